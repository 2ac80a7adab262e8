use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer, Config};
use crate::handlers::{certificates, events, health_check, tickets};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/events", get(events::list_events).post(events::create_event))
        .route("/api/events/:event_id", get(events::get_event))
        .route("/api/events/:event_id/publish", post(events::publish_event))
        .route("/api/events/:event_id/start", post(events::start_event))
        .route("/api/events/:event_id/complete", post(events::complete_event))
        .route("/api/events/:event_id/cancel", post(events::cancel_event))
        .route("/api/events/:event_id/register", post(events::register))
        .route("/api/events/:event_id/verify", post(events::verify_ticket))
        .route("/api/events/:event_id/attendance", get(events::list_attendance))
        .route(
            "/api/events/:event_id/certificates",
            get(certificates::event_certificates).post(certificates::issue_certificates),
        )
        .route("/api/tickets", get(tickets::my_tickets))
        .route("/api/tickets/:code", get(tickets::get_ticket))
        .route("/api/tickets/:code/cancel", post(tickets::cancel_ticket))
        .route("/api/certificates", get(certificates::my_certificates))
        .route("/api/certificates/:number", get(certificates::lookup_certificate))
        .with_state(state)
}

/// Routes plus the HTTP middleware stack.
pub fn create_app(state: AppState, config: &Config) -> Router {
    create_routes(state)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(config.production))
        .layer(create_cors_layer(&config.cors_allowed_origins))
}
