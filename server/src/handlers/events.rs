use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{Caller, NewEvent, TicketCode};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// The scanned QR payload.
    pub ticket_code: String,
}

pub async fn create_event(
    State(state): State<AppState>,
    caller: Caller,
    Json(input): Json<NewEvent>,
) -> Result<Response, AppError> {
    let event = state.events.create(&caller, input).await?;
    Ok(created(event, "Event created").into_response())
}

pub async fn list_events(State(state): State<AppState>, _caller: Caller) -> Result<Response, AppError> {
    let events = state.events.list_published().await?;
    Ok(success(events, "Published events").into_response())
}

pub async fn get_event(
    State(state): State<AppState>,
    _caller: Caller,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = state.events.get(event_id).await?;
    Ok(success(event, "Event found").into_response())
}

pub async fn publish_event(
    State(state): State<AppState>,
    caller: Caller,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = state.events.publish(event_id, &caller).await?;
    Ok(success(event, "Event published").into_response())
}

pub async fn start_event(
    State(state): State<AppState>,
    caller: Caller,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = state.events.start(event_id, &caller).await?;
    Ok(success(event, "Event started").into_response())
}

pub async fn complete_event(
    State(state): State<AppState>,
    caller: Caller,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let completion = state.events.complete(event_id, &caller).await?;
    Ok(success(completion, "Event completed").into_response())
}

pub async fn cancel_event(
    State(state): State<AppState>,
    caller: Caller,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = state.events.cancel(event_id, &caller).await?;
    Ok(success(event, "Event cancelled").into_response())
}

pub async fn register(
    State(state): State<AppState>,
    caller: Caller,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let registration = state.registration.register(event_id, &caller).await?;
    Ok(created(registration, "Registration confirmed").into_response())
}

pub async fn verify_ticket(
    State(state): State<AppState>,
    caller: Caller,
    Path(event_id): Path<Uuid>,
    Json(request): Json<VerifyRequest>,
) -> Result<Response, AppError> {
    let code = request.ticket_code.trim();
    if code.is_empty() {
        return Err(AppError::ValidationError("Ticket code is required".to_string()));
    }
    let admission = state
        .verification
        .verify(&TicketCode::from(code), event_id, &caller)
        .await?;
    Ok(success(admission, "Entry granted").into_response())
}

pub async fn list_attendance(
    State(state): State<AppState>,
    caller: Caller,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let attendance = state.events.attendance(event_id, &caller).await?;
    Ok(success(attendance, "Attendance").into_response())
}
