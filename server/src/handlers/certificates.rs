use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::models::Caller;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

pub async fn issue_certificates(
    State(state): State<AppState>,
    caller: Caller,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let report = state.certificates.issue_for_event(event_id, &caller).await?;
    Ok(success(report, "Certificate issuance finished").into_response())
}

pub async fn event_certificates(
    State(state): State<AppState>,
    caller: Caller,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let certificates = state.certificates.list_for_event(event_id, &caller).await?;
    Ok(success(certificates, "Certificates for event").into_response())
}

pub async fn my_certificates(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Response, AppError> {
    let certificates = state.certificates.list_for(&caller).await?;
    Ok(success(certificates, "Your certificates").into_response())
}

/// Unauthenticated so printed certificates can be checked by anyone.
pub async fn lookup_certificate(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<Response, AppError> {
    let certificate = state.certificates.lookup(&number).await?;
    Ok(success(certificate, "Certificate is valid").into_response())
}
