use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, warn};

use crate::store::StoreError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Ticket not found: {0}")]
    TicketNotFound(String),

    #[error("Registration closed: {0}")]
    RegistrationClosed(String),

    #[error("Already registered for this event")]
    DuplicateRegistration,

    #[error("No seats available")]
    SeatsExhausted,

    #[error("Ticket already used at {used_at}")]
    AlreadyUsed { used_at: DateTime<Utc> },

    #[error("Ticket has been cancelled")]
    TicketCancelled,

    #[error("Ticket belongs to a different event")]
    WrongEvent,

    #[error("Invalid ticket transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid event state: {0}")]
    InvalidState(String),

    #[error("Storage conflict: {0}")]
    StorageConflict(String),

    #[error("Storage error")]
    Store(#[from] StoreError),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) | AppError::TicketNotFound(_) => StatusCode::NOT_FOUND,
            AppError::RegistrationClosed(_)
            | AppError::DuplicateRegistration
            | AppError::SeatsExhausted
            | AppError::AlreadyUsed { .. }
            | AppError::TicketCancelled
            | AppError::InvalidTransition(_)
            | AppError::InvalidState(_)
            | AppError::StorageConflict(_) => StatusCode::CONFLICT,
            AppError::WrongEvent => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Store(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::TicketNotFound(_) => "TICKET_NOT_FOUND",
            AppError::RegistrationClosed(_) => "REGISTRATION_CLOSED",
            AppError::DuplicateRegistration => "DUPLICATE_REGISTRATION",
            AppError::SeatsExhausted => "SEATS_EXHAUSTED",
            AppError::AlreadyUsed { .. } => "ALREADY_USED",
            AppError::TicketCancelled => "TICKET_CANCELLED",
            AppError::WrongEvent => "WRONG_EVENT",
            AppError::InvalidTransition(_) => "INVALID_TRANSITION",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::StorageConflict(_) => "STORAGE_CONFLICT",
            AppError::Store(_) => "DATABASE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Structured context the client can act on.
    fn details(&self) -> Option<Value> {
        match self {
            AppError::AlreadyUsed { used_at } => Some(json!({ "used_at": used_at })),
            _ => None,
        }
    }

    fn log(&self) {
        match self {
            AppError::Store(e) => {
                error!(error = ?e, "Storage error");
            }
            AppError::InternalServerError(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            AppError::AuthError(_) | AppError::Forbidden(_) => {
                warn!(code = self.code(), message = %self, "Request rejected");
            }
            _ => {
                tracing::debug!(code = self.code(), message = %self, "Request rejected");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Only expose high-level message to the client
        let public_message = match &self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::TicketNotFound(msg)
            | AppError::RegistrationClosed(msg)
            | AppError::InvalidTransition(msg)
            | AppError::InvalidState(msg)
            | AppError::StorageConflict(msg) => msg.clone(),
            AppError::Store(_) => "A database error occurred".to_string(),
            AppError::InternalServerError(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        error_response(code, public_message, self.details(), status)
    }
}
