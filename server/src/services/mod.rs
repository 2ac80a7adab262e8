//! Workflows sitting between the HTTP handlers and the stores.
//!
//! Each service holds only the stores it needs. None of them keep mutable
//! state of their own; every race is settled by a conditional store operation.

use uuid::Uuid;

use crate::models::{Caller, Event, Ticket, TicketCode};
use crate::store::{EventStore, TicketStore};
use crate::utils::error::AppError;

pub mod certificates;
pub mod events;
pub mod registration;
pub mod tickets;
pub mod verification;

pub use certificates::{
    CertificateRenderer, CertificateService, IssuanceFailure, IssuanceReport, LoggingRenderer,
    RenderError,
};
pub use events::{EventCompletion, EventService};
pub use registration::{Registration, RegistrationService};
pub use tickets::TicketService;
pub use verification::{Admission, VerificationService};

pub(crate) async fn load_event(events: &dyn EventStore, event_id: Uuid) -> Result<Event, AppError> {
    events
        .get_event(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event '{event_id}' was not found")))
}

pub(crate) async fn load_ticket(
    tickets: &dyn TicketStore,
    code: &TicketCode,
) -> Result<Ticket, AppError> {
    tickets
        .get_ticket(code)
        .await?
        .ok_or_else(|| AppError::TicketNotFound(format!("No ticket with code '{code}'")))
}

pub(crate) fn require_owner(event: &Event, caller: &Caller) -> Result<(), AppError> {
    if caller.is_organizer() && event.is_owned_by(caller.id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the organizer of this event can do that".to_string(),
        ))
    }
}
