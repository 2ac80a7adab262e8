use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::load_event;
use crate::models::{Caller, EventStatus, Ticket, TicketCode};
use crate::store::{Conditional, EventStore, SeatReservation, TicketInsert, TicketStore};
use crate::utils::error::AppError;

/// Fresh codes to try before giving up on a registration.
const MAX_CODE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub ticket: Ticket,
    /// Exactly the ticket code; no personal data goes into the QR image.
    pub qr_payload: String,
    pub registered_count: i32,
}

#[derive(Clone)]
pub struct RegistrationService {
    events: Arc<dyn EventStore>,
    tickets: Arc<dyn TicketStore>,
}

impl RegistrationService {
    pub fn new(events: Arc<dyn EventStore>, tickets: Arc<dyn TicketStore>) -> Self {
        Self { events, tickets }
    }

    pub async fn register(&self, event_id: Uuid, caller: &Caller) -> Result<Registration, AppError> {
        if !caller.is_student() {
            return Err(AppError::Forbidden(format!(
                "Only students can register for events, not an {}",
                caller.role
            )));
        }

        let event = load_event(self.events.as_ref(), event_id).await?;
        if event.status != EventStatus::Published {
            return Err(AppError::RegistrationClosed(format!(
                "Event is {}, registration is not open",
                event.status
            )));
        }
        if event.starts_at <= Utc::now() {
            return Err(AppError::RegistrationClosed(
                "Event has already started".to_string(),
            ));
        }
        if let Some(department) = &event.department {
            if caller.department.as_deref() != Some(department.as_str()) {
                return Err(AppError::Forbidden(format!(
                    "Registration is limited to the {department} department"
                )));
            }
        }
        if self
            .tickets
            .find_active_ticket(event_id, caller.id)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicateRegistration);
        }

        // The earlier checks are advisory; this update is the one that counts.
        let registered_count = match self.events.reserve_seat(event_id).await? {
            SeatReservation::Reserved { registered_count } => registered_count,
            SeatReservation::Exhausted => {
                info!(%event_id, user_id = %caller.id, "Registration rejected, no seats left");
                return Err(AppError::SeatsExhausted);
            }
        };

        match self.issue_ticket(event_id, caller.id).await {
            Ok(ticket) => {
                info!(
                    %event_id,
                    user_id = %caller.id,
                    ticket = %ticket.code,
                    registered_count,
                    "Registration confirmed"
                );
                Ok(Registration {
                    qr_payload: ticket.qr_payload().to_string(),
                    ticket,
                    registered_count,
                })
            }
            Err(err) => {
                self.release_reserved_seat(event_id).await;
                Err(err)
            }
        }
    }

    async fn issue_ticket(&self, event_id: Uuid, user_id: Uuid) -> Result<Ticket, AppError> {
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let ticket = Ticket::new(TicketCode::generate(), event_id, user_id);
            match self.tickets.insert_ticket(ticket).await? {
                TicketInsert::Created(ticket) => return Ok(ticket),
                TicketInsert::DuplicateHolder => return Err(AppError::DuplicateRegistration),
                TicketInsert::CodeTaken => {
                    warn!(%event_id, attempt, "Ticket code collision, regenerating");
                }
            }
        }
        Err(AppError::InternalServerError(
            "Could not allocate a unique ticket code".to_string(),
        ))
    }

    /// Give back a seat taken by a registration that did not produce a ticket.
    async fn release_reserved_seat(&self, event_id: Uuid) {
        match self.events.release_seat(event_id).await {
            Ok(Conditional::Applied(registered_count)) => {
                debug!(%event_id, registered_count, "Reserved seat released");
            }
            Ok(Conditional::NotMatched) => {
                warn!(%event_id, "Reserved seat release found nothing to release");
            }
            Err(e) => {
                error!(%event_id, error = ?e, "Failed to release reserved seat");
            }
        }
    }
}
