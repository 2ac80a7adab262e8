use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::{load_event, load_ticket};
use crate::models::{Caller, Ticket, TicketCode, TicketStatus};
use crate::store::{Conditional, EventStore, TicketStore};
use crate::utils::error::AppError;

#[derive(Clone)]
pub struct TicketService {
    events: Arc<dyn EventStore>,
    tickets: Arc<dyn TicketStore>,
}

impl TicketService {
    pub fn new(events: Arc<dyn EventStore>, tickets: Arc<dyn TicketStore>) -> Self {
        Self { events, tickets }
    }

    pub async fn get(&self, code: &TicketCode, caller: &Caller) -> Result<Ticket, AppError> {
        let ticket = self.load(code).await?;
        self.authorize(&ticket, caller).await?;
        Ok(ticket)
    }

    pub async fn list_for(&self, caller: &Caller) -> Result<Vec<Ticket>, AppError> {
        Ok(self.tickets.list_tickets_for_user(caller.id).await?)
    }

    /// `unused → cancelled`. Cancelling a cancelled ticket returns it unchanged.
    pub async fn cancel(&self, code: &TicketCode, caller: &Caller) -> Result<Ticket, AppError> {
        let ticket = self.load(code).await?;
        self.authorize(&ticket, caller).await?;
        if !ticket.status.can_transition_to(TicketStatus::Cancelled) {
            return settled_cancel(ticket);
        }

        let cancelled = match self.tickets.cancel_ticket(code).await? {
            Conditional::Applied(ticket) => ticket,
            Conditional::NotMatched => {
                let current = self.load(code).await?;
                if current.status == TicketStatus::Unused {
                    return Err(AppError::StorageConflict(
                        "Ticket changed while it was being cancelled".to_string(),
                    ));
                }
                return settled_cancel(current);
            }
        };

        info!(
            ticket = %cancelled.code,
            event_id = %cancelled.event_id,
            cancelled_by = %caller.id,
            "Ticket cancelled"
        );
        self.release_seat(cancelled.event_id).await;
        Ok(cancelled)
    }

    /// Best-effort: a failed decrement only under-reports availability.
    async fn release_seat(&self, event_id: Uuid) {
        match self.events.release_seat(event_id).await {
            Ok(Conditional::Applied(_)) => {}
            Ok(Conditional::NotMatched) => {
                warn!(%event_id, "Registered count already zero on cancellation");
            }
            Err(e) => {
                warn!(%event_id, error = ?e, "Failed to release seat after cancellation");
            }
        }
    }

    async fn load(&self, code: &TicketCode) -> Result<Ticket, AppError> {
        load_ticket(self.tickets.as_ref(), code).await
    }

    /// The holder, or the organizer who owns the ticket's event.
    async fn authorize(&self, ticket: &Ticket, caller: &Caller) -> Result<(), AppError> {
        if ticket.user_id == caller.id {
            return Ok(());
        }
        let event = load_event(self.events.as_ref(), ticket.event_id).await?;
        if caller.is_organizer() && event.is_owned_by(caller.id) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "This ticket belongs to someone else".to_string(),
            ))
        }
    }
}

/// Cancel outcome for a ticket that has already left `unused`.
fn settled_cancel(ticket: Ticket) -> Result<Ticket, AppError> {
    match ticket.status {
        TicketStatus::Cancelled => Ok(ticket),
        TicketStatus::Used => Err(AppError::InvalidTransition(
            "A ticket that has been used cannot be cancelled".to_string(),
        )),
        TicketStatus::Unused => Err(AppError::InvalidTransition(
            "Ticket is still unused".to_string(),
        )),
    }
}
