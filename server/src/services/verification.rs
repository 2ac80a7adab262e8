//! Door-side ticket verification.
//!
//! Admission is at-most-once per ticket. The conditional `unused → used`
//! update picks the single winner among concurrent scans; everyone else
//! re-reads the ticket and reports when it was used. The attendance ledger's
//! (event, user) uniqueness is the backstop behind that update. If the
//! attendance write fails outright the ticket is put back to `unused`.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{load_event, load_ticket, require_owner};
use crate::models::{AttendanceRecord, Caller, Ticket, TicketCode, TicketStatus};
use crate::store::{AttendanceLedger, Conditional, EventStore, Recorded, TicketStore};
use crate::utils::error::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct Admission {
    pub ticket: Ticket,
    pub attendance: AttendanceRecord,
}

#[derive(Clone)]
pub struct VerificationService {
    events: Arc<dyn EventStore>,
    tickets: Arc<dyn TicketStore>,
    attendance: Arc<dyn AttendanceLedger>,
}

impl VerificationService {
    pub fn new(
        events: Arc<dyn EventStore>,
        tickets: Arc<dyn TicketStore>,
        attendance: Arc<dyn AttendanceLedger>,
    ) -> Self {
        Self {
            events,
            tickets,
            attendance,
        }
    }

    pub async fn verify(
        &self,
        code: &TicketCode,
        event_id: Uuid,
        verifier: &Caller,
    ) -> Result<Admission, AppError> {
        let ticket = self.load(code).await?;
        if ticket.event_id != event_id {
            return Err(AppError::WrongEvent);
        }
        let event = load_event(self.events.as_ref(), event_id).await?;
        require_owner(&event, verifier)?;
        ensure_admissible(&ticket)?;

        let now = Utc::now();
        let admitted = match self.tickets.mark_used(code, now).await? {
            Conditional::Applied(ticket) => ticket,
            Conditional::NotMatched => {
                // Another scan or a cancellation got there first.
                let current = self.load(code).await?;
                ensure_admissible(&current)?;
                return Err(AppError::StorageConflict(
                    "Ticket changed during verification".to_string(),
                ));
            }
        };

        let record = AttendanceRecord::new(
            event_id,
            admitted.user_id,
            admitted.code.clone(),
            verifier.id,
            now,
        );
        let recorded = match self.attendance.record_once(record).await {
            Ok(recorded) => recorded,
            Err(e) => {
                self.revert_admission(&admitted).await;
                return Err(e.into());
            }
        };
        match recorded {
            Recorded::Inserted(attendance) => {
                info!(
                    %event_id,
                    ticket = %admitted.code,
                    user_id = %admitted.user_id,
                    verified_by = %verifier.id,
                    "Entry recorded"
                );
                Ok(Admission {
                    ticket: admitted,
                    attendance,
                })
            }
            Recorded::AlreadyExists => {
                warn!(
                    %event_id,
                    ticket = %admitted.code,
                    user_id = %admitted.user_id,
                    "Attendance already recorded for this attendee"
                );
                let used_at = self
                    .attendance
                    .find_attendance(event_id, admitted.user_id)
                    .await?
                    .map_or(now, |existing| existing.entered_at);
                Err(AppError::AlreadyUsed { used_at })
            }
        }
    }

    /// Put a ticket back to `unused` when its attendance record could not be
    /// written, so the holder is not turned away on the next scan.
    async fn revert_admission(&self, ticket: &Ticket) {
        match self.tickets.revert_used(&ticket.code).await {
            Ok(Conditional::Applied(_)) => {
                warn!(
                    ticket = %ticket.code,
                    event_id = %ticket.event_id,
                    "Attendance write failed, admission reverted"
                );
            }
            Ok(Conditional::NotMatched) => {
                error!(ticket = %ticket.code, "Admission revert found the ticket no longer used");
            }
            Err(e) => {
                error!(
                    ticket = %ticket.code,
                    error = ?e,
                    "Failed to revert admission, ticket is used without attendance"
                );
            }
        }
    }

    async fn load(&self, code: &TicketCode) -> Result<Ticket, AppError> {
        load_ticket(self.tickets.as_ref(), code).await
    }
}

fn ensure_admissible(ticket: &Ticket) -> Result<(), AppError> {
    match ticket.status {
        TicketStatus::Unused => Ok(()),
        TicketStatus::Used => Err(AppError::AlreadyUsed {
            used_at: ticket.used_at.unwrap_or(ticket.updated_at),
        }),
        TicketStatus::Cancelled => Err(AppError::TicketCancelled),
    }
}
