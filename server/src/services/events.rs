use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use super::certificates::{CertificateService, IssuanceReport};
use super::{load_event, require_owner};
use crate::models::{AttendanceRecord, Caller, Event, EventStatus, NewEvent};
use crate::store::{AttendanceLedger, Conditional, EventStore};
use crate::utils::error::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct EventCompletion {
    pub event: Event,
    /// Present when the event issues certificates and the batch ran.
    pub certificates: Option<IssuanceReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuance_error: Option<String>,
}

#[derive(Clone)]
pub struct EventService {
    events: Arc<dyn EventStore>,
    attendance: Arc<dyn AttendanceLedger>,
    certificates: CertificateService,
}

impl EventService {
    pub fn new(
        events: Arc<dyn EventStore>,
        attendance: Arc<dyn AttendanceLedger>,
        certificates: CertificateService,
    ) -> Self {
        Self {
            events,
            attendance,
            certificates,
        }
    }

    pub async fn create(&self, caller: &Caller, input: NewEvent) -> Result<Event, AppError> {
        if !caller.is_organizer() {
            return Err(AppError::Forbidden(format!(
                "Only organizers can create events, not a {}",
                caller.role
            )));
        }
        validate_new_event(&input)?;

        let event = self.events.create_event(caller.id, input).await?;
        info!(event_id = %event.id, organizer_id = %caller.id, seat_limit = event.seat_limit, "Event created");
        Ok(event)
    }

    pub async fn get(&self, event_id: Uuid) -> Result<Event, AppError> {
        load_event(self.events.as_ref(), event_id).await
    }

    pub async fn list_published(&self) -> Result<Vec<Event>, AppError> {
        Ok(self
            .events
            .list_events_by_status(EventStatus::Published)
            .await?)
    }

    pub async fn publish(&self, event_id: Uuid, caller: &Caller) -> Result<Event, AppError> {
        self.transition(event_id, caller, EventStatus::Published).await
    }

    pub async fn start(&self, event_id: Uuid, caller: &Caller) -> Result<Event, AppError> {
        self.transition(event_id, caller, EventStatus::Ongoing).await
    }

    pub async fn cancel(&self, event_id: Uuid, caller: &Caller) -> Result<Event, AppError> {
        self.transition(event_id, caller, EventStatus::Cancelled).await
    }

    /// Completes the event and runs certificate issuance when enabled.
    pub async fn complete(
        &self,
        event_id: Uuid,
        caller: &Caller,
    ) -> Result<EventCompletion, AppError> {
        let event = self
            .transition(event_id, caller, EventStatus::Completed)
            .await?;
        if !event.certificates_enabled {
            return Ok(EventCompletion {
                event,
                certificates: None,
                issuance_error: None,
            });
        }

        // The event is completed either way; a failed batch is reported and can
        // be re-run through the certificates endpoint.
        match self.certificates.issue(&event, caller.id).await {
            Ok(report) => Ok(EventCompletion {
                event,
                certificates: Some(report),
                issuance_error: None,
            }),
            Err(e) => {
                error!(%event_id, error = %e, "Certificate issuance failed after completion");
                Ok(EventCompletion {
                    event,
                    certificates: None,
                    issuance_error: Some(
                        "Certificate issuance failed, run it again for this event".to_string(),
                    ),
                })
            }
        }
    }

    pub async fn attendance(
        &self,
        event_id: Uuid,
        caller: &Caller,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        let event = load_event(self.events.as_ref(), event_id).await?;
        require_owner(&event, caller)?;
        Ok(self.attendance.list_attendance(event_id).await?)
    }

    async fn transition(
        &self,
        event_id: Uuid,
        caller: &Caller,
        to: EventStatus,
    ) -> Result<Event, AppError> {
        let event = load_event(self.events.as_ref(), event_id).await?;
        require_owner(&event, caller)?;
        if event.status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "Event is already {}, it can no longer change",
                event.status
            )));
        }
        if !event.status.can_transition_to(to) {
            return Err(AppError::InvalidState(format!(
                "Event cannot move from {} to {to}",
                event.status
            )));
        }

        match self
            .events
            .transition_event(event_id, event.status, to)
            .await?
        {
            Conditional::Applied(updated) => {
                info!(%event_id, from = %event.status, to = %to, "Event status changed");
                Ok(updated)
            }
            Conditional::NotMatched => Err(AppError::StorageConflict(
                "Event status changed concurrently, reload and retry".to_string(),
            )),
        }
    }
}

fn validate_new_event(input: &NewEvent) -> Result<(), AppError> {
    if input.title.trim().is_empty() {
        return Err(AppError::ValidationError("Title is required".to_string()));
    }
    if input.location.trim().is_empty() {
        return Err(AppError::ValidationError("Location is required".to_string()));
    }
    if input.seat_limit < 1 {
        return Err(AppError::ValidationError(
            "Seat limit must be at least 1".to_string(),
        ));
    }
    if input.starts_at <= Utc::now() {
        return Err(AppError::ValidationError(
            "Event must start in the future".to_string(),
        ));
    }
    Ok(())
}
