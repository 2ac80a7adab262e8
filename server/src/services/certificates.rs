//! Certificate issuance for completed events.
//!
//! The batch is safe to re-run: every insert goes through the ledger's
//! (event, user) uniqueness, so a second run only reports skips. One
//! attendee failing never stops the others.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::{load_event, require_owner};
use crate::models::{Caller, Certificate, Event, EventStatus};
use crate::store::{AttendanceLedger, CertificateInsert, CertificateLedger, EventStore, StoreError};
use crate::utils::error::AppError;

/// Fresh numbers to try for one attendee before reporting a failure.
const MAX_NUMBER_ATTEMPTS: usize = 5;

#[derive(Debug, Error)]
#[error("certificate rendering failed: {0}")]
pub struct RenderError(pub String);

/// Seam to the external PDF renderer.
#[async_trait]
pub trait CertificateRenderer: Send + Sync {
    async fn render(&self, event: &Event, certificate: &Certificate) -> Result<(), RenderError>;
}

/// Records the render job for the document service to pick up.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingRenderer;

#[async_trait]
impl CertificateRenderer for LoggingRenderer {
    async fn render(&self, event: &Event, certificate: &Certificate) -> Result<(), RenderError> {
        info!(
            event_id = %event.id,
            event_title = %event.title,
            number = %certificate.number,
            user_id = %certificate.user_id,
            "Certificate queued for rendering"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuanceFailure {
    pub user_id: Uuid,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IssuanceReport {
    pub generated: usize,
    pub skipped: usize,
    pub total_attendees: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<IssuanceFailure>,
}

enum Issued {
    Generated,
    Skipped,
}

#[derive(Debug, Error)]
enum IssueError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("could not allocate a unique certificate number")]
    NumbersExhausted,
}

#[derive(Clone)]
pub struct CertificateService {
    events: Arc<dyn EventStore>,
    attendance: Arc<dyn AttendanceLedger>,
    certificates: Arc<dyn CertificateLedger>,
    renderer: Arc<dyn CertificateRenderer>,
    concurrency: usize,
}

impl CertificateService {
    pub fn new(
        events: Arc<dyn EventStore>,
        attendance: Arc<dyn AttendanceLedger>,
        certificates: Arc<dyn CertificateLedger>,
        renderer: Arc<dyn CertificateRenderer>,
        concurrency: usize,
    ) -> Self {
        Self {
            events,
            attendance,
            certificates,
            renderer,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn issue_for_event(
        &self,
        event_id: Uuid,
        caller: &Caller,
    ) -> Result<IssuanceReport, AppError> {
        let event = load_event(self.events.as_ref(), event_id).await?;
        require_owner(&event, caller)?;
        self.issue(&event, caller.id).await
    }

    pub(crate) async fn issue(
        &self,
        event: &Event,
        issued_by: Uuid,
    ) -> Result<IssuanceReport, AppError> {
        if !event.certificates_enabled {
            info!(event_id = %event.id, "Certificates disabled, nothing to issue");
            return Ok(IssuanceReport::default());
        }
        if event.status != EventStatus::Completed {
            return Err(AppError::InvalidState(format!(
                "Certificates can only be issued for completed events, this one is {}",
                event.status
            )));
        }

        let attendees: Vec<Uuid> = self
            .attendance
            .list_attendance(event.id)
            .await?
            .into_iter()
            .map(|record| record.user_id)
            .collect();
        let total_attendees = attendees.len();

        let outcomes: Vec<(Uuid, Result<Issued, IssueError>)> = stream::iter(attendees)
            .map(|user_id| async move {
                (user_id, self.issue_one(event, user_id, issued_by).await)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = IssuanceReport {
            total_attendees,
            ..IssuanceReport::default()
        };
        for (user_id, outcome) in outcomes {
            match outcome {
                Ok(Issued::Generated) => report.generated += 1,
                Ok(Issued::Skipped) => report.skipped += 1,
                Err(e) => {
                    warn!(event_id = %event.id, %user_id, error = %e, "Certificate not issued");
                    report.errors.push(IssuanceFailure {
                        user_id,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            event_id = %event.id,
            generated = report.generated,
            skipped = report.skipped,
            failed = report.errors.len(),
            total = report.total_attendees,
            "Certificate issuance finished"
        );
        Ok(report)
    }

    async fn issue_one(
        &self,
        event: &Event,
        user_id: Uuid,
        issued_by: Uuid,
    ) -> Result<Issued, IssueError> {
        // Saves a render for the common re-run case; the insert below decides.
        if self
            .certificates
            .find_certificate(event.id, user_id)
            .await?
            .is_some()
        {
            return Ok(Issued::Skipped);
        }

        for attempt in 1..=MAX_NUMBER_ATTEMPTS {
            let certificate = Certificate::new(event.id, user_id, issued_by);
            self.renderer.render(event, &certificate).await?;
            match self.certificates.issue_if_absent(certificate).await? {
                CertificateInsert::Issued(_) => return Ok(Issued::Generated),
                CertificateInsert::AlreadyIssued => return Ok(Issued::Skipped),
                CertificateInsert::NumberTaken => {
                    warn!(
                        event_id = %event.id,
                        %user_id,
                        attempt,
                        "Certificate number collision, regenerating"
                    );
                }
            }
        }
        Err(IssueError::NumbersExhausted)
    }

    pub async fn list_for(&self, caller: &Caller) -> Result<Vec<Certificate>, AppError> {
        Ok(self.certificates.list_certificates_for_user(caller.id).await?)
    }

    pub async fn list_for_event(
        &self,
        event_id: Uuid,
        caller: &Caller,
    ) -> Result<Vec<Certificate>, AppError> {
        let event = load_event(self.events.as_ref(), event_id).await?;
        require_owner(&event, caller)?;
        Ok(self.certificates.list_certificates_for_event(event_id).await?)
    }

    /// Public authenticity check by printed number.
    pub async fn lookup(&self, number: &str) -> Result<Certificate, AppError> {
        self.certificates
            .get_certificate(number)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Certificate '{number}' was not found")))
    }
}
