//! Storage contracts for the ticketing core.
//!
//! Every "check then mutate" the workflows need is a single conditional
//! operation here. Implementations must make each method atomic with respect
//! to every other method on the same rows; workflows hold no locks of their
//! own and several server instances may share one database.
//!
//! Expected outcomes (a race was lost, a row already exists) come back as
//! named enum variants. `StoreError` is reserved for the store itself failing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AttendanceRecord, Certificate, Event, EventStatus, NewEvent, Ticket, TicketCode,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Result of the atomic "take a seat if one is left" update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatReservation {
    Reserved { registered_count: i32 },
    /// Event full, missing, or no longer published at commit time.
    Exhausted,
}

/// Result of a conditional update: the predicate held and the row changed,
/// or it did not and nothing was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conditional<T> {
    Applied(T),
    NotMatched,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketInsert {
    Created(Ticket),
    /// The holder already has a non-cancelled ticket for this event.
    DuplicateHolder,
    /// The generated code is taken; pick another.
    CodeTaken,
}

/// Result of an insert guarded by a uniqueness constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded<T> {
    Inserted(T),
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateInsert {
    Issued(Certificate),
    /// The attendee already holds a certificate for this event.
    AlreadyIssued,
    /// The generated number is taken; pick another.
    NumberTaken,
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn create_event(&self, organizer_id: Uuid, input: NewEvent) -> Result<Event, StoreError>;

    async fn get_event(&self, event_id: Uuid) -> Result<Option<Event>, StoreError>;

    async fn list_events_by_status(&self, status: EventStatus) -> Result<Vec<Event>, StoreError>;

    /// Set `status = to` only while the row still has status `from`.
    async fn transition_event(
        &self,
        event_id: Uuid,
        from: EventStatus,
        to: EventStatus,
    ) -> Result<Conditional<Event>, StoreError>;

    /// Increment the registered count where it is below the seat limit and
    /// the event is published, as one statement.
    async fn reserve_seat(&self, event_id: Uuid) -> Result<SeatReservation, StoreError>;

    /// Decrement the registered count where it is above zero.
    async fn release_seat(&self, event_id: Uuid) -> Result<Conditional<i32>, StoreError>;
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn insert_ticket(&self, ticket: Ticket) -> Result<TicketInsert, StoreError>;

    async fn get_ticket(&self, code: &TicketCode) -> Result<Option<Ticket>, StoreError>;

    async fn find_active_ticket(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Ticket>, StoreError>;

    async fn list_tickets_for_user(&self, user_id: Uuid) -> Result<Vec<Ticket>, StoreError>;

    /// `unused → used`, stamping `used_at`, only while the ticket is unused.
    async fn mark_used(
        &self,
        code: &TicketCode,
        used_at: DateTime<Utc>,
    ) -> Result<Conditional<Ticket>, StoreError>;

    /// `unused → cancelled`, only while the ticket is unused.
    async fn cancel_ticket(&self, code: &TicketCode) -> Result<Conditional<Ticket>, StoreError>;

    /// `used → unused`, clearing `used_at`. Only for undoing an admission
    /// whose attendance record could not be written.
    async fn revert_used(&self, code: &TicketCode) -> Result<Conditional<Ticket>, StoreError>;
}

#[async_trait]
pub trait AttendanceLedger: Send + Sync {
    async fn record_once(
        &self,
        record: AttendanceRecord,
    ) -> Result<Recorded<AttendanceRecord>, StoreError>;

    async fn find_attendance(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AttendanceRecord>, StoreError>;

    async fn list_attendance(&self, event_id: Uuid) -> Result<Vec<AttendanceRecord>, StoreError>;
}

#[async_trait]
pub trait CertificateLedger: Send + Sync {
    async fn issue_if_absent(
        &self,
        certificate: Certificate,
    ) -> Result<CertificateInsert, StoreError>;

    async fn find_certificate(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Certificate>, StoreError>;

    async fn get_certificate(&self, number: &str) -> Result<Option<Certificate>, StoreError>;

    async fn list_certificates_for_event(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<Certificate>, StoreError>;

    async fn list_certificates_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Certificate>, StoreError>;
}
