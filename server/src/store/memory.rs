//! In-process backend for development and tests.
//!
//! All collections sit behind one async lock and each trait method takes it
//! exactly once, so every method behaves like a single atomic statement.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AttendanceLedger, CertificateInsert, CertificateLedger, Conditional, EventStore, Recorded,
    SeatReservation, StoreError, TicketInsert, TicketStore,
};
use crate::models::{
    AttendanceRecord, Certificate, Event, EventStatus, NewEvent, Ticket, TicketCode, TicketStatus,
};

#[derive(Default)]
struct Tables {
    events: HashMap<Uuid, Event>,
    tickets: HashMap<TicketCode, Ticket>,
    /// (event, user) → code of the holder's non-cancelled ticket.
    active_tickets: HashMap<(Uuid, Uuid), TicketCode>,
    attendance: Vec<AttendanceRecord>,
    attended: HashSet<(Uuid, Uuid)>,
    certificates: HashMap<(Uuid, Uuid), Certificate>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an event as-is, bypassing lifecycle rules. Used for seeding.
    pub async fn put_event(&self, event: Event) {
        self.tables.write().await.events.insert(event.id, event);
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn create_event(&self, organizer_id: Uuid, input: NewEvent) -> Result<Event, StoreError> {
        let now = Utc::now();
        let event = Event {
            id: Uuid::new_v4(),
            organizer_id,
            title: input.title,
            description: input.description,
            location: input.location,
            department: input.department,
            starts_at: input.starts_at,
            seat_limit: input.seat_limit,
            registered_count: 0,
            status: EventStatus::Draft,
            certificates_enabled: input.certificates_enabled,
            created_at: now,
            updated_at: now,
        };
        self.tables
            .write()
            .await
            .events
            .insert(event.id, event.clone());
        Ok(event)
    }

    async fn get_event(&self, event_id: Uuid) -> Result<Option<Event>, StoreError> {
        Ok(self.tables.read().await.events.get(&event_id).cloned())
    }

    async fn list_events_by_status(&self, status: EventStatus) -> Result<Vec<Event>, StoreError> {
        let tables = self.tables.read().await;
        let mut events: Vec<Event> = tables
            .events
            .values()
            .filter(|e| e.status == status)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.starts_at);
        Ok(events)
    }

    async fn transition_event(
        &self,
        event_id: Uuid,
        from: EventStatus,
        to: EventStatus,
    ) -> Result<Conditional<Event>, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.events.get_mut(&event_id) {
            Some(event) if event.status == from => {
                event.status = to;
                event.updated_at = Utc::now();
                Ok(Conditional::Applied(event.clone()))
            }
            _ => Ok(Conditional::NotMatched),
        }
    }

    async fn reserve_seat(&self, event_id: Uuid) -> Result<SeatReservation, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.events.get_mut(&event_id) {
            Some(event)
                if event.status == EventStatus::Published
                    && event.registered_count < event.seat_limit =>
            {
                event.registered_count += 1;
                event.updated_at = Utc::now();
                Ok(SeatReservation::Reserved {
                    registered_count: event.registered_count,
                })
            }
            _ => Ok(SeatReservation::Exhausted),
        }
    }

    async fn release_seat(&self, event_id: Uuid) -> Result<Conditional<i32>, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.events.get_mut(&event_id) {
            Some(event) if event.registered_count > 0 => {
                event.registered_count -= 1;
                event.updated_at = Utc::now();
                Ok(Conditional::Applied(event.registered_count))
            }
            _ => Ok(Conditional::NotMatched),
        }
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn insert_ticket(&self, ticket: Ticket) -> Result<TicketInsert, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.tickets.contains_key(&ticket.code) {
            return Ok(TicketInsert::CodeTaken);
        }
        let holder = (ticket.event_id, ticket.user_id);
        if tables.active_tickets.contains_key(&holder) {
            return Ok(TicketInsert::DuplicateHolder);
        }
        tables.active_tickets.insert(holder, ticket.code.clone());
        tables.tickets.insert(ticket.code.clone(), ticket.clone());
        Ok(TicketInsert::Created(ticket))
    }

    async fn get_ticket(&self, code: &TicketCode) -> Result<Option<Ticket>, StoreError> {
        Ok(self.tables.read().await.tickets.get(code).cloned())
    }

    async fn find_active_ticket(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Ticket>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .active_tickets
            .get(&(event_id, user_id))
            .and_then(|code| tables.tickets.get(code))
            .filter(|ticket| ticket.status.is_active())
            .cloned())
    }

    async fn list_tickets_for_user(&self, user_id: Uuid) -> Result<Vec<Ticket>, StoreError> {
        let tables = self.tables.read().await;
        let mut tickets: Vec<Ticket> = tables
            .tickets
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tickets)
    }

    async fn mark_used(
        &self,
        code: &TicketCode,
        used_at: DateTime<Utc>,
    ) -> Result<Conditional<Ticket>, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.tickets.get_mut(code) {
            Some(ticket) if ticket.status == TicketStatus::Unused => {
                ticket.status = TicketStatus::Used;
                ticket.used_at = Some(used_at);
                ticket.updated_at = used_at;
                Ok(Conditional::Applied(ticket.clone()))
            }
            _ => Ok(Conditional::NotMatched),
        }
    }

    async fn cancel_ticket(&self, code: &TicketCode) -> Result<Conditional<Ticket>, StoreError> {
        let mut tables = self.tables.write().await;
        let cancelled = match tables.tickets.get_mut(code) {
            Some(ticket) if ticket.status == TicketStatus::Unused => {
                ticket.status = TicketStatus::Cancelled;
                ticket.updated_at = Utc::now();
                ticket.clone()
            }
            _ => return Ok(Conditional::NotMatched),
        };
        tables
            .active_tickets
            .remove(&(cancelled.event_id, cancelled.user_id));
        Ok(Conditional::Applied(cancelled))
    }

    async fn revert_used(&self, code: &TicketCode) -> Result<Conditional<Ticket>, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.tickets.get_mut(code) {
            Some(ticket) if ticket.status == TicketStatus::Used => {
                ticket.status = TicketStatus::Unused;
                ticket.used_at = None;
                ticket.updated_at = Utc::now();
                Ok(Conditional::Applied(ticket.clone()))
            }
            _ => Ok(Conditional::NotMatched),
        }
    }
}

#[async_trait]
impl AttendanceLedger for MemoryStore {
    async fn record_once(
        &self,
        record: AttendanceRecord,
    ) -> Result<Recorded<AttendanceRecord>, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.attended.insert((record.event_id, record.user_id)) {
            return Ok(Recorded::AlreadyExists);
        }
        tables.attendance.push(record.clone());
        Ok(Recorded::Inserted(record))
    }

    async fn find_attendance(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .attendance
            .iter()
            .find(|r| r.event_id == event_id && r.user_id == user_id)
            .cloned())
    }

    async fn list_attendance(&self, event_id: Uuid) -> Result<Vec<AttendanceRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .attendance
            .iter()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CertificateLedger for MemoryStore {
    async fn issue_if_absent(
        &self,
        certificate: Certificate,
    ) -> Result<CertificateInsert, StoreError> {
        let mut tables = self.tables.write().await;
        let key = (certificate.event_id, certificate.user_id);
        if tables.certificates.contains_key(&key) {
            return Ok(CertificateInsert::AlreadyIssued);
        }
        if tables
            .certificates
            .values()
            .any(|c| c.number == certificate.number)
        {
            return Ok(CertificateInsert::NumberTaken);
        }
        tables.certificates.insert(key, certificate.clone());
        Ok(CertificateInsert::Issued(certificate))
    }

    async fn find_certificate(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Certificate>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .certificates
            .get(&(event_id, user_id))
            .cloned())
    }

    async fn get_certificate(&self, number: &str) -> Result<Option<Certificate>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .certificates
            .values()
            .find(|c| c.number == number)
            .cloned())
    }

    async fn list_certificates_for_event(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<Certificate>, StoreError> {
        let tables = self.tables.read().await;
        let mut certificates: Vec<Certificate> = tables
            .certificates
            .values()
            .filter(|c| c.event_id == event_id)
            .cloned()
            .collect();
        certificates.sort_by_key(|c| c.issued_at);
        Ok(certificates)
    }

    async fn list_certificates_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Certificate>, StoreError> {
        let tables = self.tables.read().await;
        let mut certificates: Vec<Certificate> = tables
            .certificates
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        certificates.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(certificates)
    }
}
