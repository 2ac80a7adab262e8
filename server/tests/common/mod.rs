#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use eventhub_server::models::{
    AttendanceRecord, Caller, Certificate, Event, EventStatus, NewEvent, Ticket, TicketCode,
};
use eventhub_server::services::{CertificateRenderer, LoggingRenderer};
use eventhub_server::state::AppState;
use eventhub_server::store::{
    AttendanceLedger, CertificateInsert, CertificateLedger, Conditional, EventStore,
    MemoryStore, Recorded, SeatReservation, StoreError, TicketInsert, TicketStore,
};
use uuid::Uuid;

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
    pub organizer: Caller,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_renderer(Arc::new(LoggingRenderer))
    }

    pub fn with_renderer(renderer: Arc<dyn CertificateRenderer>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), renderer, 4);
        Self {
            store,
            state,
            organizer: Caller::organizer(Uuid::new_v4()),
        }
    }

    /// A harness whose services run on top of a [`FaultyStore`]. `store` still
    /// points at the healthy tables underneath, for seeding and inspection.
    pub fn with_faults() -> (Self, Arc<FaultyStore>) {
        let store = Arc::new(MemoryStore::new());
        let faults = Arc::new(FaultyStore::new(store.clone()));
        let state = AppState::new(faults.clone(), Arc::new(LoggingRenderer), 4);
        let harness = Self {
            store,
            state,
            organizer: Caller::organizer(Uuid::new_v4()),
        };
        (harness, faults)
    }

    pub async fn draft_event(&self, seat_limit: i32, certificates_enabled: bool) -> Event {
        self.state
            .events
            .create(&self.organizer, new_event(seat_limit, certificates_enabled))
            .await
            .unwrap()
    }

    pub async fn published_event(&self, seat_limit: i32) -> Event {
        self.published_event_with(seat_limit, true).await
    }

    pub async fn published_event_with(&self, seat_limit: i32, certificates_enabled: bool) -> Event {
        let event = self.draft_event(seat_limit, certificates_enabled).await;
        self.state
            .events
            .publish(event.id, &self.organizer)
            .await
            .unwrap()
    }

    /// Seed an event directly, skipping lifecycle and date validation.
    pub async fn seed_event(&self, configure: impl FnOnce(&mut Event)) -> Event {
        let now = Utc::now();
        let mut event = Event {
            id: Uuid::new_v4(),
            organizer_id: self.organizer.id,
            title: "Seeded event".to_string(),
            description: None,
            location: "Main auditorium".to_string(),
            department: None,
            starts_at: now + Duration::days(7),
            seat_limit: 50,
            registered_count: 0,
            status: EventStatus::Published,
            certificates_enabled: true,
            created_at: now,
            updated_at: now,
        };
        configure(&mut event);
        self.store.put_event(event.clone()).await;
        event
    }

    pub async fn event(&self, event_id: Uuid) -> Event {
        self.state.events.get(event_id).await.unwrap()
    }
}

pub fn new_event(seat_limit: i32, certificates_enabled: bool) -> NewEvent {
    NewEvent {
        title: "Intro to Rust workshop".to_string(),
        description: Some("Hands-on session".to_string()),
        location: "Lab 3".to_string(),
        department: None,
        starts_at: Utc::now() + Duration::days(7),
        seat_limit,
        certificates_enabled,
    }
}

pub fn student() -> Caller {
    Caller::student(Uuid::new_v4(), Some("CSE".to_string()))
}

fn injected(what: &str) -> StoreError {
    StoreError::Corrupt(format!("injected failure: {what}"))
}

/// How [`FaultyStore::insert_ticket`] behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketInsertMode {
    Normal,
    Fail,
    AlwaysCodeTaken,
}

/// Delegates to a [`MemoryStore`] but can be told to fail individual calls.
pub struct FaultyStore {
    inner: Arc<MemoryStore>,
    fail_attendance_write: AtomicBool,
    fail_attendance_list: AtomicBool,
    ticket_insert: Mutex<TicketInsertMode>,
    number_clashes: AtomicUsize,
}

impl FaultyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_attendance_write: AtomicBool::new(false),
            fail_attendance_list: AtomicBool::new(false),
            ticket_insert: Mutex::new(TicketInsertMode::Normal),
            number_clashes: AtomicUsize::new(0),
        }
    }

    pub fn fail_attendance_write(&self, fail: bool) {
        self.fail_attendance_write.store(fail, Ordering::SeqCst);
    }

    pub fn fail_attendance_list(&self, fail: bool) {
        self.fail_attendance_list.store(fail, Ordering::SeqCst);
    }

    pub fn set_ticket_insert(&self, mode: TicketInsertMode) {
        *self.ticket_insert.lock().unwrap() = mode;
    }

    /// The next `count` certificate inserts report a taken number.
    pub fn clash_certificate_numbers(&self, count: usize) {
        self.number_clashes.store(count, Ordering::SeqCst);
    }

    fn take_number_clash(&self) -> bool {
        self.number_clashes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl EventStore for FaultyStore {
    async fn create_event(&self, organizer_id: Uuid, input: NewEvent) -> Result<Event, StoreError> {
        self.inner.create_event(organizer_id, input).await
    }

    async fn get_event(&self, event_id: Uuid) -> Result<Option<Event>, StoreError> {
        self.inner.get_event(event_id).await
    }

    async fn list_events_by_status(&self, status: EventStatus) -> Result<Vec<Event>, StoreError> {
        self.inner.list_events_by_status(status).await
    }

    async fn transition_event(
        &self,
        event_id: Uuid,
        from: EventStatus,
        to: EventStatus,
    ) -> Result<Conditional<Event>, StoreError> {
        self.inner.transition_event(event_id, from, to).await
    }

    async fn reserve_seat(&self, event_id: Uuid) -> Result<SeatReservation, StoreError> {
        self.inner.reserve_seat(event_id).await
    }

    async fn release_seat(&self, event_id: Uuid) -> Result<Conditional<i32>, StoreError> {
        self.inner.release_seat(event_id).await
    }
}

#[async_trait]
impl TicketStore for FaultyStore {
    async fn insert_ticket(&self, ticket: Ticket) -> Result<TicketInsert, StoreError> {
        let mode = *self.ticket_insert.lock().unwrap();
        match mode {
            TicketInsertMode::Fail => Err(injected("insert_ticket")),
            TicketInsertMode::AlwaysCodeTaken => Ok(TicketInsert::CodeTaken),
            TicketInsertMode::Normal => self.inner.insert_ticket(ticket).await,
        }
    }

    async fn get_ticket(&self, code: &TicketCode) -> Result<Option<Ticket>, StoreError> {
        self.inner.get_ticket(code).await
    }

    async fn find_active_ticket(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Ticket>, StoreError> {
        self.inner.find_active_ticket(event_id, user_id).await
    }

    async fn list_tickets_for_user(&self, user_id: Uuid) -> Result<Vec<Ticket>, StoreError> {
        self.inner.list_tickets_for_user(user_id).await
    }

    async fn mark_used(
        &self,
        code: &TicketCode,
        used_at: DateTime<Utc>,
    ) -> Result<Conditional<Ticket>, StoreError> {
        self.inner.mark_used(code, used_at).await
    }

    async fn cancel_ticket(&self, code: &TicketCode) -> Result<Conditional<Ticket>, StoreError> {
        self.inner.cancel_ticket(code).await
    }

    async fn revert_used(&self, code: &TicketCode) -> Result<Conditional<Ticket>, StoreError> {
        self.inner.revert_used(code).await
    }
}

#[async_trait]
impl AttendanceLedger for FaultyStore {
    async fn record_once(
        &self,
        record: AttendanceRecord,
    ) -> Result<Recorded<AttendanceRecord>, StoreError> {
        if self.fail_attendance_write.load(Ordering::SeqCst) {
            return Err(injected("record_once"));
        }
        self.inner.record_once(record).await
    }

    async fn find_attendance(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        self.inner.find_attendance(event_id, user_id).await
    }

    async fn list_attendance(&self, event_id: Uuid) -> Result<Vec<AttendanceRecord>, StoreError> {
        if self.fail_attendance_list.load(Ordering::SeqCst) {
            return Err(injected("list_attendance"));
        }
        self.inner.list_attendance(event_id).await
    }
}

#[async_trait]
impl CertificateLedger for FaultyStore {
    async fn issue_if_absent(
        &self,
        certificate: Certificate,
    ) -> Result<CertificateInsert, StoreError> {
        if self.take_number_clash() {
            return Ok(CertificateInsert::NumberTaken);
        }
        self.inner.issue_if_absent(certificate).await
    }

    async fn find_certificate(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Certificate>, StoreError> {
        self.inner.find_certificate(event_id, user_id).await
    }

    async fn get_certificate(&self, number: &str) -> Result<Option<Certificate>, StoreError> {
        self.inner.get_certificate(number).await
    }

    async fn list_certificates_for_event(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<Certificate>, StoreError> {
        self.inner.list_certificates_for_event(event_id).await
    }

    async fn list_certificates_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Certificate>, StoreError> {
        self.inner.list_certificates_for_user(user_id).await
    }
}
