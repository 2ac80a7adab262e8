//! PostgreSQL backend.
//!
//! Atomicity comes from single statements: conditional `UPDATE ... WHERE ...
//! RETURNING` for transitions and counters, and unique constraints (see the
//! migrations) for the (event, user) pairs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use super::{
    AttendanceLedger, CertificateInsert, CertificateLedger, Conditional, EventStore, Recorded,
    SeatReservation, StoreError, TicketInsert, TicketStore,
};
use crate::models::attendance::AttendanceRow;
use crate::models::event::EventRow;
use crate::models::ticket::TicketRow;
use crate::models::{
    AttendanceRecord, Certificate, Event, EventStatus, NewEvent, Ticket, TicketCode,
};

const TICKET_PKEY: &str = "tickets_pkey";
const TICKET_ACTIVE_HOLDER: &str = "tickets_active_holder_idx";
const CERTIFICATE_PKEY: &str = "certificates_pkey";

const EVENT_COLUMNS: &str = "id, organizer_id, title, description, location, department, \
     starts_at, seat_limit, registered_count, status, certificates_enabled, created_at, updated_at";
const TICKET_COLUMNS: &str = "code, event_id, user_id, status, used_at, created_at, updated_at";
const ATTENDANCE_COLUMNS: &str = "id, event_id, user_id, ticket_code, verified_by, entered_at";
const CERTIFICATE_COLUMNS: &str = "number, event_id, user_id, issued_by, issued_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        tracing::info!("Successfully connected to database");
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!().run(&self.pool).await?;
        tracing::info!("Migrations run successfully");
        Ok(())
    }
}

fn event_from_row(row: EventRow) -> Result<Event, StoreError> {
    let id = row.id;
    Event::try_from(row).map_err(|e| StoreError::Corrupt(format!("event {id}: {e}")))
}

fn ticket_from_row(row: TicketRow) -> Result<Ticket, StoreError> {
    let code = row.code.clone();
    Ticket::try_from(row).map_err(|e| StoreError::Corrupt(format!("ticket {code}: {e}")))
}

fn violated_constraint(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => db.constraint(),
        _ => None,
    }
}

#[async_trait]
impl EventStore for PgStore {
    async fn create_event(&self, organizer_id: Uuid, input: NewEvent) -> Result<Event, StoreError> {
        let sql = format!(
            "INSERT INTO events (id, organizer_id, title, description, location, department, \
             starts_at, seat_limit, certificates_enabled) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {EVENT_COLUMNS}"
        );
        let row: EventRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(organizer_id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.location)
            .bind(&input.department)
            .bind(input.starts_at)
            .bind(input.seat_limit)
            .bind(input.certificates_enabled)
            .fetch_one(&self.pool)
            .await?;
        event_from_row(row)
    }

    async fn get_event(&self, event_id: Uuid) -> Result<Option<Event>, StoreError> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
        let row: Option<EventRow> = sqlx::query_as(&sql)
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(event_from_row).transpose()
    }

    async fn list_events_by_status(&self, status: EventStatus) -> Result<Vec<Event>, StoreError> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE status = $1 ORDER BY starts_at ASC"
        );
        let rows: Vec<EventRow> = sqlx::query_as(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(event_from_row).collect()
    }

    async fn transition_event(
        &self,
        event_id: Uuid,
        from: EventStatus,
        to: EventStatus,
    ) -> Result<Conditional<Event>, StoreError> {
        let sql = format!(
            "UPDATE events SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND status = $2 RETURNING {EVENT_COLUMNS}"
        );
        let row: Option<EventRow> = sqlx::query_as(&sql)
            .bind(event_id)
            .bind(from.as_str())
            .bind(to.as_str())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Conditional::Applied(event_from_row(row)?)),
            None => Ok(Conditional::NotMatched),
        }
    }

    async fn reserve_seat(&self, event_id: Uuid) -> Result<SeatReservation, StoreError> {
        let count: Option<i32> = sqlx::query_scalar(
            "UPDATE events SET registered_count = registered_count + 1, updated_at = NOW() \
             WHERE id = $1 AND status = 'published' AND registered_count < seat_limit \
             RETURNING registered_count",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(match count {
            Some(registered_count) => SeatReservation::Reserved { registered_count },
            None => SeatReservation::Exhausted,
        })
    }

    async fn release_seat(&self, event_id: Uuid) -> Result<Conditional<i32>, StoreError> {
        let count: Option<i32> = sqlx::query_scalar(
            "UPDATE events SET registered_count = registered_count - 1, updated_at = NOW() \
             WHERE id = $1 AND registered_count > 0 RETURNING registered_count",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(count.map_or(Conditional::NotMatched, Conditional::Applied))
    }
}

#[async_trait]
impl TicketStore for PgStore {
    async fn insert_ticket(&self, ticket: Ticket) -> Result<TicketInsert, StoreError> {
        let sql = format!(
            "INSERT INTO tickets (code, event_id, user_id, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {TICKET_COLUMNS}"
        );
        let result: Result<TicketRow, sqlx::Error> = sqlx::query_as(&sql)
            .bind(ticket.code.as_str())
            .bind(ticket.event_id)
            .bind(ticket.user_id)
            .bind(ticket.status.as_str())
            .bind(ticket.created_at)
            .bind(ticket.updated_at)
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(row) => Ok(TicketInsert::Created(ticket_from_row(row)?)),
            Err(err) => match violated_constraint(&err).map(str::to_owned).as_deref() {
                Some(TICKET_PKEY) => Ok(TicketInsert::CodeTaken),
                Some(TICKET_ACTIVE_HOLDER) => Ok(TicketInsert::DuplicateHolder),
                _ => Err(err.into()),
            },
        }
    }

    async fn get_ticket(&self, code: &TicketCode) -> Result<Option<Ticket>, StoreError> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE code = $1");
        let row: Option<TicketRow> = sqlx::query_as(&sql)
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(ticket_from_row).transpose()
    }

    async fn find_active_ticket(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Ticket>, StoreError> {
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets \
             WHERE event_id = $1 AND user_id = $2 AND status <> 'cancelled'"
        );
        let row: Option<TicketRow> = sqlx::query_as(&sql)
            .bind(event_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ticket_from_row).transpose()
    }

    async fn list_tickets_for_user(&self, user_id: Uuid) -> Result<Vec<Ticket>, StoreError> {
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE user_id = $1 ORDER BY created_at DESC"
        );
        let rows: Vec<TicketRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(ticket_from_row).collect()
    }

    async fn mark_used(
        &self,
        code: &TicketCode,
        used_at: DateTime<Utc>,
    ) -> Result<Conditional<Ticket>, StoreError> {
        let sql = format!(
            "UPDATE tickets SET status = 'used', used_at = $2, updated_at = $2 \
             WHERE code = $1 AND status = 'unused' RETURNING {TICKET_COLUMNS}"
        );
        let row: Option<TicketRow> = sqlx::query_as(&sql)
            .bind(code.as_str())
            .bind(used_at)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Conditional::Applied(ticket_from_row(row)?)),
            None => Ok(Conditional::NotMatched),
        }
    }

    async fn cancel_ticket(&self, code: &TicketCode) -> Result<Conditional<Ticket>, StoreError> {
        let sql = format!(
            "UPDATE tickets SET status = 'cancelled', updated_at = NOW() \
             WHERE code = $1 AND status = 'unused' RETURNING {TICKET_COLUMNS}"
        );
        let row: Option<TicketRow> = sqlx::query_as(&sql)
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Conditional::Applied(ticket_from_row(row)?)),
            None => Ok(Conditional::NotMatched),
        }
    }

    async fn revert_used(&self, code: &TicketCode) -> Result<Conditional<Ticket>, StoreError> {
        let sql = format!(
            "UPDATE tickets SET status = 'unused', used_at = NULL, updated_at = NOW() \
             WHERE code = $1 AND status = 'used' RETURNING {TICKET_COLUMNS}"
        );
        let row: Option<TicketRow> = sqlx::query_as(&sql)
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Conditional::Applied(ticket_from_row(row)?)),
            None => Ok(Conditional::NotMatched),
        }
    }
}

#[async_trait]
impl AttendanceLedger for PgStore {
    async fn record_once(
        &self,
        record: AttendanceRecord,
    ) -> Result<Recorded<AttendanceRecord>, StoreError> {
        let sql = format!(
            "INSERT INTO attendance (id, event_id, user_id, ticket_code, verified_by, entered_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (event_id, user_id) DO NOTHING RETURNING {ATTENDANCE_COLUMNS}"
        );
        let row: Option<AttendanceRow> = sqlx::query_as(&sql)
            .bind(record.id)
            .bind(record.event_id)
            .bind(record.user_id)
            .bind(record.ticket_code.as_str())
            .bind(record.verified_by)
            .bind(record.entered_at)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => Recorded::Inserted(row.into()),
            None => Recorded::AlreadyExists,
        })
    }

    async fn find_attendance(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE event_id = $1 AND user_id = $2"
        );
        let row: Option<AttendanceRow> = sqlx::query_as(&sql)
            .bind(event_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(AttendanceRecord::from))
    }

    async fn list_attendance(&self, event_id: Uuid) -> Result<Vec<AttendanceRecord>, StoreError> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE event_id = $1 ORDER BY entered_at ASC"
        );
        let rows: Vec<AttendanceRow> = sqlx::query_as(&sql)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(AttendanceRecord::from).collect())
    }
}

#[async_trait]
impl CertificateLedger for PgStore {
    async fn issue_if_absent(
        &self,
        certificate: Certificate,
    ) -> Result<CertificateInsert, StoreError> {
        // The (event, user) conflict is absorbed; a clash on the number
        // primary key still raises and is reported separately.
        let sql = format!(
            "INSERT INTO certificates (number, event_id, user_id, issued_by, issued_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (event_id, user_id) DO NOTHING RETURNING {CERTIFICATE_COLUMNS}"
        );
        let result: Result<Option<Certificate>, sqlx::Error> = sqlx::query_as(&sql)
            .bind(&certificate.number)
            .bind(certificate.event_id)
            .bind(certificate.user_id)
            .bind(certificate.issued_by)
            .bind(certificate.issued_at)
            .fetch_optional(&self.pool)
            .await;

        match result {
            Ok(row) => Ok(row.map_or(CertificateInsert::AlreadyIssued, CertificateInsert::Issued)),
            Err(err) => match violated_constraint(&err).map(str::to_owned).as_deref() {
                Some(CERTIFICATE_PKEY) => Ok(CertificateInsert::NumberTaken),
                _ => Err(err.into()),
            },
        }
    }

    async fn find_certificate(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Certificate>, StoreError> {
        let sql = format!(
            "SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE event_id = $1 AND user_id = $2"
        );
        Ok(sqlx::query_as(&sql)
            .bind(event_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_certificate(&self, number: &str) -> Result<Option<Certificate>, StoreError> {
        let sql = format!("SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE number = $1");
        Ok(sqlx::query_as(&sql)
            .bind(number)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_certificates_for_event(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<Certificate>, StoreError> {
        let sql = format!(
            "SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE event_id = $1 ORDER BY issued_at ASC"
        );
        Ok(sqlx::query_as(&sql)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_certificates_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Certificate>, StoreError> {
        let sql = format!(
            "SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE user_id = $1 ORDER BY issued_at DESC"
        );
        Ok(sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }
}
