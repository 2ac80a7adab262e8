use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::ticket::TicketCode;

/// One verified entry. Unique per (event, user) and never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub ticket_code: TicketCode,
    pub verified_by: Uuid,
    pub entered_at: DateTime<Utc>,
}

impl AttendanceRecord {
    pub fn new(
        event_id: Uuid,
        user_id: Uuid,
        ticket_code: TicketCode,
        verified_by: Uuid,
        entered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            user_id,
            ticket_code,
            verified_by,
            entered_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AttendanceRow {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub ticket_code: String,
    pub verified_by: Uuid,
    pub entered_at: DateTime<Utc>,
}

impl From<AttendanceRow> for AttendanceRecord {
    fn from(row: AttendanceRow) -> Self {
        Self {
            id: row.id,
            event_id: row.event_id,
            user_id: row.user_id,
            ticket_code: row.ticket_code.into(),
            verified_by: row.verified_by,
            entered_at: row.entered_at,
        }
    }
}
