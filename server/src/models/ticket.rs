use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::event::UnknownStatus;

/// No 0/O or 1/I so codes survive being read aloud at the door.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 10;
const CODE_PREFIX: &str = "TKT-";

/// Human-readable ticket identifier. This string is the whole QR payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketCode(String);

impl TicketCode {
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..CODE_LENGTH)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        Self(format!("{CODE_PREFIX}{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TicketCode {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TicketCode {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for TicketCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Unused,
    Used,
    Cancelled,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Unused => "unused",
            TicketStatus::Used => "used",
            TicketStatus::Cancelled => "cancelled",
        }
    }

    /// `unused` is the only state with exits.
    pub fn can_transition_to(self, next: TicketStatus) -> bool {
        matches!(
            (self, next),
            (TicketStatus::Unused, TicketStatus::Used)
                | (TicketStatus::Unused, TicketStatus::Cancelled)
        )
    }

    /// Whether the ticket still holds a seat and blocks re-registration.
    pub fn is_active(self) -> bool {
        !matches!(self, TicketStatus::Cancelled)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unused" => Ok(TicketStatus::Unused),
            "used" => Ok(TicketStatus::Used),
            "cancelled" => Ok(TicketStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub code: TicketCode,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub status: TicketStatus,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    pub fn new(code: TicketCode, event_id: Uuid, user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            code,
            event_id,
            user_id,
            status: TicketStatus::Unused,
            used_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Payload handed to the QR renderer: the code and nothing else.
    pub fn qr_payload(&self) -> &str {
        self.code.as_str()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TicketRow {
    pub code: String,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = UnknownStatus;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        Ok(Ticket {
            code: TicketCode(row.code),
            event_id: row.event_id,
            user_id: row.user_id,
            status: row.status.parse()?,
            used_at: row.used_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
