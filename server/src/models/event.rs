use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of an event as driven by its organizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Draft,
    Published,
    Ongoing,
    Completed,
    Cancelled,
}

impl EventStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::Draft => "draft",
            EventStatus::Published => "published",
            EventStatus::Ongoing => "ongoing",
            EventStatus::Completed => "completed",
            EventStatus::Cancelled => "cancelled",
        }
    }

    /// The complete transition table. Anything not listed here is illegal.
    pub fn can_transition_to(self, next: EventStatus) -> bool {
        matches!(
            (self, next),
            (EventStatus::Draft, EventStatus::Published)
                | (EventStatus::Draft, EventStatus::Cancelled)
                | (EventStatus::Published, EventStatus::Ongoing)
                | (EventStatus::Published, EventStatus::Cancelled)
                | (EventStatus::Ongoing, EventStatus::Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, EventStatus::Completed | EventStatus::Cancelled)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for EventStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(EventStatus::Draft),
            "published" => Ok(EventStatus::Published),
            "ongoing" => Ok(EventStatus::Ongoing),
            "completed" => Ok(EventStatus::Completed),
            "cancelled" => Ok(EventStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    /// Only members of this department may register when set.
    pub department: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub seat_limit: i32,
    pub registered_count: i32,
    pub status: EventStatus,
    pub certificates_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.organizer_id == user_id
    }
}

/// Organizer input for a new event. The store assigns id, counters and timestamps.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub department: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub seat_limit: i32,
    #[serde(default)]
    pub certificates_enabled: bool,
}

/// Raw `events` row; status is kept as text in the database.
#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub department: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub seat_limit: i32,
    pub registered_count: i32,
    pub status: String,
    pub certificates_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for Event {
    type Error = UnknownStatus;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Event {
            id: row.id,
            organizer_id: row.organizer_id,
            title: row.title,
            description: row.description,
            location: row.location,
            department: row.department,
            starts_at: row.starts_at,
            seat_limit: row.seat_limit,
            registered_count: row.registered_count,
            status: row.status.parse()?,
            certificates_enabled: row.certificates_enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [EventStatus; 5] = [
        EventStatus::Draft,
        EventStatus::Published,
        EventStatus::Ongoing,
        EventStatus::Completed,
        EventStatus::Cancelled,
    ];

    #[test]
    fn test_happy_path_is_legal() {
        assert!(EventStatus::Draft.can_transition_to(EventStatus::Published));
        assert!(EventStatus::Published.can_transition_to(EventStatus::Ongoing));
        assert!(EventStatus::Ongoing.can_transition_to(EventStatus::Completed));
    }

    #[test]
    fn test_cancel_only_before_start() {
        assert!(EventStatus::Draft.can_transition_to(EventStatus::Cancelled));
        assert!(EventStatus::Published.can_transition_to(EventStatus::Cancelled));
        assert!(!EventStatus::Ongoing.can_transition_to(EventStatus::Cancelled));
        assert!(!EventStatus::Completed.can_transition_to(EventStatus::Cancelled));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_status_text_round_trips() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<EventStatus>(), Ok(status));
        }
        assert!("archived".parse::<EventStatus>().is_err());
    }
}
