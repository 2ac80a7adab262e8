use chrono::{DateTime, Datelike, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

const NUMBER_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const NUMBER_LENGTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Certificate {
    /// Printed on the document, e.g. `CERT-2026-7KQ2M9XA`.
    pub number: String,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub issued_by: Uuid,
    pub issued_at: DateTime<Utc>,
}

impl Certificate {
    pub fn new(event_id: Uuid, user_id: Uuid, issued_by: Uuid) -> Self {
        let issued_at = Utc::now();
        Self {
            number: generate_number(issued_at),
            event_id,
            user_id,
            issued_by,
            issued_at,
        }
    }
}

fn generate_number(issued_at: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..NUMBER_LENGTH)
        .map(|_| NUMBER_ALPHABET[rng.gen_range(0..NUMBER_ALPHABET.len())] as char)
        .collect();
    format!("CERT-{}-{suffix}", issued_at.year())
}
