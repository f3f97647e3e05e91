pub mod actor;
pub mod campaign;
pub mod embedding;
pub mod inflight;
pub mod media;
pub mod outbox;
pub mod player;
pub mod session;
pub mod snapshot;
pub mod timer;
pub mod turn;

use chrono::{DateTime, Utc};

/// Parse an RFC3339 timestamp written by this crate's own repositories.
/// Rows we wrote ourselves are always well-formed, so a parse failure here
/// indicates a corrupted database rather than a recoverable condition.
pub(crate) fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .unwrap_or_else(|e| panic!("stored timestamp {s:?} is not RFC3339: {e}"))
        .with_timezone(&Utc)
}

pub(crate) fn json_or_null(v: &serde_json::Value) -> String {
    serde_json::to_string(v).unwrap_or_else(|_| "null".to_string())
}
