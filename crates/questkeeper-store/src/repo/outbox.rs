use chrono::Utc;
use questkeeper_core::CampaignId;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value as Json;

use crate::error::Result;
use crate::models::OutboxEvent;

/// Append an outbox event. Idempotent under the
/// `(campaign_id, session_scope, event_type, idempotency_key)` uniqueness —
/// a retried Phase C that re-emits the same event is a silent no-op, and
/// the caller can tell the two cases apart via the return value.
pub fn append(
    conn: &Connection,
    campaign_id: CampaignId,
    session_scope: &str,
    event_type: &str,
    idempotency_key: &str,
    payload: &Json,
) -> Result<Option<OutboxEvent>> {
    let now = Utc::now().to_rfc3339();
    let n = conn.execute(
        "INSERT OR IGNORE INTO outbox_events
         (campaign_id, session_scope, event_type, idempotency_key, payload_json,
          status, attempts, next_attempt_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'pending', 0, NULL, ?6, ?6)",
        params![
            campaign_id.get(),
            session_scope,
            event_type,
            idempotency_key,
            super::json_or_null(payload),
            now,
        ],
    )?;
    if n == 0 {
        return Ok(None);
    }
    get(
        conn,
        campaign_id,
        session_scope,
        event_type,
        idempotency_key,
    )
}

pub fn get(
    conn: &Connection,
    campaign_id: CampaignId,
    session_scope: &str,
    event_type: &str,
    idempotency_key: &str,
) -> Result<Option<OutboxEvent>> {
    conn.query_row(
        "SELECT id, campaign_id, session_scope, event_type, idempotency_key, payload_json,
                status, attempts, next_attempt_at, created_at, updated_at
         FROM outbox_events
         WHERE campaign_id = ?1 AND session_scope = ?2 AND event_type = ?3 AND idempotency_key = ?4",
        params![campaign_id.get(), session_scope, event_type, idempotency_key],
        row_to_event,
    )
    .optional()
    .map_err(Into::into)
}

pub fn list_pending(conn: &Connection, limit: usize) -> Result<Vec<OutboxEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, campaign_id, session_scope, event_type, idempotency_key, payload_json,
                status, attempts, next_attempt_at, created_at, updated_at
         FROM outbox_events
         WHERE status = 'pending' AND (next_attempt_at IS NULL OR next_attempt_at <= ?1)
         ORDER BY created_at LIMIT ?2",
    )?;
    let now = Utc::now().to_rfc3339();
    let rows = stmt.query_map(params![now, limit as i64], row_to_event)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<OutboxEvent> {
    let payload_json: String = row.get(5)?;
    let status_str: String = row.get(6)?;
    let next_attempt_at: Option<String> = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;
    Ok(OutboxEvent {
        id: row.get(0)?,
        campaign_id: CampaignId(row.get(1)?),
        session_scope: row.get(2)?,
        event_type: row.get(3)?,
        idempotency_key: row.get(4)?,
        payload: serde_json::from_str(&payload_json).unwrap_or(Json::Null),
        status: status_str.parse().unwrap_or(crate::models::OutboxStatus::Failed),
        attempts: row.get(7)?,
        next_attempt_at: next_attempt_at.map(|s| super::parse_rfc3339(&s)),
        created_at: super::parse_rfc3339(&created_at),
        updated_at: super::parse_rfc3339(&updated_at),
    })
}
