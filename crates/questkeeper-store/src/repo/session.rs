use chrono::Utc;
use questkeeper_core::CampaignId;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::models::Session;

/// Sessions are never mutated by the turn engine — only created and read,
/// to scope outbox idempotency by surface.
pub fn get_or_create(conn: &Connection, campaign_id: CampaignId, surface_key: &str) -> Result<Session> {
    if let Some(s) = get_by_surface_key(conn, surface_key)? {
        return Ok(s);
    }
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT OR IGNORE INTO sessions (campaign_id, surface_key, created_at) VALUES (?1, ?2, ?3)",
        params![campaign_id.get(), surface_key, now],
    )?;
    get_by_surface_key(conn, surface_key)?
        .ok_or_else(|| StoreError::NotFound(format!("session {surface_key} missing after insert")))
}

pub fn get_by_surface_key(conn: &Connection, surface_key: &str) -> Result<Option<Session>> {
    conn.query_row(
        "SELECT id, campaign_id, surface_key, created_at FROM sessions WHERE surface_key = ?1",
        params![surface_key],
        row_to_session,
    )
    .optional()
    .map_err(Into::into)
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let created_at: String = row.get(3)?;
    Ok(Session {
        id: row.get(0)?,
        campaign_id: CampaignId(row.get(1)?),
        surface_key: row.get(2)?,
        created_at: super::parse_rfc3339(&created_at),
    })
}
