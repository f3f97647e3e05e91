use chrono::Utc;
use questkeeper_core::ActorId;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::Actor;

/// Return the existing actor for `external_id`, creating one if absent.
/// Identity is immutable once created; only `display_name` may drift.
pub fn get_or_create(conn: &Connection, external_id: &str, display_name: &str) -> Result<Actor> {
    if let Some(actor) = get_by_external_id(conn, external_id)? {
        return Ok(actor);
    }
    let now = Utc::now();
    conn.execute(
        "INSERT OR IGNORE INTO actors (external_id, display_name, created_at) VALUES (?1, ?2, ?3)",
        params![external_id, display_name, now.to_rfc3339()],
    )?;
    get_by_external_id(conn, external_id)?.ok_or_else(|| {
        crate::error::StoreError::NotFound(format!("actor {external_id} missing after insert"))
    })
}

pub fn get_by_external_id(conn: &Connection, external_id: &str) -> Result<Option<Actor>> {
    conn.query_row(
        "SELECT id, external_id, display_name, created_at FROM actors WHERE external_id = ?1",
        params![external_id],
        row_to_actor,
    )
    .optional()
    .map_err(Into::into)
}

pub fn rename(conn: &Connection, id: ActorId, display_name: &str) -> Result<()> {
    conn.execute(
        "UPDATE actors SET display_name = ?1 WHERE id = ?2",
        params![display_name, id.get()],
    )?;
    Ok(())
}

fn row_to_actor(row: &rusqlite::Row<'_>) -> rusqlite::Result<Actor> {
    let created_at: String = row.get(3)?;
    Ok(Actor {
        id: ActorId(row.get(0)?),
        external_id: row.get(1)?,
        display_name: row.get(2)?,
        created_at: crate::repo::parse_rfc3339(&created_at),
    })
}
