use chrono::Utc;
use questkeeper_core::{CampaignId, TurnId};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::models::{Campaign, CampaignUpdate};

/// Return the existing campaign for `(namespace, name_normalized)`, creating
/// one at `row_version = 1` if absent.
pub fn get_or_create(conn: &Connection, namespace: &str, name_normalized: &str) -> Result<Campaign> {
    if let Some(c) = get_by_name(conn, namespace, name_normalized)? {
        return Ok(c);
    }
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT OR IGNORE INTO campaigns
         (namespace, name_normalized, summary, state_json, characters_json,
          last_narration, memory_visible_max_turn_id, row_version, created_at, updated_at)
         VALUES (?1, ?2, '', '{}', '{}', '', NULL, 1, ?3, ?3)",
        params![namespace, name_normalized, now],
    )?;
    get_by_name(conn, namespace, name_normalized)?
        .ok_or_else(|| StoreError::NotFound(format!("campaign {namespace}/{name_normalized}")))
}

pub fn get_by_name(conn: &Connection, namespace: &str, name_normalized: &str) -> Result<Option<Campaign>> {
    conn.query_row(
        SELECT_COLUMNS_WHERE_BY_NAME,
        params![namespace, name_normalized],
        row_to_campaign,
    )
    .optional()
    .map_err(Into::into)
}

pub fn get_by_id(conn: &Connection, id: CampaignId) -> Result<Option<Campaign>> {
    conn.query_row(SELECT_COLUMNS_WHERE_BY_ID, params![id.get()], row_to_campaign)
        .optional()
        .map_err(Into::into)
}

/// Compare-and-set update: succeeds only if the row's `row_version` still
/// equals `expected_row_version`. Returns `None` on a CAS mismatch rather
/// than an error — the turn engine decides whether that is retryable.
pub fn cas_update(
    conn: &Connection,
    id: CampaignId,
    expected_row_version: i64,
    update: &CampaignUpdate,
) -> Result<Option<Campaign>> {
    let now = Utc::now().to_rfc3339();
    let rows = conn.execute(
        "UPDATE campaigns
         SET state_json = ?1, characters_json = ?2, summary = ?3, last_narration = ?4,
             row_version = row_version + 1, updated_at = ?5
         WHERE id = ?6 AND row_version = ?7",
        params![
            super::json_or_null(&update.state),
            super::json_or_null(&update.characters),
            update.summary,
            update.last_narration,
            now,
            id.get(),
            expected_row_version,
        ],
    )?;
    if rows == 0 {
        return Ok(None);
    }
    get_by_id(conn, id)
}

/// Restore campaign fields from a rewind target and bump `row_version`,
/// unconditionally (rewind already holds exclusive transactional access).
pub fn restore_from_snapshot(
    conn: &Connection,
    id: CampaignId,
    state: &serde_json::Value,
    characters: &serde_json::Value,
    summary: &str,
    last_narration: &str,
    memory_visible_max_turn_id: TurnId,
) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE campaigns
         SET state_json = ?1, characters_json = ?2, summary = ?3, last_narration = ?4,
             memory_visible_max_turn_id = ?5, row_version = row_version + 1, updated_at = ?6
         WHERE id = ?7",
        params![
            super::json_or_null(state),
            super::json_or_null(characters),
            summary,
            last_narration,
            memory_visible_max_turn_id.get(),
            now,
            id.get(),
        ],
    )?;
    Ok(())
}

const SELECT_COLUMNS_WHERE_BY_NAME: &str = "
    SELECT id, namespace, name_normalized, summary, state_json, characters_json,
           last_narration, memory_visible_max_turn_id, row_version, created_at, updated_at
    FROM campaigns WHERE namespace = ?1 AND name_normalized = ?2";

const SELECT_COLUMNS_WHERE_BY_ID: &str = "
    SELECT id, namespace, name_normalized, summary, state_json, characters_json,
           last_narration, memory_visible_max_turn_id, row_version, created_at, updated_at
    FROM campaigns WHERE id = ?1";

fn row_to_campaign(row: &rusqlite::Row<'_>) -> rusqlite::Result<Campaign> {
    let state_json: String = row.get(4)?;
    let characters_json: String = row.get(5)?;
    let memory_visible_max_turn_id: Option<i64> = row.get(7)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;
    Ok(Campaign {
        id: CampaignId(row.get(0)?),
        namespace: row.get(1)?,
        name_normalized: row.get(2)?,
        summary: row.get(3)?,
        state: serde_json::from_str(&state_json).unwrap_or(serde_json::Value::Null),
        characters: serde_json::from_str(&characters_json).unwrap_or(serde_json::Value::Null),
        last_narration: row.get(6)?,
        memory_visible_max_turn_id: memory_visible_max_turn_id.map(TurnId),
        row_version: row.get(8)?,
        created_at: super::parse_rfc3339(&created_at),
        updated_at: super::parse_rfc3339(&updated_at),
    })
}
