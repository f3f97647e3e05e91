use chrono::Utc;
use questkeeper_core::{CampaignId, TurnId};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value as Json;

use crate::error::Result;
use crate::models::Snapshot;

/// Insert a snapshot keyed on `turn_id` (unique — one snapshot per
/// narration turn). Fails with a uniqueness violation if called twice for
/// the same turn, which the engine never does.
pub fn insert(
    conn: &Connection,
    campaign_id: CampaignId,
    turn_id: TurnId,
    campaign_state: &Json,
    characters: &Json,
    summary: &str,
    last_narration: &str,
    players: &Json,
) -> Result<Snapshot> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO snapshots
         (campaign_id, turn_id, campaign_state_json, characters_json, summary,
          last_narration, players_json, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            campaign_id.get(),
            turn_id.get(),
            super::json_or_null(campaign_state),
            super::json_or_null(characters),
            summary,
            last_narration,
            super::json_or_null(players),
            now.to_rfc3339(),
        ],
    )?;
    Ok(Snapshot {
        id: conn.last_insert_rowid(),
        campaign_id,
        turn_id,
        campaign_state: campaign_state.clone(),
        characters: characters.clone(),
        summary: summary.to_string(),
        last_narration: last_narration.to_string(),
        players: players.clone(),
        created_at: now,
    })
}

pub fn get_by_turn(conn: &Connection, turn_id: TurnId) -> Result<Option<Snapshot>> {
    conn.query_row(
        "SELECT id, campaign_id, turn_id, campaign_state_json, characters_json, summary,
                last_narration, players_json, created_at
         FROM snapshots WHERE turn_id = ?1",
        params![turn_id.get()],
        row_to_snapshot,
    )
    .optional()
    .map_err(Into::into)
}

/// Delete every snapshot strictly after `target_turn_id`. Returns the count.
pub fn delete_after(conn: &Connection, campaign_id: CampaignId, target_turn_id: TurnId) -> Result<usize> {
    let n = conn.execute(
        "DELETE FROM snapshots WHERE campaign_id = ?1 AND turn_id > ?2",
        params![campaign_id.get(), target_turn_id.get()],
    )?;
    Ok(n)
}

fn row_to_snapshot(row: &rusqlite::Row<'_>) -> rusqlite::Result<Snapshot> {
    let state_json: String = row.get(3)?;
    let characters_json: String = row.get(4)?;
    let players_json: String = row.get(7)?;
    let created_at: String = row.get(8)?;
    Ok(Snapshot {
        id: row.get(0)?,
        campaign_id: CampaignId(row.get(1)?),
        turn_id: TurnId(row.get(2)?),
        campaign_state: serde_json::from_str(&state_json).unwrap_or(Json::Null),
        characters: serde_json::from_str(&characters_json).unwrap_or(Json::Null),
        summary: row.get(5)?,
        last_narration: row.get(6)?,
        players: serde_json::from_str(&players_json).unwrap_or(Json::Null),
        created_at: super::parse_rfc3339(&created_at),
    })
}
