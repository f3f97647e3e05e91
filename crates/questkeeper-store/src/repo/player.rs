use chrono::Utc;
use questkeeper_core::{ActorId, CampaignId, PlayerId};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value as Json;

use crate::error::{Result, StoreError};
use crate::models::Player;

pub fn get_or_create(conn: &Connection, campaign_id: CampaignId, actor_id: ActorId) -> Result<Player> {
    if let Some(p) = get(conn, campaign_id, actor_id)? {
        return Ok(p);
    }
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT OR IGNORE INTO players
         (campaign_id, actor_id, level, xp, attributes_json, state_json, created_at, updated_at)
         VALUES (?1, ?2, 1, 0, '{}', '{}', ?3, ?3)",
        params![campaign_id.get(), actor_id.get(), now],
    )?;
    get(conn, campaign_id, actor_id)?.ok_or_else(|| {
        StoreError::NotFound(format!("player {campaign_id}/{actor_id} missing after insert"))
    })
}

pub fn get(conn: &Connection, campaign_id: CampaignId, actor_id: ActorId) -> Result<Option<Player>> {
    conn.query_row(
        "SELECT id, campaign_id, actor_id, level, xp, attributes_json, state_json,
                created_at, updated_at
         FROM players WHERE campaign_id = ?1 AND actor_id = ?2",
        params![campaign_id.get(), actor_id.get()],
        row_to_player,
    )
    .optional()
    .map_err(Into::into)
}

/// Every player row for a campaign — used to snapshot all players'
/// projected state in Phase C, not just the acting player's.
pub fn list_for_campaign(conn: &Connection, campaign_id: CampaignId) -> Result<Vec<Player>> {
    let mut stmt = conn.prepare(
        "SELECT id, campaign_id, actor_id, level, xp, attributes_json, state_json,
                created_at, updated_at
         FROM players WHERE campaign_id = ?1",
    )?;
    let rows = stmt.query_map(params![campaign_id.get()], row_to_player)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

pub fn update_projection(
    conn: &Connection,
    id: PlayerId,
    level: i64,
    xp: i64,
    attributes: &Json,
    state: &Json,
) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE players SET level = ?1, xp = ?2, attributes_json = ?3, state_json = ?4,
         updated_at = ?5 WHERE id = ?6",
        params![
            level,
            xp,
            super::json_or_null(attributes),
            super::json_or_null(state),
            now,
            id.get()
        ],
    )?;
    Ok(())
}

fn row_to_player(row: &rusqlite::Row<'_>) -> rusqlite::Result<Player> {
    let attributes_json: String = row.get(5)?;
    let state_json: String = row.get(6)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;
    Ok(Player {
        id: PlayerId(row.get(0)?),
        campaign_id: CampaignId(row.get(1)?),
        actor_id: ActorId(row.get(2)?),
        level: row.get(3)?,
        xp: row.get(4)?,
        attributes: serde_json::from_str(&attributes_json).unwrap_or(Json::Null),
        state: serde_json::from_str(&state_json).unwrap_or(Json::Null),
        created_at: super::parse_rfc3339(&created_at),
        updated_at: super::parse_rfc3339(&updated_at),
    })
}
