use chrono::Utc;
use questkeeper_core::{CampaignId, PlayerId};
use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::MediaRef;

pub fn insert(
    conn: &Connection,
    campaign_id: CampaignId,
    room_key: Option<&str>,
    player_id: Option<PlayerId>,
    media_uri: &str,
) -> Result<MediaRef> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO media_refs (campaign_id, room_key, player_id, media_uri, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            campaign_id.get(),
            room_key,
            player_id.map(|p| p.get()),
            media_uri,
            now.to_rfc3339(),
        ],
    )?;
    Ok(MediaRef {
        id: conn.last_insert_rowid(),
        campaign_id,
        room_key: room_key.map(str::to_string),
        player_id,
        media_uri: media_uri.to_string(),
        created_at: now,
    })
}

pub fn list_for_campaign(conn: &Connection, campaign_id: CampaignId) -> Result<Vec<MediaRef>> {
    let mut stmt = conn.prepare(
        "SELECT id, campaign_id, room_key, player_id, media_uri, created_at
         FROM media_refs WHERE campaign_id = ?1",
    )?;
    let rows = stmt.query_map(params![campaign_id.get()], row_to_media)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

fn row_to_media(row: &rusqlite::Row<'_>) -> rusqlite::Result<MediaRef> {
    let player_id: Option<i64> = row.get(3)?;
    let created_at: String = row.get(5)?;
    Ok(MediaRef {
        id: row.get(0)?,
        campaign_id: CampaignId(row.get(1)?),
        room_key: row.get(2)?,
        player_id: player_id.map(PlayerId),
        media_uri: row.get(4)?,
        created_at: super::parse_rfc3339(&created_at),
    })
}
