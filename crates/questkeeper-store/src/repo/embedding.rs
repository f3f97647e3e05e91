use chrono::Utc;
use questkeeper_core::{CampaignId, TurnId};
use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::Embedding;

pub fn insert(conn: &Connection, campaign_id: CampaignId, turn_id: TurnId, vector: &[u8]) -> Result<Embedding> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO embeddings (campaign_id, turn_id, vector_blob, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![campaign_id.get(), turn_id.get(), vector, now.to_rfc3339()],
    )?;
    Ok(Embedding {
        id: conn.last_insert_rowid(),
        campaign_id,
        turn_id,
        vector: vector.to_vec(),
        created_at: now,
    })
}

pub fn list_for_campaign(conn: &Connection, campaign_id: CampaignId) -> Result<Vec<Embedding>> {
    let mut stmt = conn.prepare(
        "SELECT id, campaign_id, turn_id, vector_blob, created_at
         FROM embeddings WHERE campaign_id = ?1",
    )?;
    let rows = stmt.query_map(params![campaign_id.get()], row_to_embedding)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

/// Delete every embedding strictly after `target_turn_id`. Returns the count.
pub fn delete_after(conn: &Connection, campaign_id: CampaignId, target_turn_id: TurnId) -> Result<usize> {
    let n = conn.execute(
        "DELETE FROM embeddings WHERE campaign_id = ?1 AND turn_id > ?2",
        params![campaign_id.get(), target_turn_id.get()],
    )?;
    Ok(n)
}

fn row_to_embedding(row: &rusqlite::Row<'_>) -> rusqlite::Result<Embedding> {
    let created_at: String = row.get(4)?;
    Ok(Embedding {
        id: row.get(0)?,
        campaign_id: CampaignId(row.get(1)?),
        turn_id: TurnId(row.get(2)?),
        vector: row.get(3)?,
        created_at: super::parse_rfc3339(&created_at),
    })
}
