use chrono::Utc;
use questkeeper_core::{CampaignId, TurnId};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{Turn, TurnKind};

/// Append a turn and return it with its assigned `turn_id`.
///
/// `turn_id` ordering is the causal order within a campaign — callers that
/// append the `(user, narration)` pair must call this twice, in order,
/// inside the same transaction.
pub fn append(
    conn: &Connection,
    campaign_id: CampaignId,
    kind: TurnKind,
    content: &str,
    external_message_id: Option<&str>,
    external_user_message_id: Option<&str>,
) -> Result<Turn> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO turns
         (campaign_id, kind, content, external_message_id, external_user_message_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            campaign_id.get(),
            kind.as_str(),
            content,
            external_message_id,
            external_user_message_id,
            now.to_rfc3339(),
        ],
    )?;
    let id = TurnId(conn.last_insert_rowid());
    Ok(Turn {
        id,
        campaign_id,
        kind,
        content: content.to_string(),
        external_message_id: external_message_id.map(str::to_string),
        external_user_message_id: external_user_message_id.map(str::to_string),
        created_at: now,
    })
}

/// Most-recent-first, bounded to `limit`.
pub fn recent(conn: &Connection, campaign_id: CampaignId, limit: usize) -> Result<Vec<Turn>> {
    let mut stmt = conn.prepare(
        "SELECT id, campaign_id, kind, content, external_message_id, external_user_message_id,
                created_at
         FROM turns WHERE campaign_id = ?1 ORDER BY id DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![campaign_id.get(), limit as i64], row_to_turn)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

pub fn find_by_external_message(
    conn: &Connection,
    campaign_id: CampaignId,
    message_id: &str,
) -> Result<Option<Turn>> {
    if let Some(t) = query_one_by(conn, campaign_id, "external_message_id", message_id)? {
        return Ok(Some(t));
    }
    query_one_by(conn, campaign_id, "external_user_message_id", message_id)
}

fn query_one_by(
    conn: &Connection,
    campaign_id: CampaignId,
    column: &str,
    value: &str,
) -> Result<Option<Turn>> {
    let sql = format!(
        "SELECT id, campaign_id, kind, content, external_message_id, external_user_message_id,
                created_at
         FROM turns WHERE campaign_id = ?1 AND {column} = ?2"
    );
    conn.query_row(&sql, params![campaign_id.get(), value], row_to_turn)
        .optional()
        .map_err(Into::into)
}

/// Delete every turn strictly after `target_turn_id` for `campaign_id`.
/// Returns the number of rows deleted.
pub fn delete_after(conn: &Connection, campaign_id: CampaignId, target_turn_id: TurnId) -> Result<usize> {
    let n = conn.execute(
        "DELETE FROM turns WHERE campaign_id = ?1 AND id > ?2",
        params![campaign_id.get(), target_turn_id.get()],
    )?;
    Ok(n)
}

fn row_to_turn(row: &rusqlite::Row<'_>) -> rusqlite::Result<Turn> {
    let kind_str: String = row.get(2)?;
    let created_at: String = row.get(6)?;
    Ok(Turn {
        id: TurnId(row.get(0)?),
        campaign_id: CampaignId(row.get(1)?),
        kind: kind_str.parse().unwrap_or(TurnKind::System),
        content: row.get(3)?,
        external_message_id: row.get(4)?,
        external_user_message_id: row.get(5)?,
        created_at: super::parse_rfc3339(&created_at),
    })
}
