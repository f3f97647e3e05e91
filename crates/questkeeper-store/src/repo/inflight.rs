use chrono::{DateTime, Utc};
use questkeeper_core::{ActorId, CampaignId};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::InflightTurn;

pub fn get(conn: &Connection, campaign_id: CampaignId, actor_id: ActorId) -> Result<Option<InflightTurn>> {
    conn.query_row(
        &format!("{SELECT} WHERE campaign_id = ?1 AND actor_id = ?2"),
        params![campaign_id.get(), actor_id.get()],
        row_to_inflight,
    )
    .optional()
    .map_err(Into::into)
}

/// Insert a new lease row. Returns `None` if `(campaign_id, actor_id)`
/// already has a row (the caller must then decide steal vs. `LeaseHeld`).
pub fn try_insert(
    conn: &Connection,
    campaign_id: CampaignId,
    actor_id: ActorId,
    claim_token: &str,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<Option<InflightTurn>> {
    let n = conn.execute(
        "INSERT OR IGNORE INTO inflight_turns
         (campaign_id, actor_id, claim_token, claimed_at, heartbeat_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?4, ?5)",
        params![
            campaign_id.get(),
            actor_id.get(),
            claim_token,
            now.to_rfc3339(),
            expires_at.to_rfc3339(),
        ],
    )?;
    if n == 0 {
        return Ok(None);
    }
    get(conn, campaign_id, actor_id)
}

/// Overwrite an expired lease with a fresh claim (a "steal"). Only succeeds
/// if the existing row's `expires_at` is still `< now` at the moment of the
/// write — a second racer's steal attempt will affect zero rows.
pub fn steal(
    conn: &Connection,
    campaign_id: CampaignId,
    actor_id: ActorId,
    new_claim_token: &str,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<Option<InflightTurn>> {
    let rows = conn.execute(
        "UPDATE inflight_turns
         SET claim_token = ?1, claimed_at = ?2, heartbeat_at = ?2, expires_at = ?3
         WHERE campaign_id = ?4 AND actor_id = ?5 AND expires_at < ?2",
        params![
            new_claim_token,
            now.to_rfc3339(),
            expires_at.to_rfc3339(),
            campaign_id.get(),
            actor_id.get(),
        ],
    )?;
    if rows == 0 {
        return Ok(None);
    }
    get(conn, campaign_id, actor_id)
}

/// Extend `heartbeat_at`/`expires_at` only if `claim_token` still matches.
/// Returns `false` if the lease was stolen (or released) out from under us.
pub fn heartbeat(conn: &Connection, claim_token: &str, now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Result<bool> {
    let rows = conn.execute(
        "UPDATE inflight_turns SET heartbeat_at = ?1, expires_at = ?2 WHERE claim_token = ?3",
        params![now.to_rfc3339(), expires_at.to_rfc3339(), claim_token],
    )?;
    Ok(rows > 0)
}

/// Read-only existence check tied to a claim token.
pub fn validate(conn: &Connection, claim_token: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM inflight_turns WHERE claim_token = ?1)",
        params![claim_token],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Conditional delete on `claim_token` match. Idempotent: releasing an
/// already-released lease affects zero rows and is still `Ok(())`.
pub fn release(conn: &Connection, claim_token: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM inflight_turns WHERE claim_token = ?1",
        params![claim_token],
    )?;
    Ok(())
}

const SELECT: &str = "
    SELECT id, campaign_id, actor_id, claim_token, claimed_at, heartbeat_at, expires_at
    FROM inflight_turns";

fn row_to_inflight(row: &rusqlite::Row<'_>) -> rusqlite::Result<InflightTurn> {
    let claimed_at: String = row.get(4)?;
    let heartbeat_at: String = row.get(5)?;
    let expires_at: String = row.get(6)?;
    Ok(InflightTurn {
        id: row.get(0)?,
        campaign_id: CampaignId(row.get(1)?),
        actor_id: ActorId(row.get(2)?),
        claim_token: row.get(3)?,
        claimed_at: super::parse_rfc3339(&claimed_at),
        heartbeat_at: super::parse_rfc3339(&heartbeat_at),
        expires_at: super::parse_rfc3339(&expires_at),
    })
}
