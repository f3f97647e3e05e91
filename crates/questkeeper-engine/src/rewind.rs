use rusqlite::{Connection, Transaction};
use tracing::instrument;

use questkeeper_core::{ActorId, CampaignId, EngineError, TurnId};
use questkeeper_store::repo::{campaign, embedding, player, snapshot, turn};
use questkeeper_store::UnitOfWork;

use crate::outbox_writer::emit_memory_prune_requested;

/// Counts of rows deleted by a rewind. A second identical rewind reports
/// zeroes — idempotence, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RewindResult {
    pub deleted_turns: usize,
    pub deleted_snapshots: usize,
}

/// Restores a campaign to the state captured at `target_turn_id`'s snapshot,
/// deletes everything after it, and sets the memory visibility watermark.
///
/// Opens its own [`UnitOfWork`] the same way Phase A/C of the turn engine
/// do, so all six steps of §4.5 — restore, delete turns, delete snapshots,
/// delete embeddings, restore player projections, enqueue the prune event —
/// commit together or not at all.
#[instrument(skip(conn))]
pub fn rewind_to_turn(
    conn: &mut Connection,
    campaign_id: CampaignId,
    target_turn_id: TurnId,
) -> Result<RewindResult, EngineError> {
    let uow = UnitOfWork::begin(conn).map_err(|e| EngineError::Store(e.to_string()))?;
    let result = rewind_to_turn_in(uow.tx(), campaign_id, target_turn_id)?;
    uow.commit().map_err(|e| EngineError::Store(e.to_string()))?;
    Ok(result)
}

/// The rewind logic proper, run against an already-open transaction. Used
/// both by [`rewind_to_turn`] (which opens its own) and by any future
/// caller that needs to fold a rewind into a larger transaction of its own.
fn rewind_to_turn_in(
    tx: &Transaction<'_>,
    campaign_id: CampaignId,
    target_turn_id: TurnId,
) -> Result<RewindResult, EngineError> {
    let snap = snapshot::get_by_turn(tx, target_turn_id)
        .map_err(|e| EngineError::Store(e.to_string()))?
        .ok_or(EngineError::NoSnapshot {
            turn_id: target_turn_id.get(),
        })?;

    campaign::restore_from_snapshot(
        tx,
        campaign_id,
        &snap.campaign_state,
        &snap.characters,
        &snap.summary,
        &snap.last_narration,
        target_turn_id,
    )
    .map_err(|e| EngineError::Store(e.to_string()))?;

    let deleted_turns = turn::delete_after(tx, campaign_id, target_turn_id)
        .map_err(|e| EngineError::Store(e.to_string()))?;
    let deleted_snapshots = snapshot::delete_after(tx, campaign_id, target_turn_id)
        .map_err(|e| EngineError::Store(e.to_string()))?;
    embedding::delete_after(tx, campaign_id, target_turn_id)
        .map_err(|e| EngineError::Store(e.to_string()))?;

    restore_player_projections(tx, campaign_id, &snap.players)
        .map_err(|e| EngineError::Store(e.to_string()))?;

    emit_memory_prune_requested(tx, campaign_id, target_turn_id)
        .map_err(|e| EngineError::Store(e.to_string()))?;

    Ok(RewindResult {
        deleted_turns,
        deleted_snapshots,
    })
}

/// Writes each per-player projection captured in the snapshot's `players`
/// object back into the `players` table, keyed by the `actor_id` each entry
/// was stored under (see `resolver::commit_phase_c`'s snapshot write).
/// Entries for an actor no longer present in the campaign, or that fail to
/// parse, are skipped defensively rather than aborting the whole rewind.
fn restore_player_projections(
    tx: &Transaction<'_>,
    campaign_id: CampaignId,
    players_projection: &serde_json::Value,
) -> questkeeper_store::error::Result<()> {
    let Some(entries) = players_projection.as_object() else {
        return Ok(());
    };
    for (actor_id_str, projected) in entries {
        let Ok(raw_actor_id) = actor_id_str.parse::<i64>() else {
            continue;
        };
        let actor_id = ActorId(raw_actor_id);
        let Some(existing) = player::get(tx, campaign_id, actor_id)? else {
            continue;
        };
        let level = projected.get("level").and_then(|v| v.as_i64()).unwrap_or(existing.level);
        let xp = projected.get("xp").and_then(|v| v.as_i64()).unwrap_or(existing.xp);
        let attributes = projected.get("attributes").cloned().unwrap_or(existing.attributes);
        let state = projected.get("state").cloned().unwrap_or(existing.state);
        player::update_projection(tx, existing.id, level, xp, &attributes, &state)?;
    }
    Ok(())
}

/// Resolves an external message id to a `turn_id` (trying
/// `external_message_id` then falling back to `external_user_message_id`)
/// and rewinds to it.
#[instrument(skip(conn))]
pub fn rewind_to_external_message(
    conn: &mut Connection,
    campaign_id: CampaignId,
    external_message_id: &str,
) -> Result<RewindResult, EngineError> {
    let target = turn::find_by_external_message(conn, campaign_id, external_message_id)
        .map_err(|e| EngineError::Store(e.to_string()))?
        .ok_or_else(|| EngineError::NotFound(format!("message {external_message_id}")))?;
    rewind_to_turn(conn, campaign_id, target.id)
}
