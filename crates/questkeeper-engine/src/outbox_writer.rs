use rusqlite::Connection;
use serde_json::json;

use questkeeper_core::{CampaignId, TurnId};
use questkeeper_store::models::OutboxEvent;
use questkeeper_store::repo::outbox;
use questkeeper_store::StoreError;

/// The three outbox event types the core emits directly. Each carries its
/// own natural idempotency key so a retried Phase C never double-emits.
pub fn emit_scene_image_requested(
    conn: &Connection,
    campaign_id: CampaignId,
    session_scope: &str,
    narration_turn_id: TurnId,
    prompt_text: &str,
) -> Result<Option<OutboxEvent>, StoreError> {
    outbox::append(
        conn,
        campaign_id,
        session_scope,
        "scene_image_requested",
        &narration_turn_id.to_string(),
        &json!({ "turn_id": narration_turn_id.get(), "prompt": prompt_text }),
    )
}

pub fn emit_timer_scheduled(
    conn: &Connection,
    campaign_id: CampaignId,
    session_scope: &str,
    timer_id: i64,
    event_text: &str,
) -> Result<Option<OutboxEvent>, StoreError> {
    outbox::append(
        conn,
        campaign_id,
        session_scope,
        "timer_scheduled",
        &timer_id.to_string(),
        &json!({ "timer_id": timer_id, "event_text": event_text }),
    )
}

/// Idempotency key is the rewind target `turn_id` — rewinding to the same
/// turn twice must not enqueue a second prune request.
pub fn emit_memory_prune_requested(
    conn: &Connection,
    campaign_id: CampaignId,
    target_turn_id: TurnId,
) -> Result<Option<OutboxEvent>, StoreError> {
    outbox::append(
        conn,
        campaign_id,
        questkeeper_store::models::NO_SESSION_SCOPE,
        "memory_prune_requested",
        &target_turn_id.to_string(),
        &json!({ "target_turn_id": target_turn_id.get() }),
    )
}
