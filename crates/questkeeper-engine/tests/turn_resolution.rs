use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::Connection;

use questkeeper_core::ports::{CompletionPrompt, PortError, RawCompletion, TextCompletion};
use questkeeper_core::{ActorId, CampaignId, EngineConfig, EngineError, FixedClock};
use questkeeper_engine::stubs::{FixedActorResolver, ScriptedTextCompletion};
use questkeeper_engine::{filter_memory_hits_by_visibility, rewind_to_turn, ResolveTurnInput, TurnEngine};
use questkeeper_store::repo::{campaign, player};

/// A completion stub that, on its first call, reaches behind the engine's
/// back and bumps the campaign's `row_version` directly — modeling a
/// second process's commit landing while Phase B holds no transaction.
/// Exercises the CAS-conflict-then-retry path deterministically, without
/// needing genuine OS-thread concurrency.
struct ConflictInjectingCompletion {
    conn: Arc<Mutex<Connection>>,
    campaign_id: CampaignId,
    narration: String,
    injected: AtomicBool,
}

#[async_trait]
impl TextCompletion for ConflictInjectingCompletion {
    async fn complete(&self, _prompt: &CompletionPrompt) -> Result<RawCompletion, PortError> {
        if !self.injected.swap(true, Ordering::SeqCst) {
            let guard = self.conn.lock().unwrap();
            guard
                .execute(
                    "UPDATE campaigns SET row_version = row_version + 1 WHERE id = ?1",
                    rusqlite::params![self.campaign_id.get()],
                )
                .unwrap();
        }
        Ok(RawCompletion {
            text: self.narration.clone(),
        })
    }
}

/// A completion stub that steals the caller's own lease mid-Phase-B by
/// directly overwriting the `inflight_turns` row with a fabricated
/// claim_token and a far-future `now`, bypassing the TTL check the way a
/// genuinely expired-then-stolen lease would. Models S6's worker B.
struct LeaseStealingCompletion {
    conn: Arc<Mutex<Connection>>,
    campaign_id: CampaignId,
    actor_id: ActorId,
    narration: String,
}

#[async_trait]
impl TextCompletion for LeaseStealingCompletion {
    async fn complete(&self, _prompt: &CompletionPrompt) -> Result<RawCompletion, PortError> {
        let guard = self.conn.lock().unwrap();
        let far_future = Utc::now() + chrono::Duration::seconds(10_000);
        questkeeper_store::repo::inflight::steal(
            &guard,
            self.campaign_id,
            self.actor_id,
            "worker-b-stole-it",
            far_future,
            far_future + chrono::Duration::seconds(90),
        )
        .unwrap();
        Ok(RawCompletion {
            text: self.narration.clone(),
        })
    }
}

fn seeded_db() -> Arc<Mutex<Connection>> {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    questkeeper_store::db::init_db(&conn).expect("init schema");
    Arc::new(Mutex::new(conn))
}

fn seed_campaign_and_player(conn: &Arc<Mutex<Connection>>) -> (CampaignId, ActorId) {
    let guard = conn.lock().unwrap();
    let actor_now = Utc::now().to_rfc3339();
    guard
        .execute(
            "INSERT INTO actors (external_id, display_name, created_at) VALUES ('A1', 'Player One', ?1)",
            rusqlite::params![actor_now],
        )
        .unwrap();
    let actor_id = ActorId(guard.last_insert_rowid());

    let campaign_row = campaign::get_or_create(&guard, "ns", "c1").unwrap();
    questkeeper_store::repo::player::get_or_create(&guard, campaign_row.id, actor_id).unwrap();

    (campaign_row.id, actor_id)
}

fn make_engine(conn: Arc<Mutex<Connection>>, completion_reply: &str) -> TurnEngine {
    TurnEngine::new(
        conn,
        Arc::new(FixedClock::new(Utc::now())),
        Arc::new(ScriptedTextCompletion::single(completion_reply)),
        Arc::new(FixedActorResolver {
            actor_id: ActorId(1),
        }),
        EngineConfig::default(),
    )
}

fn narration_only(text: &str) -> String {
    format!(r#"{{"narration": "{text}", "timer_instruction": null, "give_items": []}}"#)
}

#[tokio::test]
async fn s1_happy_path_commits_user_and_narration_turns() {
    let conn = seeded_db();
    let (campaign_id, actor_id) = seed_campaign_and_player(&conn);
    let engine = make_engine(conn, &narration_only("You see a lamp."));

    let result = engine
        .resolve_turn(ResolveTurnInput {
            campaign_id,
            actor_id,
            action_text: "look".to_string(),
            session_scope: None,
            before_phase_c: None,
        })
        .await
        .expect("resolve_turn should succeed");

    assert_eq!(result.narration, "You see a lamp.");
    assert_eq!(result.row_version_new, 2);
    assert!(result.emitted_events.is_empty());
}

#[tokio::test]
async fn s2_cas_conflict_retries_and_commits_at_the_new_version() {
    let conn = seeded_db();
    let (campaign_id, actor_id) = seed_campaign_and_player(&conn);

    let engine = TurnEngine::new(
        conn.clone(),
        Arc::new(FixedClock::new(Utc::now())),
        Arc::new(ConflictInjectingCompletion {
            conn: conn.clone(),
            campaign_id,
            narration: "You see a lamp.".to_string(),
            injected: AtomicBool::new(false),
        }),
        Arc::new(FixedActorResolver {
            actor_id: ActorId(1),
        }),
        EngineConfig::default(),
    );

    let result = engine
        .resolve_turn(ResolveTurnInput {
            campaign_id,
            actor_id,
            action_text: "look".to_string(),
            session_scope: None,
            before_phase_c: None,
        })
        .await
        .expect("resolve_turn should succeed after retrying Phase A");

    // The injected commit took row_version from 1 to 2 mid-Phase-B; the
    // engine's own commit then lands at 3 after retrying.
    assert_eq!(result.row_version_new, 3);
}

#[tokio::test]
async fn s3_lease_held_rejects_concurrent_submission_for_same_actor() {
    let conn = seeded_db();
    let (campaign_id, actor_id) = seed_campaign_and_player(&conn);

    let clock = FixedClock::new(Utc::now());
    {
        let guard = conn.lock().unwrap();
        let lease_mgr = questkeeper_lease::LeaseManager::new(&clock);
        lease_mgr
            .claim(&guard, campaign_id, actor_id, 90)
            .expect("first claim succeeds");
    }

    let engine = make_engine(conn, &narration_only("irrelevant"));
    let result = engine
        .resolve_turn(ResolveTurnInput {
            campaign_id,
            actor_id,
            action_text: "look".to_string(),
            session_scope: None,
            before_phase_c: None,
        })
        .await;

    assert!(matches!(result, Err(EngineError::LeaseHeld)));
}

#[tokio::test]
async fn s4_timer_schedule_emits_timer_scheduled_event() {
    let conn = seeded_db();
    let (campaign_id, actor_id) = seed_campaign_and_player(&conn);
    let reply = r#"{
        "narration": "The sun dips below the horizon.",
        "timer_instruction": {
            "kind": "schedule",
            "event_text": "dawn",
            "interruptible": true,
            "interrupt_action": null,
            "due_at": "2026-07-28T00:00:00Z"
        },
        "give_items": []
    }"#;
    let engine = make_engine(conn.clone(), reply);

    let result = engine
        .resolve_turn(ResolveTurnInput {
            campaign_id,
            actor_id,
            action_text: "wait".to_string(),
            session_scope: None,
            before_phase_c: None,
        })
        .await
        .expect("resolve_turn should succeed");

    assert_eq!(result.emitted_events.len(), 1);
    assert_eq!(result.emitted_events[0].event_type, "timer_scheduled");

    let guard = conn.lock().unwrap();
    let active = questkeeper_store::repo::timer::get_active(&guard, campaign_id)
        .unwrap()
        .expect("schedule left one active timer");
    assert_eq!(active.status, questkeeper_store::models::TimerStatus::ScheduledUnbound);
    drop(guard);

    // A second attach binds it; a third attach is a no-op (covered directly
    // at the state-machine level in questkeeper-timers; here we only assert
    // the engine wired the schedule instruction through correctly).
}

#[tokio::test]
async fn s5_rewind_restores_snapshot_and_is_idempotent() {
    let conn = seeded_db();
    let (campaign_id, actor_id) = seed_campaign_and_player(&conn);

    let mut narration_turn_ids = Vec::new();
    for i in 0..3 {
        let engine = make_engine(conn.clone(), &narration_only(&format!("Event {i}")));
        let result = engine
            .resolve_turn(ResolveTurnInput {
                campaign_id,
                actor_id,
                action_text: format!("act {i}"),
                session_scope: None,
                before_phase_c: None,
            })
            .await
            .expect("resolve_turn should succeed");
        narration_turn_ids.push(result.narration_turn_id);
    }

    let target = narration_turn_ids[1];
    let mut guard = conn.lock().unwrap();

    let rewind_result = rewind_to_turn(&mut guard, campaign_id, target).expect("rewind succeeds");
    // The third iteration appended a user turn and a narration turn, both
    // strictly after `target`.
    assert_eq!(rewind_result.deleted_turns, 2);
    assert_eq!(rewind_result.deleted_snapshots, 1);

    let campaign_after = campaign::get_by_id(&guard, campaign_id).unwrap().unwrap();
    assert_eq!(campaign_after.memory_visible_max_turn_id, Some(target));

    let second = rewind_to_turn(&mut guard, campaign_id, target).expect("second rewind succeeds");
    assert_eq!(second.deleted_turns, 0);
    assert_eq!(second.deleted_snapshots, 0);

    let events: i64 = guard
        .query_row(
            "SELECT COUNT(*) FROM outbox_events WHERE event_type = 'memory_prune_requested'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(events, 1);
}

#[tokio::test]
async fn rewind_restores_the_players_projected_state_from_the_snapshot() {
    let conn = seeded_db();
    let (campaign_id, actor_id) = seed_campaign_and_player(&conn);

    // Bump the player's level/xp so the snapshot taken by the next turn
    // captures that, not the freshly-created default.
    {
        let guard = conn.lock().unwrap();
        let p = player::get(&guard, campaign_id, actor_id).unwrap().unwrap();
        player::update_projection(
            &guard,
            p.id,
            5,
            500,
            &serde_json::json!({"strength": 12}),
            &serde_json::json!({"hp": 40}),
        )
        .unwrap();
    }

    let engine = make_engine(conn.clone(), &narration_only("Event 0"));
    let result = engine
        .resolve_turn(ResolveTurnInput {
            campaign_id,
            actor_id,
            action_text: "act 0".to_string(),
            session_scope: None,
            before_phase_c: None,
        })
        .await
        .expect("resolve_turn should succeed");
    let target = result.narration_turn_id;

    // Simulate the player's projection diverging further after the
    // snapshot was taken (e.g. a later, unrelated turn changed it).
    {
        let guard = conn.lock().unwrap();
        let p = player::get(&guard, campaign_id, actor_id).unwrap().unwrap();
        player::update_projection(
            &guard,
            p.id,
            1,
            0,
            &serde_json::json!({}),
            &serde_json::json!({}),
        )
        .unwrap();
    }

    {
        let mut guard = conn.lock().unwrap();
        rewind_to_turn(&mut guard, campaign_id, target).expect("rewind succeeds");
    }

    let guard = conn.lock().unwrap();
    let restored = player::get(&guard, campaign_id, actor_id).unwrap().unwrap();
    assert_eq!(restored.level, 5);
    assert_eq!(restored.xp, 500);
    assert_eq!(restored.attributes, serde_json::json!({"strength": 12}));
    assert_eq!(restored.state, serde_json::json!({"hp": 40}));
}

#[tokio::test]
async fn rewind_restores_a_bystander_players_projection_too() {
    // A campaign can have multiple concurrent actors (§5); the snapshot
    // taken when one of them resolves a turn must still capture every
    // player's projected state, not just the one who acted.
    let conn = seeded_db();
    let (campaign_id, actor_id) = seed_campaign_and_player(&conn);

    let bystander_id = {
        let guard = conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        guard
            .execute(
                "INSERT INTO actors (external_id, display_name, created_at) VALUES ('A2', 'Player Two', ?1)",
                rusqlite::params![now],
            )
            .unwrap();
        let bystander_id = ActorId(guard.last_insert_rowid());
        let bystander = player::get_or_create(&guard, campaign_id, bystander_id).unwrap();
        player::update_projection(
            &guard,
            bystander.id,
            9,
            999,
            &serde_json::json!({"strength": 3}),
            &serde_json::json!({"hp": 12}),
        )
        .unwrap();
        bystander_id
    };

    let engine = make_engine(conn.clone(), &narration_only("Event 0"));
    let result = engine
        .resolve_turn(ResolveTurnInput {
            campaign_id,
            actor_id,
            action_text: "act 0".to_string(),
            session_scope: None,
            before_phase_c: None,
        })
        .await
        .expect("resolve_turn should succeed");
    let target = result.narration_turn_id;

    // The bystander's projection diverges after the snapshot was taken.
    {
        let guard = conn.lock().unwrap();
        let bystander = player::get(&guard, campaign_id, bystander_id).unwrap().unwrap();
        player::update_projection(
            &guard,
            bystander.id,
            1,
            0,
            &serde_json::json!({}),
            &serde_json::json!({}),
        )
        .unwrap();
    }

    {
        let mut guard = conn.lock().unwrap();
        rewind_to_turn(&mut guard, campaign_id, target).expect("rewind succeeds");
    }

    let guard = conn.lock().unwrap();
    let restored = player::get(&guard, campaign_id, bystander_id).unwrap().unwrap();
    assert_eq!(restored.level, 9);
    assert_eq!(restored.xp, 999);
    assert_eq!(restored.attributes, serde_json::json!({"strength": 3}));
    assert_eq!(restored.state, serde_json::json!({"hp": 12}));
}

#[tokio::test]
async fn s6_stolen_lease_yields_lease_lost_with_zero_writes() {
    let conn = seeded_db();
    let (campaign_id, actor_id) = seed_campaign_and_player(&conn);

    let engine = TurnEngine::new(
        conn.clone(),
        Arc::new(FixedClock::new(Utc::now())),
        Arc::new(LeaseStealingCompletion {
            conn: conn.clone(),
            campaign_id,
            actor_id,
            narration: "too late".to_string(),
        }),
        Arc::new(FixedActorResolver {
            actor_id,
        }),
        EngineConfig::default(),
    );

    let result = engine
        .resolve_turn(ResolveTurnInput {
            campaign_id,
            actor_id,
            action_text: "look".to_string(),
            session_scope: None,
            before_phase_c: None,
        })
        .await;

    assert!(matches!(result, Err(EngineError::LeaseLost)));

    let guard = conn.lock().unwrap();
    let turn_count: i64 = guard
        .query_row("SELECT COUNT(*) FROM turns", [], |row| row.get(0))
        .unwrap();
    assert_eq!(turn_count, 0, "no Phase C writes should have landed");
}

#[tokio::test]
async fn completion_state_advances_the_campaigns_persisted_world_state() {
    let conn = seeded_db();
    let (campaign_id, actor_id) = seed_campaign_and_player(&conn);
    let reply = r#"{
        "narration": "You pick up the lamp.",
        "timer_instruction": null,
        "give_items": [],
        "state": {"room": "cellar", "holds_lamp": true},
        "characters": {"npc_guard": {"mood": "suspicious"}}
    }"#;
    let engine = make_engine(conn.clone(), reply);

    engine
        .resolve_turn(ResolveTurnInput {
            campaign_id,
            actor_id,
            action_text: "take lamp".to_string(),
            session_scope: None,
            before_phase_c: None,
        })
        .await
        .expect("resolve_turn should succeed");

    let guard = conn.lock().unwrap();
    let campaign_after = campaign::get_by_id(&guard, campaign_id).unwrap().unwrap();
    assert_eq!(
        campaign_after.state,
        serde_json::json!({"room": "cellar", "holds_lamp": true})
    );
    assert_eq!(
        campaign_after.characters,
        serde_json::json!({"npc_guard": {"mood": "suspicious"}})
    );
}

#[tokio::test]
async fn omitted_state_leaves_the_campaigns_world_state_unchanged() {
    let conn = seeded_db();
    let (campaign_id, actor_id) = seed_campaign_and_player(&conn);
    let engine = make_engine(conn.clone(), &narration_only("You see a lamp."));

    engine
        .resolve_turn(ResolveTurnInput {
            campaign_id,
            actor_id,
            action_text: "look".to_string(),
            session_scope: None,
            before_phase_c: None,
        })
        .await
        .expect("resolve_turn should succeed");

    let guard = conn.lock().unwrap();
    let campaign_after = campaign::get_by_id(&guard, campaign_id).unwrap().unwrap();
    assert_eq!(campaign_after.state, serde_json::json!({}));
    assert_eq!(campaign_after.characters, serde_json::json!({}));
}

#[tokio::test]
async fn scene_image_prompt_emits_scene_image_requested_event() {
    let conn = seeded_db();
    let (campaign_id, actor_id) = seed_campaign_and_player(&conn);
    let reply = r#"{
        "narration": "A torch-lit cavern opens before you.",
        "timer_instruction": null,
        "give_items": [],
        "scene_image_prompt": "a torch-lit cavern, fantasy art"
    }"#;
    let engine = make_engine(conn.clone(), reply);

    let result = engine
        .resolve_turn(ResolveTurnInput {
            campaign_id,
            actor_id,
            action_text: "look".to_string(),
            session_scope: None,
            before_phase_c: None,
        })
        .await
        .expect("resolve_turn should succeed");

    assert_eq!(result.emitted_events.len(), 1);
    assert_eq!(result.emitted_events[0].event_type, "scene_image_requested");

    let guard = conn.lock().unwrap();
    let count: i64 = guard
        .query_row(
            "SELECT COUNT(*) FROM outbox_events WHERE event_type = 'scene_image_requested'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn memory_filter_respects_watermark() {
    use questkeeper_core::ports::MemoryHit;

    let hits = vec![
        MemoryHit {
            turn_id: 5.into(),
            excerpt: "a".into(),
            score_milli: 900,
        },
        MemoryHit {
            turn_id: 50.into(),
            excerpt: "b".into(),
            score_milli: 800,
        },
    ];
    let filtered = filter_memory_hits_by_visibility(hits, Some(10.into()));
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].excerpt, "a");
}
