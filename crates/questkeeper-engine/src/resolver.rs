use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use serde_json::json;
use tracing::{info, instrument, warn};

use questkeeper_core::ports::{ActorResolver, CompletionPrompt, TextCompletion};
use questkeeper_core::{ActorId, CampaignId, Clock, EngineConfig, EngineError};
use questkeeper_lease::{ClaimToken, LeaseManager};
use questkeeper_store::models::{CampaignUpdate, OutboxEvent, TurnKind};
use questkeeper_store::repo::{campaign, player, snapshot, timer, turn};
use questkeeper_store::UnitOfWork;

use crate::error::{lease_err, port_err, store_err, timer_err};
use crate::outbox_writer::{emit_scene_image_requested, emit_timer_scheduled};
use crate::parse::parse_completion;
use crate::prompt::build_prompt;
use crate::turn_context::TurnContext;

/// Input to [`TurnEngine::resolve_turn`]. `before_phase_c`, when present, is
/// called with a read-only view of the `TurnContext` right before the
/// campaign CAS attempt — tests use it to observe (never mutate) state
/// mid-resolution.
pub struct ResolveTurnInput<'a> {
    pub campaign_id: CampaignId,
    pub actor_id: ActorId,
    pub action_text: String,
    pub session_scope: Option<String>,
    pub before_phase_c: Option<&'a dyn Fn(&TurnContext)>,
}

#[derive(Debug, Clone)]
pub struct ResolveTurnResult {
    pub narration: String,
    pub narration_turn_id: questkeeper_core::TurnId,
    pub row_version_new: i64,
    pub emitted_events: Vec<OutboxEvent>,
}

/// Orchestrates the three-phase turn-resolution protocol described in the
/// component design: a short Phase A transaction to claim the lease and
/// load context, an untransacted Phase B that calls out to the completion
/// port, and a short Phase C transaction that commits the result under a
/// `row_version` CAS fence.
///
/// The connection is held behind a `Mutex` and only ever locked for the
/// duration of Phase A or Phase C — never across Phase B's `.await`, so a
/// single slow completion call cannot starve other campaigns' turns.
pub struct TurnEngine {
    conn: Arc<Mutex<Connection>>,
    clock: Arc<dyn Clock>,
    completion: Arc<dyn TextCompletion>,
    actor_resolver: Arc<dyn ActorResolver>,
    config: EngineConfig,
}

impl TurnEngine {
    /// Takes a shared handle to the connection (rather than owning it
    /// outright) so a host or test harness can keep its own clone for
    /// direct inspection between `resolve_turn` calls — the engine only
    /// ever locks it for the duration of Phase A or Phase C.
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        clock: Arc<dyn Clock>,
        completion: Arc<dyn TextCompletion>,
        actor_resolver: Arc<dyn ActorResolver>,
        config: EngineConfig,
    ) -> Self {
        Self {
            conn,
            clock,
            completion,
            actor_resolver,
            config,
        }
    }

    #[instrument(skip(self, input), fields(campaign_id = %input.campaign_id, actor_id = %input.actor_id))]
    pub async fn resolve_turn(
        &self,
        input: ResolveTurnInput<'_>,
    ) -> Result<ResolveTurnResult, EngineError> {
        let lease_mgr = LeaseManager::new(self.clock.as_ref());

        let claim_token = {
            let conn = self.conn.lock().expect("engine connection mutex poisoned");
            lease_mgr
                .claim(&conn, input.campaign_id, input.actor_id, self.config.lease_ttl_seconds)
                .map_err(lease_err)?
        };

        let mut attempt = 0u32;
        loop {
            match self.try_resolve_once(&input, &claim_token, &lease_mgr).await {
                Err(EngineError::CasConflict) if attempt < self.config.max_conflict_retries => {
                    attempt += 1;
                    warn!(attempt, "campaign row_version changed mid-turn, retrying");
                    continue;
                }
                other => return other,
            }
        }
    }

    async fn try_resolve_once(
        &self,
        input: &ResolveTurnInput<'_>,
        claim_token: &ClaimToken,
        lease_mgr: &LeaseManager<'_>,
    ) -> Result<ResolveTurnResult, EngineError> {
        let ctx = self.load_turn_context(input)?;

        let prompt = build_prompt(&ctx);
        let raw = self
            .complete_with_heartbeat(&prompt, claim_token, lease_mgr)
            .await?;
        let parsed = parse_completion(&raw.text)?;

        for give in &parsed.give_items {
            self.actor_resolver
                .resolve(&give.target_mention)
                .await
                .map_err(port_err)?;
        }

        self.commit_phase_c(input, ctx, claim_token, lease_mgr, parsed)
    }

    /// Phase A: claim (already done by the caller) and load a snapshot of
    /// everything Phase B needs, inside one short transaction.
    fn load_turn_context(&self, input: &ResolveTurnInput<'_>) -> Result<TurnContext, EngineError> {
        let mut conn = self.conn.lock().expect("engine connection mutex poisoned");
        let uow = UnitOfWork::begin(&mut conn).map_err(store_err)?;
        let tx = uow.tx();

        let campaign_row = campaign::get_by_id(tx, input.campaign_id)
            .map_err(store_err)?
            .ok_or_else(|| EngineError::NotFound(format!("campaign {}", input.campaign_id)))?;
        let rv0 = campaign_row.row_version;
        let recent_turns = turn::recent(tx, input.campaign_id, self.config.recent_turns_limit)
            .map_err(store_err)?;
        let player_row = player::get_or_create(tx, input.campaign_id, input.actor_id)
            .map_err(store_err)?;
        let active_timer = timer::get_active(tx, input.campaign_id).map_err(store_err)?;

        uow.commit().map_err(store_err)?;

        Ok(TurnContext {
            campaign: campaign_row,
            rv0,
            recent_turns,
            player: player_row,
            active_timer,
            action_text: input.action_text.clone(),
        })
    }

    /// Phase B's only suspension point. Heartbeats the lease on a ticker
    /// racing the completion future so a slow model call does not let the
    /// lease expire out from under it; a fast reply never sees a tick.
    async fn complete_with_heartbeat(
        &self,
        prompt: &CompletionPrompt,
        claim_token: &ClaimToken,
        lease_mgr: &LeaseManager<'_>,
    ) -> Result<questkeeper_core::ports::RawCompletion, EngineError> {
        let interval = self.config.heartbeat_interval();
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick is immediate; consume it up front

        let completion_fut = self.completion.complete(prompt);
        tokio::pin!(completion_fut);

        loop {
            tokio::select! {
                result = &mut completion_fut => {
                    return result.map_err(port_err);
                }
                _ = ticker.tick() => {
                    let conn = self.conn.lock().expect("engine connection mutex poisoned");
                    match lease_mgr.heartbeat(&conn, claim_token, self.config.lease_ttl_seconds) {
                        Ok(true) => {}
                        Ok(false) => warn!("heartbeat found lease already gone"),
                        Err(e) => warn!(error = %e, "heartbeat failed"),
                    }
                }
            }
        }
    }

    /// Phase C: revalidate the lease, CAS the campaign forward, append the
    /// turn pair, snapshot, apply timer transitions, emit outbox events,
    /// release the lease, commit. Any failure rolls back the entire phase.
    fn commit_phase_c(
        &self,
        input: &ResolveTurnInput<'_>,
        ctx: TurnContext,
        claim_token: &ClaimToken,
        lease_mgr: &LeaseManager<'_>,
        parsed: questkeeper_core::ports::CompletionOutput,
    ) -> Result<ResolveTurnResult, EngineError> {
        let mut conn = self.conn.lock().expect("engine connection mutex poisoned");
        let uow = UnitOfWork::begin(&mut conn).map_err(store_err)?;
        let tx = uow.tx();

        if !lease_mgr.validate(tx, claim_token).map_err(lease_err)? {
            return Err(EngineError::LeaseLost);
        }

        if let Some(hook) = input.before_phase_c {
            hook(&ctx);
        }

        let update = CampaignUpdate {
            state: parsed.state.clone().unwrap_or_else(|| ctx.campaign.state.clone()),
            characters: parsed
                .characters
                .clone()
                .unwrap_or_else(|| ctx.campaign.characters.clone()),
            summary: ctx.campaign.summary.clone(),
            last_narration: parsed.narration.clone(),
        };
        let updated_campaign = campaign::cas_update(tx, ctx.campaign.id, ctx.rv0, &update)
            .map_err(store_err)?
            .ok_or(EngineError::CasConflict)?;

        let user_turn = turn::append(
            tx,
            input.campaign_id,
            TurnKind::User,
            &input.action_text,
            None,
            None,
        )
        .map_err(store_err)?;
        let narration_turn = turn::append(
            tx,
            input.campaign_id,
            TurnKind::Narration,
            &parsed.narration,
            None,
            None,
        )
        .map_err(store_err)?;

        // Every player in the campaign, not just the one who acted this
        // turn — rewind must be able to restore all of them.
        let mut players_projection = serde_json::Map::new();
        for p in player::list_for_campaign(tx, input.campaign_id).map_err(store_err)? {
            players_projection.insert(
                p.actor_id.to_string(),
                json!({
                    "level": p.level,
                    "xp": p.xp,
                    "attributes": p.attributes,
                    "state": p.state,
                }),
            );
        }
        let players_projection = serde_json::Value::Object(players_projection);
        snapshot::insert(
            tx,
            input.campaign_id,
            narration_turn.id,
            &updated_campaign.state,
            &updated_campaign.characters,
            &updated_campaign.summary,
            &updated_campaign.last_narration,
            &players_projection,
        )
        .map_err(store_err)?;

        let mut emitted_events = Vec::new();
        let session_scope = input
            .session_scope
            .as_deref()
            .unwrap_or(questkeeper_store::models::NO_SESSION_SCOPE);

        if let Some(prompt_text) = &parsed.scene_image_prompt {
            if let Some(event) = emit_scene_image_requested(
                tx,
                input.campaign_id,
                session_scope,
                narration_turn.id,
                prompt_text,
            )
            .map_err(store_err)?
            {
                emitted_events.push(event);
            }
        }

        if let Some(instruction) = &parsed.timer_instruction {
            use questkeeper_core::ports::TimerInstruction;
            match instruction {
                TimerInstruction::Schedule {
                    event_text,
                    interruptible,
                    interrupt_action,
                    due_at,
                } => {
                    let new_timer = questkeeper_timers::machine::schedule(
                        tx,
                        input.campaign_id,
                        event_text,
                        *interruptible,
                        interrupt_action.as_deref(),
                        *due_at,
                    )
                    .map_err(timer_err)?;
                    if let Some(event) = emit_timer_scheduled(
                        tx,
                        input.campaign_id,
                        session_scope,
                        new_timer.id,
                        event_text,
                    )
                    .map_err(store_err)?
                    {
                        emitted_events.push(event);
                    }
                }
                TimerInstruction::Bind {
                    message_id,
                    channel_id,
                    thread_id,
                } => {
                    questkeeper_timers::machine::attach(
                        tx,
                        input.campaign_id,
                        message_id,
                        channel_id.as_deref(),
                        thread_id.as_deref(),
                    )
                    .map_err(timer_err)?;
                }
                TimerInstruction::Cancel => {
                    questkeeper_timers::machine::cancel(tx, input.campaign_id)
                        .map_err(timer_err)?;
                }
            }
        }

        lease_mgr.release(tx, claim_token).map_err(lease_err)?;

        uow.commit().map_err(store_err)?;

        info!(
            row_version_new = updated_campaign.row_version,
            narration_turn_id = narration_turn.id.get(),
            "turn resolved"
        );

        let _ = user_turn; // kept for the atomic-pair invariant; id not surfaced on the result

        Ok(ResolveTurnResult {
            narration: parsed.narration,
            narration_turn_id: narration_turn.id,
            row_version_new: updated_campaign.row_version,
            emitted_events,
        })
    }
}
