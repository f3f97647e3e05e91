use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ActorId, CampaignId, TurnId};

/// Requested transition on the campaign's single active timer, parsed out
/// of a completion's structured output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimerInstruction {
    Schedule {
        event_text: String,
        interruptible: bool,
        interrupt_action: Option<String>,
        due_at: DateTime<Utc>,
    },
    Bind {
        message_id: String,
        channel_id: Option<String>,
        thread_id: Option<String>,
    },
    Cancel,
}

/// A request to hand an item to another actor, resolved via `ActorResolver`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GiveItemInstruction {
    pub target_mention: String,
    pub item_name: String,
    pub quantity: u32,
}

/// The structured output a `TextCompletion` call is expected to yield once
/// parsed. `narration` is the only required field.
///
/// `state`/`characters` carry the model's computed next world state —
/// the actual narrative progress a turn makes. When absent, Phase C leaves
/// the campaign's current `state`/`characters` untouched for that turn
/// (a model reply that only narrates without changing tracked world state
/// is valid), but `last_narration` and `row_version` still advance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionOutput {
    pub narration: String,
    pub timer_instruction: Option<TimerInstruction>,
    #[serde(default)]
    pub give_items: Vec<GiveItemInstruction>,
    #[serde(default)]
    pub state: Option<serde_json::Value>,
    #[serde(default)]
    pub characters: Option<serde_json::Value>,
    /// Present when the narration introduces a scene worth illustrating.
    /// Triggers a `scene_image_requested` outbox event in Phase C; the
    /// `MediaGeneration` port consumer (outside the core) is what actually
    /// renders it.
    #[serde(default)]
    pub scene_image_prompt: Option<String>,
}

/// A prompt assembled from a `TurnContext`, handed to the completion port.
#[derive(Debug, Clone)]
pub struct CompletionPrompt {
    pub campaign_id: CampaignId,
    pub acting_actor: ActorId,
    pub system_preamble: String,
    pub recent_turns_text: String,
    pub action_text: String,
}

/// The completion backend's raw reply, before the engine has attempted to
/// parse it into a [`CompletionOutput`]. Kept separate from
/// `CompletionOutput` because a syntactically successful port call can
/// still return text the engine cannot parse — that is `BadModelOutput`,
/// not `PortFailure`.
#[derive(Debug, Clone)]
pub struct RawCompletion {
    pub text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("completion backend unavailable: {0}")]
    Unavailable(String),
    #[error("port operation timed out")]
    Timeout,
}

/// The language-model completion backend. The only suspension point in
/// turn resolution that holds no database transaction.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, prompt: &CompletionPrompt) -> Result<RawCompletion, PortError>;
}

/// Resolves a free-text mention (e.g. "@Alice", "the blacksmith") to a
/// stable `ActorId` for give-item instructions.
#[async_trait]
pub trait ActorResolver: Send + Sync {
    async fn resolve(&self, mention: &str) -> Result<ActorId, PortError>;
}

/// A single hit returned by the external similarity index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoryHit {
    pub turn_id: TurnId,
    pub excerpt: String,
    pub score_milli: i64,
}

#[async_trait]
pub trait MemorySearch: Send + Sync {
    async fn search(&self, campaign_id: CampaignId, query: &str) -> Result<Vec<MemoryHit>, PortError>;
}

/// Applies the narrative effect of an expired timer. Invoked by the host's
/// timer-expiry worker, not inline in `resolve_turn`.
#[async_trait]
pub trait TimerEffects: Send + Sync {
    async fn apply(&self, campaign_id: CampaignId, event_text: &str) -> Result<(), PortError>;
}
