use std::sync::Mutex;

use async_trait::async_trait;

use questkeeper_core::ports::{
    ActorResolver, CompletionPrompt, MemoryHit, MemorySearch, PortError, RawCompletion,
    TextCompletion, TimerEffects,
};
use questkeeper_core::{ActorId, CampaignId};

/// Deterministic stand-in for a real completion backend. Returns a fixed
/// script of replies in order, looping the last one once exhausted — enough
/// for integration tests to drive multi-turn scenarios without a real LLM.
pub struct ScriptedTextCompletion {
    replies: Mutex<Vec<String>>,
}

impl ScriptedTextCompletion {
    pub fn new(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies),
        }
    }

    pub fn single(reply: impl Into<String>) -> Self {
        Self::new(vec![reply.into()])
    }
}

#[async_trait]
impl TextCompletion for ScriptedTextCompletion {
    async fn complete(&self, _prompt: &CompletionPrompt) -> Result<RawCompletion, PortError> {
        let mut replies = self.replies.lock().expect("scripted completion mutex poisoned");
        let text = if replies.len() > 1 {
            replies.remove(0)
        } else {
            replies.first().cloned().unwrap_or_default()
        };
        Ok(RawCompletion { text })
    }
}

/// Resolves every mention to the same fixed actor. Real resolution (fuzzy
/// name matching, mention syntax) lives above this core.
pub struct FixedActorResolver {
    pub actor_id: ActorId,
}

#[async_trait]
impl ActorResolver for FixedActorResolver {
    async fn resolve(&self, _mention: &str) -> Result<ActorId, PortError> {
        Ok(self.actor_id)
    }
}

/// Always returns no hits. A real implementation lives in the embedding
/// search service, out of core scope.
pub struct EmptyMemorySearch;

#[async_trait]
impl MemorySearch for EmptyMemorySearch {
    async fn search(&self, _campaign_id: CampaignId, _query: &str) -> Result<Vec<MemoryHit>, PortError> {
        Ok(Vec::new())
    }
}

/// No-op timer effects port, useful where a test only cares about the
/// state machine transitions themselves, not their narrative consequences.
pub struct NoopTimerEffects;

#[async_trait]
impl TimerEffects for NoopTimerEffects {
    async fn apply(&self, _campaign_id: CampaignId, _event_text: &str) -> Result<(), PortError> {
        Ok(())
    }
}
