use questkeeper_store::models::{Campaign, Player, Timer, Turn};

/// The data Phase A gathers before releasing its transaction. Immutable —
/// Phase B only reads it to build a prompt, and Phase C revalidates
/// everything that matters (`rv0`) rather than trusting this snapshot is
/// still current.
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub campaign: Campaign,
    /// `row_version` as observed at the start of Phase A (`rv0`).
    pub rv0: i64,
    /// Most-recent-first, bounded to `recent_turns_limit`.
    pub recent_turns: Vec<Turn>,
    pub player: Player,
    pub active_timer: Option<Timer>,
    pub action_text: String,
}
