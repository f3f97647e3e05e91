use questkeeper_core::ports::CompletionPrompt;
use questkeeper_store::models::TurnKind;

use crate::turn_context::TurnContext;

/// Assemble the prompt handed to the `TextCompletion` port. Turn content
/// and campaign summary are opaque strings as far as this engine is
/// concerned — formatting them is the only thing it does with them.
pub fn build_prompt(ctx: &TurnContext) -> CompletionPrompt {
    let mut recent_turns_text = String::new();
    for turn in ctx.recent_turns.iter().rev() {
        let speaker = match turn.kind {
            TurnKind::User => "Player",
            TurnKind::Narration => "Narrator",
            TurnKind::System => "System",
        };
        recent_turns_text.push_str(speaker);
        recent_turns_text.push_str(": ");
        recent_turns_text.push_str(&turn.content);
        recent_turns_text.push('\n');
    }

    let mut system_preamble = format!("Summary: {}\n", ctx.campaign.summary);
    if let Some(timer) = &ctx.active_timer {
        system_preamble.push_str(&format!(
            "Active timer: {} (due {})\n",
            timer.event_text, timer.due_at
        ));
    }

    CompletionPrompt {
        campaign_id: ctx.campaign.id,
        acting_actor: ctx.player.actor_id,
        system_preamble,
        recent_turns_text,
        action_text: ctx.action_text.clone(),
    }
}
