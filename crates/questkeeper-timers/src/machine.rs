use chrono::{DateTime, Utc};
use questkeeper_core::CampaignId;
use questkeeper_store::models::Timer;
use questkeeper_store::repo::timer;
use rusqlite::Connection;
use tracing::{debug, instrument};

use crate::error::Result;

/// `(none) -> scheduled_unbound`. If an active timer already exists it is
/// cancelled first, in the same transaction, so the partial-unique index
/// never sees two active rows at once.
#[instrument(skip(conn), fields(%campaign_id))]
pub fn schedule(
    conn: &Connection,
    campaign_id: CampaignId,
    event_text: &str,
    interruptible: bool,
    interrupt_action: Option<&str>,
    due_at: DateTime<Utc>,
) -> Result<Timer> {
    if let Some(existing) = timer::get_active(conn, campaign_id)? {
        debug!(timer_id = existing.id, "superseding active timer before reschedule");
        timer::cancel_active(conn, campaign_id)?;
    }
    Ok(timer::insert_unbound(
        conn,
        campaign_id,
        event_text,
        interruptible,
        interrupt_action,
        due_at,
    )?)
}

/// `scheduled_unbound -> scheduled_bound`. A second `attach` with the
/// timer already bound is a no-op, not an error.
pub fn attach(
    conn: &Connection,
    campaign_id: CampaignId,
    message_id: &str,
    channel_id: Option<&str>,
    thread_id: Option<&str>,
) -> Result<Option<Timer>> {
    Ok(timer::bind(conn, campaign_id, message_id, channel_id, thread_id)?)
}

/// `scheduled_unbound | scheduled_bound -> cancelled`. No-op if nothing
/// is active.
pub fn cancel(conn: &Connection, campaign_id: CampaignId) -> Result<Option<Timer>> {
    Ok(timer::cancel_active(conn, campaign_id)?)
}

/// `scheduled_unbound | scheduled_bound -> expired`, called by a host
/// worker polling `due_at`. Idempotent past the first call.
pub fn expire(conn: &Connection, timer_id: i64) -> Result<Option<Timer>> {
    Ok(timer::expire(conn, timer_id)?)
}

/// `expired -> consumed`, called once the host's `TimerEffects` port has
/// applied the narrative effect. Idempotent past the first call.
pub fn consume(conn: &Connection, timer_id: i64) -> Result<Option<Timer>> {
    Ok(timer::consume(conn, timer_id)?)
}
