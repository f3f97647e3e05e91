use chrono::{DateTime, Utc};
use questkeeper_core::CampaignId;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{Timer, TimerStatus};

/// The one row with `status IN (scheduled_unbound, scheduled_bound)`, if any.
/// Storage-level uniqueness (`idx_timers_one_active_per_campaign`) guarantees
/// there is never more than one.
pub fn get_active(conn: &Connection, campaign_id: CampaignId) -> Result<Option<Timer>> {
    conn.query_row(
        &format!(
            "{SELECT} WHERE campaign_id = ?1
             AND status IN ('scheduled_unbound', 'scheduled_bound')"
        ),
        params![campaign_id.get()],
        row_to_timer,
    )
    .optional()
    .map_err(Into::into)
}

pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Timer>> {
    conn.query_row(&format!("{SELECT} WHERE id = ?1"), params![id], row_to_timer)
        .optional()
        .map_err(Into::into)
}

/// Insert a new `scheduled_unbound` row. Callers must have already cancelled
/// any active timer in the same transaction — the partial unique index
/// rejects a second active row rather than silently overwriting one.
pub fn insert_unbound(
    conn: &Connection,
    campaign_id: CampaignId,
    event_text: &str,
    interruptible: bool,
    interrupt_action: Option<&str>,
    due_at: DateTime<Utc>,
) -> Result<Timer> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO timers
         (campaign_id, status, event_text, interruptible, interrupt_action, due_at,
          created_at, updated_at)
         VALUES (?1, 'scheduled_unbound', ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            campaign_id.get(),
            event_text,
            interruptible,
            interrupt_action,
            due_at.to_rfc3339(),
            now.to_rfc3339(),
        ],
    )?;
    get_by_id(conn, conn.last_insert_rowid())?.ok_or_else(|| {
        crate::error::StoreError::NotFound("timer missing immediately after insert".into())
    })
}

/// `scheduled_unbound | scheduled_bound -> cancelled`. No-op (`Ok(None)`)
/// if there is no active timer to cancel.
pub fn cancel_active(conn: &Connection, campaign_id: CampaignId) -> Result<Option<Timer>> {
    let Some(active) = get_active(conn, campaign_id)? else {
        return Ok(None);
    };
    transition(conn, active.id, TimerStatus::Cancelled)
}

/// `scheduled_unbound -> scheduled_bound`. If the active timer is already
/// `scheduled_bound`, this is a no-op that returns the unchanged row rather
/// than an error. `Ok(None)` if there is no active timer at all.
pub fn bind(
    conn: &Connection,
    campaign_id: CampaignId,
    message_id: &str,
    channel_id: Option<&str>,
    thread_id: Option<&str>,
) -> Result<Option<Timer>> {
    let Some(active) = get_active(conn, campaign_id)? else {
        return Ok(None);
    };
    if active.status == TimerStatus::ScheduledBound {
        return Ok(Some(active));
    }
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE timers SET status = 'scheduled_bound', message_id = ?1, channel_id = ?2,
         thread_id = ?3, updated_at = ?4 WHERE id = ?5 AND status = 'scheduled_unbound'",
        params![message_id, channel_id, thread_id, now, active.id],
    )?;
    get_by_id(conn, active.id)
}

/// `scheduled_unbound | scheduled_bound -> expired`. No-op if the timer is
/// already in a terminal state.
pub fn expire(conn: &Connection, id: i64) -> Result<Option<Timer>> {
    let Some(timer) = get_by_id(conn, id)? else {
        return Ok(None);
    };
    if !timer.status.is_active() {
        return Ok(Some(timer));
    }
    transition(conn, id, TimerStatus::Expired)
}

/// `expired -> consumed`. No-op if not currently `expired`.
pub fn consume(conn: &Connection, id: i64) -> Result<Option<Timer>> {
    let Some(timer) = get_by_id(conn, id)? else {
        return Ok(None);
    };
    if timer.status != TimerStatus::Expired {
        return Ok(Some(timer));
    }
    transition(conn, id, TimerStatus::Consumed)
}

fn transition(conn: &Connection, id: i64, to: TimerStatus) -> Result<Option<Timer>> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE timers SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![to.as_str(), now, id],
    )?;
    get_by_id(conn, id)
}

const SELECT: &str = "
    SELECT id, campaign_id, status, event_text, interruptible, interrupt_action, due_at,
           message_id, channel_id, thread_id, created_at, updated_at
    FROM timers";

fn row_to_timer(row: &rusqlite::Row<'_>) -> rusqlite::Result<Timer> {
    let status_str: String = row.get(2)?;
    let due_at: String = row.get(6)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;
    Ok(Timer {
        id: row.get(0)?,
        campaign_id: CampaignId(row.get(1)?),
        status: status_str.parse().unwrap_or(TimerStatus::Cancelled),
        event_text: row.get(3)?,
        interruptible: row.get(4)?,
        interrupt_action: row.get(5)?,
        due_at: super::parse_rfc3339(&due_at),
        message_id: row.get(7)?,
        channel_id: row.get(8)?,
        thread_id: row.get(9)?,
        created_at: super::parse_rfc3339(&created_at),
        updated_at: super::parse_rfc3339(&updated_at),
    })
}
