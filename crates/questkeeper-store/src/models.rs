use chrono::{DateTime, Utc};
use questkeeper_core::{ActorId, CampaignId, PlayerId, TurnId};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub external_id: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub namespace: String,
    pub name_normalized: String,
    pub summary: String,
    pub state: Json,
    pub characters: Json,
    pub last_narration: String,
    pub memory_visible_max_turn_id: Option<TurnId>,
    pub row_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The subset of campaign fields a Phase-C CAS write is allowed to change.
#[derive(Debug, Clone)]
pub struct CampaignUpdate {
    pub state: Json,
    pub characters: Json,
    pub summary: String,
    pub last_narration: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub campaign_id: CampaignId,
    pub surface_key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub campaign_id: CampaignId,
    pub actor_id: ActorId,
    pub level: i64,
    pub xp: i64,
    pub attributes: Json,
    pub state: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    User,
    Narration,
    System,
}

impl TurnKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TurnKind::User => "user",
            TurnKind::Narration => "narration",
            TurnKind::System => "system",
        }
    }
}

impl std::str::FromStr for TurnKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(TurnKind::User),
            "narration" => Ok(TurnKind::Narration),
            "system" => Ok(TurnKind::System),
            other => Err(format!("unknown turn kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub campaign_id: CampaignId,
    pub kind: TurnKind,
    pub content: String,
    pub external_message_id: Option<String>,
    pub external_user_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: i64,
    pub campaign_id: CampaignId,
    pub turn_id: TurnId,
    pub campaign_state: Json,
    pub characters: Json,
    pub summary: String,
    pub last_narration: String,
    /// Keyed by `actor_id` as a string (JSON object keys must be strings).
    pub players: Json,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    ScheduledUnbound,
    ScheduledBound,
    Cancelled,
    Expired,
    Consumed,
}

impl TimerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TimerStatus::ScheduledUnbound => "scheduled_unbound",
            TimerStatus::ScheduledBound => "scheduled_bound",
            TimerStatus::Cancelled => "cancelled",
            TimerStatus::Expired => "expired",
            TimerStatus::Consumed => "consumed",
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, TimerStatus::ScheduledUnbound | TimerStatus::ScheduledBound)
    }
}

impl std::str::FromStr for TimerStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled_unbound" => Ok(TimerStatus::ScheduledUnbound),
            "scheduled_bound" => Ok(TimerStatus::ScheduledBound),
            "cancelled" => Ok(TimerStatus::Cancelled),
            "expired" => Ok(TimerStatus::Expired),
            "consumed" => Ok(TimerStatus::Consumed),
            other => Err(format!("unknown timer status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timer {
    pub id: i64,
    pub campaign_id: CampaignId,
    pub status: TimerStatus,
    pub event_text: String,
    pub interruptible: bool,
    pub interrupt_action: Option<String>,
    pub due_at: DateTime<Utc>,
    pub message_id: Option<String>,
    pub channel_id: Option<String>,
    pub thread_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InflightTurn {
    pub id: i64,
    pub campaign_id: CampaignId,
    pub actor_id: ActorId,
    pub claim_token: String,
    pub claimed_at: DateTime<Utc>,
    pub heartbeat_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Sent,
    Failed,
}

impl OutboxStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Sent => "sent",
            OutboxStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for OutboxStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OutboxStatus::Pending),
            "sent" => Ok(OutboxStatus::Sent),
            "failed" => Ok(OutboxStatus::Failed),
            other => Err(format!("unknown outbox status: {other}")),
        }
    }
}

/// Sentinel `session_scope` used when an outbox event has no session to
/// scope its idempotency key against.
pub const NO_SESSION_SCOPE: &str = "__no_session__";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: i64,
    pub campaign_id: CampaignId,
    pub session_scope: String,
    pub event_type: String,
    pub idempotency_key: String,
    pub payload: Json,
    pub status: OutboxStatus,
    pub attempts: i64,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub id: i64,
    pub campaign_id: CampaignId,
    pub turn_id: TurnId,
    pub vector: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRef {
    pub id: i64,
    pub campaign_id: CampaignId,
    pub room_key: Option<String>,
    pub player_id: Option<PlayerId>,
    pub media_uri: String,
    pub created_at: DateTime<Utc>,
}
