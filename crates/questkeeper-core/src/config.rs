use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Default lease time-to-live, in seconds, before a claim becomes stealable.
pub const DEFAULT_LEASE_TTL_SECONDS: u64 = 90;
/// Default number of Phase A/C retries on a CAS conflict before surfacing it.
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 1;
/// Default number of most-recent turns loaded into a `TurnContext`.
pub const DEFAULT_RECENT_TURNS_LIMIT: usize = 20;
/// Heartbeat cadence expressed as a fraction of the lease TTL (ttl / N).
pub const DEFAULT_HEARTBEAT_FRACTION: u64 = 3;

/// Engine-wide configuration (`questkeeper.toml` + `QUESTKEEPER_*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_lease_ttl_seconds")]
    pub lease_ttl_seconds: u64,
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
    #[serde(default = "default_recent_turns_limit")]
    pub recent_turns_limit: usize,
    #[serde(default = "default_heartbeat_fraction")]
    pub heartbeat_fraction: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            lease_ttl_seconds: DEFAULT_LEASE_TTL_SECONDS,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            recent_turns_limit: DEFAULT_RECENT_TURNS_LIMIT,
            heartbeat_fraction: DEFAULT_HEARTBEAT_FRACTION,
        }
    }
}

impl EngineConfig {
    /// Load configuration layering an optional TOML file under `QUESTKEEPER_*`
    /// environment overrides, falling back to `Default` for anything unset.
    pub fn load(toml_path: Option<&str>) -> Result<Self, EngineError> {
        let mut figment = Figment::from(figment::providers::Serialized::defaults(
            EngineConfig::default(),
        ));
        if let Some(path) = toml_path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("QUESTKEEPER_"));
        figment
            .extract()
            .map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn heartbeat_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(
            (self.lease_ttl_seconds / self.heartbeat_fraction.max(1)).max(1),
        )
    }
}

fn default_database_path() -> String {
    "questkeeper.sqlite3".to_string()
}
fn default_lease_ttl_seconds() -> u64 {
    DEFAULT_LEASE_TTL_SECONDS
}
fn default_max_conflict_retries() -> u32 {
    DEFAULT_MAX_CONFLICT_RETRIES
}
fn default_recent_turns_limit() -> usize {
    DEFAULT_RECENT_TURNS_LIMIT
}
fn default_heartbeat_fraction() -> u64 {
    DEFAULT_HEARTBEAT_FRACTION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_with_no_file_or_env() {
        let cfg = EngineConfig::load(None).expect("load");
        assert_eq!(cfg.lease_ttl_seconds, DEFAULT_LEASE_TTL_SECONDS);
        assert_eq!(cfg.max_conflict_retries, DEFAULT_MAX_CONFLICT_RETRIES);
    }

    #[test]
    fn env_override_takes_effect() {
        std::env::set_var("QUESTKEEPER_LEASE_TTL_SECONDS", "45");
        let cfg = EngineConfig::load(None).expect("load");
        assert_eq!(cfg.lease_ttl_seconds, 45);
        std::env::remove_var("QUESTKEEPER_LEASE_TTL_SECONDS");
    }
}
