use thiserror::Error;

/// Canonical error taxonomy for the turn-resolution engine.
///
/// Lower-level crates (`questkeeper-store`, `questkeeper-lease`,
/// `questkeeper-timers`) define their own narrow error enums; `EngineError`
/// is what actually crosses the public API boundary, the way `SkynetError`
/// sits above `SessionError`/`SchedulerError` in the rest of this codebase.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Another non-expired lease already exists for `(campaign, actor)`.
    #[error("turn already in progress for this actor")]
    LeaseHeld,

    /// The lease was stolen (or released) before Phase C could commit.
    #[error("lease lost before commit — resubmit the action")]
    LeaseLost,

    /// The campaign's `row_version` changed between Phase A and Phase C,
    /// and all configured retries were exhausted.
    #[error("campaign state changed concurrently; retries exhausted")]
    CasConflict,

    /// The completion backend's output could not be parsed into the
    /// structured turn-resolution schema.
    #[error("model output could not be parsed: {0}")]
    BadModelOutput(String),

    /// A capability port (`TextCompletion`, `MemorySearch`, ...) failed.
    #[error("capability port failure: {0}")]
    PortFailure(String),

    /// `rewind_to_turn` targeted a turn with no attached snapshot.
    #[error("no snapshot exists for turn {turn_id}")]
    NoSnapshot { turn_id: i64 },

    /// A referenced campaign, actor, or player does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// An underlying persistence failure not covered by a more specific kind.
    #[error("store error: {0}")]
    Store(String),
}

impl EngineError {
    /// Short, stable error code — useful for host-side logging/metrics
    /// without matching on the `Display` string.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::LeaseHeld => "LEASE_HELD",
            EngineError::LeaseLost => "LEASE_LOST",
            EngineError::CasConflict => "CAS_CONFLICT",
            EngineError::BadModelOutput(_) => "BAD_MODEL_OUTPUT",
            EngineError::PortFailure(_) => "PORT_FAILURE",
            EngineError::NoSnapshot { .. } => "NO_SNAPSHOT",
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::Config(_) => "CONFIG_ERROR",
            EngineError::Store(_) => "STORE_ERROR",
        }
    }

    /// `true` for the single error kind the engine is allowed to recover
    /// from locally by retrying Phase A → C.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::CasConflict)
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_has_a_stable_code() {
        let cases: Vec<EngineError> = vec![
            EngineError::LeaseHeld,
            EngineError::LeaseLost,
            EngineError::CasConflict,
            EngineError::BadModelOutput("x".into()),
            EngineError::PortFailure("x".into()),
            EngineError::NoSnapshot { turn_id: 1 },
            EngineError::NotFound("x".into()),
            EngineError::Config("x".into()),
            EngineError::Store("x".into()),
        ];
        let codes: Vec<&str> = cases.iter().map(|e| e.code()).collect();
        let unique: std::collections::HashSet<&str> = codes.iter().copied().collect();
        assert_eq!(codes.len(), unique.len(), "error codes must be distinct");
    }

    #[test]
    fn only_cas_conflict_is_retryable() {
        assert!(EngineError::CasConflict.is_retryable());
        assert!(!EngineError::LeaseHeld.is_retryable());
        assert!(!EngineError::LeaseLost.is_retryable());
    }
}
