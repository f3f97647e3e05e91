//! Conversions from the lower-level crates' own error enums into the
//! public [`EngineError`] that crosses the turn engine's API boundary.
//!
//! These are plain functions, not `From` impls: `EngineError` lives in
//! `questkeeper-core`, which none of `questkeeper-store`, `questkeeper-lease`,
//! or `questkeeper-timers` may depend on (that would cycle the crate graph
//! back through `questkeeper-engine`), so the orphan rule rules out
//! implementing a foreign trait for a foreign type here. Stringifying the
//! source error is the same shape this codebase already uses elsewhere for
//! cross-boundary error flattening.

use questkeeper_core::ports::PortError;
use questkeeper_core::EngineError;
use questkeeper_lease::LeaseError;
use questkeeper_store::StoreError;
use questkeeper_timers::TimerError;

pub(crate) fn store_err(e: StoreError) -> EngineError {
    EngineError::Store(e.to_string())
}

pub(crate) fn lease_err(e: LeaseError) -> EngineError {
    match e {
        LeaseError::LeaseHeld => EngineError::LeaseHeld,
        LeaseError::NotValid => EngineError::LeaseLost,
        LeaseError::Store(inner) => EngineError::Store(inner.to_string()),
    }
}

pub(crate) fn timer_err(e: TimerError) -> EngineError {
    match e {
        TimerError::Store(inner) => EngineError::Store(inner.to_string()),
    }
}

pub(crate) fn port_err(e: PortError) -> EngineError {
    EngineError::PortFailure(e.to_string())
}
