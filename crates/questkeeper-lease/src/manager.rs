use questkeeper_core::{ActorId, CampaignId, Clock};
use questkeeper_store::repo::inflight;
use rusqlite::Connection;
use tracing::{debug, instrument, warn};

use crate::error::{LeaseError, Result};
use crate::types::ClaimToken;

/// Guarantees at-most-one in-flight turn per `(campaign, actor)` across
/// processes, without blocking indefinitely if a holder crashes.
///
/// Stateless by design: every operation takes the `Connection`/`Transaction`
/// it should run against, because `claim` must happen inside the same
/// Phase A transaction that loads the campaign, and `validate` must happen
/// inside Phase C's. There is nothing this type could usefully own.
pub struct LeaseManager<'a> {
    clock: &'a dyn Clock,
}

impl<'a> LeaseManager<'a> {
    pub fn new(clock: &'a dyn Clock) -> Self {
        Self { clock }
    }

    /// Insert a new lease, stealing an expired one if present.
    #[instrument(skip(self, conn), fields(%campaign_id, %actor_id))]
    pub fn claim(
        &self,
        conn: &Connection,
        campaign_id: CampaignId,
        actor_id: ActorId,
        ttl_seconds: u64,
    ) -> Result<ClaimToken> {
        let now = self.clock.now();
        let expires_at = now + chrono::Duration::seconds(ttl_seconds as i64);
        let token = ClaimToken::new();

        if let Some(row) = inflight::try_insert(conn, campaign_id, actor_id, token.as_str(), now, expires_at)? {
            debug!(claim_token = %row.claim_token, "lease claimed");
            return Ok(token);
        }

        // Someone already holds a row — it is either expired (stealable)
        // or genuinely held.
        match inflight::steal(conn, campaign_id, actor_id, token.as_str(), now, expires_at)? {
            Some(row) => {
                warn!(claim_token = %row.claim_token, "lease stolen from expired holder");
                Ok(token)
            }
            None => Err(LeaseError::LeaseHeld),
        }
    }

    /// Extend the lease's TTL. Returns `false` if it was stolen or released
    /// out from under the caller.
    #[instrument(skip(self, conn, token))]
    pub fn heartbeat(&self, conn: &Connection, token: &ClaimToken, ttl_seconds: u64) -> Result<bool> {
        let now = self.clock.now();
        let expires_at = now + chrono::Duration::seconds(ttl_seconds as i64);
        Ok(inflight::heartbeat(conn, token.as_str(), now, expires_at)?)
    }

    /// Read-only existence check tied to the claim token.
    pub fn validate(&self, conn: &Connection, token: &ClaimToken) -> Result<bool> {
        Ok(inflight::validate(conn, token.as_str())?)
    }

    /// Conditional delete; idempotent.
    #[instrument(skip(self, conn, token))]
    pub fn release(&self, conn: &Connection, token: &ClaimToken) -> Result<()> {
        inflight::release(conn, token.as_str())?;
        Ok(())
    }
}
