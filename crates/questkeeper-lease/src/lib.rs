pub mod error;
pub mod manager;
pub mod types;

pub use error::LeaseError;
pub use manager::LeaseManager;
pub use types::ClaimToken;

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use questkeeper_core::{ActorId, CampaignId, FixedClock};
    use rusqlite::Connection;

    use super::*;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        questkeeper_store::db::init_db(&conn).unwrap();
        conn
    }

    #[test]
    fn claim_then_second_claim_is_lease_held() {
        let conn = setup();
        let clock = FixedClock::new(Utc::now());
        let mgr = LeaseManager::new(&clock);
        let campaign = CampaignId(1);
        let actor = ActorId(1);

        let _first = mgr.claim(&conn, campaign, actor, 90).unwrap();
        let second = mgr.claim(&conn, campaign, actor, 90);
        assert!(matches!(second, Err(LeaseError::LeaseHeld)));
    }

    #[test]
    fn expired_lease_can_be_stolen() {
        let conn = setup();
        let clock = FixedClock::new(Utc::now());
        let mgr = LeaseManager::new(&clock);
        let campaign = CampaignId(1);
        let actor = ActorId(1);

        let first = mgr.claim(&conn, campaign, actor, 90).unwrap();
        clock.advance(chrono::Duration::seconds(91));
        let second = mgr.claim(&conn, campaign, actor, 90).unwrap();
        assert_ne!(first, second);

        // The original token is no longer valid.
        assert!(!mgr.validate(&conn, &first).unwrap());
        assert!(mgr.validate(&conn, &second).unwrap());
    }

    #[test]
    fn heartbeat_fails_after_steal() {
        let conn = setup();
        let clock = FixedClock::new(Utc::now());
        let mgr = LeaseManager::new(&clock);
        let campaign = CampaignId(1);
        let actor = ActorId(1);

        let original = mgr.claim(&conn, campaign, actor, 90).unwrap();
        clock.advance(chrono::Duration::seconds(91));
        let _stolen = mgr.claim(&conn, campaign, actor, 90).unwrap();

        let ok = mgr.heartbeat(&conn, &original, 90).unwrap();
        assert!(!ok);
    }

    #[test]
    fn release_is_idempotent() {
        let conn = setup();
        let clock = FixedClock::new(Utc::now());
        let mgr = LeaseManager::new(&clock);
        let token = mgr.claim(&conn, CampaignId(1), ActorId(1), 90).unwrap();

        mgr.release(&conn, &token).unwrap();
        // Releasing again must not error.
        mgr.release(&conn, &token).unwrap();
        assert!(!mgr.validate(&conn, &token).unwrap());
    }
}
