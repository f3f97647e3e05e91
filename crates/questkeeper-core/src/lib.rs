pub mod clock;
pub mod config;
pub mod error;
pub mod ids;
pub mod logging;
pub mod ports;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use error::EngineError;
pub use ids::{ActorId, CampaignId, PlayerId, SessionId, TurnId};
pub use logging::init_tracing;
