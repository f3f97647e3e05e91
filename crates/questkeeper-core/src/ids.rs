use serde::{Deserialize, Serialize};

/// Opaque primary-key newtypes. Kept as thin `i64` wrappers — the engine
/// never does arithmetic on them, only equality and ordering.
macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl $name {
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(v: i64) -> Self {
                Self(v)
            }
        }
    };
}

id_type!(CampaignId);
id_type!(ActorId);
id_type!(PlayerId);
id_type!(TurnId);
id_type!(SessionId);
