use thiserror::Error;

#[derive(Debug, Error)]
pub enum LeaseError {
    /// Another non-expired lease already exists for `(campaign, actor)`.
    #[error("lease already held for this campaign/actor pair")]
    LeaseHeld,

    /// The claim token presented does not correspond to a live lease — it
    /// was released, stolen, or never existed.
    #[error("lease not found or no longer valid for this claim token")]
    NotValid,

    #[error(transparent)]
    Store(#[from] questkeeper_store::StoreError),
}

pub type Result<T> = std::result::Result<T, LeaseError>;
