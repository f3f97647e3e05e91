use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("row not found: {0}")]
    NotFound(String),

    /// A conditional update (CAS, lease claim, idempotent timer transition)
    /// touched zero rows. Callers interpret this per-operation — it is not
    /// always an error (e.g. idempotent timer re-application).
    #[error("conditional update affected no rows: {0}")]
    NoRowsAffected(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
