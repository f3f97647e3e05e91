use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimerError {
    #[error(transparent)]
    Store(#[from] questkeeper_store::StoreError),
}

pub type Result<T> = std::result::Result<T, TimerError>;
