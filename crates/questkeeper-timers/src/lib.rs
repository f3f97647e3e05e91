pub mod error;
pub mod machine;

pub use error::TimerError;
