pub mod db;
pub mod error;
pub mod models;
pub mod repo;
pub mod uow;

pub use error::StoreError;
pub use uow::UnitOfWork;
