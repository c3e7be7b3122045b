use thiserror::Error;

use billroute_core::flows::store::StoreError;

pub mod approval;
pub mod memory;

pub use approval::SqlApprovalStore;
pub use memory::InMemoryApprovalStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(
                error @ (sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::WorkerCrashed),
            ) => StoreError::Connection(error.to_string()),
            RepositoryError::Database(error) => StoreError::Database(error.to_string()),
            RepositoryError::Decode(message) => StoreError::Decode(message),
            RepositoryError::Conflict(message) => StoreError::Conflict(message),
        }
    }
}
