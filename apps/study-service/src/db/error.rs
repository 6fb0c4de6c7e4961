//! Store error types.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("card not found: {0}")]
    CardNotFound(Uuid),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("connection lock poisoned")]
    LockPoisoned,

    #[error("blocking task failed: {0}")]
    Task(String),
}
