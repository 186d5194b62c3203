//! Storage error types.

use nethelper_core::BotError;
use thiserror::Error;

/// Errors that can occur when using storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StorageError> for BotError {
    fn from(e: StorageError) -> Self {
        BotError::Database(e.to_string())
    }
}
