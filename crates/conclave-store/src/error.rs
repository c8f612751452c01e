//! Error types for store operations

use conclave_domain::ItemError;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// `add` on a key that is already live
    #[error("Context key '{0}' already exists; use update instead")]
    DuplicateKey(String),

    /// `update` on a key that is not live
    #[error("Cannot update non-existent context key '{0}'")]
    NoSuchKey(String),

    /// Item failed validation
    #[error("Invalid context item: {0}")]
    InvalidItem(#[from] ItemError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored JSON could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Opening or loading the durable store failed
    #[error("Failed to connect context store: {0}")]
    Connection(String),
}

impl StoreError {
    /// Caller errors: duplicate add, missing key, malformed item
    ///
    /// These are never worth retrying.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            StoreError::DuplicateKey(_) | StoreError::NoSuchKey(_) | StoreError::InvalidItem(_)
        )
    }

    /// Failures of the backing database
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            StoreError::Database(_) | StoreError::Serialization(_) | StoreError::Connection(_)
        )
    }
}
