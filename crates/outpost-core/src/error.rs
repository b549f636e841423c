//! Error types for the Outpost system.

use thiserror::Error;

use crate::keys::KeyError;

#[derive(Debug, Error)]
pub enum OutpostError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Entity already exists: {entity} with key {key}")]
    AlreadyExists { entity: String, key: String },

    /// A conditional write found a different version (or lifecycle state)
    /// than the caller expected. Nothing was written.
    #[error("Conflicting update on {entity} with key {key}")]
    Conflict { entity: String, key: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Malformed key: {0}")]
    Key(#[from] KeyError),

    #[error("Provisioning failed: {0}")]
    Provisioning(String),

    #[error("Toolchain error: {0}")]
    Toolchain(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OutpostError {
    /// Returns true for a lost optimistic-concurrency race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

pub type OutpostResult<T> = Result<T, OutpostError>;
