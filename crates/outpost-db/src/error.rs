//! Database-specific error types and conversions.

use outpost_core::error::OutpostError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Record already exists: {entity} with key {key}")]
    AlreadyExists { entity: String, key: String },

    #[error("Conditional update rejected: {entity} with key {key}")]
    Conflict { entity: String, key: String },

    #[error("Invalid stored record: {0}")]
    Decode(String),
}

/// How a failed write statement should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteFailure {
    Duplicate,
    Conflict,
    Other,
}

impl WriteFailure {
    /// Classify SurrealDB's error text, its only signal for these cases:
    ///
    /// - "Database record ... already exists": `CREATE` on an existing
    ///   record id.
    /// - "Database index ... already contains ...": unique index violation.
    /// - "Failed to commit transaction due to a read or write conflict":
    ///   a transaction that lost a write race.
    ///
    /// Any other wording, including messages reworded by a SurrealDB
    /// upgrade, is `Other` and surfaces as `OutpostError::Database`.
    pub(crate) fn classify(message: &str) -> Self {
        let lowered = message.to_lowercase();
        if lowered.contains("already exists") || lowered.contains("already contains") {
            Self::Duplicate
        } else if lowered.contains("conflict") {
            Self::Conflict
        } else {
            Self::Other
        }
    }
}

impl DbError {
    /// Map a failed write onto `AlreadyExists`, `Conflict` or `Query`.
    pub(crate) fn from_write(err: surrealdb::Error, entity: &str, key: &str) -> Self {
        let message = err.to_string();
        match WriteFailure::classify(&message) {
            WriteFailure::Duplicate => DbError::AlreadyExists {
                entity: entity.into(),
                key: key.into(),
            },
            WriteFailure::Conflict => DbError::Conflict {
                entity: entity.into(),
                key: key.into(),
            },
            WriteFailure::Other => DbError::Query(message),
        }
    }
}

impl From<DbError> for OutpostError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::AlreadyExists { entity, key } => OutpostError::AlreadyExists { entity, key },
            DbError::Conflict { entity, key } => OutpostError::Conflict { entity, key },
            other => OutpostError::Database(other.to_string()),
        }
    }
}
