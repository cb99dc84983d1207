//! Error types for the reconciliation engine

use thiserror::Error;

/// Errors surfaced by the update orchestrator.
///
/// `Validation` and `NotFound` map to 4xx-equivalent rejections at the HTTP
/// layer and are raised before any write. `Database` aborts and rolls back
/// the core transaction. Advisory step failures never appear here; they are
/// collected in the [`crate::outcome`] types instead.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Payload failed field-level validation (4xx, with the offending field)
    #[error("Validation failed for field '{field}': {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// Property or a referenced entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Payload is structurally unusable (not a JSON object, etc.)
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Database error on the critical write path
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Error from the common layer
    #[error(transparent)]
    Common(#[from] imob_common::Error),
}

/// Result type for reconciliation operations
pub type UpdateResult<T> = Result<T, UpdateError>;
