//! Error types for the Memoria engine.

use memoria_store::StoreError;

/// Errors produced by engine operations.
///
/// Runtime degradations (embedding provider outages) are absorbed with a
/// recorded warning and never surface here; a second concurrent
/// consolidation pass returns a no-op result, not an error.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("memory not found: {id}")]
    NotFound { id: String },

    #[error("unknown memory kind: {kind}")]
    InvalidKind { kind: String },

    #[error("invalid knowledge payload: {reason}")]
    ValidationFailure { reason: String },

    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
