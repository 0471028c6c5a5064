//! Error taxonomy
//!
//! Four classes with distinct handling: transient dependency failures surface
//! as [`AtlasError::ServiceUnavailable`] after retries are exhausted; data
//! errors are unit-scoped (the offending link/chunk/entity is logged and
//! skipped); unknown ids come back as [`AtlasError::NotFound`] rather than a
//! panic; cancellation is always its own signal and never conflated with
//! failure.

use thiserror::Error;

/// Error type shared across the Atlas crates.
#[derive(Debug, Error)]
pub enum AtlasError {
    /// A dependency (embedding/LLM/store endpoint) is unavailable after
    /// retries, or its circuit breaker is open.
    #[error("{service} unavailable: {message} (retry after {retry_after_secs}s)")]
    ServiceUnavailable {
        service: String,
        message: String,
        retry_after_secs: u64,
    },

    /// Malformed input data: bad markdown, unparseable LLM output, invalid
    /// metadata. Recoverable at the unit level.
    #[error("data error: {0}")]
    Data(String),

    /// Unknown document/concept/chunk id. Explicit, never thrown as a panic.
    #[error("not found: {0}")]
    NotFound(String),

    /// Graph or vector store failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid configuration, detected at construction time.
    #[error("configuration error: {0}")]
    Config(String),

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,
}

/// Specialized Result type for Atlas operations.
pub type AtlasResult<T> = Result<T, AtlasError>;

impl AtlasError {
    pub fn unavailable(
        service: impl Into<String>,
        message: impl Into<String>,
        retry_after_secs: u64,
    ) -> Self {
        Self::ServiceUnavailable {
            service: service.into(),
            message: message.into(),
            retry_after_secs,
        }
    }

    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ServiceUnavailable { .. })
    }

    /// Whether this error should abort only the current unit of work
    /// (one chunk, one link, one entity) rather than the whole operation.
    pub fn is_unit_scoped(&self) -> bool {
        matches!(self, Self::Data(_) | Self::ServiceUnavailable { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
