//! Error types for tally operations

use thiserror::Error;

/// Remote resource errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResourceError {
    #[error("No resource registered under '{resource}'")]
    NotRegistered { resource: String },

    #[error("Request to {resource} failed with status {status}: {message}")]
    RequestFailed {
        resource: String,
        status: u16,
        message: String,
    },

    #[error("Invalid response from {resource}: {reason}")]
    InvalidResponse { resource: String, reason: String },

    #[error("Record {id} not found in {resource}")]
    NotFound { resource: String, id: String },
}

/// Fan-out and join errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Request {request_id} timed out after {after_ms}ms")]
    TimedOut { request_id: String, after_ms: u64 },

    #[error("Trigger '{trigger}' superseded by generation {generation}")]
    Superseded { trigger: String, generation: u64 },

    #[error("Duplicate request {request_id} in one batch")]
    DuplicateRequest { request_id: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all tally errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TallyError {
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl TallyError {
    /// True when the error marks a stale trigger rather than a failure.
    pub fn is_superseded(&self) -> bool {
        matches!(self, TallyError::Dispatch(DispatchError::Superseded { .. }))
    }
}

/// Result type alias for tally operations.
pub type TallyResult<T> = Result<T, TallyError>;

// =============================================================================
// TESTS
// =============================================================================
