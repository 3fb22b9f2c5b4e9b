//! Error types for cadence operations.
//!
//! Every failure carries a stable [`ErrorKind`] so request layers can map it
//! onto their own envelopes without matching on message text.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

/// Result type alias for cadence operations.
pub type CadenceResult<T> = Result<T, CadenceError>;

/// Main error type for all cadence operations.
#[derive(Error, Debug)]
pub enum CadenceError {
    /// Caller supplied an argument outside its documented domain.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        message: String,
        field: Option<&'static str>,
    },

    /// Learning item not found.
    #[error("Item not found: {message}")]
    NotFound { message: String, item_id: String },

    /// The memory model produced a state that breaks an item invariant.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Backing store failed or is unreachable. Safe to retry.
    #[error("Storage unavailable: {message}")]
    StorageUnavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Stable error kinds for programmatic handling.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    InvariantViolation,
    StorageUnavailable,
    Configuration,
}

impl ErrorKind {
    /// Get the string representation of the error kind.
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

impl CadenceError {
    /// Create an invalid argument error naming the offending field.
    pub fn invalid_field(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
            field: Some(field),
        }
    }

    /// Create a not found error.
    pub fn not_found(item_id: impl Into<String>) -> Self {
        let id = item_id.into();
        Self::NotFound {
            message: format!("Item with id '{}' not found", id),
            item_id: id,
        }
    }

    /// Create an invariant violation error.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }

    /// Get the error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvariantViolation(_) => ErrorKind::InvariantViolation,
            Self::StorageUnavailable { .. } => ErrorKind::StorageUnavailable,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Whether the caller may retry the same request unchanged.
    ///
    /// Only storage failures are transient. The scheduler itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable { .. })
    }

    /// Get the field that failed validation, if known.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::InvalidArgument { field, .. } => *field,
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for CadenceError {
    fn from(err: rusqlite::Error) -> Self {
        Self::StorageUnavailable {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for CadenceError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::StorageUnavailable {
            message: format!("lock poisoned: {}", err),
            source: None,
        }
    }
}
