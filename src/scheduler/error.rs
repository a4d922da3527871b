//! Error types for the scheduler module

use std::fmt;

use crate::utils::error::StorageError;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Batch-fatal scheduler errors.
///
/// Pair-level harvesting failures never surface here; they are collected in
/// the batch report.
#[derive(Debug)]
pub enum SchedulerError {
    /// Listing stores or categories failed
    Catalog { operation: String, reason: String },

    /// The sink could not be prepared
    Prepare { reason: String },

    /// Scheduler configuration is unusable
    InvalidConfig { field: String, reason: String },

    /// Cursor checkpoint could not be read or written
    Checkpoint { operation: String, reason: String },

    /// Serialization/deserialization error
    SerializationError { reason: String },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Catalog { operation, reason } => {
                write!(f, "Catalog listing failed during '{}': {}", operation, reason)
            }
            Self::Prepare { reason } => {
                write!(f, "Sink preparation failed: {}", reason)
            }
            Self::InvalidConfig { field, reason } => {
                write!(f, "Scheduler config error in '{}': {}", field, reason)
            }
            Self::Checkpoint { operation, reason } => {
                write!(f, "Checkpoint error during '{}': {}", operation, reason)
            }
            Self::SerializationError { reason } => {
                write!(f, "Serialization error: {}", reason)
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError {
            reason: err.to_string(),
        }
    }
}

impl SchedulerError {
    /// Create a catalog listing error
    pub fn catalog(operation: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Catalog {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a sink preparation error
    pub fn prepare(err: &StorageError) -> Self {
        Self::Prepare {
            reason: err.to_string(),
        }
    }

    /// Create a config error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a checkpoint error
    pub fn checkpoint(operation: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Checkpoint {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if a fresh execution of the same batch may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Catalog { .. } | Self::Prepare { .. } | Self::Checkpoint { .. }
        )
    }
}
