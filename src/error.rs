//! Unified error handling for the shelfwatch crate
//!
//! This module provides a unified error type that consolidates all domain-specific
//! errors into a single `Error` enum, while maintaining the ability to use
//! domain-specific errors when needed.
//!
//! # Architecture
//!
//! - [`ShelfwatchError`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! Per-request HTTP failures never appear here: the fetch client folds them
//! into [`crate::crawler::FetchOutcome`], and pair-level failures are recorded
//! in the batch report. What remains are the failures that stop a batch.

use std::io;
use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::scheduler::error::SchedulerError;
pub use crate::utils::error::{FetchError, StorageError};

/// Common trait for all shelfwatch error types
pub trait ShelfwatchError: std::error::Error {
    /// Check if this error is recoverable (a fresh execution may succeed)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP client, proxy)
    Network,
    /// Payload decoding errors
    Parsing,
    /// Catalog, sink, counter store and checkpoint errors
    Storage,
    /// Configuration and validation errors
    Config,
    /// Batch scheduling errors
    Scheduler,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Short human-readable label for the category
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "network error",
            Self::Parsing => "parsing error",
            Self::Storage => "storage error",
            Self::Config => "configuration error",
            Self::Scheduler => "scheduler error",
            Self::Other => "other error",
        }
    }
}

/// Unified error type for the shelfwatch crate
#[derive(Error, Debug)]
pub enum Error {
    /// Fetch client construction errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Catalog, sink and counter store errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Batch scheduling errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ShelfwatchError for FetchError {
    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Http(_))
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Http(_) => ErrorCategory::Network,
            Self::InvalidUrl(_) | Self::InvalidProxy(_) => ErrorCategory::Config,
        }
    }
}

impl ShelfwatchError for StorageError {
    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidRow(_))
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Storage
    }
}

impl ShelfwatchError for SchedulerError {
    fn is_recoverable(&self) -> bool {
        SchedulerError::is_recoverable(self)
    }

    fn category(&self) -> ErrorCategory {
        match self {
            SchedulerError::InvalidConfig { .. } => ErrorCategory::Config,
            SchedulerError::Catalog { .. } | SchedulerError::Prepare { .. } => {
                ErrorCategory::Storage
            }
            _ => ErrorCategory::Scheduler,
        }
    }
}

impl ShelfwatchError for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            Self::Storage(e) => e.is_recoverable(),
            Self::Scheduler(e) => ShelfwatchError::is_recoverable(e),
            Self::Io(_) => true, // I/O errors are often transient
            Self::Json(_) => false,
            Self::Http(_) => true,
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(e) => e.category(),
            Self::Storage(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::Scheduler(e) => ShelfwatchError::category(e),
            Self::Json(_) => ErrorCategory::Parsing,
            Self::Http(_) => ErrorCategory::Network,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
