//! Error types for the shelfwatch harvester
//!
//! This module defines the domain error types for client construction and
//! storage access. Per-request fetch results are not errors; they are
//! classified into [`crate::crawler::FetchOutcome`] instead.

use thiserror::Error;

/// Errors that can occur while building or configuring the fetch client
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP client construction error
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid base URL or listing path
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Proxy endpoint or credentials could not be used
    #[error("Invalid proxy configuration: {0}")]
    InvalidProxy(String),
}

/// Errors raised by the catalog source, the record sink and the counter store
#[derive(Error, Debug)]
pub enum StorageError {
    /// Connection pool could not be created or yielded no connection
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// A row did not have the expected shape
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    /// Redis counter store error
    #[error("Redis error: {0}")]
    Redis(String),

    /// Cursor checkpoint file error
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),
}

impl From<deadpool_postgres::PoolError> for StorageError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

impl From<deadpool_postgres::CreatePoolError> for StorageError {
    fn from(err: deadpool_postgres::CreatePoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        Self::Redis(err.to_string())
    }
}

impl From<deadpool_redis::PoolError> for StorageError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        Self::Redis(err.to_string())
    }
}
