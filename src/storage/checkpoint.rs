//! Cursor checkpoint for the local batch driver
//!
//! The orchestrator normally owns the cursor. When batches are driven locally,
//! the cursor is persisted to a JSON file after every batch so an interrupted
//! run resumes at the next unfinished batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::scheduler::batch::BatchCursor;
use crate::utils::error::StorageError;

/// Persisted driver state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorRecord {
    /// Next batch to execute
    pub cursor: BatchCursor,

    /// The run reached `Done`
    pub finished: bool,

    pub updated_at: DateTime<Utc>,
}

/// JSON file holding a [`CursorRecord`]
#[derive(Debug, Clone)]
pub struct CursorCheckpoint {
    path: PathBuf,
}

impl CursorCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save the cursor, replacing the previous record atomically
    pub fn save(&self, cursor: BatchCursor, finished: bool) -> Result<CursorRecord, StorageError> {
        let record = CursorRecord {
            cursor,
            finished,
            updated_at: Utc::now(),
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                StorageError::Checkpoint(format!("create {}: {e}", parent.display()))
            })?;
        }

        // Write to temp file first, then rename
        let temp_path = self.path.with_extension("json.tmp");
        let file = File::create(&temp_path).map_err(|e| {
            StorageError::Checkpoint(format!("create {}: {e}", temp_path.display()))
        })?;

        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &record)
            .map_err(|e| StorageError::Checkpoint(format!("serialize: {e}")))?;
        writer
            .flush()
            .map_err(|e| StorageError::Checkpoint(format!("flush: {e}")))?;

        fs::rename(&temp_path, &self.path).map_err(|e| {
            StorageError::Checkpoint(format!("rename to {}: {e}", self.path.display()))
        })?;

        tracing::debug!(
            path = %self.path.display(),
            batch_index = cursor.batch_index,
            finished,
            "Cursor checkpoint saved"
        );
        Ok(record)
    }

    /// Load the saved record, `None` when no checkpoint exists
    pub fn load(&self) -> Result<Option<CursorRecord>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let file = File::open(&self.path).map_err(|e| {
            StorageError::Checkpoint(format!("open {}: {e}", self.path.display()))
        })?;

        let record = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            StorageError::Checkpoint(format!("parse {}: {e}", self.path.display()))
        })?;

        Ok(Some(record))
    }

    /// Remove the checkpoint file if present
    pub fn clear(&self) -> Result<(), StorageError> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                StorageError::Checkpoint(format!("remove {}: {e}", self.path.display()))
            })?;
        }
        Ok(())
    }
}
