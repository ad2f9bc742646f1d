//! Cursor checkpoints for incremental resources
//!
//! After every persisted page of tickets or users the page's `after_cursor` is
//! saved next to the export. A re-run starts from that cursor instead of the
//! beginning of the incremental stream. The checkpoint is saved after the page
//! is flushed, so a crash between the two repeats at most one page.

use super::ResumeError;
use crate::ResourceKind;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// Current checkpoint schema version
const SCHEMA_VERSION: &str = "1.0.0";

/// Maximum accepted checkpoint file size
pub const MAX_CHECKPOINT_FILE_SIZE: u64 = 1024 * 1024;

/// Last persisted position of an incremental export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorCheckpoint {
    schema_version: String,
    resource: ResourceKind,
    after_cursor: String,
    records_written: u64,
    updated_at: i64,
}

impl CursorCheckpoint {
    /// Checkpoint for `resource` at `after_cursor`
    pub fn new(resource: ResourceKind, after_cursor: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            resource,
            after_cursor: after_cursor.into(),
            records_written: 0,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Resource this checkpoint belongs to
    pub fn resource(&self) -> ResourceKind {
        self.resource
    }

    /// Cursor to resume from
    pub fn after_cursor(&self) -> &str {
        &self.after_cursor
    }

    /// Records written across all runs since the checkpoint was created
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Last update time in Unix milliseconds
    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    /// Move to the cursor following a persisted page
    pub fn advance(&mut self, after_cursor: impl Into<String>, records: u64) {
        self.after_cursor = after_cursor.into();
        self.records_written += records;
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }

    /// Save atomically (temp file, fsync, rename)
    pub fn save(&self, path: &Path) -> Result<(), ResumeError> {
        let parent_dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent_dir).map_err(|e| ResumeError::IoError(e.to_string()))?;

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ResumeError::SerializationError(e.to_string()))?;

        let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
            .map_err(|e| ResumeError::IoError(format!("Failed to create temp file: {e}")))?;
        temp_file
            .write_all(json.as_bytes())
            .map_err(|e| ResumeError::IoError(format!("Failed to write to temp file: {e}")))?;
        temp_file
            .flush()
            .map_err(|e| ResumeError::IoError(format!("Failed to flush temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| ResumeError::IoError(format!("Failed to sync temp file: {e}")))?;
        temp_file
            .persist(path)
            .map_err(|e| ResumeError::IoError(format!("Failed to persist temp file: {e}")))?;

        if let Ok(dir) = std::fs::File::open(parent_dir) {
            let _ = dir.sync_all();
        }

        debug!(
            path = %path.display(),
            resource = %self.resource,
            records_written = self.records_written,
            "Cursor checkpoint saved"
        );
        Ok(())
    }

    /// Load the checkpoint of `resource`; `None` when no checkpoint exists
    pub fn load(path: &Path, resource: ResourceKind) -> Result<Option<Self>, ResumeError> {
        if !path.exists() {
            return Ok(None);
        }

        let metadata = std::fs::metadata(path).map_err(|e| ResumeError::IoError(e.to_string()))?;
        if metadata.len() > MAX_CHECKPOINT_FILE_SIZE {
            return Err(ResumeError::StateTooLarge {
                size: metadata.len(),
                max: MAX_CHECKPOINT_FILE_SIZE,
            });
        }

        let contents =
            std::fs::read_to_string(path).map_err(|e| ResumeError::IoError(e.to_string()))?;
        let checkpoint: CursorCheckpoint = serde_json::from_str(&contents).map_err(|e| {
            warn!(error = %e, path = %path.display(), "Failed to deserialize cursor checkpoint");
            ResumeError::DeserializationError(e.to_string())
        })?;

        if checkpoint.schema_version != SCHEMA_VERSION {
            return Err(ResumeError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION.to_string(),
                found: checkpoint.schema_version,
            });
        }
        if checkpoint.resource != resource {
            return Err(ResumeError::ResourceMismatch {
                expected: resource.to_string(),
                found: checkpoint.resource.to_string(),
            });
        }

        info!(
            resource = %resource,
            records_written = checkpoint.records_written,
            "Resuming incremental export from checkpoint"
        );
        Ok(Some(checkpoint))
    }
}
