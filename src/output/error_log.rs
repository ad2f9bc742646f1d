//! Append-only log of skipped items (`errors.txt`)

use super::{OutputError, OutputResult};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Human-readable record of every item the export gave up on
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    /// Log writing to `path`; the file is created on the first entry
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the log
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line
    pub fn record(&self, message: &str) -> OutputResult<()> {
        warn!(error_log = %self.path.display(), "{message}");

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| OutputError::io(&self.path, e))?;

        let line = format!("{}\n", message.replace('\n', " "));
        file.write_all(line.as_bytes())
            .map_err(|e| OutputError::io(&self.path, e))
    }
}
