//! Export directory layout
//!
//! ```text
//! exported/
//!   tickets.json  comments.json  users.json          append-only
//!   views.json ... recipient_addresses.json          rewritten each run
//!   errors.txt  summary.json
//!   .resume/<resource>.json                          cursor checkpoints
//!   .export.lock
//!   attachments/<id><.ext>
//! ```

use super::{OutputError, OutputResult};
use crate::ResourceKind;
use std::path::{Path, PathBuf};
use tracing::info;

/// Paths of every file produced by an export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportLayout {
    root: PathBuf,
}

impl ExportLayout {
    /// Layout rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Export root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Output file for a resource
    pub fn resource(&self, kind: ResourceKind) -> PathBuf {
        self.root.join(kind.file_name())
    }

    /// Append-only error log
    pub fn errors(&self) -> PathBuf {
        self.root.join("errors.txt")
    }

    /// Run summary written at the end of every run
    pub fn summary(&self) -> PathBuf {
        self.root.join("summary.json")
    }

    /// Directory holding downloaded attachments
    pub fn attachments_dir(&self) -> PathBuf {
        self.root.join("attachments")
    }

    /// Target path of one attachment
    pub fn attachment(&self, attachment_id: u64, original_name: &str) -> PathBuf {
        self.attachments_dir()
            .join(attachment_file_name(attachment_id, original_name))
    }

    /// Directory holding cursor checkpoints
    pub fn resume_dir(&self) -> PathBuf {
        self.root.join(".resume")
    }

    /// Cursor checkpoint of an incremental resource
    pub fn checkpoint(&self, kind: ResourceKind) -> PathBuf {
        self.resume_dir().join(kind.file_name())
    }

    /// Advisory lock file guarding the whole directory
    pub fn lock(&self) -> PathBuf {
        self.root.join(".export.lock")
    }

    /// Create the root and attachment directories if absent
    pub fn ensure_dirs(&self) -> OutputResult<()> {
        for dir in [self.root.clone(), self.attachments_dir()] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir).map_err(|e| OutputError::io(&dir, e))?;
                info!(path = %dir.display(), "Created directory");
            }
        }
        Ok(())
    }
}

/// `<id><.ext>`, where `.ext` is the original file name's extension
pub fn attachment_file_name(attachment_id: u64, original_name: &str) -> String {
    match Path::new(original_name).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{attachment_id}.{ext}"),
        _ => attachment_id.to_string(),
    }
}
