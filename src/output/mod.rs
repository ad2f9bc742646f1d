//! Export output files
//!
//! - [`path::ExportLayout`] - where every file of an export lives
//! - [`jsonl`] - append-only JSON-lines writers, the comments pair format and
//!   atomically replaced snapshot files
//! - [`error_log::ErrorLog`] - append-only log of skipped items

pub mod error_log;
pub mod jsonl;
pub mod path;

pub use error_log::ErrorLog;
pub use jsonl::{
    write_snapshot, CommentPairs, CommentRecord, CommentsWriter, JsonLinesReader, JsonLinesWriter,
};
pub use path::{attachment_file_name, ExportLayout};

/// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error on {path}: {message}")]
    IoError {
        /// File involved
        path: String,
        /// Underlying error
        message: String,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// A stored line could not be parsed
    #[error("malformed line {line} in {path}: {message}")]
    MalformedLine {
        /// File involved
        path: String,
        /// 1-based line number
        line: usize,
        /// Parser message
        message: String,
    },
}

impl OutputError {
    pub(crate) fn io(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        OutputError::IoError {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
