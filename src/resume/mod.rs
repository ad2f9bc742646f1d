//! Resume capability for re-runs
//!
//! Three pieces of persistent state make a re-run pick up where the last one
//! stopped:
//! - [`ledger::CommentLedger`] - ticket ids already present in the comments file
//! - [`checkpoint::CursorCheckpoint`] - last persisted `after_cursor` of an
//!   incremental resource
//! - [`lock::ExportLock`] - advisory lock keeping a second process out of the
//!   same export directory

pub mod checkpoint;
pub mod ledger;
pub mod lock;

pub use checkpoint::CursorCheckpoint;
pub use ledger::CommentLedger;
pub use lock::ExportLock;

/// Errors related to resume state
#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    /// Schema version mismatch
    #[error("schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected schema version
        expected: String,
        /// Found schema version
        found: String,
    },

    /// Checkpoint belongs to another resource
    #[error("checkpoint resource mismatch: expected {expected}, found {found}")]
    ResourceMismatch {
        /// Resource the caller asked for
        expected: String,
        /// Resource recorded in the file
        found: String,
    },

    /// State file too large
    #[error("state file too large: {size} bytes (max: {max} bytes)")]
    StateTooLarge {
        /// Actual file size
        size: u64,
        /// Maximum allowed size
        max: u64,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    DeserializationError(String),

    /// Another process holds the export directory
    #[error("export directory is locked by another process ({path}): {message}")]
    Locked {
        /// Lock file
        path: String,
        /// OS message
        message: String,
    },
}
