//! Ledger of tickets whose comments are already exported
//!
//! Derived from the comments file on startup: the line at every even 0-based
//! position holds a ticket id, the following line its comments. Only complete
//! pairs count, so an id line left behind by an interrupted write is fetched
//! again.

use super::ResumeError;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// Set of ticket ids present in the comments file
#[derive(Debug, Clone, Default)]
pub struct CommentLedger {
    ticket_ids: HashSet<u64>,
}

impl CommentLedger {
    /// Empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan the comments file; a missing file yields an empty ledger
    pub fn load(comments_file: &Path) -> Result<Self, ResumeError> {
        if !comments_file.exists() {
            info!(path = %comments_file.display(), "No comments file yet, starting with empty ledger");
            return Ok(Self::new());
        }

        let file = File::open(comments_file).map_err(|e| ResumeError::IoError(e.to_string()))?;
        let reader = BufReader::new(file);

        let mut ticket_ids = HashSet::new();
        let mut pending: Option<u64> = None;
        let mut unparseable = 0usize;

        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| ResumeError::IoError(e.to_string()))?;
            if index % 2 == 0 {
                pending = match line.trim().parse::<u64>() {
                    Ok(id) => Some(id),
                    Err(_) => {
                        unparseable += 1;
                        None
                    }
                };
            } else if let Some(id) = pending.take() {
                ticket_ids.insert(id);
            }
        }

        if pending.is_some() {
            warn!(
                path = %comments_file.display(),
                "Comments file ends with an unpaired ticket id, it will be fetched again"
            );
        }
        if unparseable > 0 {
            warn!(
                path = %comments_file.display(),
                unparseable,
                "Ignored id lines that are not integers"
            );
        }

        info!(
            path = %comments_file.display(),
            tickets = ticket_ids.len(),
            "Loaded comment ledger"
        );
        Ok(Self { ticket_ids })
    }

    /// Whether the ticket's comments are already on disk
    pub fn already_exported(&self, ticket_id: u64) -> bool {
        self.ticket_ids.contains(&ticket_id)
    }

    /// Record a ticket written during this run
    pub fn insert(&mut self, ticket_id: u64) -> bool {
        self.ticket_ids.insert(ticket_id)
    }

    /// Number of ledgered tickets
    pub fn len(&self) -> usize {
        self.ticket_ids.len()
    }

    /// Whether the ledger is empty
    pub fn is_empty(&self) -> bool {
        self.ticket_ids.is_empty()
    }
}
