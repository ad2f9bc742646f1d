//! # Zendesk Exporter Library
//!
//! Exports a single Zendesk support account to local files: tickets, ticket
//! comments, users, views, triggers, macros, automations, account settings,
//! support addresses and comment attachments.
//!
//! ## Features
//!
//! - **One Generic Collector**: cursor-style and next-page-style pagination share
//!   a single lazy page stream ([`fetcher::pagination`])
//! - **Rate Limiting**: HTTP 429 responses are retried after the server-advertised
//!   `retry-after` delay, with a bounded retry budget
//! - **Resume Capability**: comments are resumed from the comments file itself,
//!   incremental resources from a cursor checkpoint
//! - **Idempotent Attachments**: a file already on disk is never downloaded twice
//!
//! ## Quick Start
//!
//! ```no_run
//! use zendesk_exporter::config::ApiCredentials;
//! use zendesk_exporter::exporter::{ExportOptions, ExportOrchestrator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let credentials = ApiCredentials::from_env()?;
//! let orchestrator = ExportOrchestrator::connect(credentials, ExportOptions::default())?;
//! let summary = orchestrator.run().await?;
//! println!("{} records written", summary.total_records());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`client`] - Rate-limited HTTP client over a pluggable [`client::Transport`]
//! - [`fetcher`] - Pagination, per-ticket comment fetch and attachment downloads
//! - [`resume`] - Comment ledger, cursor checkpoints and the export directory lock
//! - [`output`] - Append-only JSON-lines files, snapshot files and the error log
//! - [`exporter`] - Stage sequencing, failure policy and the run summary

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// CLI command implementations
pub mod cli;

/// Rate-limited HTTP client
pub mod client;

/// Credentials and environment loading
pub mod config;

/// Export orchestration
pub mod exporter;

/// Paginated fetchers
pub mod fetcher;

/// Output files
pub mod output;

/// Resume capability for re-runs
pub mod resume;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

pub use config::ApiCredentials;

/// A single domain object exactly as returned by the API
pub type ExportRecord = Value;

/// Name of the self-referential API URL field stripped before persisting
pub const SELF_URL_FIELD: &str = "url";

/// Remove the self-referential `url` field from a top-level record.
///
/// The remaining fields keep their API order. Non-object values are left
/// untouched.
pub fn strip_self_url(record: &mut ExportRecord) {
    if let Value::Object(map) = record {
        map.shift_remove(SELF_URL_FIELD);
    }
}

/// Resources exported from a Zendesk account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Tickets (incremental cursor export)
    Tickets,
    /// Ticket comments (one record per ticket)
    Comments,
    /// Users (incremental cursor export)
    Users,
    /// Views
    Views,
    /// Triggers
    Triggers,
    /// Macros
    Macros,
    /// Automations
    Automations,
    /// Account settings
    Settings,
    /// Support (recipient) addresses
    RecipientAddresses,
}

impl ResourceKind {
    /// Field of the API response holding this resource's records
    pub fn response_field(&self) -> &'static str {
        match self {
            ResourceKind::Tickets => "tickets",
            ResourceKind::Comments => "comments",
            ResourceKind::Users => "users",
            ResourceKind::Views => "views",
            ResourceKind::Triggers => "triggers",
            ResourceKind::Macros => "macros",
            ResourceKind::Automations => "automations",
            ResourceKind::Settings => "settings",
            ResourceKind::RecipientAddresses => "recipient_addresses",
        }
    }

    /// File name of this resource inside the export directory
    pub fn file_name(&self) -> &'static str {
        match self {
            ResourceKind::Tickets => "tickets.json",
            ResourceKind::Comments => "comments.json",
            ResourceKind::Users => "users.json",
            ResourceKind::Views => "views.json",
            ResourceKind::Triggers => "triggers.json",
            ResourceKind::Macros => "macros.json",
            ResourceKind::Automations => "automations.json",
            ResourceKind::Settings => "settings.json",
            ResourceKind::RecipientAddresses => "recipient_addresses.json",
        }
    }

    /// Whether the resource file is rewritten in full on every run
    pub fn is_snapshot(&self) -> bool {
        !matches!(
            self,
            ResourceKind::Tickets | ResourceKind::Comments | ResourceKind::Users
        )
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceKind::Tickets => "tickets",
            ResourceKind::Comments => "comments",
            ResourceKind::Users => "users",
            ResourceKind::Views => "views",
            ResourceKind::Triggers => "triggers",
            ResourceKind::Macros => "macros",
            ResourceKind::Automations => "automations",
            ResourceKind::Settings => "settings",
            ResourceKind::RecipientAddresses => "recipient_addresses",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tickets" => Ok(ResourceKind::Tickets),
            "comments" => Ok(ResourceKind::Comments),
            "users" => Ok(ResourceKind::Users),
            "views" => Ok(ResourceKind::Views),
            "triggers" => Ok(ResourceKind::Triggers),
            "macros" => Ok(ResourceKind::Macros),
            "automations" => Ok(ResourceKind::Automations),
            "settings" => Ok(ResourceKind::Settings),
            "recipient_addresses" => Ok(ResourceKind::RecipientAddresses),
            _ => Err(format!("Invalid resource: {s}")),
        }
    }
}
