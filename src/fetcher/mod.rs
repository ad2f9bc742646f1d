//! Paginated fetchers
//!
//! Every exported resource is described by one [`ResourceEndpoint`] entry and
//! fetched through the generic [`pagination::PaginatedCollector`]. Per-ticket
//! comments and attachments have their own drivers on top of it.

use crate::client::{ErrorClass, HttpError};
use crate::config::ConfigError;
use crate::output::OutputError;
use crate::{ExportRecord, ResourceKind};
use futures_util::Stream;
use reqwest::Url;
use std::borrow::Cow;
use std::pin::Pin;

pub mod attachments;
pub mod comments;
pub mod pagination;

pub use attachments::{AttachmentFetcher, AttachmentReport};
pub use comments::{CommentExporter, CommentOutcome};
pub use pagination::PaginatedCollector;

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// HTTP request failed
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Endpoint URL could not be built
    #[error("endpoint error: {0}")]
    Endpoint(#[from] ConfigError),

    /// Output file could not be read or written
    #[error(transparent)]
    Output(#[from] OutputError),

    /// The server never signalled the last page
    #[error("pagination for {resource} exceeded {max_pages} pages")]
    PageLimitExceeded {
        /// Resource being paginated
        resource: ResourceKind,
        /// Page cap in effect
        max_pages: usize,
    },
}

impl FetcherError {
    /// Classification used for retry/skip/abort decisions
    pub fn class(&self) -> ErrorClass {
        match self {
            FetcherError::Http(e) => e.class(),
            _ => ErrorClass::Unclassified,
        }
    }
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Lazy sequence of pages
pub type PageStream = Pin<Box<dyn Stream<Item = FetcherResult<Page>> + Send>>;

/// Pagination convention of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStyle {
    /// `cursor` / `after_cursor`, ends on `end_of_stream`
    Cursor,
    /// `next_page` URL, ends when it is null or absent
    NextPage,
    /// One object, no pagination
    Single,
}

/// Position in a paginated listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// Opaque cursor of the incremental export
    Cursor(String),
    /// Full URL of the next page
    NextPage(Url),
}

/// One page of records
#[derive(Debug, Clone)]
pub struct Page {
    /// 1-based page number within this run
    pub number: usize,
    /// Records in API order
    pub records: Vec<ExportRecord>,
    /// Position after this page, when the API supplied one
    pub after: Option<PageCursor>,
    /// Whether the API signalled that nothing follows
    pub is_last: bool,
}

/// How to fetch one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEndpoint {
    /// Resource fetched
    pub kind: ResourceKind,
    /// Path relative to the API base URL
    pub path: Cow<'static, str>,
    /// Pagination convention
    pub style: PageStyle,
    /// Query parameters of the first request
    pub params: &'static [(&'static str, &'static str)],
}

impl ResourceEndpoint {
    /// Incremental ticket export
    pub const TICKETS: ResourceEndpoint = ResourceEndpoint::fixed(
        ResourceKind::Tickets,
        "incremental/tickets/cursor",
        PageStyle::Cursor,
    );

    /// Incremental user export
    pub const USERS: ResourceEndpoint = ResourceEndpoint::fixed(
        ResourceKind::Users,
        "incremental/users/cursor",
        PageStyle::Cursor,
    );

    /// Views
    pub const VIEWS: ResourceEndpoint =
        ResourceEndpoint::fixed(ResourceKind::Views, "views", PageStyle::NextPage);

    /// Triggers
    pub const TRIGGERS: ResourceEndpoint =
        ResourceEndpoint::fixed(ResourceKind::Triggers, "triggers", PageStyle::NextPage);

    /// Macros
    pub const MACROS: ResourceEndpoint =
        ResourceEndpoint::fixed(ResourceKind::Macros, "macros", PageStyle::NextPage);

    /// Automations
    pub const AUTOMATIONS: ResourceEndpoint =
        ResourceEndpoint::fixed(ResourceKind::Automations, "automations", PageStyle::NextPage);

    /// Account settings, a single object
    pub const SETTINGS: ResourceEndpoint = ResourceEndpoint::fixed(
        ResourceKind::Settings,
        "account/settings.json",
        PageStyle::Single,
    );

    /// Support addresses
    pub const RECIPIENT_ADDRESSES: ResourceEndpoint = ResourceEndpoint::fixed(
        ResourceKind::RecipientAddresses,
        "recipient_addresses",
        PageStyle::NextPage,
    );

    /// Snapshot resources in export order
    pub const SNAPSHOTS: [ResourceEndpoint; 6] = [
        Self::VIEWS,
        Self::TRIGGERS,
        Self::MACROS,
        Self::AUTOMATIONS,
        Self::SETTINGS,
        Self::RECIPIENT_ADDRESSES,
    ];

    const fn fixed(kind: ResourceKind, path: &'static str, style: PageStyle) -> Self {
        Self {
            kind,
            path: Cow::Borrowed(path),
            style,
            params: &[],
        }
    }

    /// Comments of one ticket
    pub fn ticket_comments(ticket_id: u64) -> Self {
        Self {
            kind: ResourceKind::Comments,
            path: Cow::Owned(format!("tickets/{ticket_id}/comments")),
            style: PageStyle::NextPage,
            params: &[("include_inline_images", "true")],
        }
    }

    /// Field of the response holding the records
    pub fn response_field(&self) -> &'static str {
        self.kind.response_field()
    }
}
