//! Per-ticket comment export
//!
//! Each ticket's comments are fetched page by page and accumulated, then
//! written as one record once the last page arrives. Error handling per
//! failed page:
//! - 5xx, network failure after client retries, undecodable body: retry the
//!   same page, skipping the ticket once the error budget is spent
//! - 404: the ticket was deleted upstream; logged and skipped
//! - 401/403, exhausted rate-limit budget, shutdown: fatal for the run
//! - anything else: governed by the [`FailurePolicy`]

use super::pagination::PaginatedCollector;
use super::{FetcherError, FetcherResult, ResourceEndpoint};
use crate::client::{ErrorClass, HttpError};
use crate::exporter::config::{calculate_backoff, FailurePolicy, MAX_COMMENT_PAGE_ERRORS};
use crate::output::{CommentsWriter, ErrorLog};
use crate::resume::CommentLedger;
use crate::shutdown::sleep_unless_shutdown;
use tracing::{debug, warn};

/// Result of exporting one ticket's comments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentOutcome {
    /// Record written
    Written {
        /// Comments in the record
        comments: usize,
        /// Pages fetched
        pages: usize,
    },
    /// Ticket already in the ledger, nothing fetched
    AlreadyExported,
    /// Ticket deleted upstream (404)
    Deleted,
    /// Ticket given up on and logged to the error log
    Skipped,
}

/// Exports ticket comments into the comments file
pub struct CommentExporter<'a> {
    collector: &'a PaginatedCollector,
    writer: &'a mut CommentsWriter,
    ledger: &'a mut CommentLedger,
    error_log: &'a ErrorLog,
    policy: FailurePolicy,
    max_page_errors: u32,
}

impl<'a> CommentExporter<'a> {
    /// Exporter appending to `writer` and consulting `ledger`
    pub fn new(
        collector: &'a PaginatedCollector,
        writer: &'a mut CommentsWriter,
        ledger: &'a mut CommentLedger,
        error_log: &'a ErrorLog,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            collector,
            writer,
            ledger,
            error_log,
            policy,
            max_page_errors: MAX_COMMENT_PAGE_ERRORS,
        }
    }

    /// Override the per-ticket error budget
    pub fn with_max_page_errors(mut self, max_page_errors: u32) -> Self {
        self.max_page_errors = max_page_errors;
        self
    }

    /// Export the comments of one ticket
    ///
    /// Returns an error only when the run must stop.
    pub async fn export_ticket(&mut self, ticket_id: u64) -> FetcherResult<CommentOutcome> {
        if self.ledger.already_exported(ticket_id) {
            debug!(ticket_id, "Comments already exported, skipping");
            return Ok(CommentOutcome::AlreadyExported);
        }

        let endpoint = ResourceEndpoint::ticket_comments(ticket_id);
        let mut request = self.collector.first_request(&endpoint, None)?;
        let mut accumulated = Vec::new();
        let mut pages = 0usize;
        let mut error_count = 0u32;

        loop {
            if pages >= self.collector.max_pages() {
                let err = FetcherError::PageLimitExceeded {
                    resource: endpoint.kind,
                    max_pages: self.collector.max_pages(),
                };
                return self.unclassified(ticket_id, err);
            }

            let err = match self.collector.fetch_page(&endpoint, &request, pages + 1).await {
                Ok(page) => {
                    pages += 1;
                    let next = self.collector.next_request(&endpoint, &page);
                    accumulated.extend(page.records);
                    match next {
                        Some(next) => {
                            request = next;
                            continue;
                        }
                        None => {
                            self.writer.append_ticket(ticket_id, &accumulated)?;
                            self.ledger.insert(ticket_id);
                            debug!(ticket_id, comments = accumulated.len(), pages, "Comments written");
                            return Ok(CommentOutcome::Written {
                                comments: accumulated.len(),
                                pages,
                            });
                        }
                    }
                }
                Err(err) => err,
            };

            match err.class() {
                ErrorClass::RateLimited | ErrorClass::Unauthorized | ErrorClass::Cancelled => {
                    return Err(err);
                }
                ErrorClass::ResourceGone => {
                    self.error_log
                        .record(&format!("Looks like ticket was removed, skipping it {ticket_id}"))?;
                    return Ok(CommentOutcome::Deleted);
                }
                ErrorClass::TransientServer => {
                    error_count += 1;
                    if error_count > self.max_page_errors {
                        self.error_log.record(&format!(
                            "Skipping ticket comments for ticket {ticket_id} because of too many errors ({error_count}): {err}"
                        ))?;
                        return Ok(CommentOutcome::Skipped);
                    }
                    let backoff = calculate_backoff(error_count - 1);
                    warn!(
                        ticket_id,
                        attempt = error_count,
                        max_errors = self.max_page_errors,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Transient error fetching comments, retrying page"
                    );
                    let shutdown = self.collector.client().shutdown();
                    if !sleep_unless_shutdown(backoff, shutdown).await {
                        return Err(FetcherError::Http(HttpError::Cancelled));
                    }
                }
                ErrorClass::Unclassified => return self.unclassified(ticket_id, err),
            }
        }
    }

    fn unclassified(&self, ticket_id: u64, err: FetcherError) -> FetcherResult<CommentOutcome> {
        match self.policy {
            FailurePolicy::FailFast => Err(err),
            FailurePolicy::BestEffort => {
                self.error_log
                    .record(&format!("Skipping ticket comments for ticket {ticket_id}: {err}"))?;
                Ok(CommentOutcome::Skipped)
            }
        }
    }
}
