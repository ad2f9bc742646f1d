//! Attachment downloads driven by the comments file
//!
//! The comments file is streamed one ticket at a time. Every attachment whose
//! target file is missing is downloaded through the rate-limited client and
//! written atomically, so a file on disk is always complete. Failed downloads
//! are logged and retried on the next run.

use super::{FetcherError, FetcherResult};
use crate::client::{HttpError, RateLimitedClient};
use crate::output::{CommentPairs, ErrorLog, ExportLayout, OutputError};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// Attachment reference inside a comment
#[derive(Debug, Clone, Deserialize)]
struct AttachmentRef {
    id: u64,
    #[serde(default)]
    file_name: String,
    content_url: String,
}

/// Outcome of an attachment pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentReport {
    /// Tickets whose comments were scanned
    pub ticket_ids: BTreeSet<u64>,
    /// Files downloaded in this run
    pub downloaded: u64,
    /// Files already on disk
    pub already_present: u64,
    /// Downloads that failed and were logged
    pub failed: u64,
    /// Comment records that could not be parsed
    pub malformed_records: u64,
}

/// Downloads attachments referenced in the comments file
pub struct AttachmentFetcher<'a> {
    client: &'a RateLimitedClient,
    layout: &'a ExportLayout,
    error_log: &'a ErrorLog,
}

impl<'a> AttachmentFetcher<'a> {
    /// Fetcher writing below `layout`'s attachment directory
    pub fn new(client: &'a RateLimitedClient, layout: &'a ExportLayout, error_log: &'a ErrorLog) -> Self {
        Self {
            client,
            layout,
            error_log,
        }
    }

    /// Download every missing attachment referenced in `comments_file`
    ///
    /// Only shutdown and local file errors stop the pass.
    pub async fn fetch_all(&self, comments_file: &Path) -> FetcherResult<AttachmentReport> {
        let mut report = AttachmentReport::default();

        let Some(pairs) = CommentPairs::open(comments_file)? else {
            info!(path = %comments_file.display(), "No comments file, no attachments to fetch");
            return Ok(report);
        };

        for record in pairs {
            let record = match record {
                Ok(record) => record,
                Err(OutputError::MalformedLine { path, line, message }) => {
                    warn!(path = %path, line, error = %message, "Skipping malformed comments record");
                    report.malformed_records += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            report.ticket_ids.insert(record.ticket_id);

            for comment in &record.comments {
                for attachment in attachments_of(comment) {
                    self.fetch_one(record.ticket_id, attachment, &mut report).await?;
                }
            }
        }

        Ok(report)
    }

    async fn fetch_one(
        &self,
        ticket_id: u64,
        attachment: &Value,
        report: &mut AttachmentReport,
    ) -> FetcherResult<()> {
        let attachment: AttachmentRef = match serde_json::from_value(attachment.clone()) {
            Ok(attachment) => attachment,
            Err(e) => {
                let id = attachment.get("id").map(Value::to_string).unwrap_or_else(|| "-".to_string());
                self.error_log
                    .record(&format!("Skipping attachment id {id} Error: ERR_INVALID_ATTACHMENT {e}"))?;
                report.failed += 1;
                return Ok(());
            }
        };

        let target = self.layout.attachment(attachment.id, &attachment.file_name);
        if target.exists() {
            report.already_present += 1;
            return Ok(());
        }

        let url = match Url::parse(&attachment.content_url) {
            Ok(url) => url,
            Err(e) => {
                self.error_log.record(&format!(
                    "Skipping attachment id {} Error: ERR_INVALID_URL {e}",
                    attachment.id
                ))?;
                report.failed += 1;
                return Ok(());
            }
        };

        debug!(ticket_id, attachment_id = attachment.id, url = %url, "Downloading attachment");
        match self.client.get_bytes(url).await {
            Ok(bytes) => {
                write_atomically(&target, &bytes)?;
                report.downloaded += 1;
                debug!(
                    attachment_id = attachment.id,
                    bytes = bytes.len(),
                    path = %target.display(),
                    "Attachment saved"
                );
            }
            Err(HttpError::Cancelled) => return Err(FetcherError::Http(HttpError::Cancelled)),
            Err(e) => {
                let status = e
                    .status()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string());
                self.error_log.record(&format!(
                    "Skipping attachment id {} Error: {} {}",
                    attachment.id,
                    e.code(),
                    status
                ))?;
                report.failed += 1;
            }
        }
        Ok(())
    }
}

/// Attachments of a comment; a missing or non-list field means none
fn attachments_of(comment: &Value) -> &[Value] {
    comment
        .get("attachments")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn write_atomically(target: &Path, bytes: &[u8]) -> Result<(), OutputError> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| OutputError::io(dir, e))?;

    let mut temp_file = tempfile::NamedTempFile::new_in(dir).map_err(|e| OutputError::io(dir, e))?;
    temp_file
        .write_all(bytes)
        .and_then(|_| temp_file.flush())
        .map_err(|e| OutputError::io(target, e))?;
    temp_file
        .persist(target)
        .map_err(|e| OutputError::io(target, e.error))?;
    Ok(())
}
