//! Export orchestrator: runs every stage in order and reports on each

use super::config::{ExportOptions, FailurePolicy};
use super::progress::ProgressState;
use super::stage::{ExportSummary, Stage, StageReport, StageStatus};
use super::ExportError;
use crate::client::{HttpError, RateLimitedClient, ReqwestTransport, Transport};
use crate::config::ApiCredentials;
use crate::fetcher::{
    AttachmentFetcher, CommentExporter, CommentOutcome, PageCursor, PageStyle, PaginatedCollector,
    ResourceEndpoint,
};
use crate::output::{
    write_snapshot, CommentsWriter, ErrorLog, ExportLayout, JsonLinesReader, JsonLinesWriter,
    OutputError,
};
use crate::resume::{CommentLedger, CursorCheckpoint, ExportLock};
use crate::shutdown::SharedShutdown;
use crate::ResourceKind;
use futures_util::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Runs an export of one account into one directory
pub struct ExportOrchestrator {
    collector: PaginatedCollector,
    layout: ExportLayout,
    error_log: ErrorLog,
    options: ExportOptions,
}

impl ExportOrchestrator {
    /// Orchestrator talking to the live API
    pub fn connect(credentials: ApiCredentials, options: ExportOptions) -> Result<Self, ExportError> {
        let transport =
            ReqwestTransport::new(&credentials, options.request_timeout, options.connect_timeout)?;
        Ok(Self::with_transport(credentials, Arc::new(transport), options))
    }

    /// Orchestrator over any [`Transport`]
    pub fn with_transport(
        credentials: ApiCredentials,
        transport: Arc<dyn Transport>,
        options: ExportOptions,
    ) -> Self {
        let client = RateLimitedClient::new(transport, options.retry);
        let layout = ExportLayout::new(options.export_dir.clone());
        let error_log = ErrorLog::new(layout.errors());
        Self {
            collector: PaginatedCollector::new(client, credentials),
            layout,
            error_log,
            options,
        }
    }

    /// Attach a shared shutdown handle for graceful cancellation
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.collector = self.collector.with_shutdown(shutdown);
        self
    }

    /// Override the page cap of every paginated request
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.collector = self.collector.with_max_pages(max_pages);
        self
    }

    /// Export directory layout
    pub fn layout(&self) -> &ExportLayout {
        &self.layout
    }

    /// Run every stage in order
    ///
    /// The summary is written to `summary.json` whether or not the run completes.
    pub async fn run(&self) -> Result<ExportSummary, ExportError> {
        self.layout.ensure_dirs()?;
        let mut lock = ExportLock::open(&self.layout.lock())?;
        let _guard = lock.try_hold()?;

        let mut summary = ExportSummary::new(self.layout.root(), self.options.failure_policy);
        info!(
            export_dir = %self.layout.root().display(),
            failure_policy = %self.options.failure_policy,
            "Starting export"
        );

        for stage in Stage::ALL {
            if self.shutdown_requested() {
                let err = ExportError::Http(HttpError::Cancelled);
                return Err(self.abort(&mut summary, stage, err));
            }

            info!(stage = %stage, "Exporting {}...", stage.label());
            let started = Instant::now();

            match self.run_stage(stage).await {
                Ok(mut report) => {
                    report.duration_ms = started.elapsed().as_millis() as u64;
                    info!(
                        stage = %stage,
                        records_written = report.records_written,
                        items_skipped = report.items_skipped,
                        items_already_present = report.items_already_present,
                        duration_ms = report.duration_ms,
                        "Stage completed"
                    );
                    summary.push(report);
                }
                Err(err) if self.may_skip(stage, &err) => {
                    warn!(stage = %stage, error = %err, "Stage failed, continuing with next stage");
                    self.error_log
                        .record(&format!("Skipping {} export Error: {err}", stage.label()))?;
                    let mut report =
                        StageReport::failed(stage, StageStatus::Skipped, err.to_string());
                    report.duration_ms = started.elapsed().as_millis() as u64;
                    summary.push(report);
                }
                Err(err) => return Err(self.abort(&mut summary, stage, err)),
            }
        }

        summary.finish(true);
        summary.save(&self.layout.summary())?;
        info!(
            total_records = summary.total_records(),
            total_skipped = summary.total_skipped(),
            failed_stages = ?summary.failed_stages(),
            "Finished"
        );
        Ok(summary)
    }

    async fn run_stage(&self, stage: Stage) -> Result<StageReport, ExportError> {
        match stage {
            Stage::Tickets => self.export_incremental(stage, &ResourceEndpoint::TICKETS).await,
            Stage::Users => self.export_incremental(stage, &ResourceEndpoint::USERS).await,
            Stage::Comments => self.export_comments().await,
            Stage::Attachments => self.export_attachments().await,
            Stage::Views => self.export_snapshot(stage, &ResourceEndpoint::VIEWS).await,
            Stage::Triggers => self.export_snapshot(stage, &ResourceEndpoint::TRIGGERS).await,
            Stage::Macros => self.export_snapshot(stage, &ResourceEndpoint::MACROS).await,
            Stage::Automations => {
                self.export_snapshot(stage, &ResourceEndpoint::AUTOMATIONS)
                    .await
            }
            Stage::Settings => self.export_snapshot(stage, &ResourceEndpoint::SETTINGS).await,
            Stage::RecipientAddresses => {
                self.export_snapshot(stage, &ResourceEndpoint::RECIPIENT_ADDRESSES)
                    .await
            }
        }
    }

    /// Cursor-paginated export appended to the resource file, checkpointed per page
    async fn export_incremental(
        &self,
        stage: Stage,
        endpoint: &ResourceEndpoint,
    ) -> Result<StageReport, ExportError> {
        let kind = endpoint.kind;
        let checkpoint_path = self.layout.checkpoint(kind);
        let mut checkpoint = CursorCheckpoint::load(&checkpoint_path, kind)?;
        let resume = checkpoint
            .as_ref()
            .map(|c| PageCursor::Cursor(c.after_cursor().to_string()));

        let mut writer = JsonLinesWriter::open(self.layout.resource(kind))?;
        let mut pages = self.collector.collect(endpoint.clone(), resume);
        let mut progress = ProgressState::new(None, kind.response_field());
        let mut report = StageReport::new(stage);

        while let Some(page) = pages.next().await {
            let page = page?;
            let written = writer.append_page(&page.records)? as u64;
            report.records_written += written;

            if let Some(PageCursor::Cursor(after_cursor)) = &page.after {
                let current = checkpoint.get_or_insert_with(|| CursorCheckpoint::new(kind, ""));
                current.advance(after_cursor.clone(), written);
                current.save(&checkpoint_path)?;
            }

            progress.update(written);
            if progress.should_emit_update() {
                info!(stage = %stage, page = page.number, "{}", progress.format_progress());
                progress.mark_emitted();
            }
        }

        Ok(report.completed())
    }

    /// Comments of every ticket in `tickets.json` not yet in the comments file
    async fn export_comments(&self) -> Result<StageReport, ExportError> {
        let mut report = StageReport::new(Stage::Comments);
        let tickets_file = self.layout.resource(ResourceKind::Tickets);
        let comments_file = self.layout.resource(ResourceKind::Comments);

        let total = count_lines(&tickets_file)?;
        let Some(tickets) = JsonLinesReader::open(&tickets_file)? else {
            info!("No tickets exported, nothing to fetch comments for");
            return Ok(report.completed());
        };

        let mut ledger = CommentLedger::load(&comments_file)?;
        let mut writer = CommentsWriter::open(&comments_file)?;
        let mut exporter = CommentExporter::new(
            &self.collector,
            &mut writer,
            &mut ledger,
            &self.error_log,
            self.options.failure_policy,
        );
        let mut progress = ProgressState::new(Some(total), "tickets");

        for ticket in tickets {
            progress.update(1);
            let ticket_id = match ticket {
                Ok(ticket) => ticket.get("id").and_then(Value::as_u64),
                Err(OutputError::MalformedLine { line, message, .. }) => {
                    warn!(line, error = %message, "Skipping malformed ticket line");
                    None
                }
                Err(e) => return Err(e.into()),
            };
            let Some(ticket_id) = ticket_id else {
                report.items_skipped += 1;
                continue;
            };

            match exporter.export_ticket(ticket_id).await? {
                CommentOutcome::Written { .. } => report.records_written += 1,
                CommentOutcome::AlreadyExported => report.items_already_present += 1,
                CommentOutcome::Deleted | CommentOutcome::Skipped => report.items_skipped += 1,
            }

            if progress.should_emit_update() {
                info!(stage = %Stage::Comments, "{}", progress.format_progress());
                progress.mark_emitted();
            }
        }

        Ok(report.completed())
    }

    async fn export_attachments(&self) -> Result<StageReport, ExportError> {
        let fetcher = AttachmentFetcher::new(self.collector.client(), &self.layout, &self.error_log);
        let outcome = fetcher
            .fetch_all(&self.layout.resource(ResourceKind::Comments))
            .await?;

        info!(
            tickets = outcome.ticket_ids.len(),
            downloaded = outcome.downloaded,
            already_present = outcome.already_present,
            failed = outcome.failed,
            "Attachments processed"
        );

        let mut report = StageReport::new(Stage::Attachments);
        report.records_written = outcome.downloaded;
        report.items_already_present = outcome.already_present;
        report.items_skipped = outcome.failed + outcome.malformed_records;
        Ok(report.completed())
    }

    /// Fetch every page, then replace the resource file in one write
    async fn export_snapshot(
        &self,
        stage: Stage,
        endpoint: &ResourceEndpoint,
    ) -> Result<StageReport, ExportError> {
        let mut pages = self.collector.collect(endpoint.clone(), None);
        let mut items = Vec::new();
        while let Some(page) = pages.next().await {
            items.extend(page?.records);
        }

        let mut report = StageReport::new(stage);
        report.records_written = items.len() as u64;
        let snapshot = match endpoint.style {
            PageStyle::Single => items.into_iter().next().unwrap_or(Value::Null),
            PageStyle::Cursor | PageStyle::NextPage => Value::Array(items),
        };
        write_snapshot(self.layout.resource(endpoint.kind), &snapshot)?;
        Ok(report.completed())
    }

    fn may_skip(&self, stage: Stage, err: &ExportError) -> bool {
        stage.is_snapshot()
            && self.options.failure_policy == FailurePolicy::BestEffort
            && !err.is_always_fatal()
    }

    /// Record the failing stage, save the summary and wrap the error
    fn abort(&self, summary: &mut ExportSummary, stage: Stage, err: ExportError) -> ExportError {
        let status = if err.is_cancelled() {
            StageStatus::Cancelled
        } else {
            StageStatus::Failed
        };
        error!(stage = %stage, error = %err, "Export stopped");
        summary.push(StageReport::failed(stage, status, err.to_string()));
        summary.finish(false);
        if let Err(save_err) = summary.save(&self.layout.summary()) {
            warn!(error = %save_err, "Failed to write run summary");
        }
        ExportError::StageFailed {
            stage,
            source: Box::new(err),
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.collector
            .client()
            .shutdown()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }
}

fn count_lines(path: &std::path::Path) -> Result<u64, OutputError> {
    use std::io::BufRead;

    if !path.exists() {
        return Ok(0);
    }
    let file = std::fs::File::open(path).map_err(|e| OutputError::io(path, e))?;
    let mut count = 0;
    for line in std::io::BufReader::new(file).lines() {
        if !line.map_err(|e| OutputError::io(path, e))?.trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}
