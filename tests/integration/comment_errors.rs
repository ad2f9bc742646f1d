//! Per-ticket comment export under failing pages

use crate::common::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use zendesk_exporter::client::{ErrorClass, RateLimitedClient};
use zendesk_exporter::exporter::{FailurePolicy, RetryPolicy};
use zendesk_exporter::fetcher::{
    CommentExporter, CommentOutcome, FetcherResult, PaginatedCollector,
};
use zendesk_exporter::output::{CommentsWriter, ErrorLog};
use zendesk_exporter::resume::CommentLedger;

struct Harness {
    _temp: TempDir,
    collector: PaginatedCollector,
    writer: CommentsWriter,
    ledger: CommentLedger,
    error_log: ErrorLog,
    comments_path: std::path::PathBuf,
}

fn harness(fake: &Arc<FakeZendesk>) -> Harness {
    let temp = TempDir::new().unwrap();
    let comments_path = temp.path().join("comments.json");
    let client = RateLimitedClient::new(fake.clone(), RetryPolicy::default());
    Harness {
        collector: PaginatedCollector::new(client, credentials()),
        writer: CommentsWriter::open(&comments_path).unwrap(),
        ledger: CommentLedger::new(),
        error_log: ErrorLog::new(temp.path().join("errors.txt")),
        comments_path,
        _temp: temp,
    }
}

impl Harness {
    async fn export(
        &mut self,
        ticket_id: u64,
        policy: FailurePolicy,
        budget: u32,
    ) -> FetcherResult<CommentOutcome> {
        CommentExporter::new(
            &self.collector,
            &mut self.writer,
            &mut self.ledger,
            &self.error_log,
            policy,
        )
        .with_max_page_errors(budget)
        .export_ticket(ticket_id)
        .await
    }

    fn errors(&self) -> Vec<String> {
        if self.error_log.path().exists() {
            read_lines(self.error_log.path())
        } else {
            Vec::new()
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_server_error_retries_same_page() {
    let fake = FakeZendesk::new();
    fake.route(
        &api("tickets/5/comments"),
        ok(list_page(
            "comments",
            json!([{ "id": 1 }]),
            Some("https://acme.zendesk.com/api/v2/tickets/5/comments.json?page=2"),
        )),
    )
    .route(&api("tickets/5/comments.json"), status(502))
    .route(
        &api("tickets/5/comments.json"),
        ok(list_page("comments", json!([{ "id": 2 }]), None)),
    );
    let mut h = harness(&fake);

    let started = tokio::time::Instant::now();
    let outcome = h.export(5, FailurePolicy::BestEffort, 3).await.unwrap();

    assert_eq!(outcome, CommentOutcome::Written { comments: 2, pages: 2 });
    assert!(started.elapsed() >= Duration::from_secs(1));
    let retried = fake.calls_to(&api("tickets/5/comments.json"));
    assert_eq!(retried.len(), 2);
    assert_eq!(retried[0], retried[1]);
    // Only the failing page was requested again
    assert_eq!(fake.calls_to(&api("tickets/5/comments")).len(), 1);

    assert_eq!(
        read_lines(&h.comments_path),
        vec!["5", "[{\"id\":1},{\"id\":2}]"]
    );
    assert!(h.errors().is_empty());
    assert!(h.ledger.already_exported(5));
}

#[tokio::test(start_paused = true)]
async fn test_ticket_skipped_after_error_budget() {
    let fake = FakeZendesk::new();
    for _ in 0..3 {
        fake.route(&api("tickets/6/comments"), status(500));
    }
    let mut h = harness(&fake);

    let outcome = h.export(6, FailurePolicy::FailFast, 2).await.unwrap();

    assert_eq!(outcome, CommentOutcome::Skipped);
    assert_eq!(fake.calls().len(), 3);
    let errors = h.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Skipping ticket comments for ticket 6"), "{}", errors[0]);
    assert!(!h.comments_path.exists() || read_lines(&h.comments_path).is_empty());
    assert!(!h.ledger.already_exported(6));
}

#[tokio::test(start_paused = true)]
async fn test_unclassified_error_follows_policy() {
    let fake = FakeZendesk::new();
    fake.route(&api("tickets/8/comments"), status(422))
        .route(&api("tickets/8/comments"), status(422));
    let mut h = harness(&fake);

    let outcome = h.export(8, FailurePolicy::BestEffort, 3).await.unwrap();
    assert_eq!(outcome, CommentOutcome::Skipped);
    assert_eq!(h.errors().len(), 1);

    let err = h.export(8, FailurePolicy::FailFast, 3).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Unclassified);
    assert_eq!(h.errors().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_forbidden_is_fatal_under_any_policy() {
    let fake = FakeZendesk::new();
    fake.route(&api("tickets/9/comments"), status(403));
    let mut h = harness(&fake);

    let err = h.export(9, FailurePolicy::BestEffort, 3).await.unwrap_err();

    assert_eq!(err.class(), ErrorClass::Unauthorized);
    assert!(h.errors().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_ledgered_ticket_is_not_fetched() {
    let fake = FakeZendesk::new();
    let mut h = harness(&fake);
    h.ledger.insert(10);

    let outcome = h.export(10, FailurePolicy::BestEffort, 3).await.unwrap();

    assert_eq!(outcome, CommentOutcome::AlreadyExported);
    assert!(fake.calls().is_empty());
}
