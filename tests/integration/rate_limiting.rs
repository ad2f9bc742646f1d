//! Integration tests for rate limiting and network retries

use crate::common::*;
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;
use zendesk_exporter::client::{ErrorClass, RateLimitedClient, RequestSpec};
use zendesk_exporter::exporter::{ExportOrchestrator, RetryPolicy, Stage};
use zendesk_exporter::output::ExportLayout;
use zendesk_exporter::ResourceKind;

#[tokio::test(start_paused = true)]
async fn test_rate_limited_snapshot_waits_and_repeats_request() {
    let temp = TempDir::new().unwrap();
    let fake = FakeZendesk::new();
    script_empty_incrementals(&fake);
    fake.route(&api("views"), rate_limited("3"));
    script_snapshots(&fake);

    let started = tokio::time::Instant::now();
    let summary =
        ExportOrchestrator::with_transport(credentials(), fake.clone(), options(temp.path()))
            .run()
            .await
            .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(4));
    let views = fake.calls_to(&api("views"));
    assert_eq!(views.len(), 2);
    assert_eq!(views[0], views[1]);
    assert_eq!(summary.stage(Stage::Views).unwrap().records_written, 1);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_rate_limit_stops_run_even_under_best_effort() {
    let temp = TempDir::new().unwrap();
    let fake = FakeZendesk::new();
    script_empty_incrementals(&fake);
    for _ in 0..4 {
        fake.route(&api("views"), rate_limited("1"));
    }
    script_snapshots(&fake);

    let err = ExportOrchestrator::with_transport(credentials(), fake.clone(), options(temp.path()))
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::RateLimited);
    // 1 attempt + 3 retries, then nothing further
    assert_eq!(fake.calls_to(&api("views")).len(), 4);
    assert!(fake.calls_to(&api("triggers")).is_empty());
    assert!(!ExportLayout::new(temp.path())
        .resource(ResourceKind::Views)
        .exists());
}

#[tokio::test(start_paused = true)]
async fn test_network_failure_is_retried_with_backoff() {
    let fake = FakeZendesk::new();
    fake.route(&api("macros"), connection_reset())
        .route(&api("macros"), ok(json!({ "macros": [] })));
    let client = RateLimitedClient::new(
        fake.clone(),
        RetryPolicy {
            max_rate_limit_retries: 1,
            max_network_retries: 2,
        },
    );

    let request = RequestSpec::json(credentials().endpoint("macros").unwrap());
    let started = tokio::time::Instant::now();
    let body: serde_json::Value = client.get_json(&request).await.unwrap();

    assert_eq!(body, json!({ "macros": [] }));
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(fake.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_network_budget_is_bounded() {
    let fake = FakeZendesk::new();
    for _ in 0..3 {
        fake.route(&api("macros"), connection_reset());
    }
    let client = RateLimitedClient::new(
        fake.clone(),
        RetryPolicy {
            max_rate_limit_retries: 1,
            max_network_retries: 1,
        },
    );

    let request = RequestSpec::json(credentials().endpoint("macros").unwrap());
    let err = client.send(&request).await.unwrap_err();

    assert_eq!(err.class(), ErrorClass::TransientServer);
    assert_eq!(err.code(), "ERR_NETWORK");
    assert_eq!(fake.calls().len(), 2);
}
