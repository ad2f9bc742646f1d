//! Integration tests for resuming an interrupted export

use crate::common::*;
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;
use zendesk_exporter::exporter::{ExportOrchestrator, Stage};
use zendesk_exporter::output::ExportLayout;
use zendesk_exporter::resume::{CursorCheckpoint, ExportLock};
use zendesk_exporter::shutdown::ShutdownCoordinator;
use zendesk_exporter::ResourceKind;

#[tokio::test(start_paused = true)]
async fn test_incremental_export_resumes_from_checkpoint() {
    let temp = TempDir::new().unwrap();
    let layout = ExportLayout::new(temp.path());

    let first = FakeZendesk::new();
    first
        .route(
            &api("incremental/tickets/cursor"),
            ok(cursor_page("tickets", &[1, 2], "c1", false)),
        )
        .route(&api("incremental/tickets/cursor"), status(401));

    ExportOrchestrator::with_transport(credentials(), first.clone(), options(temp.path()))
        .run()
        .await
        .unwrap_err();

    assert_eq!(read_lines(&layout.resource(ResourceKind::Tickets)).len(), 2);
    let checkpoint = CursorCheckpoint::load(&layout.checkpoint(ResourceKind::Tickets), ResourceKind::Tickets)
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.after_cursor(), "c1");
    assert_eq!(checkpoint.records_written(), 2);

    let second = FakeZendesk::new();
    second
        .route(
            &api("incremental/tickets/cursor"),
            ok(cursor_page("tickets", &[3], "c2", true)),
        )
        .route(
            &api("incremental/users/cursor"),
            ok(cursor_page("users", &[], "u1", true)),
        )
        .route(
            &api("tickets/1/comments"),
            ok(json!({ "comments": [], "next_page": null })),
        )
        .route(
            &api("tickets/2/comments"),
            ok(json!({ "comments": [], "next_page": null })),
        )
        .route(
            &api("tickets/3/comments"),
            ok(json!({ "comments": [], "next_page": null })),
        );
    script_snapshots(&second);

    let summary =
        ExportOrchestrator::with_transport(credentials(), second.clone(), options(temp.path()))
            .run()
            .await
            .unwrap();

    let calls = second.calls_to(&api("incremental/tickets/cursor"));
    assert_eq!(query_value(&calls[0], "cursor").as_deref(), Some("c1"));
    assert_eq!(query_value(&calls[0], "start_time").as_deref(), Some("0"));
    assert_eq!(read_lines(&layout.resource(ResourceKind::Tickets)).len(), 3);
    assert_eq!(summary.stage(Stage::Tickets).unwrap().records_written, 1);
    assert_eq!(summary.stage(Stage::Comments).unwrap().records_written, 3);
}

#[tokio::test(start_paused = true)]
async fn test_first_incremental_request_sends_empty_cursor() {
    let temp = TempDir::new().unwrap();
    let fake = FakeZendesk::new();
    script_empty_incrementals(&fake);
    script_snapshots(&fake);

    ExportOrchestrator::with_transport(credentials(), fake.clone(), options(temp.path()))
        .run()
        .await
        .unwrap();

    for path in ["incremental/tickets/cursor", "incremental/users/cursor"] {
        let calls = fake.calls_to(&api(path));
        assert_eq!(calls.len(), 1);
        assert_eq!(query_value(&calls[0], "cursor").as_deref(), Some(""));
        assert_eq!(query_value(&calls[0], "start_time").as_deref(), Some("0"));
    }
}

#[tokio::test(start_paused = true)]
async fn test_torn_comment_tail_is_refetched() {
    let temp = TempDir::new().unwrap();
    let layout = ExportLayout::new(temp.path());
    std::fs::create_dir_all(temp.path()).unwrap();

    // Ticket 42's id line made it to disk, its comments line did not
    std::fs::write(
        layout.resource(ResourceKind::Tickets),
        "{\"id\":41}\n{\"id\":42}\n",
    )
    .unwrap();
    let mut comments = std::fs::File::create(layout.resource(ResourceKind::Comments)).unwrap();
    comments.write_all(b"41\n[{\"id\":1}]\n42\n").unwrap();
    drop(comments);

    let fake = FakeZendesk::new();
    fake.route(
        &api("incremental/tickets/cursor"),
        ok(cursor_page("tickets", &[], "c1", true)),
    )
    .route(
        &api("incremental/users/cursor"),
        ok(cursor_page("users", &[], "u1", true)),
    )
    .route(
        &api("tickets/42/comments"),
        ok(json!({ "comments": [{ "id": 2 }], "next_page": null })),
    );
    script_snapshots(&fake);

    let summary =
        ExportOrchestrator::with_transport(credentials(), fake.clone(), options(temp.path()))
            .run()
            .await
            .unwrap();

    assert!(fake.calls_to(&api("tickets/41/comments")).is_empty());
    assert_eq!(fake.calls_to(&api("tickets/42/comments")).len(), 1);
    assert_eq!(
        read_lines(&layout.resource(ResourceKind::Comments)),
        vec!["41", "[{\"id\":1}]", "42", "[{\"id\":2}]"]
    );
    let report = summary.stage(Stage::Comments).unwrap();
    assert_eq!(report.records_written, 1);
    assert_eq!(report.items_already_present, 1);
}

#[tokio::test(start_paused = true)]
async fn test_second_run_on_locked_directory_is_refused() {
    let temp = TempDir::new().unwrap();
    let layout = ExportLayout::new(temp.path());
    layout.ensure_dirs().unwrap();

    let mut held = ExportLock::open(&layout.lock()).unwrap();
    let _guard = held.try_hold().unwrap();

    let fake = FakeZendesk::new();
    let err = ExportOrchestrator::with_transport(credentials(), fake.clone(), options(temp.path()))
        .run()
        .await
        .unwrap_err();

    assert!(err.to_string().contains("lock"), "{err}");
    assert!(fake.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_before_start_stops_without_requests() {
    let temp = TempDir::new().unwrap();
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let fake = FakeZendesk::new();
    let err = ExportOrchestrator::with_transport(credentials(), fake.clone(), options(temp.path()))
        .with_shutdown(Arc::clone(&shutdown))
        .run()
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(fake.calls().is_empty());

    let summary: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(ExportLayout::new(temp.path()).summary()).unwrap(),
    )
    .unwrap();
    assert_eq!(summary["stages"][0]["status"], "cancelled");
}
