//! Unit tests for the comment ledger and the comments file readers

use std::io::Write;
use tempfile::TempDir;
use zendesk_exporter::output::{CommentPairs, CommentsWriter};
use zendesk_exporter::resume::CommentLedger;

#[test]
fn test_ledger_ignores_unpaired_trailing_id() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("comments.json");
    std::fs::write(&path, "41\n[]\n42\n").unwrap();

    let ledger = CommentLedger::load(&path).unwrap();

    assert_eq!(ledger.len(), 1);
    assert!(ledger.already_exported(41));
    assert!(!ledger.already_exported(42));
}

#[test]
fn test_ledger_of_missing_file_is_empty() {
    let temp = TempDir::new().unwrap();
    let ledger = CommentLedger::load(&temp.path().join("comments.json")).unwrap();
    assert!(ledger.is_empty());
}

#[test]
fn test_writer_then_ledger_agree() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("comments.json");

    let mut writer = CommentsWriter::open(&path).unwrap();
    writer.append_ticket(5, &[serde_json::json!({ "id": 1 })]).unwrap();
    writer.append_ticket(9, &[]).unwrap();
    drop(writer);

    let ledger = CommentLedger::load(&path).unwrap();
    assert!(ledger.already_exported(5));
    assert!(ledger.already_exported(9));
    assert_eq!(ledger.len(), 2);
}

#[test]
fn test_writer_drops_torn_pair_on_open() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("comments.json");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(b"1\n[]\n2\n[{\"id\"").unwrap();
    drop(file);

    let mut writer = CommentsWriter::open(&path).unwrap();
    writer.append_ticket(2, &[]).unwrap();
    drop(writer);

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "1\n[]\n2\n[]\n");
}

#[test]
fn test_pairs_skip_bad_record_and_continue() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("comments.json");
    std::fs::write(&path, "1\nnot json\n2\n[{\"id\":7}]\n").unwrap();

    let pairs: Vec<_> = CommentPairs::open(&path).unwrap().unwrap().collect();

    assert_eq!(pairs.len(), 2);
    assert!(pairs[0].is_err());
    let record = pairs[1].as_ref().unwrap();
    assert_eq!(record.ticket_id, 2);
    assert_eq!(record.comments.len(), 1);
}

#[tokio::test]
async fn test_single_ticket_without_attachments_downloads_nothing() {
    use crate::common::FakeZendesk;
    use zendesk_exporter::client::RateLimitedClient;
    use zendesk_exporter::exporter::RetryPolicy;
    use zendesk_exporter::fetcher::AttachmentFetcher;
    use zendesk_exporter::output::{ErrorLog, ExportLayout};

    let temp = TempDir::new().unwrap();
    let layout = ExportLayout::new(temp.path());
    layout.ensure_dirs().unwrap();
    let comments = layout.resource(zendesk_exporter::ResourceKind::Comments);
    std::fs::write(&comments, "42\n[{\"id\":1,\"attachments\":[]}]\n").unwrap();

    let ledger = CommentLedger::load(&comments).unwrap();
    assert!(ledger.already_exported(42));
    assert_eq!(ledger.len(), 1);

    let fake = FakeZendesk::new();
    let client = RateLimitedClient::new(fake.clone(), RetryPolicy::default());
    let error_log = ErrorLog::new(layout.errors());
    let report = AttachmentFetcher::new(&client, &layout, &error_log)
        .fetch_all(&comments)
        .await
        .unwrap();

    assert_eq!(report.ticket_ids.into_iter().collect::<Vec<_>>(), vec![42]);
    assert_eq!(report.downloaded, 0);
    assert!(fake.calls().is_empty());
    assert_eq!(std::fs::read_dir(layout.attachments_dir()).unwrap().count(), 0);
}
