use std::path::PathBuf;
use zendesk_exporter::output::{attachment_file_name, ExportLayout};
use zendesk_exporter::ResourceKind;

#[test]
fn test_resource_files_sit_at_export_root() {
    let layout = ExportLayout::new("exported");

    assert_eq!(
        layout.resource(ResourceKind::Tickets),
        PathBuf::from("exported/tickets.json")
    );
    assert_eq!(
        layout.resource(ResourceKind::RecipientAddresses),
        PathBuf::from("exported/recipient_addresses.json")
    );
    assert_eq!(layout.errors(), PathBuf::from("exported/errors.txt"));
    assert_eq!(layout.summary(), PathBuf::from("exported/summary.json"));
}

#[test]
fn test_attachment_name_keeps_only_extension() {
    // Original names may contain anything; only the extension survives
    assert_eq!(attachment_file_name(7, "Quarterly report.PDF"), "7.PDF");
    assert_eq!(attachment_file_name(8, "archive.tar.gz"), "8.gz");
    assert_eq!(attachment_file_name(9, "README"), "9");
    assert_eq!(attachment_file_name(10, ""), "10");
    assert_eq!(attachment_file_name(11, "../../etc/passwd.txt"), "11.txt");
}

#[test]
fn test_attachment_paths_live_under_attachments_dir() {
    let layout = ExportLayout::new("/tmp/acme");
    assert_eq!(
        layout.attachment(501, "logo.png"),
        PathBuf::from("/tmp/acme/attachments/501.png")
    );
}

#[test]
fn test_resume_state_is_hidden() {
    let layout = ExportLayout::new("exported");
    assert_eq!(
        layout.checkpoint(ResourceKind::Users),
        PathBuf::from("exported/.resume/users.json")
    );
    assert_eq!(layout.lock(), PathBuf::from("exported/.export.lock"));
}
