//! Unit tests for page decoding across the three pagination styles

use reqwest::Url;
use serde_json::json;
use zendesk_exporter::client::ErrorClass;
use zendesk_exporter::fetcher::pagination::parse_page;
use zendesk_exporter::fetcher::{PageCursor, ResourceEndpoint};

fn url() -> Url {
    Url::parse("https://acme.zendesk.com/api/v2/resource").unwrap()
}

#[test]
fn test_cursor_page_strips_self_urls() {
    let body = json!({
        "users": [
            { "id": 1, "url": "https://acme.zendesk.com/api/v2/users/1.json", "name": "Ana" },
            { "id": 2, "name": "Bo" }
        ],
        "after_cursor": "MTU3",
        "end_of_stream": false
    });

    let page = parse_page(&ResourceEndpoint::USERS, &url(), body, 1).unwrap();

    assert_eq!(page.records.len(), 2);
    assert!(page.records.iter().all(|r| r.get("url").is_none()));
    assert_eq!(page.records[0]["name"], "Ana");
    assert_eq!(page.after, Some(PageCursor::Cursor("MTU3".to_string())));
    assert!(!page.is_last);
}

#[test]
fn test_cursor_page_without_end_flag_is_invalid() {
    let body = json!({ "tickets": [], "after_cursor": "x" });
    let err = parse_page(&ResourceEndpoint::TICKETS, &url(), body, 1).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Unclassified);
}

#[test]
fn test_last_cursor_page_keeps_cursor() {
    let body = json!({ "tickets": [], "after_cursor": "end", "end_of_stream": true });
    let page = parse_page(&ResourceEndpoint::TICKETS, &url(), body, 4).unwrap();
    assert!(page.is_last);
    assert_eq!(page.after, Some(PageCursor::Cursor("end".to_string())));
    assert_eq!(page.number, 4);
}

#[test]
fn test_list_page_keeps_records_verbatim() {
    let body = json!({
        "views": [{ "id": 3, "url": "https://acme.zendesk.com/api/v2/views/3.json" }],
        "next_page": "https://acme.zendesk.com/api/v2/views.json?page=2"
    });

    let page = parse_page(&ResourceEndpoint::VIEWS, &url(), body, 1).unwrap();

    assert!(page.records[0].get("url").is_some());
    match page.after {
        Some(PageCursor::NextPage(next)) => assert_eq!(next.query(), Some("page=2")),
        other => panic!("unexpected cursor {other:?}"),
    }
    assert!(!page.is_last);
}

#[test]
fn test_list_page_without_next_is_last() {
    let body = json!({ "macros": [], "next_page": null });
    let page = parse_page(&ResourceEndpoint::MACROS, &url(), body, 2).unwrap();
    assert!(page.is_last);
    assert!(page.after.is_none());
}

#[test]
fn test_missing_field_is_invalid() {
    let body = json!({ "error": "RecordNotFound" });
    let err = parse_page(&ResourceEndpoint::TRIGGERS, &url(), body, 1).unwrap_err();
    assert!(err.to_string().contains("triggers"), "{err}");
}

#[test]
fn test_settings_object_is_one_record() {
    let body = json!({ "settings": { "tickets": { "comments_public_by_default": true } } });
    let page = parse_page(&ResourceEndpoint::SETTINGS, &url(), body, 1).unwrap();
    assert_eq!(page.records.len(), 1);
    assert!(page.is_last);
}

#[test]
fn test_comment_endpoint_requests_inline_images() {
    let endpoint = ResourceEndpoint::ticket_comments(77);
    assert_eq!(endpoint.path, "tickets/77/comments");
    assert_eq!(endpoint.params, &[("include_inline_images", "true")]);
    assert_eq!(endpoint.response_field(), "comments");
}
