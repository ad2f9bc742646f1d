//! Shared fixtures: a scripted Zendesk API behind the `Transport` seam

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use zendesk_exporter::client::{HttpResponse, RequestSpec, Transport, TransportError};
use zendesk_exporter::exporter::{ExportOptions, RetryPolicy};
use zendesk_exporter::ApiCredentials;

pub const BASE_URL: &str = "https://acme.zendesk.com/api/v2";

pub type Reply = Result<HttpResponse, TransportError>;

/// Replies queued per URL path; an unscripted path answers 404
#[derive(Default)]
pub struct FakeZendesk {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<RequestSpec>>,
}

impl FakeZendesk {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a reply for `path` (e.g. `/api/v2/views`)
    pub fn route(&self, path: &str, reply: Reply) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<RequestSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<RequestSpec> {
        self.calls()
            .into_iter()
            .filter(|c| c.url.path() == path)
            .collect()
    }

    pub fn calls_under(&self, prefix: &str) -> Vec<RequestSpec> {
        self.calls()
            .into_iter()
            .filter(|c| c.url.path().starts_with(prefix))
            .collect()
    }
}

#[async_trait]
impl Transport for FakeZendesk {
    async fn execute(&self, request: &RequestSpec) -> Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(request.clone());
        let queued = self
            .routes
            .lock()
            .unwrap()
            .get_mut(request.url.path())
            .and_then(VecDeque::pop_front);
        queued.unwrap_or_else(|| status(404))
    }
}

pub fn ok(body: Value) -> Reply {
    Ok(HttpResponse {
        status: 200,
        retry_after: None,
        body: Bytes::from(body.to_string()),
    })
}

pub fn raw(body: &'static [u8]) -> Reply {
    Ok(HttpResponse {
        status: 200,
        retry_after: None,
        body: Bytes::from_static(body),
    })
}

pub fn status(code: u16) -> Reply {
    Ok(HttpResponse {
        status: code,
        retry_after: None,
        body: Bytes::from_static(b"{\"error\":\"scripted\"}"),
    })
}

pub fn rate_limited(retry_after: &str) -> Reply {
    Ok(HttpResponse {
        status: 429,
        retry_after: Some(retry_after.to_string()),
        body: Bytes::new(),
    })
}

pub fn connection_reset() -> Reply {
    Err(TransportError::Connect("connection reset by peer".to_string()))
}

pub fn api(path: &str) -> String {
    format!("/api/v2/{path}")
}

pub fn credentials() -> ApiCredentials {
    ApiCredentials::new(BASE_URL, "agent@acme.test", "t0ken").unwrap()
}

pub fn options(export_dir: &std::path::Path) -> ExportOptions {
    ExportOptions {
        export_dir: export_dir.to_path_buf(),
        retry: RetryPolicy {
            max_rate_limit_retries: 3,
            max_network_retries: 1,
        },
        ..ExportOptions::default()
    }
}

/// One incremental page
pub fn cursor_page(field: &str, ids: &[u64], after: &str, end_of_stream: bool) -> Value {
    let records: Vec<Value> = ids
        .iter()
        .map(|id| json!({ "id": id, "url": format!("{BASE_URL}/{field}/{id}.json") }))
        .collect();
    json!({
        field: records,
        "after_cursor": after,
        "end_of_stream": end_of_stream,
    })
}

/// One list page, with a `next_page` link when `next` is set
pub fn list_page(field: &str, records: Value, next: Option<&str>) -> Value {
    json!({
        field: records,
        "next_page": next,
        "count": records.as_array().map(Vec::len).unwrap_or(0),
    })
}

/// Script the six snapshot endpoints with one small page each
pub fn script_snapshots(fake: &FakeZendesk) {
    for field in ["views", "triggers", "macros", "automations", "recipient_addresses"] {
        fake.route(
            &api(field),
            ok(list_page(field, json!([{ "id": 1, "title": field }]), None)),
        );
    }
    fake.route(
        &api("account/settings.json"),
        ok(json!({ "settings": { "branding": { "header_color": "1F73B7" } } })),
    );
}

/// Script an account with no tickets and no users
pub fn script_empty_incrementals(fake: &FakeZendesk) {
    fake.route(
        &api("incremental/tickets/cursor"),
        ok(cursor_page("tickets", &[], "t-end", true)),
    );
    fake.route(
        &api("incremental/users/cursor"),
        ok(cursor_page("users", &[], "u-end", true)),
    );
}

pub fn read_lines(path: &std::path::Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

pub fn query_value(request: &RequestSpec, key: &str) -> Option<String> {
    request
        .query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
}
