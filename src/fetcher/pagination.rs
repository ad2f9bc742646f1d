//! Generic pagination over Zendesk listing endpoints
//!
//! Supports the two conventions of the API:
//! - Cursor style (incremental exports): `cursor` + `start_time=0` on every
//!   request, `after_cursor` and `end_of_stream` in the response
//! - Next-page style: the response's `next_page` URL is requested verbatim
//!   until it is null or absent
//!
//! Includes safety mechanisms:
//! - Maximum page count to stop a server that never signals the end
//! - A response missing the resource field is rejected instead of read as empty

use super::{FetcherError, FetcherResult, Page, PageCursor, PageStream, PageStyle, ResourceEndpoint};
use crate::client::{HttpError, RateLimitedClient, RequestSpec};
use crate::config::ApiCredentials;
use crate::exporter::config::MAX_PAGES;
use crate::shutdown::SharedShutdown;
use crate::strip_self_url;
use futures_util::stream;
use reqwest::Url;
use serde_json::Value;
use tracing::debug;

/// Drives an endpoint across pages
#[derive(Clone)]
pub struct PaginatedCollector {
    client: RateLimitedClient,
    credentials: ApiCredentials,
    max_pages: usize,
}

enum PageState {
    Pending { request: RequestSpec, fetched: usize },
    Failed(FetcherError),
    Done,
}

impl PaginatedCollector {
    /// Collector resolving endpoints against the credentials' base URL
    pub fn new(client: RateLimitedClient, credentials: ApiCredentials) -> Self {
        Self {
            client,
            credentials,
            max_pages: MAX_PAGES,
        }
    }

    /// Override the page cap
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Attach a shutdown handle to the underlying client
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.client = self.client.with_shutdown(shutdown);
        self
    }

    /// Underlying HTTP client
    pub fn client(&self) -> &RateLimitedClient {
        &self.client
    }

    /// Page cap in effect
    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Lazy stream of pages, starting at `resume` when given
    ///
    /// The stream ends after the last page or after the first error.
    pub fn collect(&self, endpoint: ResourceEndpoint, resume: Option<PageCursor>) -> PageStream {
        let collector = self.clone();
        let initial = match self.first_request(&endpoint, resume.as_ref()) {
            Ok(request) => PageState::Pending {
                request,
                fetched: 0,
            },
            Err(e) => PageState::Failed(e),
        };

        let stream = stream::unfold(initial, move |state| {
            let collector = collector.clone();
            let endpoint = endpoint.clone();
            async move {
                match state {
                    PageState::Done => None,
                    PageState::Failed(e) => Some((Err(e), PageState::Done)),
                    PageState::Pending { request, fetched } => {
                        if fetched >= collector.max_pages {
                            let err = FetcherError::PageLimitExceeded {
                                resource: endpoint.kind,
                                max_pages: collector.max_pages,
                            };
                            return Some((Err(err), PageState::Done));
                        }
                        match collector.fetch_page(&endpoint, &request, fetched + 1).await {
                            Ok(page) => {
                                let next = match collector.next_request(&endpoint, &page) {
                                    Some(request) => PageState::Pending {
                                        request,
                                        fetched: fetched + 1,
                                    },
                                    None => PageState::Done,
                                };
                                Some((Ok(page), next))
                            }
                            Err(e) => Some((Err(e), PageState::Done)),
                        }
                    }
                }
            }
        });

        Box::pin(stream)
    }

    /// Request for the first page, or for the page at `resume`
    pub fn first_request(
        &self,
        endpoint: &ResourceEndpoint,
        resume: Option<&PageCursor>,
    ) -> FetcherResult<RequestSpec> {
        if let Some(PageCursor::NextPage(url)) = resume {
            return Ok(RequestSpec::json(url.clone()));
        }

        let url = self.credentials.endpoint(&endpoint.path)?;
        let request = match endpoint.style {
            PageStyle::Cursor => {
                let cursor = match resume {
                    Some(PageCursor::Cursor(cursor)) => cursor.as_str(),
                    _ => "",
                };
                cursor_request(url, cursor)
            }
            PageStyle::NextPage | PageStyle::Single => RequestSpec::json(url),
        };

        Ok(endpoint
            .params
            .iter()
            .fold(request, |request, (key, value)| request.with_param(*key, *value)))
    }

    /// Request following `page`, `None` after the last page
    pub fn next_request(&self, endpoint: &ResourceEndpoint, page: &Page) -> Option<RequestSpec> {
        if page.is_last {
            return None;
        }
        match &page.after {
            Some(PageCursor::Cursor(cursor)) => {
                let url = page_url(&self.credentials, endpoint)?;
                Some(cursor_request(url, cursor))
            }
            Some(PageCursor::NextPage(url)) => Some(RequestSpec::json(url.clone())),
            None => None,
        }
    }

    /// Fetch and decode a single page
    pub async fn fetch_page(
        &self,
        endpoint: &ResourceEndpoint,
        request: &RequestSpec,
        number: usize,
    ) -> FetcherResult<Page> {
        debug!(
            resource = %endpoint.kind,
            page = number,
            url = %request.url,
            "Fetching page"
        );
        let body: Value = self.client.get_json(request).await?;
        let page = parse_page(endpoint, &request.url, body, number)?;
        debug!(
            resource = %endpoint.kind,
            page = number,
            records = page.records.len(),
            is_last = page.is_last,
            "Received page"
        );
        Ok(page)
    }
}

fn cursor_request(url: Url, cursor: &str) -> RequestSpec {
    RequestSpec::json(url)
        .with_param("cursor", cursor)
        .with_param("start_time", "0")
}

fn page_url(credentials: &ApiCredentials, endpoint: &ResourceEndpoint) -> Option<Url> {
    credentials.endpoint(&endpoint.path).ok()
}

/// Decode one response body into a [`Page`]
pub fn parse_page(
    endpoint: &ResourceEndpoint,
    url: &Url,
    mut body: Value,
    number: usize,
) -> FetcherResult<Page> {
    let invalid = |message: String| {
        FetcherError::Http(HttpError::InvalidResponse {
            url: url.to_string(),
            message,
        })
    };

    let field = endpoint.response_field();
    let data = body
        .get_mut(field)
        .map(Value::take)
        .ok_or_else(|| invalid(format!("response has no '{field}' field")))?;

    let mut records = match (endpoint.style, data) {
        (_, Value::Array(items)) => items,
        (PageStyle::Single, Value::Object(object)) => vec![Value::Object(object)],
        (_, other) => {
            return Err(invalid(format!(
                "'{field}' is not a list (found {})",
                json_type(&other)
            )))
        }
    };

    let (after, is_last) = match endpoint.style {
        PageStyle::Cursor => {
            for record in &mut records {
                strip_self_url(record);
            }
            let end_of_stream = body
                .get("end_of_stream")
                .and_then(Value::as_bool)
                .ok_or_else(|| invalid("response has no 'end_of_stream' flag".to_string()))?;
            let after_cursor = body
                .get("after_cursor")
                .and_then(Value::as_str)
                .map(|c| PageCursor::Cursor(c.to_string()));
            if !end_of_stream && after_cursor.is_none() {
                return Err(invalid(
                    "'end_of_stream' is false but 'after_cursor' is missing".to_string(),
                ));
            }
            (after_cursor, end_of_stream)
        }
        PageStyle::NextPage => match body.get("next_page").and_then(Value::as_str) {
            Some(next) => {
                let next_url = Url::parse(next)
                    .map_err(|e| invalid(format!("invalid next_page '{next}': {e}")))?;
                (Some(PageCursor::NextPage(next_url)), false)
            }
            None => (None, true),
        },
        PageStyle::Single => (None, true),
    };

    Ok(Page {
        number,
        records,
        after,
        is_last,
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
