//! Transport adapter around the OpenSearch client.
//!
//! Every request the provider makes goes through [`Transport::perform_request`],
//! which traces the request signature at debug level and translates failures:
//! a 404 becomes [`Lookup::IndexAbsent`], anything else a `BadRequest`
//! carrying the engine's detail.

use opensearch::http::headers::{HeaderMap, HeaderValue, CONTENT_TYPE};
use opensearch::http::Method;
use opensearch::OpenSearch;
use serde_json::Value;
use tracing::{debug, enabled, error, Level};
use url::Url;

use crate::errors::SearchIndexError;
use crate::types::Lookup;

/// Longest request signature written to the debug log.
pub const MAX_SIGNATURE_LEN: usize = 512;

const NOT_FOUND: u16 = 404;

/// HTTP methods used against the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
        }
    }
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::Get,
            HttpMethod::Post => Method::Post,
            HttpMethod::Put => Method::Put,
            HttpMethod::Delete => Method::Delete,
            HttpMethod::Head => Method::Head,
        }
    }
}

/// Request body, serialised according to its content type.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    /// Newline-delimited JSON, already rendered.
    NdJson(String),
}

impl RequestBody {
    fn content_type(&self) -> &'static str {
        match self {
            RequestBody::Json(_) => "application/json",
            RequestBody::NdJson(_) => "application/x-ndjson",
        }
    }

    fn into_string(self) -> Result<String, SearchIndexError> {
        match self {
            RequestBody::Json(value) => serde_json::to_string(&value)
                .map_err(|e| SearchIndexError::serialization(e.to_string())),
            RequestBody::NdJson(body) => Ok(body),
        }
    }
}

/// A successful (or deliberately ignored) response.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Decoded JSON body. `Value::Null` when the body was empty.
    pub body: Value,
}

/// One request against the engine.
#[derive(Debug, Clone)]
pub struct TransportRequest<'a> {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(&'a str, String)>,
    pub body: Option<RequestBody>,
    /// Statuses handed back to the caller instead of being translated.
    pub ignore: &'a [u16],
}

impl<'a> TransportRequest<'a> {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            ignore: &[],
        }
    }

    pub fn query(mut self, key: &'a str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn ignore(mut self, statuses: &'a [u16]) -> Self {
        self.ignore = statuses;
        self
    }
}

/// Adapter performing single requests against the engine.
#[derive(Debug, Clone)]
pub struct Transport {
    client: OpenSearch,
}

impl Transport {
    pub fn new(client: OpenSearch) -> Self {
        Self { client }
    }

    /// Perform one request and translate its outcome.
    ///
    /// # Returns
    ///
    /// * `Ok(Lookup::Found(response))` - 2xx, or a status listed in `ignore`
    /// * `Ok(Lookup::IndexAbsent)` - The engine answered 404
    /// * `Err(SearchIndexError::BadRequest)` - Any other failure, with its detail
    pub async fn perform_request(
        &self,
        request: TransportRequest<'_>,
    ) -> Result<Lookup<TransportResponse>, SearchIndexError> {
        if enabled!(Level::DEBUG) {
            debug!(
                request = %request_signature(request.method, &request.path, &request.query),
                "Search engine request"
            );
        }

        let mut headers = HeaderMap::new();
        if let Some(body) = &request.body {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(body.content_type()));
        }
        let body = request.body.map(RequestBody::into_string).transpose()?;

        let response = match self
            .client
            .send(
                request.method.into(),
                &request.path,
                headers,
                Some(&request.query),
                body,
                None,
            )
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let status = e.status_code().map(|s| s.as_u16());
                return translate_failure(status, &request.path, e.to_string());
            }
        };

        let status = response.status_code().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| SearchIndexError::bad_request(e.to_string()))?;

        if (200..300).contains(&status) || request.ignore.contains(&status) {
            return Ok(Lookup::Found(TransportResponse {
                status,
                body: parse_body(&text)?,
            }));
        }

        translate_failure(Some(status), &request.path, text)
    }
}

/// Map a failed request to the index-absent outcome or a bad request.
fn translate_failure<T>(
    status: Option<u16>,
    path: &str,
    detail: String,
) -> Result<Lookup<T>, SearchIndexError> {
    if status == Some(NOT_FOUND) {
        debug!(path = %path, "Index does not exist");
        return Ok(Lookup::IndexAbsent);
    }

    error!(status = ?status, path = %path, body = %detail, "Search engine request failed");
    Err(SearchIndexError::bad_request(match status {
        Some(status) => format!("{} ({})", detail, status),
        None => detail,
    }))
}

fn parse_body(text: &str) -> Result<Value, SearchIndexError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| SearchIndexError::parse(e.to_string()))
}

/// `METHOD /path?query`, cut to [`MAX_SIGNATURE_LEN`] bytes.
pub fn request_signature(method: HttpMethod, path: &str, query: &[(&str, String)]) -> String {
    let mut signature = format!("{} {}", method.as_str(), path);
    if !query.is_empty() {
        let encoded: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())))
            .finish();
        signature.push('?');
        signature.push_str(&encoded);
    }
    truncate_on_char_boundary(signature, MAX_SIGNATURE_LEN)
}

/// Cut `text` to at most `max` bytes without splitting a character.
pub fn truncate_on_char_boundary(mut text: String, max: usize) -> String {
    if text.len() <= max {
        return text;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text.push_str("...");
    text
}

/// Build an escaped request path from raw segments.
///
/// # Example
///
/// ```
/// use search_sync_repository::opensearch::transport::endpoint;
///
/// assert_eq!(endpoint(&["stories", "_source", "a b/c"]), "/stories/_source/a%20b%2Fc");
/// ```
pub fn endpoint(segments: &[&str]) -> String {
    let mut url = match Url::parse("http://localhost/") {
        Ok(url) => url,
        Err(_) => return format!("/{}", segments.join("/")),
    };
    if let Ok(mut path) = url.path_segments_mut() {
        path.clear().extend(segments);
    }
    url.path().to_string()
}
