//! OpenSearch provider implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! on top of the [`Transport`] adapter.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use opensearch::{http::transport::TransportBuilder, OpenSearch};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use search_sync_shared::{CountResponseBody, Document, MultiGetResponseBody, SearchResponseBody};

use crate::config::ConnectionSettings;
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::opensearch::pool::{RoundRobinPool, Sniffer, NODES_HTTP_PATH};
use crate::opensearch::transport::{
    endpoint, HttpMethod, RequestBody, Transport, TransportRequest, TransportResponse,
};
use crate::types::{
    BatchOperationResult, BatchOperationSummary, BulkAction, BulkEnvelope, BulkLine, CountRequest,
    GetSourceRequest, Lookup, MultiGetBody, MultiGetRequest, SearchRequest, SourceFilter,
};

const IGNORE_NOT_FOUND: &[u16] = &[404];

/// OpenSearch provider implementation.
///
/// Document-type labels are kept on requests for routing and logging but are
/// never written to the wire, since OpenSearch has no mapping types.
///
/// # Example
///
/// ```ignore
/// use search_sync_repository::config::{ConnectionSettings, Settings};
///
/// let mut settings = Settings::new();
/// settings.insert("elasticsearch.hosts".into(), "localhost:9200".into());
/// let provider = OpenSearchProvider::new(&ConnectionSettings::from_settings(&settings)?)?;
/// provider.health_check().await?;
/// ```
pub struct OpenSearchProvider {
    transport: Transport,
    sniffer: Option<Sniffer>,
}

impl OpenSearchProvider {
    /// Create a provider for the configured hosts.
    ///
    /// Requests are spread round-robin over the hosts. With sniffing enabled the
    /// node list is reseeded from the cluster at `sniff_interval`.
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchProvider)` - A new provider instance
    /// * `Err(SearchIndexError::ConnectionError)` - If the transport cannot be built
    pub fn new(settings: &ConnectionSettings) -> Result<Self, SearchIndexError> {
        let pool = RoundRobinPool::new(settings.hosts.clone())?;

        let mut builder = TransportBuilder::new(pool.clone()).disable_proxy();
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let transport = builder
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let hosts: Vec<&str> = settings.hosts.iter().map(|u| u.as_str()).collect();
        info!(
            hosts = ?hosts,
            sniff = settings.sniff,
            sniff_interval_secs = settings.sniff_interval.as_secs(),
            "Created OpenSearch provider"
        );

        let sniffer = settings.sniff.then(|| {
            let scheme = settings.hosts.first().map(Url::scheme).unwrap_or("http");
            Sniffer::new(pool, scheme, settings.sniff_interval)
        });

        Ok(Self {
            transport: Transport::new(OpenSearch::new(transport)),
            sniffer,
        })
    }

    /// Wrap an already configured client. No sniffing is done.
    pub fn from_client(client: OpenSearch) -> Self {
        Self {
            transport: Transport::new(client),
            sniffer: None,
        }
    }

    /// Perform a request, refreshing the node list first when it is stale.
    ///
    /// A failed request marks the node list stale so the next one reseeds.
    async fn request(
        &self,
        request: TransportRequest<'_>,
    ) -> Result<Lookup<TransportResponse>, SearchIndexError> {
        self.sniff_if_due().await;

        let outcome = self.transport.perform_request(request).await;
        if outcome.is_err() {
            if let Some(sniffer) = &self.sniffer {
                sniffer.mark_stale();
            }
        }
        outcome
    }

    /// Reseed the pool from `GET /_nodes/http`. Failures keep the current nodes.
    async fn sniff_if_due(&self) {
        let Some(sniffer) = &self.sniffer else {
            return;
        };
        let now = Instant::now();
        if !sniffer.is_due(now) {
            return;
        }
        sniffer.mark_sniffed(now);

        let request = TransportRequest::new(HttpMethod::Get, NODES_HTTP_PATH);
        match self.transport.perform_request(request).await {
            Ok(Lookup::Found(response)) => match sniffer.reseed_from(&response.body) {
                0 => warn!("Node sniffing returned no HTTP nodes, keeping current nodes"),
                nodes => info!(nodes, hosts = ?sniffer.pool().urls(), "Reseeded connection pool"),
            },
            Ok(Lookup::IndexAbsent) => {
                warn!(path = NODES_HTTP_PATH, "Node sniffing answered 404, keeping current nodes");
            }
            Err(e) => warn!(error = %e, "Node sniffing failed, keeping current nodes"),
        }
    }

    /// Render bulk lines as newline-delimited JSON.
    fn render_bulk_body(lines: &[BulkLine]) -> Result<String, SearchIndexError> {
        let mut body = String::new();
        for line in lines {
            let value = match line {
                BulkLine::Action(envelope) => Self::action_metadata(envelope),
                BulkLine::Source(document) => Value::Object(document.clone()),
            };
            let rendered = serde_json::to_string(&value)
                .map_err(|e| SearchIndexError::serialization(e.to_string()))?;
            body.push_str(&rendered);
            body.push('\n');
        }
        Ok(body)
    }

    /// `{"index": {"_index": ..., "_id": ...}}` for one envelope.
    fn action_metadata(envelope: &BulkEnvelope) -> Value {
        let mut meta = Map::new();
        meta.insert("_index".to_string(), Value::String(envelope.index.clone()));
        if let Some(id) = &envelope.id {
            meta.insert("_id".to_string(), Value::String(id.clone()));
        }
        let mut line = Map::new();
        line.insert(envelope.action.as_str().to_string(), Value::Object(meta));
        Value::Object(line)
    }

    fn multi_get_body(body: &MultiGetBody) -> Value {
        match body {
            MultiGetBody::Ids(ids) => json!({ "ids": ids }),
            MultiGetBody::Docs(targets) => json!({
                "docs": targets
                    .iter()
                    .map(|t| json!({"_index": t.index, "_id": t.id}))
                    .collect::<Vec<_>>()
            }),
        }
    }

    fn decode<T: DeserializeOwned>(response: TransportResponse) -> Result<T, SearchIndexError> {
        serde_json::from_value(response.body).map_err(|e| SearchIndexError::parse(e.to_string()))
    }

    /// Summarise the per-item outcome of a bulk response.
    fn summarize_bulk(lines: &[BulkLine], body: BulkResponseBody) -> BatchOperationSummary {
        let actions: Vec<BulkAction> = lines
            .iter()
            .filter_map(|line| match line {
                BulkLine::Action(envelope) => Some(envelope.action),
                BulkLine::Source(_) => None,
            })
            .collect();

        let mut summary = BatchOperationSummary::default();
        for (position, item) in body.items.into_iter().enumerate() {
            let Some((name, outcome)) = item.into_iter().next() else {
                continue;
            };
            let action = actions.get(position).copied().unwrap_or(match name.as_str() {
                "delete" => BulkAction::Delete,
                _ => BulkAction::Index,
            });

            // Deleting a document that is already gone is not a failure
            let missing_delete = action == BulkAction::Delete && outcome.status == 404;
            let success = outcome.error.is_none()
                && ((200..300).contains(&outcome.status) || missing_delete);

            summary.total += 1;
            if success {
                summary.succeeded += 1;
                summary.results.push(BatchOperationResult {
                    document_id: outcome.id,
                    action,
                    success: true,
                    error: None,
                });
            } else {
                let reason = match &outcome.error {
                    Some(error) => error
                        .get("reason")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| error.to_string()),
                    None => format!("status {}", outcome.status),
                };
                warn!(
                    action = %action,
                    document_id = ?outcome.id,
                    status = outcome.status,
                    reason = %reason,
                    "Bulk item failed"
                );
                summary.failed += 1;
                summary.results.push(BatchOperationResult {
                    document_id: outcome.id,
                    action,
                    success: false,
                    error: Some(SearchIndexError::bulk_index(reason)),
                });
            }
        }
        summary
    }
}

#[derive(Debug, Deserialize)]
struct BulkResponseBody {
    #[serde(default)]
    items: Vec<HashMap<String, BulkItemOutcome>>,
}

#[derive(Debug, Deserialize)]
struct BulkItemOutcome {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(default)]
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

/// Body returned by the `_source` endpoint for a missing document or index.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<Value>,
}

impl ErrorBody {
    fn is_index_missing(&self) -> bool {
        let Some(error) = &self.error else {
            return false;
        };
        error.get("type").and_then(Value::as_str) == Some("index_not_found_exception")
            || error
                .get("root_cause")
                .and_then(Value::as_array)
                .map(|causes| {
                    causes
                        .iter()
                        .any(|c| c.get("type").and_then(Value::as_str) == Some("index_not_found_exception"))
                })
                .unwrap_or(false)
    }
}

#[async_trait]
impl SearchIndexProvider for OpenSearchProvider {
    async fn bulk(&self, lines: &[BulkLine]) -> Result<BatchOperationSummary, SearchIndexError> {
        if lines.is_empty() {
            return Ok(BatchOperationSummary::default());
        }

        let body = Self::render_bulk_body(lines)?;
        let request =
            TransportRequest::new(HttpMethod::Post, "/_bulk").body(RequestBody::NdJson(body));

        let response = match self.request(request).await? {
            Lookup::Found(response) => response,
            Lookup::IndexAbsent => {
                return Err(SearchIndexError::bad_request("Bulk endpoint answered 404"));
            }
        };

        let summary = Self::summarize_bulk(lines, Self::decode(response)?);
        debug!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Bulk request completed"
        );
        Ok(summary)
    }

    async fn multi_get(
        &self,
        request: &MultiGetRequest,
    ) -> Result<Lookup<MultiGetResponseBody>, SearchIndexError> {
        let mut transport_request =
            TransportRequest::new(HttpMethod::Post, endpoint(&[&request.index, "_mget"]))
                .body(RequestBody::Json(Self::multi_get_body(&request.body)));
        match &request.source {
            SourceFilter::All => {}
            SourceFilter::None => transport_request = transport_request.query("_source", "false"),
            SourceFilter::Includes(fields) => {
                transport_request = transport_request.query("_source_includes", fields.join(","));
            }
        }

        match self.request(transport_request).await? {
            Lookup::Found(response) => Ok(Lookup::Found(Self::decode(response)?)),
            Lookup::IndexAbsent => Ok(Lookup::IndexAbsent),
        }
    }

    async fn search(
        &self,
        request: &SearchRequest,
    ) -> Result<Lookup<SearchResponseBody>, SearchIndexError> {
        let mut transport_request =
            TransportRequest::new(HttpMethod::Post, endpoint(&[&request.index, "_search"]))
                .query("from", request.from.to_string())
                .body(RequestBody::Json(request.body.clone()));
        if let Some(size) = request.size {
            transport_request = transport_request.query("size", size.to_string());
        }
        if let Some(sort) = &request.sort {
            transport_request = transport_request.query("sort", sort.clone());
        }
        if let Some(fields) = &request.fields {
            transport_request = transport_request.query("_source_includes", fields.join(","));
        }

        match self.request(transport_request).await? {
            Lookup::Found(response) => Ok(Lookup::Found(Self::decode(response)?)),
            Lookup::IndexAbsent => Ok(Lookup::IndexAbsent),
        }
    }

    async fn count(&self, request: &CountRequest) -> Result<Lookup<u64>, SearchIndexError> {
        let transport_request =
            TransportRequest::new(HttpMethod::Post, endpoint(&[&request.index, "_count"]))
                .body(RequestBody::Json(request.body.clone()));

        match self.request(transport_request).await? {
            Lookup::Found(response) => {
                let body: CountResponseBody = Self::decode(response)?;
                Ok(Lookup::Found(body.count))
            }
            Lookup::IndexAbsent => Ok(Lookup::IndexAbsent),
        }
    }

    async fn get_source(
        &self,
        request: &GetSourceRequest,
    ) -> Result<Lookup<Option<Document>>, SearchIndexError> {
        let transport_request = TransportRequest::new(
            HttpMethod::Get,
            endpoint(&[&request.index, "_source", &request.id]),
        )
        .ignore(IGNORE_NOT_FOUND);

        let response = match self.request(transport_request).await? {
            Lookup::Found(response) => response,
            Lookup::IndexAbsent => return Ok(Lookup::IndexAbsent),
        };

        if response.status == 404 {
            let body: ErrorBody = Self::decode(response).unwrap_or(ErrorBody { error: None });
            if body.is_index_missing() {
                return Ok(Lookup::IndexAbsent);
            }
            debug!(index = %request.index, id = %request.id, "Document not found");
            return Ok(Lookup::Found(None));
        }

        match response.body {
            Value::Object(document) => Ok(Lookup::Found(Some(document))),
            Value::Null => Ok(Lookup::Found(None)),
            other => Err(SearchIndexError::parse(format!(
                "Expected a document source, got {}",
                other
            ))),
        }
    }

    async fn health_check(&self) -> Result<(), SearchIndexError> {
        match self
            .request(TransportRequest::new(HttpMethod::Get, "/"))
            .await?
        {
            Lookup::Found(_) => Ok(()),
            Lookup::IndexAbsent => Err(SearchIndexError::connection("Cluster root answered 404")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(action: BulkAction, id: Option<&str>) -> BulkEnvelope {
        BulkEnvelope {
            action,
            index: "stories".to_string(),
            doc_type: "story".to_string(),
            id: id.map(str::to_string),
        }
    }

    fn document(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_render_bulk_body() {
        let lines = vec![
            BulkLine::Action(envelope(BulkAction::Index, Some("1"))),
            BulkLine::Source(document(json!({"id": 1, "name": "a"}))),
            BulkLine::Action(envelope(BulkAction::Delete, Some("2"))),
        ];

        let body = OpenSearchProvider::render_bulk_body(&lines).unwrap();

        assert_eq!(
            body,
            "{\"index\":{\"_index\":\"stories\",\"_id\":\"1\"}}\n\
             {\"id\":1,\"name\":\"a\"}\n\
             {\"delete\":{\"_index\":\"stories\",\"_id\":\"2\"}}\n"
        );
    }

    #[test]
    fn test_timestamp_stays_in_source_line() {
        let lines = vec![
            BulkLine::Action(envelope(BulkAction::Index, Some("1"))),
            BulkLine::Source(document(json!({"id": 1, "timestamp": "2015-01-01"}))),
        ];

        let body = OpenSearchProvider::render_bulk_body(&lines).unwrap();

        assert_eq!(
            body,
            "{\"index\":{\"_index\":\"stories\",\"_id\":\"1\"}}\n\
             {\"id\":1,\"timestamp\":\"2015-01-01\"}\n"
        );
        assert!(!body.contains("_timestamp"));
    }

    #[test]
    fn test_action_metadata_without_id() {
        let meta = OpenSearchProvider::action_metadata(&envelope(BulkAction::Index, None));
        assert_eq!(meta, json!({"index": {"_index": "stories"}}));
    }

    #[test]
    fn test_multi_get_body() {
        let ids = OpenSearchProvider::multi_get_body(&MultiGetBody::Ids(vec!["1".into(), "2".into()]));
        assert_eq!(ids, json!({"ids": ["1", "2"]}));

        let docs = OpenSearchProvider::multi_get_body(&MultiGetBody::Docs(vec![
            crate::types::MultiGetTarget {
                index: "stories".into(),
                doc_type: "story".into(),
                id: "1".into(),
            },
        ]));
        assert_eq!(docs, json!({"docs": [{"_index": "stories", "_id": "1"}]}));
    }

    #[test]
    fn test_summarize_bulk() {
        let lines = vec![
            BulkLine::Action(envelope(BulkAction::Index, Some("1"))),
            BulkLine::Source(document(json!({"id": 1}))),
            BulkLine::Action(envelope(BulkAction::Index, Some("2"))),
            BulkLine::Source(document(json!({"id": 2}))),
            BulkLine::Action(envelope(BulkAction::Delete, Some("3"))),
        ];
        let body: BulkResponseBody = serde_json::from_value(json!({
            "took": 3,
            "errors": true,
            "items": [
                {"index": {"_id": "1", "status": 201}},
                {"index": {"_id": "2", "status": 400, "error": {"type": "mapper_parsing_exception", "reason": "failed to parse"}}},
                {"delete": {"_id": "3", "status": 404, "result": "not_found"}}
            ]
        }))
        .unwrap();

        let summary = OpenSearchProvider::summarize_bulk(&lines, body);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.results[1].document_id.as_deref(), Some("2"));
        assert_eq!(
            summary.results[1].error,
            Some(SearchIndexError::bulk_index("failed to parse"))
        );
        assert_eq!(summary.results[2].action, BulkAction::Delete);
        assert!(summary.results[2].success);
    }

    #[test]
    fn test_error_body_index_missing() {
        let body: ErrorBody = serde_json::from_value(json!({
            "error": {
                "root_cause": [{"type": "index_not_found_exception"}],
                "type": "index_not_found_exception"
            },
            "status": 404
        }))
        .unwrap();
        assert!(body.is_index_missing());

        let body: ErrorBody = serde_json::from_value(json!({
            "error": {"type": "resource_not_found_exception"},
            "status": 404
        }))
        .unwrap();
        assert!(!body.is_index_missing());

        let body: ErrorBody = serde_json::from_value(json!({})).unwrap();
        assert!(!body.is_index_missing());
    }
}
