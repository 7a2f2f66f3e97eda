//! Index client facade.
//!
//! An `IndexClient` is bound to one source type (its lower-cased name is the
//! document-type label), one index and a default chunk size. It exposes the
//! bulk write paths (`index`, `delete`, `index_missing_documents`) and the
//! read paths (`get_by_ids`, `get_collection`, `get_resource`, `get`).
//!
//! Read paths never fail because an index has not been created yet: an absent
//! index reads as empty unless the caller set `__raise_on_empty`.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};

use search_sync_shared::document::{
    document_id, document_type, scalar_to_string, value_kind,
};
use search_sync_shared::types::search_params::{as_bool_like, RAISE_KEY, RAISE_ON_EMPTY_KEY};
use search_sync_shared::{Document, FoundDocuments, ResultMeta, SearchParams};

use crate::chunks::process_chunks;
use crate::connection::SearchConnection;
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::query_string::{apply_sort, build_qs};
use crate::types::{
    BatchOperationSummary, BulkAction, BulkEnvelope, BulkLine, CountRequest, DocumentIds,
    GetSourceRequest, Lookup, MultiGetBody, MultiGetRequest, MultiGetTarget, SearchRequest,
    SourceFilter,
};
use crate::utils::parse_usize_param;

/// Operator joining clauses of different fields.
const DEFAULT_OPERATOR: &str = "AND";

/// Body keys that never apply to a count request.
const NON_COUNT_BODY_KEYS: &[&str] = &["sort", "from", "size"];

/// Outcome of [`IndexClient::get_collection`].
#[derive(Debug, Clone, PartialEq)]
pub enum Collection {
    /// `_count` was requested.
    Count(u64),
    Documents(FoundDocuments),
}

impl Collection {
    pub fn count(&self) -> Option<u64> {
        match self {
            Collection::Count(count) => Some(*count),
            Collection::Documents(_) => None,
        }
    }

    pub fn into_documents(self) -> Option<FoundDocuments> {
        match self {
            Collection::Documents(found) => Some(found),
            Collection::Count(_) => None,
        }
    }
}

/// Index client for one source type.
///
/// Cheap to clone and safe to share between tasks; all state besides the
/// `(doc_type, index_name, chunk_size)` triple lives in the shared provider.
///
/// # Example
///
/// ```no_run
/// use search_sync_repository::{SearchConnection, config::Settings};
/// use search_sync_shared::SearchParams;
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut settings = Settings::new();
/// settings.insert("elasticsearch.hosts".into(), "localhost:9200".into());
/// let connection = SearchConnection::setup(&settings)?;
///
/// let stories = connection.client("Story");
/// stories.index(&[json!({"id": 1, "title": "First"})], None).await?;
///
/// let params = SearchParams::new().with("title", "First").with("_limit", 10);
/// let found = stories.get_collection(&params).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct IndexClient {
    provider: Arc<dyn SearchIndexProvider>,
    doc_type: String,
    index_name: String,
    chunk_size: usize,
}

impl IndexClient {
    /// Create a client for `source_type_name`.
    ///
    /// # Arguments
    ///
    /// * `connection` - The shared connection
    /// * `source_type_name` - Model name; lower-cased into the document-type label
    /// * `index_name` - Target index, defaults to the connection's default index
    /// * `chunk_size` - Documents per bulk request, defaults to the connection's
    pub fn new(
        connection: &SearchConnection,
        source_type_name: &str,
        index_name: Option<&str>,
        chunk_size: Option<usize>,
    ) -> Self {
        let config = connection.config();
        Self {
            provider: Arc::clone(connection.provider()),
            doc_type: source_type_name.to_lowercase(),
            index_name: index_name
                .map(str::to_string)
                .unwrap_or_else(|| config.default_index.clone()),
            chunk_size: chunk_size.unwrap_or(config.chunk_size).max(1),
        }
    }

    pub fn doc_type(&self) -> &str {
        &self.doc_type
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Build one action envelope per document.
    ///
    /// The type label comes from the document's own `_type` field when set,
    /// otherwise from the client; either way it is lower-cased. The envelope id
    /// is the document's `id` field.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<(BulkEnvelope, Document)>)` - Envelope/document pairs in input order
    /// * `Err(SearchIndexError::ValidationError)` - If any document is not a JSON object
    pub fn prep_bulk_documents(
        &self,
        action: BulkAction,
        documents: &[Value],
    ) -> Result<Vec<(BulkEnvelope, Document)>, SearchIndexError> {
        documents
            .iter()
            .map(|value| {
                let Value::Object(document) = value else {
                    return Err(SearchIndexError::validation(format!(
                        "Document type must be `object` not a `{}`",
                        value_kind(value)
                    )));
                };

                let envelope = BulkEnvelope {
                    action,
                    index: self.index_name.clone(),
                    doc_type: self.type_label(document),
                    id: document_id(document),
                };
                Ok((envelope, document.clone()))
            })
            .collect()
    }

    /// Lower-cased type label of `document`, falling back to the client's.
    fn type_label(&self, document: &Document) -> String {
        document_type(document)
            .map(str::to_lowercase)
            .unwrap_or_else(|| self.doc_type.clone())
    }

    /// Flatten envelope/document pairs into bulk lines.
    ///
    /// Delete actions contribute their envelope only. Index actions contribute
    /// the envelope followed by the document. A `timestamp` field stays in the
    /// document; the engine rejects `_timestamp` action metadata.
    pub fn flatten_bulk_lines(prepared: Vec<(BulkEnvelope, Document)>) -> Vec<BulkLine> {
        let mut lines = Vec::with_capacity(prepared.len().saturating_mul(2));
        for (envelope, document) in prepared {
            match envelope.action {
                BulkAction::Delete => lines.push(BulkLine::Action(envelope)),
                BulkAction::Index => {
                    lines.push(BulkLine::Action(envelope));
                    lines.push(BulkLine::Source(document));
                }
            }
        }
        lines
    }

    /// Send `documents` as chunked bulk requests.
    ///
    /// Does nothing for an empty input. Each physical request carries at most
    /// `chunk_size` documents (twice as many lines for index actions). Chunks
    /// are sent one after the other; a failed chunk stops the run and earlier
    /// chunks stay applied.
    #[instrument(skip(self, documents), fields(doc_type = %self.doc_type, document_count = documents.len()))]
    pub async fn bulk(
        &self,
        action: BulkAction,
        documents: &[Value],
        chunk_size: Option<usize>,
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        if documents.is_empty() {
            debug!("Nothing to send");
            return Ok(BatchOperationSummary::default());
        }

        let prepared = self.prep_bulk_documents(action, documents)?;
        self.send_prepared(action, prepared, chunk_size).await
    }

    async fn send_prepared(
        &self,
        action: BulkAction,
        prepared: Vec<(BulkEnvelope, Document)>,
        chunk_size: Option<usize>,
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        let lines = Self::flatten_bulk_lines(prepared);
        if lines.is_empty() {
            return Ok(BatchOperationSummary::default());
        }

        let documents_per_chunk = chunk_size.unwrap_or(self.chunk_size).max(1);
        let lines_per_chunk = documents_per_chunk.saturating_mul(action.lines_per_document());

        let summaries =
            process_chunks(&lines, lines_per_chunk, |chunk| self.provider.bulk(chunk)).await?;

        let mut summary = BatchOperationSummary::default();
        for chunk_summary in summaries {
            summary.merge(chunk_summary);
        }

        info!(
            action = %action,
            index = %self.index_name,
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Bulk {} finished",
            action
        );
        Ok(summary)
    }

    /// Index (create or replace) `documents`.
    pub async fn index(
        &self,
        documents: &[Value],
        chunk_size: Option<usize>,
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        self.bulk(BulkAction::Index, documents, chunk_size).await
    }

    /// Delete one or many documents by id.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example(client: search_sync_repository::IndexClient) -> Result<(), search_sync_repository::SearchIndexError> {
    /// client.delete(7i64, None).await?;
    /// client.delete(vec!["a", "b"], None).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn delete(
        &self,
        ids: impl Into<DocumentIds>,
        chunk_size: Option<usize>,
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        let documents: Vec<Value> = ids
            .into()
            .into_values()
            .into_iter()
            .map(|id| json!({"id": id, "_type": self.doc_type}))
            .collect();
        self.bulk(BulkAction::Delete, &documents, chunk_size).await
    }

    /// Index only the documents the index does not already hold.
    ///
    /// Existing ids are looked up with one multi-get. A missing index counts as
    /// holding nothing, so every document is indexed. Documents without an id
    /// cannot be looked up and are always indexed.
    #[instrument(skip(self, documents), fields(doc_type = %self.doc_type, document_count = documents.len()))]
    pub async fn index_missing_documents(
        &self,
        documents: &[Value],
        chunk_size: Option<usize>,
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        if documents.is_empty() {
            debug!("Nothing to reconcile");
            return Ok(BatchOperationSummary::default());
        }

        let prepared = self.prep_bulk_documents(BulkAction::Index, documents)?;
        let ids: Vec<String> = prepared
            .iter()
            .filter_map(|(envelope, _)| envelope.id.clone())
            .collect();

        let existing: HashSet<String> = if ids.is_empty() {
            HashSet::new()
        } else {
            let request = MultiGetRequest {
                index: self.index_name.clone(),
                doc_type: self.doc_type.clone(),
                body: MultiGetBody::Ids(ids),
                source: SourceFilter::None,
            };
            match self.provider.multi_get(&request).await? {
                Lookup::Found(body) => body
                    .docs
                    .into_iter()
                    .filter(|doc| doc.is_found())
                    .filter_map(|doc| doc.id)
                    .collect(),
                Lookup::IndexAbsent => {
                    info!(index = %self.index_name, "Index does not exist, indexing every document");
                    HashSet::new()
                }
            }
        };

        let missing: Vec<(BulkEnvelope, Document)> = prepared
            .into_iter()
            .filter(|(envelope, _)| match &envelope.id {
                Some(id) => !existing.contains(id),
                None => true,
            })
            .collect();

        if missing.is_empty() {
            debug!("Every document is already indexed");
            return Ok(BatchOperationSummary::default());
        }

        info!(
            missing = missing.len(),
            skipped = documents.len() - missing.len(),
            "Indexing missing documents"
        );
        self.send_prepared(BulkAction::Index, missing, chunk_size).await
    }

    /// Fetch documents by id/type pairs.
    ///
    /// Each input object names its id in `_id` (or `id`) and optionally its
    /// type in `_type`. `_fields` restricts the returned source; `_id` is only
    /// added when there is no projection or the projection names it. Entries
    /// the engine returns without a payload are dropped.
    ///
    /// `__raise_on_empty` (default `true`) turns an absent index or an empty
    /// result into a not-found error.
    pub async fn get_by_ids(
        &self,
        documents: &[Value],
        params: &SearchParams,
    ) -> Result<FoundDocuments, SearchIndexError> {
        if documents.is_empty() {
            return Ok(FoundDocuments::empty());
        }

        let raise = params.raise_on_empty(true);
        let fields = params.get_list("_fields");

        let targets = documents
            .iter()
            .map(|value| self.multi_get_target(value))
            .collect::<Result<Vec<_>, _>>()?;
        let requested: Vec<String> = targets.iter().map(|t| t.id.clone()).collect();

        let request = MultiGetRequest {
            index: self.index_name.clone(),
            doc_type: self.doc_type.clone(),
            body: MultiGetBody::Docs(targets),
            source: match &fields {
                Some(fields) => SourceFilter::Includes(fields.clone()),
                None => SourceFilter::All,
            },
        };

        let body = match self.provider.multi_get(&request).await? {
            Lookup::Found(body) => body,
            Lookup::IndexAbsent => return empty_or_raise(raise, SearchIndexError::index_not_found()),
        };

        let mut found = Vec::with_capacity(body.docs.len());
        for doc in body.docs {
            if doc.found == Some(false) {
                continue;
            }
            let payload = match &fields {
                Some(_) => doc.fields.or(doc.source),
                None => doc.source,
            };
            let Some(mut document) = payload else {
                continue;
            };
            let projects_id = fields
                .as_ref()
                .map_or(true, |fields| fields.iter().any(|f| f == "_id"));
            if let Some(id) = doc.id.filter(|_| projects_id) {
                document.insert("_id".to_string(), Value::String(id));
            }
            found.push(document);
        }

        if found.is_empty() && raise {
            return Err(self.not_found(&requested.join(",")));
        }

        let meta = ResultMeta {
            total: found.len() as u64,
            start: 0,
            fields: fields.unwrap_or_default(),
            took: None,
        };
        Ok(FoundDocuments::new(found, meta))
    }

    fn multi_get_target(&self, value: &Value) -> Result<MultiGetTarget, SearchIndexError> {
        let Value::Object(document) = value else {
            return Err(SearchIndexError::validation(format!(
                "Document type must be `object` not a `{}`",
                value_kind(value)
            )));
        };
        let id = document
            .get("_id")
            .or_else(|| document.get("id"))
            .filter(|v| !v.is_null())
            .map(scalar_to_string)
            .ok_or_else(|| SearchIndexError::validation("Document has no `_id` or `id` field"))?;

        Ok(MultiGetTarget {
            index: self.index_name.clone(),
            doc_type: self.type_label(document),
            id,
        })
    }

    /// Translate collection parameters into a search request.
    ///
    /// * `_limit` becomes `size`. It is required unless an explicit `body` is
    ///   given, in which case the engine's default page size applies.
    /// * The offset is `_start`, or `_page * _limit`, or 0.
    /// * An explicit `body` is used as-is. Otherwise the filters (plus
    ///   `_raw_terms`) become a `query_string` query, or `match_all` when
    ///   nothing is left.
    /// * `_search_fields` lists the fields the query string searches. Earlier
    ///   fields get a higher boost unless they carry their own `^N`.
    /// * `_sort` goes through [`apply_sort`] and `_fields` becomes the source
    ///   projection.
    ///
    /// # Returns
    ///
    /// * `Ok(SearchRequest)` - The request, always carrying index and type
    /// * `Err(SearchIndexError::BadRequest)` - `Missing _limit` without a
    ///   `body`, or a bad integer
    pub fn build_search_params(&self, params: &SearchParams) -> Result<SearchRequest, SearchIndexError> {
        let explicit_body = params.get("body").filter(|b| !b.is_null());
        let size = parse_usize_param(params, "_limit")?;
        if size.is_none() && explicit_body.is_none() {
            return Err(SearchIndexError::bad_request("Missing _limit"));
        }

        let from = match (parse_usize_param(params, "_start")?, size) {
            (Some(start), _) => start,
            (None, Some(size)) => parse_usize_param(params, "_page")?
                .unwrap_or(0)
                .saturating_mul(size),
            (None, None) => 0,
        };

        let body = match explicit_body {
            Some(body) => body.clone(),
            None => {
                let raw_terms = params.get_str("_raw_terms").unwrap_or_default();
                let qs = build_qs(params, DEFAULT_OPERATOR, &raw_terms);
                if qs.is_empty() {
                    json!({"query": {"match_all": {}}})
                } else {
                    let mut query_string = Map::new();
                    query_string.insert("query".to_string(), Value::String(qs));
                    if let Some(fields) = params.get_list("_search_fields") {
                        query_string.insert("fields".to_string(), json!(boost_search_fields(&fields)));
                    }
                    json!({"query": {"query_string": query_string}})
                }
            }
        };

        let sort = params
            .get_list("_sort")
            .map(|items| apply_sort(&items.join(",")))
            .filter(|sort| !sort.is_empty());

        Ok(SearchRequest {
            index: self.index_name.clone(),
            doc_type: self.doc_type.clone(),
            body,
            sort,
            fields: params.get_list("_fields"),
            from,
            size,
        })
    }

    /// Count the documents a search request would match.
    ///
    /// Returns 0 when the index does not exist.
    pub async fn do_count(&self, request: &SearchRequest) -> Result<u64, SearchIndexError> {
        self.count_body(&request.body).await
    }

    async fn count_body(&self, body: &Value) -> Result<u64, SearchIndexError> {
        let mut body = body.clone();
        if let Value::Object(map) = &mut body {
            for key in NON_COUNT_BODY_KEYS {
                map.shift_remove(*key);
            }
        }

        let request = CountRequest {
            index: self.index_name.clone(),
            doc_type: self.doc_type.clone(),
            body,
        };
        Ok(self.provider.count(&request).await?.found_or(0))
    }

    /// Run a collection query.
    ///
    /// With `_count` the matching documents are only counted: an explicit
    /// `body` is counted directly, otherwise the parameters are translated
    /// first. Without it the search runs and hits are wrapped in a
    /// [`FoundDocuments`].
    ///
    /// `__raise_on_empty` (default `false`) turns an absent index or zero hits
    /// into a not-found error.
    #[instrument(skip(self, params), fields(doc_type = %self.doc_type, index = %self.index_name))]
    pub async fn get_collection(&self, params: &SearchParams) -> Result<Collection, SearchIndexError> {
        let raise = params.raise_on_empty(false);

        if is_count_request(params) {
            let count = match params.get("body").filter(|b| !b.is_null()) {
                Some(body) => self.count_body(body).await?,
                None => self.do_count(&self.build_search_params(params)?).await?,
            };
            return Ok(Collection::Count(count));
        }

        let request = self.build_search_params(params)?;
        let body = match self.provider.search(&request).await? {
            Lookup::Found(body) => body,
            Lookup::IndexAbsent => {
                return empty_or_raise(raise, SearchIndexError::index_not_found())
                    .map(Collection::Documents);
            }
        };

        let found = FoundDocuments::from_search_response(
            body,
            request.from,
            request.fields.clone().unwrap_or_default(),
        );
        debug!(hits = found.len(), total = found.total(), "Search finished");

        if found.is_empty() && raise {
            return Err(self.not_found("query"));
        }
        Ok(Collection::Documents(found))
    }

    /// Fetch one document's stored source by id.
    ///
    /// `__raise_on_empty` (default `true`) turns an absent index, an absent
    /// document or an empty source into a not-found error; otherwise those
    /// read as `None`.
    pub async fn get_resource(
        &self,
        name: &str,
        params: &SearchParams,
    ) -> Result<Option<Document>, SearchIndexError> {
        let raise = params.raise_on_empty(true);
        let request = GetSourceRequest {
            index: self.index_name.clone(),
            doc_type: self.doc_type.clone(),
            id: name.to_string(),
        };

        match self.provider.get_source(&request).await? {
            Lookup::IndexAbsent => empty_or_raise(raise, SearchIndexError::index_not_found()),
            Lookup::Found(Some(document)) if !document.is_empty() => Ok(Some(document)),
            Lookup::Found(_) => empty_or_raise(raise, self.not_found(name)),
        }
    }

    /// [`get_resource`](Self::get_resource) with the public `__raise` flag.
    ///
    /// `__raise` defaults to `false`, so a missing document reads as `None`.
    pub async fn get(
        &self,
        name: &str,
        params: &SearchParams,
    ) -> Result<Option<Document>, SearchIndexError> {
        let mut forwarded = params.clone();
        let raise = forwarded
            .remove(RAISE_KEY)
            .and_then(|v| as_bool_like(&v))
            .unwrap_or(false);
        forwarded.insert(RAISE_ON_EMPTY_KEY, raise);
        self.get_resource(name, &forwarded).await
    }

    fn not_found(&self, what: &str) -> SearchIndexError {
        SearchIndexError::not_found(format!("'{}({})' resource not found", self.doc_type, what))
    }
}

impl std::fmt::Debug for IndexClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexClient")
            .field("doc_type", &self.doc_type)
            .field("index_name", &self.index_name)
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

/// `Err(error)` under "raise on empty", otherwise the empty value.
fn empty_or_raise<T: Default>(raise: bool, error: SearchIndexError) -> Result<T, SearchIndexError> {
    if raise {
        Err(error)
    } else {
        Ok(T::default())
    }
}

/// `_count` counts as set unless it is explicitly false.
fn is_count_request(params: &SearchParams) -> bool {
    match params.get("_count") {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) if s.trim().is_empty() => true,
        Some(value) => as_bool_like(value).unwrap_or(true),
    }
}

/// `["a", "b"]` becomes `["b^1", "a^2"]`: the first field gets the highest boost.
fn boost_search_fields(fields: &[String]) -> Vec<String> {
    fields
        .iter()
        .rev()
        .enumerate()
        .map(|(i, field)| {
            if field.contains('^') {
                field.clone()
            } else {
                format!("{}^{}", field, i + 1)
            }
        })
        .collect()
}
