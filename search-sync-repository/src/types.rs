//! Request and result types used between the index client and its provider.

use serde_json::Value;

use search_sync_shared::Document;

use crate::errors::SearchIndexError;

/// Outcome of a read against an index that may not exist yet.
///
/// Providers report a missing index as `IndexAbsent` instead of an error, so
/// each read path decides for itself whether that means "empty" or "fail".
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    IndexAbsent,
}

impl<T> Lookup<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::IndexAbsent => Lookup::IndexAbsent,
        }
    }

    pub fn is_index_absent(&self) -> bool {
        matches!(self, Lookup::IndexAbsent)
    }

    /// The found value, or `default` when the index is absent.
    pub fn found_or(self, default: T) -> T {
        match self {
            Lookup::Found(value) => value,
            Lookup::IndexAbsent => default,
        }
    }
}

/// Bulk action applied to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulkAction {
    Index,
    Delete,
}

impl BulkAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkAction::Index => "index",
            BulkAction::Delete => "delete",
        }
    }

    /// Number of bulk lines each document expands to.
    pub fn lines_per_document(&self) -> usize {
        match self {
            BulkAction::Index => 2,
            BulkAction::Delete => 1,
        }
    }
}

impl std::fmt::Display for BulkAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action envelope describing where one bulk document goes.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkEnvelope {
    pub action: BulkAction,
    pub index: String,
    /// Lower-cased document-type label.
    pub doc_type: String,
    pub id: Option<String>,
}

/// One entry of the flattened bulk sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkLine {
    Action(BulkEnvelope),
    Source(Document),
}

/// Which part of the stored source a multi-get returns.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceFilter {
    All,
    None,
    Includes(Vec<String>),
}

/// Identifies one document in a `docs` style multi-get.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiGetTarget {
    pub index: String,
    pub doc_type: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MultiGetBody {
    /// `{"ids": [...]}` against the request index.
    Ids(Vec<String>),
    /// `{"docs": [{"_index", "_id"}, ...]}`.
    Docs(Vec<MultiGetTarget>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiGetRequest {
    pub index: String,
    pub doc_type: String,
    pub body: MultiGetBody,
    pub source: SourceFilter,
}

/// A search request built from collection parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub index: String,
    pub doc_type: String,
    /// Request body, `{"query": ...}`.
    pub body: Value,
    /// Sort in `field:asc,field:desc` form.
    pub sort: Option<String>,
    /// Source fields to return. `None` returns the full source.
    pub fields: Option<Vec<String>>,
    pub from: usize,
    /// Page size. `None` leaves it to the engine.
    pub size: Option<usize>,
}

/// A count request. Sort and paging never apply.
#[derive(Debug, Clone, PartialEq)]
pub struct CountRequest {
    pub index: String,
    pub doc_type: String,
    pub body: Value,
}

impl From<&SearchRequest> for CountRequest {
    fn from(request: &SearchRequest) -> Self {
        Self {
            index: request.index.clone(),
            doc_type: request.doc_type.clone(),
            body: request.body.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetSourceRequest {
    pub index: String,
    pub doc_type: String,
    pub id: String,
}

/// Result for one document of a bulk request.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOperationResult {
    pub document_id: Option<String>,
    pub action: BulkAction,
    pub success: bool,
    pub error: Option<SearchIndexError>,
}

/// Aggregated outcome of one or more bulk requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOperationSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchOperationResult>,
}

impl BatchOperationSummary {
    /// Fold another summary into this one, keeping result order.
    pub fn merge(&mut self, other: BatchOperationSummary) {
        self.total += other.total;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.results.extend(other.results);
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// One or many document ids, as accepted by `IndexClient::delete`.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentIds(Vec<Value>);

impl DocumentIds {
    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl From<Value> for DocumentIds {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => Self(items),
            Value::Null => Self(Vec::new()),
            other => Self(vec![other]),
        }
    }
}

impl From<&str> for DocumentIds {
    fn from(id: &str) -> Self {
        Self(vec![Value::from(id)])
    }
}

impl From<String> for DocumentIds {
    fn from(id: String) -> Self {
        Self(vec![Value::from(id)])
    }
}

impl From<i64> for DocumentIds {
    fn from(id: i64) -> Self {
        Self(vec![Value::from(id)])
    }
}

impl From<u64> for DocumentIds {
    fn from(id: u64) -> Self {
        Self(vec![Value::from(id)])
    }
}

impl<T: Into<Value>> From<Vec<T>> for DocumentIds {
    fn from(ids: Vec<T>) -> Self {
        Self(ids.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_ids_normalisation() {
        assert_eq!(DocumentIds::from(1i64).into_values(), vec![json!(1)]);
        assert_eq!(DocumentIds::from("a").into_values(), vec![json!("a")]);
        assert_eq!(
            DocumentIds::from(vec![1, 2]).into_values(),
            vec![json!(1), json!(2)]
        );
        assert_eq!(
            DocumentIds::from(json!(["x", "y"])).into_values(),
            vec![json!("x"), json!("y")]
        );
        assert!(DocumentIds::from(Value::Null).into_values().is_empty());
    }

    #[test]
    fn test_summary_merge() {
        let mut summary = BatchOperationSummary::default();
        summary.merge(BatchOperationSummary {
            total: 2,
            succeeded: 1,
            failed: 1,
            results: vec![],
        });
        summary.merge(BatchOperationSummary {
            total: 1,
            succeeded: 1,
            failed: 0,
            results: vec![],
        });
        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert!(summary.has_failures());
    }

    #[test]
    fn test_lookup_helpers() {
        let found: Lookup<u64> = Lookup::Found(3);
        assert_eq!(found.clone().map(|n| n * 2), Lookup::Found(6));
        assert_eq!(Lookup::<u64>::IndexAbsent.found_or(0), 0);
        assert!(!found.is_index_absent());
    }
}
