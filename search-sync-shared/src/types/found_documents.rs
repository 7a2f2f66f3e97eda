//! Result wrapper for read operations.
//!
//! `FoundDocuments` behaves like a slice of documents (length, indexing,
//! iteration) while carrying the query metadata alongside, never inside,
//! the documents themselves.

use std::ops::Deref;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::document::Document;
use crate::types::search_response::{SearchHit, SearchResponseBody};

/// Pagination and timing metadata attached to a [`FoundDocuments`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResultMeta {
    /// Total number of matches reported by the engine.
    pub total: u64,
    /// Offset of the first returned document.
    pub start: usize,
    /// Fields explicitly requested. Empty means the full source was returned.
    pub fields: Vec<String>,
    /// Engine-reported timing in milliseconds.
    pub took: Option<f64>,
}

/// Ordered documents returned by a query, plus metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FoundDocuments {
    documents: Vec<Document>,
    meta: ResultMeta,
}

impl FoundDocuments {
    /// An empty result with `total == 0` and `start == 0`.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(documents: Vec<Document>, meta: ResultMeta) -> Self {
        Self { documents, meta }
    }

    /// Build the wrapper from a search response.
    ///
    /// Each hit becomes a document built from its `fields` projection when the
    /// engine returned one, otherwise from its stored `_source`. The hit's
    /// `_score` and `_id` are overlaid on top.
    ///
    /// # Arguments
    ///
    /// * `body` - The decoded search response
    /// * `start` - The offset the query was issued with
    /// * `fields` - The fields explicitly requested, empty for full source
    pub fn from_search_response(body: SearchResponseBody, start: usize, fields: Vec<String>) -> Self {
        let total = body.hits.total.as_ref().map(|t| t.value()).unwrap_or(0);
        let documents = body.hits.hits.into_iter().map(Self::hit_to_document).collect();

        Self {
            documents,
            meta: ResultMeta {
                total,
                start,
                fields,
                took: body.took,
            },
        }
    }

    fn hit_to_document(hit: SearchHit) -> Document {
        let mut document = hit.fields.or(hit.source).unwrap_or_default();
        let score = hit.score.map(Value::from).unwrap_or(Value::Null);
        document.insert("_score".to_string(), score);
        if let Some(id) = hit.id {
            document.insert("_id".to_string(), Value::String(id));
        }
        document
    }

    pub fn meta(&self) -> &ResultMeta {
        &self.meta
    }

    pub fn total(&self) -> u64 {
        self.meta.total
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn into_documents(self) -> Vec<Document> {
        self.documents
    }
}

impl Deref for FoundDocuments {
    type Target = [Document];

    fn deref(&self) -> &Self::Target {
        &self.documents
    }
}

impl IntoIterator for FoundDocuments {
    type Item = Document;
    type IntoIter = std::vec::IntoIter<Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.into_iter()
    }
}

impl<'a> IntoIterator for &'a FoundDocuments {
    type Item = &'a Document;
    type IntoIter = std::slice::Iter<'a, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: Value) -> SearchResponseBody {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_empty_defaults() {
        let found = FoundDocuments::empty();
        assert_eq!(found.len(), 0);
        assert!(found.is_empty());
        assert_eq!(found.meta().total, 0);
        assert_eq!(found.meta().start, 0);
        assert!(found.meta().fields.is_empty());
    }

    #[test]
    fn test_from_search_response_uses_source() {
        let body = response(json!({
            "took": 2,
            "hits": {
                "total": {"value": 10, "relation": "eq"},
                "hits": [
                    {"_id": "1", "_score": 1.5, "_source": {"id": 1, "name": "bar"}},
                    {"_id": "2", "_score": 0.5, "_source": {"id": 2, "name": "baz"}}
                ]
            }
        }));

        let found = FoundDocuments::from_search_response(body, 5, vec![]);

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].get("name"), Some(&json!("bar")));
        assert_eq!(found[0].get("_score"), Some(&json!(1.5)));
        assert_eq!(found[1].get("_id"), Some(&json!("2")));
        assert_eq!(found.meta().total, 10);
        assert_eq!(found.meta().start, 5);
        assert_eq!(found.meta().took, Some(2.0));
        assert!(found.meta().fields.is_empty());
    }

    #[test]
    fn test_from_search_response_prefers_fields_projection() {
        let body = response(json!({
            "took": 1,
            "hits": {
                "total": 1,
                "hits": [
                    {"_id": "1", "_score": 2.0, "_source": {"name": "full", "extra": true}, "fields": {"name": "proj"}}
                ]
            }
        }));

        let found = FoundDocuments::from_search_response(body, 0, vec!["name".to_string()]);

        assert_eq!(found[0].get("name"), Some(&json!("proj")));
        assert!(found[0].get("extra").is_none());
        assert_eq!(found.meta().fields, vec!["name".to_string()]);
    }

    #[test]
    fn test_metadata_stays_off_documents() {
        let body = response(json!({
            "took": 1,
            "hits": {"total": 1, "hits": [{"_id": "1", "_score": 1.0, "_source": {"id": 1}}]}
        }));
        let found = FoundDocuments::from_search_response(body, 0, vec![]);

        for document in &found {
            assert!(document.get("total").is_none());
            assert!(document.get("took").is_none());
        }
        let ids: Vec<_> = found.iter().map(|d| d.get("id").cloned()).collect();
        assert_eq!(ids, vec![Some(json!(1))]);
    }
}
