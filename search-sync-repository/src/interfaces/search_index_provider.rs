//! Search index provider trait definition.
//!
//! This module defines the abstract interface for the raw search engine calls
//! the index client is built on.

use async_trait::async_trait;

use search_sync_shared::{Document, MultiGetResponseBody, SearchResponseBody};

use crate::errors::SearchIndexError;
use crate::types::{
    BatchOperationSummary, BulkLine, CountRequest, GetSourceRequest, Lookup, MultiGetRequest,
    SearchRequest,
};

/// Abstracts the underlying search engine.
///
/// Implementations are shared by every `IndexClient` created from one
/// `SearchConnection`, so they must be safe to call concurrently.
///
/// # Missing indices
///
/// Read methods return [`Lookup::IndexAbsent`] when the target index does not
/// exist. They never turn that condition into an error; the index client
/// decides per call whether an absent index means "empty" or "not found".
/// Every other failure is returned as `SearchIndexError::BadRequest` carrying
/// the engine's detail.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Send one bulk request.
    ///
    /// `lines` is the flattened envelope/document sequence: every
    /// [`BulkLine::Action`] is followed by its [`BulkLine::Source`] for index
    /// actions and stands alone for delete actions.
    ///
    /// # Returns
    ///
    /// * `Ok(BatchOperationSummary)` - One result per action, in request order
    /// * `Err(SearchIndexError)` - If the request as a whole failed
    async fn bulk(&self, lines: &[BulkLine]) -> Result<BatchOperationSummary, SearchIndexError>;

    /// Fetch several documents by id in one round trip.
    async fn multi_get(
        &self,
        request: &MultiGetRequest,
    ) -> Result<Lookup<MultiGetResponseBody>, SearchIndexError>;

    /// Run a search.
    async fn search(
        &self,
        request: &SearchRequest,
    ) -> Result<Lookup<SearchResponseBody>, SearchIndexError>;

    /// Count the documents matching the request body.
    async fn count(&self, request: &CountRequest) -> Result<Lookup<u64>, SearchIndexError>;

    /// Fetch the stored source of one document.
    ///
    /// # Returns
    ///
    /// * `Ok(Lookup::Found(Some(doc)))` - The stored source
    /// * `Ok(Lookup::Found(None))` - The index exists but the document does not
    /// * `Ok(Lookup::IndexAbsent)` - The index does not exist
    async fn get_source(
        &self,
        request: &GetSourceRequest,
    ) -> Result<Lookup<Option<Document>>, SearchIndexError>;

    /// Check that the cluster answers.
    async fn health_check(&self) -> Result<(), SearchIndexError>;
}
