//! # Search Sync Repository
//!
//! This crate keeps a search index in sync with a primary data store. It
//! provides the index client facade, the query-string translation of flat
//! collection parameters, chunked bulk execution, reference cascade indexing
//! and the OpenSearch transport underneath them.

pub mod chunks;
pub mod client;
pub mod config;
pub mod connection;
pub mod errors;
pub mod interfaces;
pub mod opensearch;
pub mod query_string;
pub mod references;
pub mod types;
pub mod utils;

pub use chunks::process_chunks;
pub use client::{Collection, IndexClient};
pub use config::{ConnectionSettings, SearchSyncConfig, Settings};
pub use connection::SearchConnection;
pub use errors::SearchIndexError;
pub use interfaces::SearchIndexProvider;
pub use crate::opensearch::OpenSearchProvider;
pub use references::{index_refs, ModelRegistry, ModelSource, ReferencingObject};
pub use types::{
    BatchOperationResult, BatchOperationSummary, BulkAction, BulkEnvelope, BulkLine, CountRequest,
    DocumentIds, GetSourceRequest, Lookup, MultiGetBody, MultiGetRequest, MultiGetTarget,
    SearchRequest, SourceFilter,
};
