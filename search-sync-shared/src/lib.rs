//! # Search Sync Shared
//!
//! This crate defines shared data structures used across the search sync crates.
//! It includes the loosely-typed document representation, the order-preserving
//! search parameter map, the result wrapper returned by read operations, and the
//! typed response bodies the search engine hands back.

pub mod types;

pub use types::document::{self, Document};
pub use types::found_documents::{FoundDocuments, ResultMeta};
pub use types::search_params::SearchParams;
pub use types::search_response::{
    CountResponseBody, HitsTotal, MultiGetDoc, MultiGetResponseBody, SearchHit, SearchHits,
    SearchResponseBody,
};
