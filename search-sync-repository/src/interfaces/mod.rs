//! Interface definitions for the search index provider.
//!
//! This module defines the abstract `SearchIndexProvider` trait that lets the
//! index client run against OpenSearch or against an in-memory test double.

mod search_index_provider;

pub use search_index_provider::SearchIndexProvider;
