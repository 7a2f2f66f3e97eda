//! Error types for the search sync repository.
//!
//! This module provides a unified error type for all index client operations.

mod search_index_error;

pub use search_index_error::SearchIndexError;
