//! This module defines the core data structures shared by the search sync crates.

pub mod document;
pub mod found_documents;
pub mod search_params;
pub mod search_response;

pub use document::Document;
pub use found_documents::{FoundDocuments, ResultMeta};
pub use search_params::SearchParams;
