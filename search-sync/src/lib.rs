//! # Search Sync
//!
//! Bulk reindexing of model sources into the search index.
//!
//! ## Modules
//!
//! - [`config`]: Environment settings and connection wiring
//! - [`models`]: File-backed model sources
//! - [`reindex`]: The reindex command

pub mod config;
pub mod models;
pub mod reindex;

pub use config::Dependencies;
pub use models::JsonFileModel;
pub use reindex::{ModelReport, ReindexArgs, ReindexCommand};

use search_sync_repository::SearchIndexError;
use thiserror::Error;

/// Errors that can occur while wiring up or running a reindex.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A model name with no registered source.
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// Search index error.
    #[error("Search index error: {0}")]
    SearchIndex(#[from] SearchIndexError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn unknown_model(name: impl Into<String>) -> Self {
        Self::UnknownModel(name.into())
    }
}
