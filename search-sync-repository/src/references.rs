//! Reference cascade indexing.
//!
//! When an object changes, the documents it references may need re-indexing
//! too. Model types are resolved through a [`ModelRegistry`] built once at
//! startup; each registered type says whether it takes part in indexing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use search_sync_shared::SearchParams;

use crate::connection::SearchConnection;
use crate::errors::SearchIndexError;
use crate::types::BatchOperationSummary;

/// A model type the search index is fed from.
#[async_trait]
pub trait ModelSource: Send + Sync {
    /// Type name; lower-cased into the document-type label.
    fn type_name(&self) -> &str;

    /// Whether documents of this type are indexed at all.
    fn index_enabled(&self) -> bool;

    /// Documents of this type matching `params` (supports at least `_limit`).
    async fn get_collection(&self, params: &SearchParams) -> Result<Vec<Value>, SearchIndexError>;
}

/// An object that can list the documents it references, grouped by type.
pub trait ReferencingObject {
    fn get_reference_documents(&self) -> Vec<(String, Vec<Value>)>;
}

/// Type name to model mapping, resolved once at startup.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<dyn ModelSource>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model under its own type name, replacing any previous entry.
    pub fn register(&mut self, model: Arc<dyn ModelSource>) -> &mut Self {
        self.models.insert(model.type_name().to_string(), model);
        self
    }

    pub fn get(&self, type_name: &str) -> Option<&Arc<dyn ModelSource>> {
        self.models.get(type_name)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.type_names())
            .finish()
    }
}

/// Index every document batch `object` references, skipping types that have
/// indexing disabled.
///
/// Types missing from the registry are skipped with a warning.
///
/// # Returns
///
/// * `Ok(BatchOperationSummary)` - Combined summary over every indexed batch
/// * `Err(SearchIndexError)` - The first failing batch
pub async fn index_refs(
    object: &dyn ReferencingObject,
    registry: &ModelRegistry,
    connection: &SearchConnection,
) -> Result<BatchOperationSummary, SearchIndexError> {
    let mut summary = BatchOperationSummary::default();

    for (type_name, documents) in object.get_reference_documents() {
        let Some(model) = registry.get(&type_name) else {
            warn!(type_name = %type_name, "Referenced type is not registered, skipping");
            continue;
        };
        if !model.index_enabled() {
            debug!(type_name = %type_name, "Indexing disabled for referenced type");
            continue;
        }

        let client = connection.client(&type_name);
        summary.merge(client.index(&documents, None).await?);
    }

    Ok(summary)
}
