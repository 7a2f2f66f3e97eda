//! File-backed model sources.
//!
//! Each model is a JSON-lines file named after the model (`Story.jsonl`),
//! one document per line. Blank lines are skipped.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use search_sync_repository::utils::parse_usize_param;
use search_sync_repository::{ModelRegistry, ModelSource, SearchIndexError};
use search_sync_shared::document::scalar_to_string;
use search_sync_shared::types::search_params::ALL_SENTINEL;
use search_sync_shared::SearchParams;

use crate::SyncError;

/// File extension of model files.
pub const MODEL_FILE_EXTENSION: &str = "jsonl";

/// A model whose documents live in a JSON-lines file.
#[derive(Debug, Clone)]
pub struct JsonFileModel {
    name: String,
    path: PathBuf,
    index_enabled: bool,
}

impl JsonFileModel {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            index_enabled: true,
        }
    }

    pub fn with_index_enabled(mut self, enabled: bool) -> Self {
        self.index_enabled = enabled;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every `*.jsonl` file in `dir`, named after its file stem.
    pub fn discover(dir: &Path) -> Result<Vec<Self>, SyncError> {
        let mut models = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(MODEL_FILE_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                models.push(Self::new(name, path.clone()));
            }
        }
        models.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(models)
    }

    /// A registry holding every model discovered in `dir`.
    pub fn registry(dir: &Path) -> Result<ModelRegistry, SyncError> {
        let mut registry = ModelRegistry::new();
        for model in Self::discover(dir)? {
            registry.register(Arc::new(model));
        }
        Ok(registry)
    }

    async fn load(&self) -> Result<Vec<Value>, SearchIndexError> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SearchIndexError::configuration(format!(
                "Failed to read model file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(number, line)| {
                serde_json::from_str(line).map_err(|e| {
                    SearchIndexError::parse(format!(
                        "{}:{}: {}",
                        self.path.display(),
                        number + 1,
                        e
                    ))
                })
            })
            .collect()
    }
}

#[async_trait]
impl ModelSource for JsonFileModel {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn index_enabled(&self) -> bool {
        self.index_enabled
    }

    /// Documents matching every filter of `params`, capped at `_limit`.
    async fn get_collection(&self, params: &SearchParams) -> Result<Vec<Value>, SearchIndexError> {
        let limit = parse_usize_param(params, "_limit")?;
        let documents = self.load().await?;
        let total = documents.len();

        let selected: Vec<Value> = documents
            .into_iter()
            .filter(|document| matches_filters(document, params))
            .take(limit.unwrap_or(usize::MAX))
            .collect();

        debug!(model = %self.name, total, selected = selected.len(), "Loaded model documents");
        Ok(selected)
    }
}

/// Equality on top-level fields; a list filter matches any of its values.
fn matches_filters(document: &Value, params: &SearchParams) -> bool {
    params
        .filters()
        .filter(|(_, expected)| expected.as_str() != Some(ALL_SENTINEL))
        .all(|(field, expected)| {
            let Some(actual) = document.get(field.as_str()) else {
                return false;
            };
            let actual = scalar_to_string(actual);
            match expected {
                Value::Array(options) => options.iter().any(|o| scalar_to_string(o) == actual),
                other => scalar_to_string(other) == actual,
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_matches_filters() {
        let document = json!({"id": 1, "status": "draft", "rank": 3});

        assert!(matches_filters(&document, &SearchParams::new()));
        assert!(matches_filters(&document, &SearchParams::new().with("status", "draft")));
        assert!(matches_filters(&document, &SearchParams::new().with("rank", "3")));
        assert!(matches_filters(
            &document,
            &SearchParams::new().with("status", json!(["live", "draft"]))
        ));
        assert!(matches_filters(&document, &SearchParams::new().with("status", "_all")));
        assert!(matches_filters(&document, &SearchParams::new().with("_limit", 1)));
        assert!(!matches_filters(&document, &SearchParams::new().with("status", "live")));
        assert!(!matches_filters(&document, &SearchParams::new().with("missing", "x")));
    }

    #[test]
    fn test_new_model_is_index_enabled() {
        let model = JsonFileModel::new("Story", "/tmp/Story.jsonl");
        assert_eq!(model.type_name(), "Story");
        assert!(model.index_enabled());
        assert!(!model.with_index_enabled(false).index_enabled());
    }
}
