//! The reindex command.
//!
//! Loads each requested model's collection and pushes it into the search
//! index. By default only documents the index does not hold yet are sent;
//! `--force` sends everything.

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, instrument};

use search_sync_repository::utils::parse_usize_param;
use search_sync_repository::{
    BatchOperationSummary, IndexClient, ModelRegistry, SearchConnection,
};
use search_sync_shared::types::search_params::split_strip;
use search_sync_shared::SearchParams;

use crate::SyncError;

/// `_limit` applied to each model's collection when `--params` sets none.
pub const DEFAULT_COLLECTION_LIMIT: usize = 10_000;

#[derive(Parser, Debug, Clone)]
#[command(name = "search-sync")]
#[command(about = "Index model collections into the search index", long_about = None)]
pub struct ReindexArgs {
    /// Comma-separated list of model names to index
    #[arg(long)]
    pub models: String,

    /// Url-encoded params for each model
    #[arg(long)]
    pub params: Option<String>,

    /// Index name
    #[arg(long)]
    pub index: Option<String>,

    /// Index chunk size
    #[arg(long)]
    pub chunk: Option<usize>,

    /// Force reindexing of all documents. By default, only documents that are
    /// missing from the index are indexed.
    #[arg(long, default_value_t = false)]
    pub force: bool,

    /// Quiet mode
    #[arg(long, default_value_t = false)]
    pub quiet: bool,

    /// Directory holding one `<Model>.jsonl` file per model
    #[arg(long, env = "SEARCH_SYNC_MODELS_DIR", default_value = "models")]
    pub models_dir: PathBuf,
}

/// Outcome for one model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelReport {
    pub model: String,
    pub documents: usize,
    pub summary: BatchOperationSummary,
}

pub struct ReindexCommand {
    args: ReindexArgs,
}

impl ReindexCommand {
    pub fn new(args: ReindexArgs) -> Self {
        Self { args }
    }

    /// Collection params: `--params` with `_limit` defaulting to 10000.
    pub fn collection_params(&self) -> SearchParams {
        let mut params = self
            .args
            .params
            .as_deref()
            .map(SearchParams::from_query_string)
            .unwrap_or_default();
        if !params.contains_key("_limit") {
            params.insert("_limit", DEFAULT_COLLECTION_LIMIT);
        }
        params
    }

    /// `--chunk`, otherwise the collection `_limit`.
    pub fn chunk_size(&self, params: &SearchParams) -> Result<usize, SyncError> {
        match self.args.chunk {
            Some(chunk) => Ok(chunk),
            None => Ok(parse_usize_param(params, "_limit")?.unwrap_or(DEFAULT_COLLECTION_LIMIT)),
        }
    }

    /// Reindex every model named in `--models`, in order.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<ModelReport>)` - One report per model
    /// * `Err(SyncError)` - An unknown model, or the first failing model
    #[instrument(skip(self, connection, registry), fields(models = %self.args.models, force = self.args.force))]
    pub async fn run(
        &self,
        connection: &SearchConnection,
        registry: &ModelRegistry,
    ) -> Result<Vec<ModelReport>, SyncError> {
        let params = self.collection_params();
        let chunk_size = self.chunk_size(&params)?;
        let mut reports = Vec::new();

        for model_name in split_strip(&self.args.models) {
            let model = registry
                .get(&model_name)
                .ok_or_else(|| SyncError::unknown_model(&model_name))?;

            let documents = model.get_collection(&params).await?;
            let client = IndexClient::new(
                connection,
                &model_name,
                self.args.index.as_deref(),
                Some(chunk_size),
            );

            let summary = if self.args.force {
                client.index(&documents, Some(chunk_size)).await?
            } else {
                client
                    .index_missing_documents(&documents, Some(chunk_size))
                    .await?
            };

            info!(
                model = %model_name,
                index = %client.index_name(),
                documents = documents.len(),
                indexed = summary.succeeded,
                failed = summary.failed,
                "Model reindexed"
            );
            reports.push(ModelReport {
                model: model_name,
                documents: documents.len(),
                summary,
            });
        }

        Ok(reports)
    }
}
