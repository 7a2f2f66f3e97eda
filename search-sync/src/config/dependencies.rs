//! Dependency initialization and wiring for the reindex binary.

use std::env;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::models::JsonFileModel;
use crate::SyncError;
use search_sync_repository::config::{
    CHUNK_SIZE_KEY, HOSTS_KEY, INDEX_NAME_KEY, SNIFF_INTERVAL_KEY, SNIFF_KEY, TIMEOUT_KEY,
};
use search_sync_repository::{ModelRegistry, SearchConnection, Settings};

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// Environment variables and the settings keys they fill.
const SETTING_VARS: &[(&str, &str)] = &[
    ("ELASTICSEARCH_HOSTS", HOSTS_KEY),
    ("ELASTICSEARCH_SNIFF", SNIFF_KEY),
    ("ELASTICSEARCH_INDEX_NAME", INDEX_NAME_KEY),
    ("ELASTICSEARCH_CHUNK_SIZE", CHUNK_SIZE_KEY),
    ("ELASTICSEARCH_TIMEOUT_SECS", TIMEOUT_KEY),
    ("ELASTICSEARCH_SNIFF_INTERVAL_SECS", SNIFF_INTERVAL_KEY),
];

/// Connection mode for the search cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry until the cluster answers.
    Retry,
}

impl ConnectionMode {
    /// Parse a connection mode.
    ///
    /// Valid values: "fail-fast" or "retry" (case-insensitive).
    /// Anything else falls back to "retry".
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            _ => {
                warn!(value = %value, "Invalid OPENSEARCH_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }

    fn from_env() -> Self {
        env::var("OPENSEARCH_CONNECTION_MODE")
            .map(|value| Self::parse(&value))
            .unwrap_or(Self::Retry)
    }
}

/// Build the settings map from environment-style variables.
///
/// Unset or blank variables are left out, so the connection defaults apply.
///
/// # Example
///
/// ```
/// use search_sync::config::settings_from_vars;
///
/// let settings = settings_from_vars(|name| match name {
///     "ELASTICSEARCH_HOSTS" => Some("localhost:9200".to_string()),
///     _ => None,
/// });
/// assert_eq!(settings.get("elasticsearch.hosts").map(String::as_str), Some("localhost:9200"));
/// assert_eq!(settings.len(), 1);
/// ```
pub fn settings_from_vars(lookup: impl Fn(&str) -> Option<String>) -> Settings {
    SETTING_VARS
        .iter()
        .filter_map(|(var, key)| {
            lookup(var)
                .filter(|value| !value.trim().is_empty())
                .map(|value| (key.to_string(), value))
        })
        .collect()
}

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The shared search connection.
    pub connection: SearchConnection,
    /// Model sources available to the reindex command.
    pub registry: ModelRegistry,
}

impl Dependencies {
    /// Initialize all dependencies from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `ELASTICSEARCH_HOSTS`: Comma separated `host:port` list (required)
    /// - `ELASTICSEARCH_SNIFF`: Reseed the node list periodically (default: false)
    /// - `ELASTICSEARCH_INDEX_NAME`: Default index name (default: "default")
    /// - `ELASTICSEARCH_CHUNK_SIZE`: Default bulk chunk size (default: 100)
    /// - `ELASTICSEARCH_TIMEOUT_SECS`: Per-request timeout (default: none)
    /// - `ELASTICSEARCH_SNIFF_INTERVAL_SECS`: Reseed frequency (default: 60)
    /// - `OPENSEARCH_CONNECTION_MODE`: Connection mode - "fail-fast" or "retry" (default: retry)
    /// - `OPENSEARCH_RETRY_INTERVAL_SECS`: Retry interval in seconds (default: 15)
    ///
    /// # Arguments
    ///
    /// * `models_dir` - Directory holding one `<Model>.jsonl` file per model
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(SyncError)` - Bad settings, unreadable models, or no connection in fail-fast mode
    pub async fn new(models_dir: &Path) -> Result<Self, SyncError> {
        let settings = settings_from_vars(|name| env::var(name).ok());
        let connection_mode = ConnectionMode::from_env();
        let retry_interval = env::var("OPENSEARCH_RETRY_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_INTERVAL_SECS);

        info!(
            hosts = settings.get(HOSTS_KEY).map(String::as_str).unwrap_or(""),
            connection_mode = ?connection_mode,
            retry_interval_secs = retry_interval,
            models_dir = %models_dir.display(),
            "Initializing dependencies"
        );

        let connection = SearchConnection::setup(&settings)
            .map_err(|e| SyncError::config(format!("Invalid search settings: {}", e)))?;
        let connection = Self::wait_until_healthy(
            connection,
            connection_mode,
            Duration::from_secs(retry_interval),
        )
        .await?;

        info!("Search index connection established");

        let registry = JsonFileModel::registry(models_dir)?;
        info!(models = ?registry.type_names(), "Model sources loaded");

        Ok(Self {
            connection,
            registry,
        })
    }

    /// Health-check `connection`, retrying according to `mode`.
    pub async fn wait_until_healthy(
        connection: SearchConnection,
        mode: ConnectionMode,
        retry_interval: Duration,
    ) -> Result<SearchConnection, SyncError> {
        loop {
            match connection.health_check().await {
                Ok(()) => return Ok(connection),
                Err(e) => match mode {
                    ConnectionMode::FailFast => {
                        return Err(SyncError::config(format!(
                            "Failed to connect to the search cluster: {}",
                            e
                        )));
                    }
                    ConnectionMode::Retry => {
                        warn!(
                            error = %e,
                            retry_interval_secs = retry_interval.as_secs(),
                            "Failed to connect to the search cluster, retrying..."
                        );
                        sleep(retry_interval).await;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use search_sync_repository::{
        BatchOperationSummary, BulkLine, CountRequest, GetSourceRequest, Lookup, MultiGetRequest,
        SearchIndexError, SearchIndexProvider, SearchRequest, SearchSyncConfig,
    };
    use search_sync_shared::{Document, MultiGetResponseBody, SearchResponseBody};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Provider whose health check fails a fixed number of times.
    struct FlakyProvider {
        failures_left: AtomicUsize,
        checks: AtomicUsize,
    }

    impl FlakyProvider {
        fn new(failures: usize) -> Self {
            Self {
                failures_left: AtomicUsize::new(failures),
                checks: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SearchIndexProvider for FlakyProvider {
        async fn bulk(&self, _lines: &[BulkLine]) -> Result<BatchOperationSummary, SearchIndexError> {
            Ok(BatchOperationSummary::default())
        }

        async fn multi_get(
            &self,
            _request: &MultiGetRequest,
        ) -> Result<Lookup<MultiGetResponseBody>, SearchIndexError> {
            Ok(Lookup::IndexAbsent)
        }

        async fn search(
            &self,
            _request: &SearchRequest,
        ) -> Result<Lookup<SearchResponseBody>, SearchIndexError> {
            Ok(Lookup::IndexAbsent)
        }

        async fn count(&self, _request: &CountRequest) -> Result<Lookup<u64>, SearchIndexError> {
            Ok(Lookup::Found(0))
        }

        async fn get_source(
            &self,
            _request: &GetSourceRequest,
        ) -> Result<Lookup<Option<Document>>, SearchIndexError> {
            Ok(Lookup::IndexAbsent)
        }

        async fn health_check(&self) -> Result<(), SearchIndexError> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(SearchIndexError::connection("connection refused"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_connection_mode_parse() {
        assert_eq!(ConnectionMode::parse("fail-fast"), ConnectionMode::FailFast);
        assert_eq!(ConnectionMode::parse("FAIL_FAST"), ConnectionMode::FailFast);
        assert_eq!(ConnectionMode::parse("retry"), ConnectionMode::Retry);
        assert_eq!(ConnectionMode::parse("sometimes"), ConnectionMode::Retry);
    }

    #[test]
    fn test_settings_from_vars_maps_every_key() {
        let settings = settings_from_vars(|name| match name {
            "ELASTICSEARCH_HOSTS" => Some("es1:9200,es2:9200".to_string()),
            "ELASTICSEARCH_SNIFF" => Some("true".to_string()),
            "ELASTICSEARCH_INDEX_NAME" => Some("stories".to_string()),
            "ELASTICSEARCH_CHUNK_SIZE" => Some("50".to_string()),
            "ELASTICSEARCH_TIMEOUT_SECS" => Some(" ".to_string()),
            _ => None,
        });

        assert_eq!(settings.get(HOSTS_KEY).unwrap(), "es1:9200,es2:9200");
        assert_eq!(settings.get(SNIFF_KEY).unwrap(), "true");
        assert_eq!(settings.get(INDEX_NAME_KEY).unwrap(), "stories");
        assert_eq!(settings.get(CHUNK_SIZE_KEY).unwrap(), "50");
        assert!(!settings.contains_key(TIMEOUT_KEY));
        assert!(!settings.contains_key(SNIFF_INTERVAL_KEY));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_healthy_retries() {
        let provider = Arc::new(FlakyProvider::new(2));
        let connection = SearchConnection::with_provider(provider.clone(), SearchSyncConfig::default());

        let result =
            Dependencies::wait_until_healthy(connection, ConnectionMode::Retry, Duration::from_secs(15))
                .await;

        assert!(result.is_ok());
        assert_eq!(provider.checks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wait_until_healthy_fail_fast() {
        let provider = Arc::new(FlakyProvider::new(1));
        let connection = SearchConnection::with_provider(provider.clone(), SearchSyncConfig::default());

        let result = Dependencies::wait_until_healthy(
            connection,
            ConnectionMode::FailFast,
            Duration::from_secs(15),
        )
        .await;

        assert!(matches!(result, Err(SyncError::ConfigError(_))));
        assert_eq!(provider.checks.load(Ordering::SeqCst), 1);
    }
}
