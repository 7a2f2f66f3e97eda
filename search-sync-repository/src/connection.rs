//! Shared connection to the search engine.
//!
//! A `SearchConnection` is built once at startup from the settings map and
//! handed to every [`IndexClient`]. It is immutable after construction;
//! cloning it only clones the `Arc` around the provider.

use std::sync::Arc;

use tracing::info;

use crate::client::IndexClient;
use crate::config::{ConnectionSettings, SearchSyncConfig, Settings};
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::opensearch::OpenSearchProvider;

#[derive(Clone)]
pub struct SearchConnection {
    provider: Arc<dyn SearchIndexProvider>,
    config: SearchSyncConfig,
}

impl SearchConnection {
    /// Parse the settings map and connect to the configured hosts.
    ///
    /// # Arguments
    ///
    /// * `settings` - Flat settings map holding `elasticsearch.hosts` and friends
    ///
    /// # Returns
    ///
    /// * `Ok(SearchConnection)` - The shared connection
    /// * `Err(SearchIndexError::ConfigurationError)` - If the host list is missing or invalid
    pub fn setup(settings: &Settings) -> Result<Self, SearchIndexError> {
        let connection_settings = ConnectionSettings::from_settings(settings)?;
        let provider = OpenSearchProvider::new(&connection_settings)?;

        info!(
            default_index = %connection_settings.config.default_index,
            chunk_size = connection_settings.config.chunk_size,
            "Search connection ready"
        );

        Ok(Self::with_provider(
            Arc::new(provider),
            connection_settings.config,
        ))
    }

    /// Build a connection around an existing provider.
    pub fn with_provider(provider: Arc<dyn SearchIndexProvider>, config: SearchSyncConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider(&self) -> &Arc<dyn SearchIndexProvider> {
        &self.provider
    }

    pub fn config(&self) -> &SearchSyncConfig {
        &self.config
    }

    /// Index client for `source_type_name` using the connection defaults.
    pub fn client(&self, source_type_name: &str) -> IndexClient {
        IndexClient::new(self, source_type_name, None, None)
    }

    /// Index client with an explicit index name and/or chunk size.
    pub fn client_with(
        &self,
        source_type_name: &str,
        index_name: Option<&str>,
        chunk_size: Option<usize>,
    ) -> IndexClient {
        IndexClient::new(self, source_type_name, index_name, chunk_size)
    }

    /// Check that the cluster answers.
    pub async fn health_check(&self) -> Result<(), SearchIndexError> {
        self.provider.health_check().await
    }
}

impl std::fmt::Debug for SearchConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConnection")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HOSTS_KEY;

    #[test]
    fn test_setup_without_hosts_fails() {
        let err = SearchConnection::setup(&Settings::new()).unwrap_err();
        assert!(matches!(err, SearchIndexError::ConfigurationError(_)));
        assert!(err.to_string().contains("Bad or missing settings for elasticsearch"));
    }

    #[tokio::test]
    async fn test_setup_builds_clients_with_defaults() {
        let mut settings = Settings::new();
        settings.insert(HOSTS_KEY.to_string(), "127.0.0.1:9200".to_string());
        settings.insert("elasticsearch.index_name".to_string(), "stories".to_string());

        let connection = SearchConnection::setup(&settings).unwrap();
        let client = connection.client("Story");

        assert_eq!(client.doc_type(), "story");
        assert_eq!(client.index_name(), "stories");
        assert_eq!(client.chunk_size(), 100);

        let client = connection.client_with("Story", Some("archive"), Some(7));
        assert_eq!(client.index_name(), "archive");
        assert_eq!(client.chunk_size(), 7);
    }
}
