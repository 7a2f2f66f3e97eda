//! Connection settings for the search engine.
//!
//! Settings arrive as a flat `key -> string` map (`elasticsearch.hosts`,
//! `elasticsearch.sniff`, ...) supplied by the host application. They are
//! parsed once, at setup, into [`ConnectionSettings`].

use std::collections::HashMap;
use std::time::Duration;

use url::Url;

use crate::errors::SearchIndexError;

/// Default number of documents per bulk request.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Index used when neither the settings nor the caller name one.
pub const DEFAULT_INDEX_NAME: &str = "default";

/// How often the node list is reseeded when sniffing is enabled.
pub const DEFAULT_SNIFF_INTERVAL_SECS: u64 = 60;

pub const HOSTS_KEY: &str = "elasticsearch.hosts";
pub const SNIFF_KEY: &str = "elasticsearch.sniff";
pub const INDEX_NAME_KEY: &str = "elasticsearch.index_name";
pub const CHUNK_SIZE_KEY: &str = "elasticsearch.chunk_size";
pub const TIMEOUT_KEY: &str = "elasticsearch.timeout_secs";
pub const SNIFF_INTERVAL_KEY: &str = "elasticsearch.sniff_interval_secs";

const BAD_SETTINGS_MESSAGE: &str = "Bad or missing settings for elasticsearch";

/// Flat settings map as supplied by the host application.
pub type Settings = HashMap<String, String>;

/// Defaults shared by every index client created from one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSyncConfig {
    /// Index name used when a client is created without one.
    pub default_index: String,

    /// Documents per bulk request when a call does not override it.
    pub chunk_size: usize,
}

impl Default for SearchSyncConfig {
    fn default() -> Self {
        Self {
            default_index: DEFAULT_INDEX_NAME.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl SearchSyncConfig {
    /// Create a config with a custom default index.
    pub fn with_default_index(mut self, index: impl Into<String>) -> Self {
        self.default_index = index.into();
        self
    }

    /// Create a config with a custom chunk size.
    ///
    /// A chunk size of zero is treated as one.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

/// Parsed connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    /// Node URLs, in configuration order.
    pub hosts: Vec<Url>,

    /// Whether the node list is discovered from the cluster.
    pub sniff: bool,

    /// Reseed frequency when `sniff` is on.
    pub sniff_interval: Duration,

    /// Per-request timeout. `None` leaves it to the transport.
    pub timeout: Option<Duration>,

    pub config: SearchSyncConfig,
}

impl ConnectionSettings {
    /// Parse settings from the flat settings map.
    ///
    /// # Arguments
    ///
    /// * `settings` - Map holding at least `elasticsearch.hosts`
    ///
    /// # Returns
    ///
    /// * `Ok(ConnectionSettings)` - Validated settings
    /// * `Err(SearchIndexError::ConfigurationError)` - If the host list is absent,
    ///   empty or unparsable, or a numeric setting is invalid
    pub fn from_settings(settings: &Settings) -> Result<Self, SearchIndexError> {
        let hosts_value = settings
            .get(HOSTS_KEY)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SearchIndexError::configuration(BAD_SETTINGS_MESSAGE))?;

        let hosts = hosts_value
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(parse_host)
            .collect::<Result<Vec<_>, _>>()?;

        if hosts.is_empty() {
            return Err(SearchIndexError::configuration(BAD_SETTINGS_MESSAGE));
        }

        let sniff = match settings.get(SNIFF_KEY) {
            Some(value) => parse_bool(SNIFF_KEY, value)?,
            None => false,
        };

        let sniff_interval = Duration::from_secs(
            parse_number(settings, SNIFF_INTERVAL_KEY)?.unwrap_or(DEFAULT_SNIFF_INTERVAL_SECS),
        );

        let timeout = parse_number(settings, TIMEOUT_KEY)?.map(Duration::from_secs);

        let mut config = SearchSyncConfig::default();
        if let Some(index) = settings.get(INDEX_NAME_KEY).map(|s| s.trim()).filter(|s| !s.is_empty()) {
            config.default_index = index.to_string();
        }
        if let Some(chunk_size) = parse_number(settings, CHUNK_SIZE_KEY)? {
            if chunk_size == 0 {
                return Err(SearchIndexError::configuration(format!(
                    "{} must be greater than zero",
                    CHUNK_SIZE_KEY
                )));
            }
            config.chunk_size = chunk_size as usize;
        }

        Ok(Self {
            hosts,
            sniff,
            sniff_interval,
            timeout,
            config,
        })
    }
}

/// Turn `host:port` (or a full URL) into a URL, defaulting the scheme to http.
fn parse_host(host: &str) -> Result<Url, SearchIndexError> {
    let candidate = if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    };

    Url::parse(&candidate).map_err(|e| {
        SearchIndexError::configuration(format!("{}: invalid host '{}': {}", BAD_SETTINGS_MESSAGE, host, e))
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, SearchIndexError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" | "" => Ok(false),
        other => Err(SearchIndexError::configuration(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

fn parse_number(settings: &Settings, key: &str) -> Result<Option<u64>, SearchIndexError> {
    match settings.get(key).map(|s| s.trim()).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => value.parse::<u64>().map(Some).map_err(|_| {
            SearchIndexError::configuration(format!("{} must be a number, got '{}'", key, value))
        }),
    }
}
