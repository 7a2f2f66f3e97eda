//! Multi-node connection pool and node sniffing.
//!
//! The `opensearch` client only ships a single-node pool, so requests are
//! spread over the configured hosts by [`RoundRobinPool`]. When sniffing is on,
//! [`Sniffer`] decides when the node list is stale and reseeds the pool from a
//! `GET /_nodes/http` response.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use opensearch::http::transport::{Connection, ConnectionPool};
use serde_json::Value;
use url::Url;

use crate::errors::SearchIndexError;

/// Path answering with the HTTP publish address of every node.
pub const NODES_HTTP_PATH: &str = "/_nodes/http";

#[derive(Debug, Clone)]
struct Node {
    url: Url,
    connection: Connection,
}

impl Node {
    fn new(url: Url) -> Self {
        Self {
            connection: Connection::new(url.clone()),
            url,
        }
    }
}

/// Round-robin pool over a replaceable node list.
///
/// Clones share the node list and the cursor, so the copy handed to the
/// transport sees every reseed made through the provider's copy.
#[derive(Debug, Clone)]
pub struct RoundRobinPool {
    nodes: Arc<RwLock<Vec<Node>>>,
    next: Arc<AtomicUsize>,
}

impl RoundRobinPool {
    /// Create a pool over `hosts`, in order.
    ///
    /// # Returns
    ///
    /// * `Ok(RoundRobinPool)` - A pool starting at the first host
    /// * `Err(SearchIndexError::ConfigurationError)` - If `hosts` is empty
    pub fn new(hosts: Vec<Url>) -> Result<Self, SearchIndexError> {
        if hosts.is_empty() {
            return Err(SearchIndexError::configuration(
                "Connection pool needs at least one host",
            ));
        }
        Ok(Self {
            nodes: Arc::new(RwLock::new(hosts.into_iter().map(Node::new).collect())),
            next: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Current node URLs.
    pub fn urls(&self) -> Vec<Url> {
        self.read_nodes().iter().map(|node| node.url.clone()).collect()
    }

    /// URL of the node the next request goes to. Advances the cursor.
    pub fn next_url(&self) -> Url {
        self.next_node().url
    }

    /// Swap in a new node list. An empty list is ignored.
    ///
    /// Returns whether the list was replaced.
    pub fn replace_nodes(&self, hosts: Vec<Url>) -> bool {
        if hosts.is_empty() {
            return false;
        }
        let mut nodes = self.nodes.write().unwrap_or_else(|e| e.into_inner());
        *nodes = hosts.into_iter().map(Node::new).collect();
        true
    }

    fn read_nodes(&self) -> std::sync::RwLockReadGuard<'_, Vec<Node>> {
        self.nodes.read().unwrap_or_else(|e| e.into_inner())
    }

    fn next_node(&self) -> Node {
        let nodes = self.read_nodes();
        // Never empty: construction and replacement both refuse an empty list
        let position = self.next.fetch_add(1, Ordering::Relaxed) % nodes.len();
        nodes[position].clone()
    }
}

impl ConnectionPool for RoundRobinPool {
    fn next(&self) -> Connection {
        self.next_node().connection
    }
}

/// Tracks when the node list was last refreshed.
#[derive(Debug)]
pub struct Sniffer {
    pool: RoundRobinPool,
    scheme: String,
    interval: Duration,
    last_sniff: Mutex<Option<Instant>>,
}

impl Sniffer {
    /// A sniffer that is due immediately, so the first request reseeds.
    pub fn new(pool: RoundRobinPool, scheme: impl Into<String>, interval: Duration) -> Self {
        Self {
            pool,
            scheme: scheme.into(),
            interval,
            last_sniff: Mutex::new(None),
        }
    }

    pub fn pool(&self) -> &RoundRobinPool {
        &self.pool
    }

    /// Whether the node list should be refreshed at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        match *self.last_sniff.lock().unwrap_or_else(|e| e.into_inner()) {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    /// Record a refresh attempt at `now`.
    pub fn mark_sniffed(&self, now: Instant) {
        *self.last_sniff.lock().unwrap_or_else(|e| e.into_inner()) = Some(now);
    }

    /// Force a refresh on the next request, after a failed one.
    pub fn mark_stale(&self) {
        *self.last_sniff.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Reseed the pool from a `/_nodes/http` body.
    ///
    /// Returns the number of nodes now in the pool, or zero when the body
    /// named none and the current list was kept.
    pub fn reseed_from(&self, body: &Value) -> usize {
        let hosts = parse_nodes_http(body, &self.scheme);
        let count = hosts.len();
        if self.pool.replace_nodes(hosts) {
            count
        } else {
            0
        }
    }
}

/// Node URLs from a `/_nodes/http` body.
///
/// `publish_address` is either `ip:port` or `hostname/ip:port`; the hostname
/// wins when present. Nodes without HTTP enabled are skipped.
pub fn parse_nodes_http(body: &Value, scheme: &str) -> Vec<Url> {
    let Some(nodes) = body.get("nodes").and_then(Value::as_object) else {
        return Vec::new();
    };

    nodes
        .values()
        .filter_map(|node| {
            node.get("http")
                .and_then(|http| http.get("publish_address"))
                .and_then(Value::as_str)
        })
        .filter_map(|address| {
            let address = match address.split_once('/') {
                Some((host, ip_and_port)) if !host.is_empty() => {
                    match ip_and_port.rsplit_once(':') {
                        Some((_, port)) => format!("{}:{}", host, port),
                        None => host.to_string(),
                    }
                }
                Some((_, ip_and_port)) => ip_and_port.to_string(),
                None => address.to_string(),
            };
            Url::parse(&format!("{}://{}", scheme, address)).ok()
        })
        .collect()
}
