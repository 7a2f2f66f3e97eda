//! OpenSearch implementation of the search index provider.
//!
//! `transport` holds the request adapter, `pool` the multi-node connection
//! pool with node sniffing, and `provider` the `SearchIndexProvider`
//! built on it.

pub mod pool;
pub mod provider;
pub mod transport;

pub use pool::{RoundRobinPool, Sniffer};
pub use provider::OpenSearchProvider;
pub use transport::{HttpMethod, RequestBody, Transport, TransportRequest, TransportResponse};
