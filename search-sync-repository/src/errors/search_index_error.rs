//! Search index error types.
//!
//! One error type covers configuration, transport and caller mistakes. Each
//! variant maps onto the response status a web collaborator should render.

use thiserror::Error;

/// Message used when a read path hits a missing index under "raise on empty".
pub const INDEX_MISSING_MESSAGE: &str = "resource not found (Index does not exist)";

/// Unified errors from index client operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SearchIndexError {
    /// Missing or invalid connection settings. Fatal at setup.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Failed to build the connection to the search engine.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The target index does not exist and the caller asked to be told.
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// The query matched nothing and the caller asked to be told.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed call or a transport failure translated for the caller.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A document of the wrong shape was handed to a bulk operation.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The engine rejected a single item of a bulk request.
    #[error("Bulk index error: {0}")]
    BulkIndexError(String),

    /// Failed to decode a response body.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to encode a request body.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl SearchIndexError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::ConfigurationError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create an index-not-found error with the standard message.
    pub fn index_not_found() -> Self {
        Self::IndexNotFound(INDEX_MISSING_MESSAGE.to_string())
    }

    /// Create a not-found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a bad request error.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a bulk index error.
    pub fn bulk_index(msg: impl Into<String>) -> Self {
        Self::BulkIndexError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// HTTP status a web layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::IndexNotFound(_) | Self::NotFound(_) => 404,
            Self::BadRequest(_)
            | Self::ValidationError(_)
            | Self::ParseError(_)
            | Self::SerializationError(_) => 400,
            Self::ConfigurationError(_) | Self::ConnectionError(_) | Self::BulkIndexError(_) => 500,
        }
    }

    /// Returns true for the two "nothing there" variants.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::IndexNotFound(_) | Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_not_found_message() {
        let err = SearchIndexError::index_not_found();
        assert_eq!(
            err.to_string(),
            "Index not found: resource not found (Index does not exist)"
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(SearchIndexError::not_found("x").http_status(), 404);
        assert_eq!(SearchIndexError::index_not_found().http_status(), 404);
        assert_eq!(SearchIndexError::bad_request("Missing _limit").http_status(), 400);
        assert_eq!(SearchIndexError::validation("bad doc").http_status(), 400);
        assert_eq!(SearchIndexError::configuration("no hosts").http_status(), 500);
    }
}
