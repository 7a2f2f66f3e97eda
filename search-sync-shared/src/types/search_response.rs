//! Response bodies returned by the search engine.
//!
//! Only the parts the sync client reads are modelled. Unknown fields are ignored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of a `_search` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchResponseBody {
    /// Time the engine spent on the query, in milliseconds. Some engines and
    /// proxies report fractions.
    #[serde(default)]
    pub took: Option<f64>,
    #[serde(default)]
    pub hits: SearchHits,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchHits {
    #[serde(default)]
    pub total: Option<HitsTotal>,
    #[serde(default)]
    pub hits: Vec<SearchHit>,
}

/// Total hit count. Older engines report a bare number, newer ones an object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum HitsTotal {
    Count(u64),
    Object {
        value: u64,
        #[serde(default)]
        relation: Option<String>,
    },
}

impl HitsTotal {
    pub fn value(&self) -> u64 {
        match self {
            HitsTotal::Count(value) => *value,
            HitsTotal::Object { value, .. } => *value,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Option<Map<String, Value>>,
    #[serde(default)]
    pub fields: Option<Map<String, Value>>,
}

/// Body of an `_mget` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MultiGetResponseBody {
    #[serde(default)]
    pub docs: Vec<MultiGetDoc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MultiGetDoc {
    #[serde(rename = "_index", default)]
    pub index: Option<String>,
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    /// Missing when the entry failed (e.g. its index does not exist).
    #[serde(default)]
    pub found: Option<bool>,
    #[serde(rename = "_source", default)]
    pub source: Option<Map<String, Value>>,
    #[serde(default)]
    pub fields: Option<Map<String, Value>>,
}

impl MultiGetDoc {
    /// Only an explicit `found: true` counts as present.
    pub fn is_found(&self) -> bool {
        self.found.unwrap_or(false)
    }
}

/// Body of a `_count` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CountResponseBody {
    pub count: u64,
}
