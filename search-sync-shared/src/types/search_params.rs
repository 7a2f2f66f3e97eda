//! Collection query parameters.
//!
//! Callers describe collection queries as flat key/value parameters. Keys that
//! start with an underscore are control keys (`_limit`, `_sort`, ...), keys
//! wrapped in double underscores (`__raise__`) are internal flags, and every
//! other key is a field filter. Iteration order is insertion order, since the
//! rendered query string must be deterministic.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::document::scalar_to_string;

/// Control keys that never become filter clauses.
pub const RESERVED_KEYS: &[&str] = &[
    "_limit",
    "_page",
    "_start",
    "_sort",
    "_fields",
    "_search_fields",
    "_raw_terms",
    "_count",
    "body",
];

/// Internal flag selecting between "raise" and "return empty" on read paths.
pub const RAISE_ON_EMPTY_KEY: &str = "__raise_on_empty";

/// Public spelling of [`RAISE_ON_EMPTY_KEY`] accepted by `get`.
pub const RAISE_KEY: &str = "__raise";

/// Filter value meaning "do not filter on this field".
pub const ALL_SENTINEL: &str = "_all";

/// Returns true for keys of the form `__name` / `__name__`.
pub fn is_dunder(key: &str) -> bool {
    key.len() > 2 && key.starts_with("__")
}

/// Split a comma separated list, trimming whitespace and dropping empty items.
pub fn split_strip(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Interpret a boolean-like value (`true`, `"yes"`, `"1"`, ...).
pub fn as_bool_like(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Order-preserving parameter map for collection queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchParams(Map<String, Value>);

impl SearchParams {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert.
    ///
    /// # Example
    ///
    /// ```
    /// use search_sync_shared::SearchParams;
    ///
    /// let params = SearchParams::new().with("foo", 1).with("_limit", 10);
    /// assert_eq!(params.len(), 2);
    /// ```
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a parameter. Replacing keeps the original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    /// A parameter rendered as a string; `None` for absent or null values.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.0.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => Some(scalar_to_string(value)),
        }
    }

    /// A comma separated parameter (or a JSON array) as a list of trimmed items.
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        match self.0.get(key)? {
            Value::Null => None,
            Value::Array(items) => Some(
                items
                    .iter()
                    .map(scalar_to_string)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
            other => Some(split_strip(&scalar_to_string(other))),
        }
    }

    /// A boolean-like flag, falling back to `default` when absent or unparsable.
    pub fn flag(&self, key: &str, default: bool) -> bool {
        self.0.get(key).and_then(as_bool_like).unwrap_or(default)
    }

    /// Whether a read path should fail instead of returning an empty result.
    pub fn raise_on_empty(&self, default: bool) -> bool {
        self.flag(RAISE_ON_EMPTY_KEY, default)
    }

    /// Returns true when `key` is a control key or an internal flag.
    pub fn is_reserved(key: &str) -> bool {
        RESERVED_KEYS.contains(&key) || is_dunder(key)
    }

    /// Field filters in insertion order, skipping control keys and internal flags.
    pub fn filters(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter().filter(|(key, _)| !Self::is_reserved(key))
    }

    /// Parse a url-encoded parameter string such as `_limit=10&status=active`.
    ///
    /// Values stay strings. Repeated keys collect into a list, in order.
    ///
    /// # Example
    ///
    /// ```
    /// use search_sync_shared::SearchParams;
    /// use serde_json::json;
    ///
    /// let params = SearchParams::from_query_string("tag=a&tag=b&_limit=5");
    /// assert_eq!(params.get("tag"), Some(&json!(["a", "b"])));
    /// assert_eq!(params.get("_limit"), Some(&json!("5")));
    /// ```
    pub fn from_query_string(query: &str) -> Self {
        let mut params = Self::new();
        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            let key = key.into_owned();
            let value = Value::String(value.into_owned());
            match params.0.get_mut(&key) {
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    params.0.insert(key, value);
                }
            }
        }
        params
    }
}

impl From<Map<String, Value>> for SearchParams {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for SearchParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insertion_order_is_kept() {
        let params = SearchParams::new()
            .with("zoo", 1)
            .with("abc", 2)
            .with("mid", 3);
        let keys: Vec<_> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["zoo", "abc", "mid"]);
    }

    #[test]
    fn test_filters_skip_reserved_and_dunder_keys() {
        let params = SearchParams::new()
            .with("foo", 1)
            .with("_limit", 10)
            .with("__raise_on_empty", true)
            .with("__name__", "x")
            .with("body", json!({}))
            .with("bar", "b");
        let keys: Vec<_> = params.filters().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["foo", "bar"]);
    }

    #[test]
    fn test_is_dunder() {
        assert!(is_dunder("__raise"));
        assert!(is_dunder("__name__"));
        assert!(!is_dunder("__"));
        assert!(!is_dunder("_limit"));
        assert!(!is_dunder("name"));
    }

    #[test]
    fn test_raise_on_empty_flag() {
        let params = SearchParams::new();
        assert!(params.raise_on_empty(true));
        assert!(!params.raise_on_empty(false));

        let params = SearchParams::new().with(RAISE_ON_EMPTY_KEY, "false");
        assert!(!params.raise_on_empty(true));

        let params = SearchParams::new().with(RAISE_ON_EMPTY_KEY, true);
        assert!(params.raise_on_empty(false));
    }

    #[test]
    fn test_get_list_from_string_and_array() {
        let params = SearchParams::new()
            .with("_fields", " a, b ,,c")
            .with("_sort", json!(["x", " y "]));
        assert_eq!(
            params.get_list("_fields"),
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        assert_eq!(
            params.get_list("_sort"),
            Some(vec!["x".to_string(), "y".to_string()])
        );
        assert_eq!(params.get_list("missing"), None);
    }

    #[test]
    fn test_remove_keeps_remaining_order() {
        let mut params = SearchParams::new().with("a", 1).with("b", 2).with("c", 3);
        params.remove("a");
        let keys: Vec<_> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn test_from_query_string() {
        let params = SearchParams::from_query_string("?status=active&tag=a&tag=b&tag=c&q=hello%20world");
        assert_eq!(params.get("status"), Some(&json!("active")));
        assert_eq!(params.get("tag"), Some(&json!(["a", "b", "c"])));
        assert_eq!(params.get("q"), Some(&json!("hello world")));
    }

    #[test]
    fn test_as_bool_like() {
        assert_eq!(as_bool_like(&json!("Yes")), Some(true));
        assert_eq!(as_bool_like(&json!("off")), Some(false));
        assert_eq!(as_bool_like(&json!(1)), Some(true));
        assert_eq!(as_bool_like(&json!("maybe")), None);
    }
}
