//! Document representation for the search index.
//!
//! Documents have no fixed schema. Apart from the identifier and the type
//! discriminator, every field is opaque payload that is forwarded to the
//! search engine untouched.

use serde_json::{Map, Value};

/// A single indexed record: an ordered mapping from field name to value.
pub type Document = Map<String, Value>;

/// Field holding the document identifier.
pub const ID_FIELD: &str = "id";

/// Field holding the optional type discriminator.
pub const TYPE_FIELD: &str = "_type";

/// Render a scalar JSON value the way it appears in query strings and ids.
///
/// Strings are rendered without quotes, every other value uses its JSON form.
///
/// # Example
///
/// ```
/// use search_sync_shared::document::scalar_to_string;
/// use serde_json::json;
///
/// assert_eq!(scalar_to_string(&json!("abc")), "abc");
/// assert_eq!(scalar_to_string(&json!(12)), "12");
/// assert_eq!(scalar_to_string(&json!(true)), "true");
/// ```
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The document identifier rendered as a string, if the document carries one.
pub fn document_id(document: &Document) -> Option<String> {
    match document.get(ID_FIELD) {
        None | Some(Value::Null) => None,
        Some(value) => Some(scalar_to_string(value)),
    }
}

/// The document's own type discriminator, if present and non-empty.
pub fn document_type(document: &Document) -> Option<&str> {
    document
        .get(TYPE_FIELD)
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
}

/// Human readable name of a JSON value's kind, used in type-mismatch errors.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_document_id_from_string_and_number() {
        assert_eq!(document_id(&doc(json!({"id": "abc"}))), Some("abc".to_string()));
        assert_eq!(document_id(&doc(json!({"id": 42}))), Some("42".to_string()));
    }

    #[test]
    fn test_document_id_missing_or_null() {
        assert_eq!(document_id(&doc(json!({"name": "x"}))), None);
        assert_eq!(document_id(&doc(json!({"id": null}))), None);
    }

    #[test]
    fn test_document_type() {
        assert_eq!(document_type(&doc(json!({"_type": "Story"}))), Some("Story"));
        assert_eq!(document_type(&doc(json!({"_type": ""}))), None);
        assert_eq!(document_type(&doc(json!({"id": 1}))), None);
    }

    #[test]
    fn test_value_kind() {
        assert_eq!(value_kind(&json!("a")), "string");
        assert_eq!(value_kind(&json!([1])), "array");
        assert_eq!(value_kind(&json!({})), "object");
        assert_eq!(value_kind(&json!(null)), "null");
    }
}
