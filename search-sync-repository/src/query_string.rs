//! Translation of flat collection parameters into query-string syntax.
//!
//! These are pure functions. Clause order always follows the iteration order
//! of the parameters, so the rendered string is deterministic.

use serde_json::Value;

use search_sync_shared::document::scalar_to_string;
use search_sync_shared::types::search_params::ALL_SENTINEL;
use search_sync_shared::SearchParams;

/// Turn a `+field,-other` sort spec into `field:asc,other:desc`.
///
/// Fields without a prefix sort ascending. Whitespace around names is ignored
/// and empty entries are dropped.
///
/// # Example
///
/// ```
/// use search_sync_repository::query_string::apply_sort;
///
/// assert_eq!(apply_sort("+foo,-bar ,zoo"), "foo:asc,bar:desc,zoo:asc");
/// assert_eq!(apply_sort(""), "");
/// ```
pub fn apply_sort(spec: &str) -> String {
    spec.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|field| {
            let (name, order) = if let Some(name) = field.strip_prefix('-') {
                (name, "desc")
            } else if let Some(name) = field.strip_prefix('+') {
                (name, "asc")
            } else if let Some((name, order)) = field.split_once(':') {
                // Already canonical
                (name, if order.trim() == "desc" { "desc" } else { "asc" })
            } else {
                (field, "asc")
            };
            let name = name.trim();
            (!name.is_empty()).then(|| format!("{}:{}", name, order))
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Render `field:v1 OP field:v2 ...` for every value, in order.
pub fn build_terms(field: &str, values: &[Value], operator: &str) -> String {
    values
        .iter()
        .map(|value| format!("{}:{}", field, scalar_to_string(value)))
        .collect::<Vec<_>>()
        .join(&format!(" {} ", operator))
}

/// Render the filter parameters as a query string.
///
/// Control keys and `__flag` keys are skipped, as is any filter whose value is
/// the `_all` sentinel. List values become an inner `OR` group. Clauses for
/// different fields are joined with `operator`.
///
/// `raw_terms` is appended as given. It may carry its own leading operator
/// (`" AND q:5"`); when it does not, `operator` is used as the separator. With
/// no other clauses any leading operator is dropped.
///
/// # Arguments
///
/// * `params` - Collection parameters, in insertion order
/// * `operator` - Operator joining clauses of different fields, usually `AND`
/// * `raw_terms` - Query-string fragment appended verbatim
pub fn build_qs(params: &SearchParams, operator: &str, raw_terms: &str) -> String {
    let clauses: Vec<String> = params
        .filters()
        .filter(|(_, value)| value.as_str() != Some(ALL_SENTINEL))
        .filter_map(|(field, value)| match value {
            Value::Array(values) if values.is_empty() => None,
            Value::Array(values) => Some(build_terms(field, values, "OR")),
            scalar => Some(format!("{}:{}", field, scalar_to_string(scalar))),
        })
        .collect();

    let mut qs = clauses.join(&format!(" {} ", operator));

    let raw = raw_terms.trim();
    if raw.is_empty() {
        return qs;
    }

    let (leading_operator, rest) = split_leading_operator(raw);
    if qs.is_empty() {
        qs.push_str(rest);
    } else {
        qs.push(' ');
        qs.push_str(leading_operator.unwrap_or(operator));
        qs.push(' ');
        qs.push_str(rest);
    }
    qs
}

/// Split `"AND q:5"` into `(Some("AND"), "q:5")`.
fn split_leading_operator(raw: &str) -> (Option<&str>, &str) {
    for op in ["AND", "OR", "NOT"] {
        if let Some(rest) = raw.strip_prefix(op) {
            if rest.starts_with(char::is_whitespace) {
                return (Some(op), rest.trim_start());
            }
        }
    }
    (None, raw)
}
