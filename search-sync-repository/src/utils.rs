//! Parameter helpers shared by the index client and its callers.

use serde_json::Value;

use search_sync_shared::SearchParams;

use crate::errors::SearchIndexError;

/// Read a non-negative integer parameter.
///
/// Accepts JSON numbers and numeric strings (as produced by query-string
/// parsing).
///
/// # Returns
///
/// * `Ok(None)` - The parameter is absent or null
/// * `Ok(Some(n))` - The parsed value
/// * `Err(SearchIndexError::BadRequest)` - The value is not a non-negative integer
///
/// # Example
///
/// ```
/// use search_sync_repository::utils::parse_usize_param;
/// use search_sync_shared::SearchParams;
///
/// let params = SearchParams::new().with("_limit", "25");
/// assert_eq!(parse_usize_param(&params, "_limit").unwrap(), Some(25));
/// assert_eq!(parse_usize_param(&params, "_page").unwrap(), None);
/// ```
pub fn parse_usize_param(params: &SearchParams, key: &str) -> Result<Option<usize>, SearchIndexError> {
    let invalid = || SearchIndexError::bad_request(format!("Bad {} param", key));
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse::<usize>().map(Some).map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

/// Lower `_limit` so that `start + _limit` never exceeds `max_limit`.
///
/// The start offset is `_start` when given, otherwise `_page * _limit`. A
/// window that already lies beyond `max_limit` ends up with a limit of zero.
///
/// # Returns
///
/// * `Ok(())` - `params` now holds the clamped `_limit`
/// * `Err(SearchIndexError::BadRequest)` - `_limit`, `_page` or `_start` is not an integer
pub fn clamp_public_limit(params: &mut SearchParams, max_limit: usize) -> Result<(), SearchIndexError> {
    let limit = parse_usize_param(params, "_limit")?.unwrap_or(max_limit);
    let start = match parse_usize_param(params, "_start")? {
        Some(start) => start,
        None => parse_usize_param(params, "_page")?.unwrap_or(0).saturating_mul(limit),
    };

    let clamped = if start.saturating_add(limit) > max_limit {
        max_limit.saturating_sub(start)
    } else {
        limit
    };
    params.insert("_limit", clamped);
    Ok(())
}
