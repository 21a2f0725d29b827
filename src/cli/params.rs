//! `--param key=value` parsing
//!
//! Values are read as JSON when they parse, otherwise taken as plain strings,
//! so `year=2024` is an integer and `state=CO` a string.

use crate::domain::{Query, QueryValue};

/// Parses one `key=value` pair
pub fn parse_param(raw: &str) -> Result<(String, QueryValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing parameter name in '{}'", raw));
    }

    let value = match serde_json::from_str::<serde_json::Value>(value) {
        Ok(json) => QueryValue::from(json),
        Err(_) => QueryValue::Text(value.to_string()),
    };

    Ok((key.to_string(), value))
}

/// Builds a query from parsed parameters; later duplicates win
pub fn build_query(params: &[(String, QueryValue)]) -> Query {
    params.iter().cloned().collect()
}
