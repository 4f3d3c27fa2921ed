//! SQL literal rendering

use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;

use crate::error::{OrmError, OrmResult};

const SQL_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render a JSON scalar as an inline SQL literal
pub fn render(attribute: &str, value: &Value) -> OrmResult<String> {
    match value {
        Value::Null => Ok("NULL".to_string()),
        Value::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(quote(&reformat_timestamp(s).unwrap_or_else(|| s.clone()))),
        Value::Array(_) | Value::Object(_) => Err(OrmError::StatementSynthesis(format!(
            "attribute '{}' holds a nested value and cannot be written as a column",
            attribute
        ))),
    }
}

/// Single-quoted string with embedded quotes doubled
pub fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Text of a scalar as it appears inside a `LIKE` pattern
pub fn raw_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Whether the text form of a scalar parses as a whole number
pub fn is_integral(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.is_u64(),
        Value::String(s) => s.trim().parse::<i64>().is_ok(),
        _ => false,
    }
}

fn reformat_timestamp(text: &str) -> Option<String> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.naive_local().format(SQL_DATE_FORMAT).to_string());
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|parsed| parsed.format(SQL_DATE_FORMAT).to_string())
}
