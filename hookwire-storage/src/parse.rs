//! Best-effort typing of raw strings

use serde_json::{Number, Value};

/// Turn a raw string into the JSON value it most likely spells
///
/// Recognizes `true`, `false`, `null`, integers, finite floats and JSON
/// objects, arrays or quoted strings. Anything else stays a string.
pub fn parse_auto(raw: &str) -> Value {
    let trimmed = raw.trim();
    match trimmed {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }

    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::Number(n.into());
    }
    // Non-finite floats have no JSON form
    if let Some(n) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }

    if trimmed.starts_with(['{', '[', '"']) {
        if let Ok(value) = serde_json::from_str(trimmed) {
            return value;
        }
    }

    Value::String(raw.to_string())
}
