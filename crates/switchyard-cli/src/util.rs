use anyhow::Result;
use serde_json::{Map, Value};
use switchyard_core::SECRET_FIELDS;
use switchyard_errors::errors::{invalid_key_value, missing_env_var};

/// Parse `key=value` tokens into a profile document fragment.
///
/// `true`/`false` become booleans, digits become integers, anything with a
/// `.` that parses as a float becomes a float, and the rest stays a string.
/// Secret fields are always strings. `ENV[NAME]` is replaced with the
/// variable's value before coercion.
pub(crate) fn parse_keyvals(
    tokens: &[String],
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Map<String, Value>> {
    let mut fields = Map::new();
    for token in tokens {
        let Some((key, raw)) = token.split_once('=') else {
            return Err(invalid_key_value(token).into_error());
        };
        let key = canonical_key(key.trim());
        let mut raw = raw.trim().to_string();
        if let Some(name) = raw.strip_prefix("ENV[").and_then(|rest| rest.strip_suffix(']')) {
            raw = lookup(name).ok_or_else(|| missing_env_var(name).into_error())?;
        }
        let value = if SECRET_FIELDS.contains(&key) {
            Value::String(raw)
        } else {
            coerce_value(&raw)
        };
        fields.insert(key.to_string(), value);
    }
    Ok(fields)
}

fn canonical_key(key: &str) -> &str {
    match key {
        "service_id" => "usage_id",
        "endpoint" => "base_url",
        other => other,
    }
}

pub(crate) fn coerce_value(raw: &str) -> Value {
    match raw {
        "true" | "True" => return Value::Bool(true),
        "false" | "False" => return Value::Bool(false),
        _ => {}
    }
    if raw.contains('.') {
        if let Some(number) = raw.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
            return Value::Number(number);
        }
    } else if let Ok(int) = raw.parse::<i64>() {
        return Value::from(int);
    }
    Value::String(raw.to_string())
}
