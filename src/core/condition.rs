//! Truthiness of resolved condition values

use serde_json::Value;

/// Strings that count as false once a template has been rendered
const FALSY_STRINGS: &[&str] = &["", "false", "f", "no", "n", "off", "0"];

/// Interpret a resolved value as a boolean.
///
/// Templates always render to strings, so `"false"`, `"no"`, `"0"` and
/// friends are falsy alongside `null`, `false` and `0`.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            let normalized = s.trim().to_ascii_lowercase();
            !FALSY_STRINGS.contains(&normalized.as_str())
        }
        Value::Array(_) | Value::Object(_) => true,
    }
}
