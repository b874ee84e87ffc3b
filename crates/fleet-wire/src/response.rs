//! Response envelope — spec §4.G, §6.
//!
//! `{ok:true, …}` or `{ok:false, error|summary: string}`. Any response
//! value is serialized as a single line; a value that would serialize to
//! `null` is coerced to the literal `"ok"` string (spec §6).

use serde_json::{json, Map, Value};

/// Build a success response with no extra fields: `{"ok":true}`.
pub fn ok() -> Value {
    json!({ "ok": true })
}

/// Build a success response, merging `extra`'s top-level object fields
/// into `{"ok":true, ...}`. Non-object `extra` is coerced to the literal
/// `"ok"` string under a `value` key so the response is never bare `null`.
pub fn ok_with(extra: Value) -> Value {
    match extra {
        Value::Object(mut map) => {
            map.insert("ok".to_string(), Value::Bool(true));
            Value::Object(map)
        }
        Value::Null => ok(),
        other => {
            let mut map = Map::new();
            map.insert("ok".to_string(), Value::Bool(true));
            map.insert("value".to_string(), other);
            Value::Object(map)
        }
    }
}

/// Build an error response: `{"ok":false, "error": message}`.
pub fn err(message: impl Into<String>) -> Value {
    json!({ "ok": false, "error": message.into() })
}

/// Build an error response carrying a `summary` instead of `error`, for
/// handlers that produce a longer human-readable explanation.
pub fn err_summary(summary: impl Into<String>) -> Value {
    json!({ "ok": false, "summary": summary.into() })
}

/// Coerce any response value to a valid wire response: `undefined`/`null`
/// becomes the literal `"ok"` (spec §6), everything else passes through.
pub fn coerce(value: Value) -> Value {
    if value.is_null() {
        Value::String("ok".to_string())
    } else {
        value
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
