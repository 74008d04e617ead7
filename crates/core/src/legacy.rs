//! Normalization of stored screen id lists.
//!
//! `last_push_screens` has been written in two shapes over time: a JSON list
//! of ids, and the same list encoded once more as a JSON string. The
//! middleware status endpoint may also report ids as strings. Everything
//! downstream works on the output of [`normalize_screen_ids`].

use serde_json::Value;
use tracing::warn;

/// Converts a stored or reported screen list into ordered screen ids.
///
/// Anything that is neither a list nor a string holding a list yields an
/// empty list, which makes the reconciler attempt a push.
pub fn normalize_screen_ids(raw: &Value) -> Vec<i64> {
    match raw {
        Value::Array(items) => items.iter().filter_map(screen_id).collect(),
        Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
            Ok(Value::Array(items)) => items.iter().filter_map(screen_id).collect(),
            Ok(_) | Err(_) => {
                warn!(value = %encoded, "undecodable last push screens, treating as empty");
                Vec::new()
            }
        },
        Value::Null => Vec::new(),
        other => {
            warn!(value = %other, "unexpected last push screens shape, treating as empty");
            Vec::new()
        }
    }
}

fn screen_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Structured form persisted by the reconciler.
pub fn encode_screen_ids(ids: &[i64]) -> Value {
    Value::from(ids.to_vec())
}
