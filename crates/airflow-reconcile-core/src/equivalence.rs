//! Diff suppression for structured-text fields.

use serde_json::Value;

/// Whether two JSON texts denote the same value.
///
/// Both sides are parsed; when both parse, the values are compared
/// structurally, so whitespace and object key order do not matter. When
/// either side fails to parse, the trimmed literals are compared instead.
///
/// Only used to decide whether a field needs an update, never to choose
/// what gets written.
pub fn json_text_equivalent(stored: &str, incoming: &str) -> bool {
    match (
        serde_json::from_str::<Value>(stored),
        serde_json::from_str::<Value>(incoming),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => stored.trim() == incoming.trim(),
    }
}
