//! JSON codec for document payloads.
//!
//! Payloads are stored as compact JSON text. Non-ASCII characters and `/` are written
//! literally, which keeps the text searchable with a plain substring predicate (see
//! [`PropertyQuery`](crate::query::PropertyQuery)).

use serde_json::Value;

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Serializes a payload to its stored JSON text.
///
/// `None` serializes to the JSON literal `null`.
pub fn serialize(data: Option<&Value>) -> String {
    match data {
        Some(value) => value.to_string(),
        None => "null".to_string(),
    }
}

/// Deserializes stored JSON text into a payload.
///
/// Missing input, empty input and the literal `null` (in any letter case) mean "no data" and
/// yield `Ok(None)`.
///
/// # Errors
///
/// Returns [`DocumentStoreError::InvalidDocument`] carrying the parser's message, line and
/// column if the text is not valid JSON.
pub fn deserialize(data: Option<&str>) -> DocumentStoreResult<Option<Value>> {
    let data = match data {
        Some(data) if !data.is_empty() && !data.eq_ignore_ascii_case("null") => data,
        _ => return Ok(None),
    };

    match serde_json::from_str::<Value>(data) {
        Ok(Value::Null) => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(err) => Err(DocumentStoreError::InvalidDocument(format!(
            "Invalid JSON data: {} (line {}, column {})",
            err,
            err.line(),
            err.column()
        ))),
    }
}
