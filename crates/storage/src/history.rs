//! Persisted layout of the clipboard history.
//!
//! The log lives under one key as a JSON array of `{text, timestamp}` records,
//! newest first. There is no schema version: anything that does not decode is
//! treated as missing rather than as an error.

use clipkeep_history::{sanitize, Entry};
use serde_json::Value;

use crate::{KeyValueStore, Result, StorageError};

/// Store key holding the history array.
pub const HISTORY_KEY: &str = "clipboard";

/// Decode a stored value into a valid history.
///
/// Absent values and non-arrays decode to the empty log. Records that are not
/// `{text, timestamp}` objects are skipped, and the remainder is sanitised so
/// the invariants hold even for hand-edited data.
pub fn decode_history(value: Option<Value>, max_entries: usize) -> Vec<Entry> {
    let items = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(other) => {
            tracing::warn!(kind = json_kind(&other), "persisted history is not an array, starting empty");
            return Vec::new();
        }
    };

    let total = items.len();
    let entries: Vec<Entry> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();

    if entries.len() < total {
        tracing::warn!(
            skipped = total - entries.len(),
            total,
            "dropped malformed history records"
        );
    }

    sanitize(entries, max_entries)
}

/// Encode a history for storage.
pub fn encode_history(entries: &[Entry]) -> Result<Value> {
    Ok(serde_json::to_value(entries)?)
}

/// Read the current history from `store`.
///
/// Corrupt data yields the empty log; only genuine read failures are errors.
pub async fn load_history<S>(store: &S, max_entries: usize) -> Result<Vec<Entry>>
where
    S: KeyValueStore + ?Sized,
{
    match store.get(HISTORY_KEY).await {
        Ok(value) => Ok(decode_history(value, max_entries)),
        Err(StorageError::Corrupt { key, source }) => {
            tracing::warn!(%key, error = %source, "persisted history is corrupt, starting empty");
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

/// Replace the stored history with `entries`.
pub async fn save_history<S>(store: &S, entries: &[Entry]) -> Result<()>
where
    S: KeyValueStore + ?Sized,
{
    let value = encode_history(entries)?;
    store.set(HISTORY_KEY, value).await
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
