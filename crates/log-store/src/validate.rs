use gasoline_core_types::{LogEntry, LogLevel};
use serde_json::Value;

use crate::errors::{LogStoreError, LogStoreResult};

/// Entries whose string payloads are this far below the limit skip serialization.
const FAST_PATH_MAX_KEYS: usize = 32;

pub fn validate_entry(index: usize, entry: &LogEntry, max_bytes: usize) -> LogStoreResult<LogLevel> {
    let level = match entry.get("level") {
        Some(Value::String(level)) => level,
        Some(other) => {
            return Err(LogStoreError::InvalidLevel {
                index,
                level: other.to_string(),
            })
        }
        None => return Err(LogStoreError::MissingLevel { index }),
    };
    let parsed = LogLevel::parse(level).ok_or_else(|| LogStoreError::InvalidLevel {
        index,
        level: level.clone(),
    })?;

    if !obviously_small(entry, max_bytes) {
        let size = serde_json::to_vec(entry)
            .map(|bytes| bytes.len())
            .unwrap_or(usize::MAX);
        if size > max_bytes {
            return Err(LogStoreError::TooLarge {
                index,
                size,
                max: max_bytes,
            });
        }
    }
    Ok(parsed)
}

/// Flat entries with a handful of short strings cannot reach the limit.
fn obviously_small(entry: &LogEntry, max_bytes: usize) -> bool {
    if entry.len() > FAST_PATH_MAX_KEYS {
        return false;
    }
    let mut total = 0usize;
    for (key, value) in entry {
        total += key.len() + 8;
        match value {
            Value::String(s) => total += s.len() * 2 + 2,
            Value::Number(_) | Value::Bool(_) | Value::Null => total += 24,
            Value::Array(_) | Value::Object(_) => return false,
        }
    }
    total < max_bytes / 2
}
