use crate::error::DocumentError;
use serde_json::Value;
use tracing::{debug, warn};

/// Parse a whole JSON document, falling back to NDJSON.
///
/// NDJSON records come back as one array; malformed lines are skipped as
/// long as at least one line parses. A document past serde_json's recursion
/// limit is `DocumentError::TooDeep`, with no NDJSON retry.
pub fn parse_document(raw: &str) -> Result<Value, DocumentError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DocumentError::Empty);
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => Ok(value),
        Err(primary) => match DocumentError::from_json(primary) {
            DocumentError::Unparseable(primary) => {
                parse_ndjson(trimmed).ok_or(DocumentError::Unparseable(primary))
            }
            err => Err(err),
        },
    }
}

fn parse_ndjson(raw: &str) -> Option<Value> {
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (idx, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(record) => records.push(record),
            Err(err) => {
                debug!(line = idx + 1, error = %err, "skipping malformed NDJSON line");
                skipped += 1;
            }
        }
    }

    if records.is_empty() {
        return None;
    }
    if skipped > 0 {
        warn!(skipped, parsed = records.len(), "skipped malformed NDJSON lines");
    }
    Some(Value::Array(records))
}
