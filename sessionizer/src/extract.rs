use crate::error::ExtractError;
use crate::parse::to_instant;
use crate::types::InstantSet;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

pub const DEFAULT_TIMESTAMP_KEYS: &[&str] = &[
    "created",
    "created_at",
    "timestamp",
    "ts",
    "time",
    "date",
    "create_time",
    "update_time",
    "modified_at",
    "last_activity_time",
];

/// Must stay below serde_json's parse-time recursion limit (128).
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Field names treated as carrying a timestamp, stored lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampKeys(HashSet<String>);

impl TimestampKeys {
    /// Blank aliases are dropped.
    pub fn new<I, S>(aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            aliases
                .into_iter()
                .map(|a| a.as_ref().trim().to_lowercase())
                .filter(|a| !a.is_empty())
                .collect(),
        )
    }

    /// Comma separated, e.g. `created_at, ts`.
    pub fn parse_list(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    pub fn matches(&self, key: &str) -> bool {
        self.0.contains(&key.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sorted(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.0.iter().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl Default for TimestampKeys {
    fn default() -> Self {
        Self::new(DEFAULT_TIMESTAMP_KEYS)
    }
}

#[derive(Debug, Clone)]
pub struct Extractor {
    keys: TimestampKeys,
    max_depth: usize,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(TimestampKeys::default())
    }
}

impl Extractor {
    pub fn new(keys: TimestampKeys) -> Self {
        Self {
            keys,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn keys(&self) -> &TimestampKeys {
        &self.keys
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Collect every timestamp attached to an alias key, at any depth.
    ///
    /// Values that do not normalize are skipped. The only failure is a
    /// document nested deeper than `max_depth` containers.
    pub fn extract(&self, document: &Value) -> Result<InstantSet, ExtractError> {
        let mut found = BTreeSet::new();
        let mut matched = 0usize;
        let mut stack: Vec<(&Value, usize)> = vec![(document, 0)];

        while let Some((value, depth)) = stack.pop() {
            if depth > self.max_depth {
                return Err(ExtractError::TooDeep {
                    limit: self.max_depth,
                });
            }
            match value {
                Value::Object(map) => {
                    for (key, child) in map {
                        if self.keys.matches(key) {
                            matched += 1;
                            if let Some(instant) = to_instant(child) {
                                found.insert(instant);
                            }
                        }
                        if is_container(child) {
                            stack.push((child, depth + 1));
                        }
                    }
                }
                Value::Array(items) => {
                    stack.extend(
                        items
                            .iter()
                            .filter(|item| is_container(item))
                            .map(|item| (item, depth + 1)),
                    );
                }
                Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
            }
        }

        debug!(matched, distinct = found.len(), "extracted timestamps");
        Ok(InstantSet::from(found))
    }
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

pub fn extract(document: &Value, keys: &TimestampKeys) -> Result<InstantSet, ExtractError> {
    Extractor::new(keys.clone()).extract(document)
}
