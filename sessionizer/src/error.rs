use thiserror::Error;

/// Failure while walking a document for timestamps.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("input too deeply nested (limit {limit})")]
    TooDeep { limit: usize },
}

/// Caller-supplied configuration that cannot produce a meaningful result.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("gap threshold must be positive (at least 1 ms), got {millis} ms")]
    NonPositiveGap { millis: i64 },
    #[error("gap threshold of {minutes} minutes is out of range")]
    GapOutOfRange { minutes: i64 },
    #[error("sample cap must be at least 1")]
    ZeroSampleCap,
}

/// Outer document could not be read as JSON or NDJSON.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document is empty")]
    Empty,
    #[error("input too deeply nested: {0}")]
    TooDeep(#[source] serde_json::Error),
    #[error("document is neither JSON nor NDJSON: {0}")]
    Unparseable(#[source] serde_json::Error),
}

impl DocumentError {
    /// serde_json gives no error code for its recursion limit, only the message.
    pub fn from_json(err: serde_json::Error) -> Self {
        if err.to_string().starts_with("recursion limit exceeded") {
            Self::TooDeep(err)
        } else {
            Self::Unparseable(err)
        }
    }
}
