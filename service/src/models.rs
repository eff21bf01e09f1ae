use crate::llm::LlmEstimate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sessionizer::HoursReport;

#[derive(Debug, Deserialize)]
pub struct ActiveTimeQuery {
    pub url: Option<String>,
    pub gap_minutes: Option<i64>,
    pub llm: Option<bool>,
}

/// Either `document` (a JSON value, or JSON/NDJSON text as a string) or
/// `url` must be set; `document` wins when both are.
#[derive(Debug, Deserialize)]
pub struct ActiveTimeBody {
    pub url: Option<String>,
    pub document: Option<Value>,
    pub gap_minutes: Option<i64>,
    pub llm: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ActiveTimeResponse {
    pub source: String,
    pub local: HoursReport,
    pub llm: Option<LlmEstimate>,
    pub llm_error: Option<String>,
}
