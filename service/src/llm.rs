use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use sessionizer::CompactTimeline;
use std::fs;
use std::time::Duration;

const DEFAULT_MODEL: &str = "gpt-5.1";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const SYSTEM_PROMPT: &str = "You estimate active time from event timestamps. \
Sort the timestamps, split them into sessions wherever two consecutive timestamps are \
at least gap_minutes apart, count each session as max(last - first, 1 minute), and sum. \
Respond with JSON only, shaped exactly as \
{\"total_hours\": number, \"session_count\": integer, \"event_count\": integer, \
\"first_timestamp\": string or null, \"last_timestamp\": string or null}.";

/// Second opinion on a summary, returned as-is and never validated.
#[derive(Debug, Clone, Serialize)]
pub struct LlmEstimate {
    pub model: String,
    pub parsed: Value,
}

#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl LlmClient {
    pub fn from_env() -> Result<Option<Self>> {
        let api_key = match std::env::var("OPENAI_API_KEY") {
            Ok(k) if !k.trim().is_empty() => Some(k),
            _ => read_key_file(),
        };
        let Some(api_key) = api_key else {
            return Ok(None);
        };
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let base_url = std::env::var("OPENAI_BASE_URL")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("build LLM http client")?;
        Ok(Some(Self {
            http,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn estimate(&self, timeline: &CompactTimeline) -> Result<LlmEstimate> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": build_prompt(timeline)?}
            ],
            "response_format": {"type": "json_object"},
            "temperature": 0.0,
        });

        let res = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("send chat request")?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            bail!("LLM call failed: {} - {}", status, text);
        }

        let json: Value = res.json().await.context("decode chat response")?;
        Ok(LlmEstimate {
            model: self.model.clone(),
            parsed: parse_content(&json),
        })
    }
}

pub fn build_prompt(timeline: &CompactTimeline) -> Result<String> {
    let payload = serde_json::to_string(timeline).context("serialize timeline")?;
    let mut prompt = String::from("Estimate active time for these events.\n");
    if timeline.truncated {
        prompt.push_str(&format!(
            "Only the earliest {} of {} timestamps are included.\n",
            timeline.timestamps.len(),
            timeline.total_events
        ));
    }
    prompt.push_str(&payload);
    Ok(prompt)
}

/// Message content parsed as JSON, or kept as a string when it is not JSON.
fn parse_content(response: &Value) -> Value {
    let content = response
        .pointer("/choices/0/message/content")
        .cloned()
        .unwrap_or(Value::String(String::new()));
    if let Some(text) = content.as_str() {
        serde_json::from_str::<Value>(text).unwrap_or_else(|_| Value::String(text.to_string()))
    } else {
        content
    }
}

fn read_key_file() -> Option<String> {
    let candidates = [
        "~/.config/openai/api_key",
        "~/.config/openai/key",
        "~/.openai/api_key",
    ];
    for path in candidates {
        let expanded = shellexpand::tilde(path).into_owned();
        if let Ok(content) = fs::read_to_string(&expanded) {
            let trimmed = content.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}
