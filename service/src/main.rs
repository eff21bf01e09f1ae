mod fetch;
mod llm;
mod models;

use anyhow::{anyhow, Context};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use models::{ActiveTimeBody, ActiveTimeQuery, ActiveTimeResponse};
use serde_json::Value;
use sessionizer::{
    aggregate, compact, parse_document, DocumentError, GapThreshold, HourglassConfig, InstantSet,
};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const DEFAULT_BIND: &str = "127.0.0.1:3220";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

#[derive(Clone)]
struct AppState {
    config: Arc<HourglassConfig>,
    http: reqwest::Client,
    max_document_bytes: usize,
    llm: Option<llm::LlmClient>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    error: anyhow::Error,
}

impl ApiError {
    fn bad_request(error: impl Into<anyhow::Error>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: error.into(),
        }
    }

    fn unprocessable(error: impl Into<anyhow::Error>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            error: error.into(),
        }
    }

    fn upstream(error: anyhow::Error) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            error,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(status = %self.status, err = ?self.error, "request failed");
        }
        let body = format!("error: {:#}", self.error);
        (self.status, body).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Nesting past the parser limit is a document problem (422); anything else is malformed input.
fn rejected_document(err: DocumentError) -> ApiError {
    match err {
        DocumentError::TooDeep(_) => ApiError::unprocessable(err),
        _ => ApiError::bad_request(err),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = HourglassConfig::from_env().context("read hourglass config")?;
    let fetch_timeout = env::var("HOURGLASS_FETCH_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(fetch_timeout))
        .build()
        .context("build http client")?;
    let max_document_bytes = env::var("HOURGLASS_MAX_DOCUMENT_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(fetch::DEFAULT_MAX_DOCUMENT_BYTES);

    let llm = llm::LlmClient::from_env()?;
    match &llm {
        Some(client) => info!(model = client.model(), "LLM delegation enabled"),
        None => info!("LLM delegation disabled (set OPENAI_API_KEY)"),
    }

    info!(
        gap_minutes = config.gap.as_minutes_f64(),
        keys = ?config.timestamp_keys.sorted(),
        sample_cap = config.sample_cap,
        max_document_bytes,
        "loaded config"
    );

    let state = AppState {
        config: Arc::new(config),
        http,
        max_document_bytes,
        llm,
    };
    let app = router(state).layer(TraceLayer::new_for_http());

    let bind_addr = env::var("HOURGLASS_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
    info!("hourglass running at http://{bind_addr}");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/active-time", get(get_active_time).post(post_active_time))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

async fn get_active_time(
    State(state): State<AppState>,
    Query(query): Query<ActiveTimeQuery>,
) -> ApiResult<Json<ActiveTimeResponse>> {
    let raw_url = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(anyhow!("active-time requires ?url=<document url>")))?;
    let (source, document) = load_remote(&state, &raw_url).await?;
    let response = report(
        &state,
        source,
        &document,
        query.gap_minutes,
        query.llm.unwrap_or(false),
    )
    .await?;
    Ok(Json(response))
}

async fn post_active_time(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<ActiveTimeResponse>> {
    // Parsed here rather than through `Json` so over-nested bodies map to 422.
    let body: ActiveTimeBody = serde_json::from_slice(&body)
        .map_err(|err| rejected_document(DocumentError::from_json(err)))?;
    let (source, document) = match (body.document, body.url) {
        (Some(Value::String(raw)), _) => (
            "inline".to_string(),
            parse_document(&raw).map_err(rejected_document)?,
        ),
        (Some(document), _) => ("inline".to_string(), document),
        (None, Some(url)) if !url.trim().is_empty() => load_remote(&state, &url).await?,
        _ => {
            return Err(ApiError::bad_request(anyhow!(
                "request body needs a document or a url"
            )));
        }
    };
    let response = report(
        &state,
        source,
        &document,
        body.gap_minutes,
        body.llm.unwrap_or(false),
    )
    .await?;
    Ok(Json(response))
}

async fn load_remote(state: &AppState, raw_url: &str) -> ApiResult<(String, Value)> {
    let url = fetch::document_url(raw_url).map_err(ApiError::bad_request)?;
    let source = url.to_string();
    let body = fetch::fetch_document(&state.http, url, state.max_document_bytes)
        .await
        .map_err(ApiError::upstream)?;
    let document = parse_document(&body).map_err(ApiError::unprocessable)?;
    Ok((source, document))
}

async fn report(
    state: &AppState,
    source: String,
    document: &Value,
    gap_minutes: Option<i64>,
    use_llm: bool,
) -> ApiResult<ActiveTimeResponse> {
    let gap = match gap_minutes {
        Some(minutes) => GapThreshold::from_minutes(minutes).map_err(ApiError::bad_request)?,
        None => state.config.gap,
    };
    let instants = state
        .config
        .extractor()
        .extract(document)
        .map_err(ApiError::unprocessable)?;
    let summary = aggregate(&instants, gap);
    info!(
        source = %source,
        events = summary.event_count,
        sessions = summary.session_count,
        hours = summary.total_hours(),
        "computed active time"
    );

    let (llm, llm_error) = if use_llm {
        delegate(state, &instants, gap).await
    } else {
        (None, None)
    };

    Ok(ActiveTimeResponse {
        source,
        local: summary.to_report(),
        llm,
        llm_error,
    })
}

/// Failures here never fail the request; they come back as `llm_error`.
async fn delegate(
    state: &AppState,
    instants: &InstantSet,
    gap: GapThreshold,
) -> (Option<llm::LlmEstimate>, Option<String>) {
    let Some(client) = &state.llm else {
        return (
            None,
            Some("LLM not configured (set OPENAI_API_KEY)".to_string()),
        );
    };
    let timeline = match compact(instants, gap, state.config.sample_cap) {
        Ok(timeline) => timeline,
        Err(err) => return (None, Some(err.to_string())),
    };
    match client.estimate(&timeline).await {
        Ok(estimate) => (Some(estimate), None),
        Err(err) => {
            warn!(err = ?err, "LLM estimate failed");
            (None, Some(format!("{err:#}")))
        }
    }
}
