//! URL lookup endpoint.
//!
//! Wire protocol: `GET /urlinfo/1/{hostname_and_port}/{path_and_query}`,
//! where `hostname_and_port` is `host` or `host:port` (port defaults to 80)
//! and the remainder of the path, plus any query string, is the path being
//! checked.

use axum::extract::{Path, RawQuery, State};
use axum::Json;
use serde::Serialize;
use urlguard_core::validate;
use urlguard_core::{ThreatLevel, ThreatType, UtcDateTime};

use crate::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct UrlCheckResponse {
    pub url: String,
    pub is_malicious: bool,
    pub threat_level: ThreatLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threat_type: Option<ThreatType>,
    pub confidence_score: f64,
    pub cached: bool,
    pub sources_queried: Vec<String>,
    pub response_time_ms: u64,
    pub timestamp: UtcDateTime,
}

pub async fn lookup(
    State(state): State<AppState>,
    Path(rest): Path<String>,
    RawQuery(raw_query): RawQuery,
) -> AppResult<Json<UrlCheckResponse>> {
    let (host_port, path_part) = rest
        .split_once('/')
        .unwrap_or((rest.as_str(), ""));

    if host_port.is_empty() {
        return Err(AppError::Validation(String::from(
            "invalid url format: hostname required",
        )));
    }

    let (hostname, port) = validate::parse_host_port(host_port)?;

    let mut path = format!("/{path_part}");
    if let Some(query_string) = raw_query {
        path.push('?');
        path.push_str(&query_string);
    }

    let query = validate::build_query(&hostname, port, &path)?;

    if !state.checker.is_ready() {
        return Err(AppError::NotReady);
    }

    state.metrics.incr("url_lookups_total");

    let deadline = state.config.request_timeout;
    let result = tokio::time::timeout(deadline, state.checker.check_url(&query))
        .await
        .map_err(|_| {
            tracing::warn!(%query, deadline_secs = deadline.as_secs(), "url check timed out");
            AppError::CheckTimeout(deadline.as_secs())
        })?;

    if result.verdict.is_malicious {
        state.metrics.incr("url_lookups_malicious");
    }
    if result.served_from_cache {
        state.metrics.incr("cache_hits");
    } else {
        state.metrics.incr("cache_misses");
    }
    state.metrics.timing("url_check_ms", result.elapsed_ms as f64);

    Ok(Json(UrlCheckResponse {
        url: validate::display_url(&query),
        is_malicious: result.verdict.is_malicious,
        threat_level: result.verdict.threat_level,
        threat_type: result.verdict.threat_type,
        confidence_score: result.verdict.confidence_score,
        cached: result.served_from_cache,
        sources_queried: result.sources_queried,
        response_time_ms: result.elapsed_ms,
        timestamp: UtcDateTime::now(),
    }))
}
