//! Request tracking: metrics and `X-Request-ID` correlation.

use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use crate::AppState;

/// Counts requests/responses, records the response-time timing, and stamps
/// every response with `X-Request-ID` and `X-Response-Time` headers. An
/// inbound `X-Request-ID` is echoed back; otherwise one is generated.
pub async fn track(State(state): State<AppState>, request: Request, next: Next) -> Response {
    state.metrics.incr("requests_total");

    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(generate_request_id);

    let started = Instant::now();
    let mut response = next.run(request).await;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    state.metrics.timing("response_time_ms", elapsed_ms);
    state.metrics.incr("responses_total");

    if let Ok(value) = HeaderValue::from_str(&format!("{elapsed_ms:.2}")) {
        response.headers_mut().insert("x-response-time", value);
    }
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    tracing::debug!(%request_id, elapsed_ms, "request completed");
    response
}

fn generate_request_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("req-{}", &id[..12])
}
