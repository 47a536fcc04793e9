//! Request handlers.

pub mod health;
pub mod urlinfo;

use axum::extract::State;
use axum::Json;

use crate::metrics::MetricsSnapshot;
use crate::AppState;

/// GET /metrics — runtime counters and timing summaries.
pub async fn metrics_snapshot(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
