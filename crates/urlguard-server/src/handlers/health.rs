//! Health check handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use urlguard_core::CheckerStatus;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    checker: CheckerStatus,
}

#[derive(Serialize)]
pub struct UrlinfoHealthResponse {
    status: &'static str,
    service: &'static str,
    message: &'static str,
    sources: CheckerStatus,
}

fn status_label(ready: bool) -> &'static str {
    if ready {
        "healthy"
    } else {
        "degraded"
    }
}

/// GET /health — process-level health.
pub async fn overall(State(state): State<AppState>) -> Json<HealthResponse> {
    let checker = state.checker.status();
    Json(HealthResponse {
        status: status_label(checker.overall_ready),
        service: "urlguard",
        version: env!("CARGO_PKG_VERSION"),
        checker,
    })
}

/// GET /urlinfo/health — lookup-service health with per-source detail.
pub async fn urlinfo(State(state): State<AppState>) -> Json<UrlinfoHealthResponse> {
    let sources = state.checker.status();
    let ready = sources.overall_ready;
    Json(UrlinfoHealthResponse {
        status: status_label(ready),
        service: "urlinfo",
        message: if ready {
            "threat sources ready"
        } else {
            "no threat sources are available"
        },
        sources,
    })
}
