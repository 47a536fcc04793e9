//! urlguard API server.
//!
//! Wires configured threat sources into a [`UrlChecker`] and exposes it
//! over HTTP:
//!
//! ```text
//! GET /urlinfo/1/{hostname_and_port}/{path_and_query}   lookup
//! GET /urlinfo/health                                   per-source health
//! GET /health                                           process health
//! GET /metrics                                          runtime metrics
//! ```
//!
//! The checker is owned here and injected into the router as shared state;
//! sources are built from environment configuration at startup and shut
//! down when the server exits.

mod config;
mod error;
mod handlers;
mod metrics;
mod middleware;

use std::sync::Arc;

use axum::middleware as axum_middleware;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use urlguard_core::{
    FileSource, HttpSource, SourceConfigError, ThreatSource, UrlChecker, VerdictCache,
};

pub use error::{AppError, AppResult};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub checker: Arc<UrlChecker>,
    pub metrics: Arc<metrics::Metrics>,
    pub config: Arc<config::Config>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "urlguard={},tower_http=info",
                    config.log_level
                ))
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        host = %config.bind_host,
        port = config.bind_port,
        cache_enabled = config.cache_enabled,
        cache_ttl_secs = config.cache_ttl.as_secs(),
        "starting urlguard"
    );

    let sources = build_sources(&config).expect("invalid source configuration");
    let cache = if config.cache_enabled {
        VerdictCache::new(config.cache_ttl, config.cache_max_entries)
    } else {
        VerdictCache::disabled()
    };
    let checker = Arc::new(UrlChecker::new(sources, cache).expect("source names must be unique"));

    checker.initialize().await;
    let status = checker.status();
    tracing::info!(
        ready = status.overall_ready,
        ready_count = status.ready_count,
        total_count = status.total_count,
        "url checker initialized"
    );

    let state = AppState {
        checker: Arc::clone(&checker),
        metrics: Arc::new(metrics::Metrics::new()),
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.bind_host, config.bind_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind API address");
    tracing::info!(%addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    checker.shutdown().await;
}

/// Build threat sources from configuration: one file source per configured
/// feed file, one HTTP source per configured endpoint.
fn build_sources(
    config: &config::Config,
) -> Result<Vec<Arc<dyn ThreatSource>>, SourceConfigError> {
    let mut sources: Vec<Arc<dyn ThreatSource>> = Vec::new();

    for file_path in &config.feed_files {
        let basename = file_path.rsplit('/').next().unwrap_or(file_path.as_str());
        let name = format!("file-{basename}");
        let source =
            FileSource::new(&name, file_path, "csv")?.with_query_timeout(config.source_timeout);
        tracing::info!(source = %name, path = %file_path, "configured file source");
        sources.push(Arc::new(source));
    }

    for (idx, endpoint) in config.feed_endpoints.iter().enumerate() {
        let name = format!("http-endpoint-{idx}");
        let source =
            HttpSource::new(&name, endpoint, "GET")?.with_query_timeout(config.source_timeout);
        tracing::info!(source = %name, endpoint = %endpoint, "configured http source");
        sources.push(Arc::new(source));
    }

    Ok(sources)
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::overall))
        .route("/urlinfo/health", get(handlers::health::urlinfo))
        .route("/metrics", get(handlers::metrics_snapshot))
        .route("/urlinfo/1/*rest", get(handlers::urlinfo::lookup))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::track,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for shutdown signal");
    tracing::info!("shutdown signal received");
}
