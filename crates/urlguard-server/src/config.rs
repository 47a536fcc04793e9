//! Configuration loaded from environment variables.

use std::env;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address for the API server.
    pub bind_host: String,
    pub bind_port: u16,

    /// Local feed files (comma-separated in `MALWARE_DB_FILES`).
    pub feed_files: Vec<String>,

    /// Remote lookup endpoints (comma-separated in `MALWARE_DB_HTTP_URLS`).
    pub feed_endpoints: Vec<String>,

    /// Verdict cache tuning.
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,

    /// Budget for a single source lookup.
    pub source_timeout: Duration,

    /// Overall deadline for one API request.
    pub request_timeout: Duration,

    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables, falling back to the
    /// defaults the service ships with.
    pub fn from_env() -> Self {
        Self {
            bind_host: env::var("API_HOST").unwrap_or_else(|_| String::from("0.0.0.0")),

            bind_port: env::var("API_PORT")
                .ok()
                .and_then(|port| port.parse().ok())
                .unwrap_or(8000),

            feed_files: env::var("MALWARE_DB_FILES")
                .map(|raw| parse_list(&raw))
                .unwrap_or_else(|_| vec![String::from("data/malware_lists/sample_malware.csv")]),

            feed_endpoints: env::var("MALWARE_DB_HTTP_URLS")
                .map(|raw| parse_list(&raw))
                .unwrap_or_default(),

            cache_enabled: env::var("CACHE_ENABLED")
                .ok()
                .and_then(|flag| parse_bool(&flag))
                .unwrap_or(true),

            cache_ttl: env::var("CACHE_TTL_SECONDS")
                .ok()
                .and_then(|secs| parse_secs(&secs))
                .unwrap_or(Duration::from_secs(3600)),

            cache_max_entries: env::var("CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|count| count.parse().ok())
                .unwrap_or(10_000),

            source_timeout: env::var("DB_QUERY_TIMEOUT_SECONDS")
                .ok()
                .and_then(|secs| parse_secs(&secs))
                .unwrap_or(Duration::from_secs(5)),

            request_timeout: env::var("API_REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|secs| parse_secs(&secs))
                .unwrap_or(Duration::from_secs(10)),

            log_level: env::var("API_LOG_LEVEL").unwrap_or_else(|_| String::from("info")),
        }
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_owned)
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_secs(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().parse().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}
