//! HTTP-backed threat source: queries a remote lookup endpoint per URL.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::http_client::{HttpClient, HttpRequest, ReqwestHttpClient};
use crate::source::{SourceFuture, ThreatSource, UrlQuery};
use crate::verdict::{ThreatLevel, ThreatType, Verdict};
use crate::SourceConfigError;

const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// How the lookup endpoint is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMethod {
    Get,
    Post,
}

impl FromStr for QueryMethod {
    type Err = SourceConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            other => Err(SourceConfigError::UnsupportedMethod {
                value: other.to_owned(),
            }),
        }
    }
}

/// Threat source backed by a remote HTTP endpoint.
///
/// Initialization is optimistic: the endpoint is probed, but the source
/// comes up ready whatever the outcome, so a transient outage is retried on
/// every query rather than disabling the source for the process lifetime.
/// A circuit breaker keeps a dead upstream from consuming the full query
/// timeout on every lookup while it stays down.
pub struct HttpSource {
    name: String,
    endpoint_url: String,
    method: QueryMethod,
    query_timeout: Duration,
    headers: BTreeMap<String, String>,
    http_client: Arc<dyn HttpClient>,
    breaker: CircuitBreaker,
    ready: AtomicBool,
}

impl std::fmt::Debug for HttpSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSource")
            .field("name", &self.name)
            .field("endpoint_url", &self.endpoint_url)
            .field("method", &self.method)
            .field("query_timeout", &self.query_timeout)
            .field("headers", &self.headers)
            .field("breaker", &self.breaker)
            .field("ready", &self.ready)
            .finish_non_exhaustive()
    }
}

impl HttpSource {
    /// Create an HTTP source. The method string is validated here: an
    /// unsupported method is a configuration error at construction.
    pub fn new(
        name: impl Into<String>,
        endpoint_url: impl Into<String>,
        method: &str,
    ) -> Result<Self, SourceConfigError> {
        Ok(Self {
            name: name.into(),
            endpoint_url: endpoint_url.into(),
            method: method.parse()?,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            headers: BTreeMap::new(),
            http_client: Arc::new(ReqwestHttpClient::new()),
            breaker: CircuitBreaker::default(),
            ready: AtomicBool::new(false),
        })
    }

    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = http_client;
        self
    }

    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker = CircuitBreaker::new(config);
        self
    }

    fn build_request(&self, query: &UrlQuery) -> HttpRequest {
        let timeout_ms = self.query_timeout.as_millis().min(u128::from(u64::MAX)) as u64;
        let mut request = match self.method {
            QueryMethod::Get => {
                let url = format!(
                    "{}?hostname={}&port={}&path={}",
                    self.endpoint_url,
                    urlencoding::encode(query.hostname()),
                    query.port(),
                    urlencoding::encode(query.path()),
                );
                HttpRequest::get(url)
            }
            QueryMethod::Post => {
                let body = serde_json::json!({
                    "hostname": query.hostname(),
                    "port": query.port(),
                    "path": query.path(),
                });
                HttpRequest::post(&self.endpoint_url).with_json_body(body.to_string())
            }
        };

        for (name, value) in &self.headers {
            request = request.with_header(name, value);
        }
        request.with_timeout_ms(timeout_ms)
    }

    /// Map the endpoint's JSON payload to a verdict, accepting the
    /// alternate key spellings remote feeds use.
    fn parse_response(&self, data: &Value) -> Verdict {
        let is_malicious = first_key(data, &["is_malicious", "malicious", "threat_detected"])
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let threat_type = first_key(data, &["threat_type", "type"])
            .and_then(Value::as_str)
            .map(ThreatType::from_feed);

        let threat_level = first_key(data, &["threat_level", "level"])
            .and_then(Value::as_str)
            .and_then(|level| level.parse().ok())
            .unwrap_or(if is_malicious {
                ThreatLevel::Medium
            } else {
                ThreatLevel::Safe
            });

        let confidence = first_key(data, &["confidence_score", "confidence"])
            .and_then(Value::as_f64)
            .unwrap_or(if is_malicious { 1.0 } else { 0.0 });

        let mut verdict = Verdict::new(
            is_malicious,
            threat_type,
            threat_level,
            confidence,
            Some(self.name.clone()),
        );

        if let Some(metadata) = data.get("metadata").and_then(Value::as_object) {
            for (key, value) in metadata {
                verdict = verdict.with_metadata(key, value.clone());
            }
        }

        verdict
    }
}

impl ThreatSource for HttpSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    fn initialize(&self) -> SourceFuture<'_, Result<(), SourceConfigError>> {
        Box::pin(async move {
            let probe = HttpRequest::get(&self.endpoint_url)
                .with_timeout_ms(self.query_timeout.as_millis().min(u128::from(u64::MAX)) as u64);

            match self.http_client.execute(probe).await {
                Ok(response) if response.is_success() => {
                    tracing::info!(source = %self.name, endpoint = %self.endpoint_url, "http source initialized");
                }
                Ok(response) => {
                    tracing::warn!(
                        source = %self.name,
                        status = response.status,
                        "http source probe returned non-success status"
                    );
                }
                Err(error) => {
                    tracing::warn!(
                        source = %self.name,
                        %error,
                        "http source connectivity check failed, staying ready"
                    );
                }
            }

            // Optimistic availability: an unreachable endpoint is retried
            // per-query, not disabled for the process lifetime.
            self.ready.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn shutdown(&self) -> SourceFuture<'_, ()> {
        Box::pin(async move {
            self.ready.store(false, Ordering::SeqCst);
        })
    }

    fn lookup(&self, query: UrlQuery) -> SourceFuture<'_, Verdict> {
        Box::pin(async move {
            if !self.is_ready() {
                return Verdict::source_failure(&self.name, "source not ready");
            }

            if !self.breaker.allow_request() {
                return Verdict::source_failure(&self.name, "upstream circuit open");
            }

            let request = self.build_request(&query);
            match self.http_client.execute(request).await {
                Ok(response) if response.status == 200 => {
                    self.breaker.record_success();
                    match serde_json::from_str::<Value>(&response.body) {
                        Ok(data) => self.parse_response(&data),
                        Err(error) => {
                            tracing::warn!(source = %self.name, %error, "malformed upstream payload");
                            Verdict::source_failure(
                                &self.name,
                                format!("malformed upstream payload: {error}"),
                            )
                        }
                    }
                }
                Ok(response) => {
                    self.breaker.record_failure();
                    tracing::warn!(
                        source = %self.name,
                        status = response.status,
                        "upstream returned non-success status"
                    );
                    Verdict::safe(&self.name)
                        .with_metadata("http_status", Value::from(response.status))
                }
                Err(error) => {
                    self.breaker.record_failure();
                    tracing::warn!(source = %self.name, %error, "upstream query failed");
                    let reason = if error.timed_out() {
                        String::from("timeout")
                    } else {
                        error.message().to_owned()
                    };
                    Verdict::source_failure(&self.name, reason)
                }
            }
        })
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

fn first_key<'a>(data: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| data.get(*key))
}
