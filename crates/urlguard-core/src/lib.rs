//! # urlguard-core
//!
//! Aggregation engine for the urlguard URL reputation service.
//!
//! A lookup for `(hostname, port, path)` fans out concurrently to every
//! ready threat-intelligence source, the per-source verdicts are merged
//! under an any-source-wins policy, and the merged result is cached with a
//! TTL and a size bound. One slow or dead source can never stall or fail
//! the overall query: each source is bounded by its own timeout, and every
//! operational failure below the source boundary is converted into verdict
//! data rather than an error.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | File- and HTTP-backed source implementations |
//! | [`cache`] | Bounded TTL cache for merged verdicts |
//! | [`checker`] | The aggregator: fan-out, merge, cache, readiness |
//! | [`circuit_breaker`] | Breaker guarding remote feed endpoints |
//! | [`error`] | Validation and configuration error types |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`source`] | Source adapter contract and lookup query types |
//! | [`validate`] | URL input validation and normalization |
//! | [`verdict`] | Verdict domain model |
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ Request layer    │  validate → deadline → respond
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ UrlChecker       │────▶│ VerdictCache     │
//! │ (fan-out, merge) │     │ (TTL + bound)    │
//! └────────┬─────────┘     └──────────────────┘
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ ThreatSource     │────▶│ HttpClient       │
//! │ (file / http)    │     │ (reqwest / test) │
//! └──────────────────┘     └──────────────────┘
//! ```

pub mod adapters;
pub mod cache;
pub mod checker;
pub mod circuit_breaker;
pub mod error;
pub mod http_client;
pub mod source;
pub mod validate;
pub mod verdict;

pub use adapters::{FeedFormat, FileSource, HttpSource, QueryMethod};
pub use cache::VerdictCache;
pub use checker::{CheckResult, CheckerStatus, SourceStatus, UrlChecker};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use error::{CoreError, SourceConfigError, ValidationError};
pub use http_client::{
    HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, NoopHttpClient,
    ReqwestHttpClient, StaticHttpClient,
};
pub use source::{SourceFuture, SourceState, ThreatSource, UrlQuery};
pub use verdict::{ThreatLevel, ThreatType, UtcDateTime, Verdict};
