//! Threat source contract and lookup query types.
//!
//! This module defines the adapter contract ([`ThreatSource`]) that every
//! threat-intelligence backend must satisfy, the normalized lookup target
//! ([`UrlQuery`]), and the lifecycle state tracked per registered source.
//!
//! # Contract
//!
//! | Operation | Description |
//! |-----------|-------------|
//! | [`initialize`](ThreatSource::initialize) | One-time setup; fails only on configuration errors |
//! | [`shutdown`](ThreatSource::shutdown) | Release resources; idempotent |
//! | [`lookup`](ThreatSource::lookup) | Produce a [`Verdict`]; operational failures become data |
//! | [`is_ready`](ThreatSource::is_ready) | Whether the source currently accepts queries |
//!
//! `lookup` is deliberately infallible: a source that cannot answer (network
//! error, malformed upstream payload, backend error status) returns a
//! non-malicious verdict carrying the reason under `metadata.error`, never an
//! `Err` the aggregator would have to distinguish.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{SourceConfigError, ValidationError, Verdict};

/// Boxed future returned by the trait methods, mirroring the adapter style
/// used throughout the codebase.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Normalized lookup target: the (hostname, port, path) triple every source
/// is queried with.
///
/// Construction normalizes the hostname to lowercase and defaults an empty
/// path to `/`, so equivalent inputs always produce the same cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UrlQuery {
    hostname: String,
    port: u16,
    path: String,
}

impl UrlQuery {
    pub fn new(
        hostname: impl Into<String>,
        port: u16,
        path: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let hostname = hostname.into().trim().to_ascii_lowercase();
        if hostname.is_empty() {
            return Err(ValidationError::EmptyHostname);
        }

        if port == 0 {
            return Err(ValidationError::InvalidPort {
                value: String::from("0"),
            });
        }

        let path = path.into();
        let path = path.trim();
        let path = if path.is_empty() {
            String::from("/")
        } else if path.starts_with('/') {
            path.to_owned()
        } else {
            return Err(ValidationError::PathMissingSlash {
                value: path.to_owned(),
            });
        };

        Ok(Self {
            hostname,
            port,
            path,
        })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Canonical cache key. Pure and deterministic: equivalent queries map
    /// to the same key.
    pub fn cache_key(&self) -> String {
        format!("{}:{}{}", self.hostname, self.port, self.path)
    }
}

impl Display for UrlQuery {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.cache_key())
    }
}

/// Lifecycle state of a registered source.
///
/// Legal transitions: `NotInitialized -> Ready` on successful initialize,
/// `NotInitialized -> Failed` on a configuration error, `Ready -> Stopped`
/// on shutdown. A failed source is never retried into `Ready` without a
/// fresh initialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceState {
    NotInitialized,
    Ready,
    Failed,
    Stopped,
}

impl SourceState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotInitialized => "not_initialized",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }
}

impl Display for SourceState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Threat source adapter contract.
///
/// Every backend variant — file feed, remote HTTP endpoint — implements this
/// trait; the checker is written solely against it and holds sources as
/// `Arc<dyn ThreatSource>`.
///
/// # Thread safety
///
/// Implementations must be `Send + Sync`: the checker queries all ready
/// sources concurrently from spawned tasks.
pub trait ThreatSource: Send + Sync {
    /// Unique identifier for this source, used in provenance and health
    /// reporting. Uniqueness across registered sources is enforced at
    /// checker construction.
    fn name(&self) -> &str;

    /// Budget for a single `lookup`. The checker abandons a lookup that
    /// exceeds it and substitutes a timeout verdict.
    fn query_timeout(&self) -> Duration;

    /// One-time setup: load a feed into memory, probe a remote endpoint.
    ///
    /// Ordinary unreachability of a remote backend must NOT fail
    /// initialization — the source stays ready and transient failures
    /// surface per-query instead. Fails only on unrecoverable configuration
    /// problems (malformed feed content, unsupported format).
    fn initialize(&self) -> SourceFuture<'_, Result<(), SourceConfigError>>;

    /// Release resources. Idempotent; never fails.
    fn shutdown(&self) -> SourceFuture<'_, ()>;

    /// Produce a verdict for the query.
    ///
    /// Must not fail for ordinary operational reasons; those are captured
    /// into a non-malicious verdict with `metadata.error` set. Querying a
    /// source that is not ready yields such a verdict as well.
    fn lookup(&self, query: UrlQuery) -> SourceFuture<'_, Verdict>;

    /// Whether the source currently accepts queries.
    fn is_ready(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_normalizes_hostname_and_path() {
        let query = UrlQuery::new("  EVIL.Net ", 443, "").expect("valid query");
        assert_eq!(query.hostname(), "evil.net");
        assert_eq!(query.path(), "/");
        assert_eq!(query.cache_key(), "evil.net:443/");
    }

    #[test]
    fn equivalent_queries_share_a_cache_key() {
        let first = UrlQuery::new("Example.com", 80, "/a").expect("valid query");
        let second = UrlQuery::new("example.COM", 80, "/a").expect("valid query");
        assert_eq!(first.cache_key(), second.cache_key());
    }

    #[test]
    fn rejects_structurally_invalid_input() {
        assert!(matches!(
            UrlQuery::new("", 80, "/"),
            Err(ValidationError::EmptyHostname)
        ));
        assert!(matches!(
            UrlQuery::new("example.com", 0, "/"),
            Err(ValidationError::InvalidPort { .. })
        ));
        assert!(matches!(
            UrlQuery::new("example.com", 80, "no-slash"),
            Err(ValidationError::PathMissingSlash { .. })
        ));
    }
}
