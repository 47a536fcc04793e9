//! The aggregation engine: fans a lookup out to every ready source,
//! merges the verdicts, and caches the result.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use tokio::task::JoinSet;

use crate::cache::VerdictCache;
use crate::source::{SourceState, ThreatSource, UrlQuery};
use crate::verdict::{ThreatLevel, Verdict};
use crate::SourceConfigError;

/// A registered source: the adapter handle plus its tracked lifecycle
/// state. State changes only during initialize/shutdown, so a plain mutex
/// is enough.
struct Registration {
    source: Arc<dyn ThreatSource>,
    state: Mutex<SourceState>,
}

impl Registration {
    fn state(&self) -> SourceState {
        *self.state.lock().expect("source state lock is not poisoned")
    }

    fn set_state(&self, state: SourceState) {
        *self.state.lock().expect("source state lock is not poisoned") = state;
    }
}

/// Point-in-time readiness snapshot for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub state: SourceState,
}

/// Aggregate readiness report, consumed by health-check endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct CheckerStatus {
    pub overall_ready: bool,
    pub ready_count: usize,
    pub total_count: usize,
    pub sources: Vec<SourceStatus>,
}

/// Unified verdict for one lookup, with provenance.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub verdict: Verdict,
    /// Names of every source the checker dispatched to for this call, in
    /// registration order — including sources that timed out or failed.
    /// Empty when the result came from the cache or no source was ready.
    pub sources_queried: Vec<String>,
    pub served_from_cache: bool,
    pub elapsed_ms: u64,
}

impl CheckResult {
    fn cached(verdict: Verdict, started: Instant) -> Self {
        Self {
            verdict,
            sources_queried: Vec::new(),
            served_from_cache: true,
            elapsed_ms: elapsed_ms(started),
        }
    }
}

/// The aggregator. Owns the registered sources and the verdict cache;
/// `check_url` is the single lookup entry point.
///
/// The checker never fails a lookup for operational reasons — no ready
/// sources, all sources timing out, and cache trouble all degrade to a
/// result rather than an error. An overall per-request deadline belongs to
/// the caller; dropping the `check_url` future abandons any still-pending
/// source tasks.
pub struct UrlChecker {
    sources: Vec<Registration>,
    cache: VerdictCache,
}

impl std::fmt::Debug for UrlChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlChecker")
            .field("source_count", &self.sources.len())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl UrlChecker {
    /// Register the given sources. Names must be non-empty and unique:
    /// provenance and per-source health reporting would otherwise be
    /// ambiguous.
    pub fn new(
        sources: Vec<Arc<dyn ThreatSource>>,
        cache: VerdictCache,
    ) -> Result<Self, SourceConfigError> {
        let mut seen = HashSet::new();
        for source in &sources {
            let name = source.name().to_owned();
            if name.is_empty() {
                return Err(SourceConfigError::EmptyName);
            }
            if !seen.insert(name.clone()) {
                return Err(SourceConfigError::DuplicateName { name });
            }
        }

        let sources = sources
            .into_iter()
            .map(|source| Registration {
                source,
                state: Mutex::new(SourceState::NotInitialized),
            })
            .collect();

        Ok(Self { sources, cache })
    }

    /// Initialize every source. A configuration failure marks that source
    /// `Failed` and moves on; the remaining sources keep serving.
    pub async fn initialize(&self) {
        for registration in &self.sources {
            let name = registration.source.name().to_owned();
            match registration.source.initialize().await {
                Ok(()) => {
                    registration.set_state(SourceState::Ready);
                    tracing::info!(source = %name, "threat source ready");
                }
                Err(error) => {
                    registration.set_state(SourceState::Failed);
                    tracing::warn!(source = %name, %error, "threat source failed to initialize");
                }
            }
        }
    }

    /// Shut down every source. Idempotent; failed sources are skipped.
    pub async fn shutdown(&self) {
        for registration in &self.sources {
            if registration.state() == SourceState::Ready {
                registration.source.shutdown().await;
            }
            registration.set_state(SourceState::Stopped);
        }
        tracing::info!("url checker stopped");
    }

    /// True once at least one source is ready to answer queries.
    pub fn is_ready(&self) -> bool {
        self.sources
            .iter()
            .any(|registration| registration.state() == SourceState::Ready)
    }

    pub fn status(&self) -> CheckerStatus {
        let sources: Vec<SourceStatus> = self
            .sources
            .iter()
            .map(|registration| SourceStatus {
                name: registration.source.name().to_owned(),
                state: registration.state(),
            })
            .collect();

        let ready_count = sources
            .iter()
            .filter(|status| status.state == SourceState::Ready)
            .count();

        CheckerStatus {
            overall_ready: ready_count > 0,
            ready_count,
            total_count: sources.len(),
            sources,
        }
    }

    pub fn cache(&self) -> &VerdictCache {
        &self.cache
    }

    /// Check one URL against every ready source.
    ///
    /// Cache hits return immediately with empty provenance. On a miss the
    /// checker queries all ready sources concurrently, each bounded by its
    /// own query timeout; a source that times out, panics, or is found
    /// unready contributes a failure verdict instead of blocking the merge.
    pub async fn check_url(&self, query: &UrlQuery) -> CheckResult {
        let started = Instant::now();
        let key = query.cache_key();

        if let Some(verdict) = self.cache.get(&key).await {
            tracing::debug!(%query, "lookup served from cache");
            return CheckResult::cached(verdict, started);
        }

        let ready: Vec<Arc<dyn ThreatSource>> = self
            .sources
            .iter()
            .filter(|registration| {
                registration.state() == SourceState::Ready && registration.source.is_ready()
            })
            .map(|registration| Arc::clone(&registration.source))
            .collect();

        if ready.is_empty() {
            tracing::warn!(%query, "no ready sources, returning default verdict");
            return CheckResult {
                verdict: Verdict::safe_default(),
                sources_queried: Vec::new(),
                served_from_cache: false,
                elapsed_ms: elapsed_ms(started),
            };
        }

        let sources_queried: Vec<String> = ready
            .iter()
            .map(|source| source.name().to_owned())
            .collect();

        let mut tasks = JoinSet::new();
        for (slot, source) in ready.into_iter().enumerate() {
            let query = query.clone();
            tasks.spawn(async move {
                let name = source.name().to_owned();
                let verdict =
                    match tokio::time::timeout(source.query_timeout(), source.lookup(query)).await
                    {
                        Ok(verdict) => verdict,
                        Err(_) => {
                            tracing::warn!(source = %name, "source lookup timed out");
                            Verdict::source_failure(name, "timeout")
                        }
                    };
                (slot, verdict)
            });
        }

        // Collected back into registration order so the merge tie-break is
        // deterministic regardless of completion order.
        let mut verdicts: Vec<Option<Verdict>> = vec![None; sources_queried.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, verdict)) => verdicts[slot] = Some(verdict),
                Err(error) => {
                    tracing::error!(%error, "source lookup task aborted");
                }
            }
        }

        let collected: Vec<Verdict> = verdicts.into_iter().flatten().collect();
        let merged = merge_verdicts(&collected);

        self.cache.put(key, merged.clone()).await;

        let result = CheckResult {
            verdict: merged,
            sources_queried,
            served_from_cache: false,
            elapsed_ms: elapsed_ms(started),
        };

        tracing::info!(
            %query,
            is_malicious = result.verdict.is_malicious,
            sources = result.sources_queried.len(),
            elapsed_ms = result.elapsed_ms,
            "url lookup complete"
        );

        result
    }
}

/// Merge policy: any malicious verdict makes the aggregate malicious; the
/// aggregate severity is the maximum observed among malicious verdicts, and
/// the threat type, confidence, and producing source come from the first
/// verdict (in registration order) at that severity. Commutative and
/// associative over the verdict set, so completion order never matters.
fn merge_verdicts(verdicts: &[Verdict]) -> Verdict {
    let mut dominant: Option<&Verdict> = None;
    for verdict in verdicts.iter().filter(|verdict| verdict.is_malicious) {
        match dominant {
            Some(current) if verdict.threat_level <= current.threat_level => {}
            _ => dominant = Some(verdict),
        }
    }

    match dominant {
        Some(verdict) => Verdict::new(
            true,
            verdict.threat_type,
            verdict.threat_level,
            verdict.confidence_score,
            verdict.detected_by.clone(),
        ),
        None => Verdict::new(false, None, ThreatLevel::Safe, 0.0, None),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}
