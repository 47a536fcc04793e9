//! File-backed threat source: a CSV or JSON feed loaded into memory.

use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use serde_json::Value;

use crate::source::{SourceFuture, ThreatSource, UrlQuery};
use crate::verdict::{ThreatLevel, ThreatType, Verdict};
use crate::SourceConfigError;

const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Supported feed file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Csv,
    Json,
}

impl FromStr for FeedFormat {
    type Err = SourceConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(SourceConfigError::UnsupportedFormat {
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FeedEntry {
    hostname: String,
    port: u16,
    path: String,
}

/// Threat source backed by a local feed file.
///
/// The feed is read once at initialize. A missing file is not an outage —
/// the source comes up ready with an empty dataset — but a file that exists
/// and cannot be parsed is a configuration error.
#[derive(Debug)]
pub struct FileSource {
    name: String,
    file_path: PathBuf,
    format: FeedFormat,
    query_timeout: Duration,
    entries: RwLock<HashSet<FeedEntry>>,
    ready: AtomicBool,
}

impl FileSource {
    /// Create a file source. The format string is validated here: an
    /// unsupported format is a configuration error at construction, before
    /// any I/O happens.
    pub fn new(
        name: impl Into<String>,
        file_path: impl Into<PathBuf>,
        format: &str,
    ) -> Result<Self, SourceConfigError> {
        Ok(Self {
            name: name.into(),
            file_path: file_path.into(),
            format: format.parse()?,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            entries: RwLock::new(HashSet::new()),
            ready: AtomicBool::new(false),
        })
    }

    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    /// Number of feed entries currently loaded.
    pub fn database_size(&self) -> usize {
        self.entries
            .read()
            .expect("feed entries lock is not poisoned")
            .len()
    }

    fn store_entries(&self, entries: HashSet<FeedEntry>) {
        *self
            .entries
            .write()
            .expect("feed entries lock is not poisoned") = entries;
    }

    fn matches(&self, query: &UrlQuery) -> bool {
        let entries = self
            .entries
            .read()
            .expect("feed entries lock is not poisoned");

        let exact = FeedEntry {
            hostname: query.hostname().to_owned(),
            port: query.port(),
            path: query.path().to_owned(),
        };
        if entries.contains(&exact) {
            return true;
        }

        // Lenient match: a listed hostname+port flags every path under it.
        entries
            .iter()
            .any(|entry| entry.hostname == query.hostname() && entry.port == query.port())
    }
}

impl ThreatSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    fn initialize(&self) -> SourceFuture<'_, Result<(), SourceConfigError>> {
        Box::pin(async move {
            if !self.file_path.exists() {
                tracing::warn!(
                    source = %self.name,
                    path = %self.file_path.display(),
                    "feed file not found, starting with empty dataset"
                );
                self.ready.store(true, Ordering::SeqCst);
                return Ok(());
            }

            let content = tokio::fs::read_to_string(&self.file_path)
                .await
                .map_err(|error| SourceConfigError::MalformedFeed {
                    path: self.file_path.display().to_string(),
                    reason: error.to_string(),
                })?;

            let entries = match self.format {
                FeedFormat::Csv => parse_csv_feed(&content),
                FeedFormat::Json => parse_json_feed(&content).map_err(|reason| {
                    SourceConfigError::MalformedFeed {
                        path: self.file_path.display().to_string(),
                        reason,
                    }
                })?,
            };

            tracing::info!(
                source = %self.name,
                path = %self.file_path.display(),
                entries = entries.len(),
                "feed loaded"
            );
            self.store_entries(entries);
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

            let size = self.database_size();
            let verdict = if self.matches(&query) {
                Verdict::malicious(&self.name, ThreatType::Malware, ThreatLevel::High, 1.0)
            } else {
                Verdict::safe(&self.name)
            };

            verdict.with_metadata("database_size", Value::from(size))
        })
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Parse a `hostname,port,path` CSV feed with a header row. Rows with a
/// missing hostname are skipped; an unparsable port defaults to 80 and a
/// blank path to `/`.
fn parse_csv_feed(content: &str) -> HashSet<FeedEntry> {
    let mut entries = HashSet::new();
    let mut lines = content.lines();

    let Some(header) = lines.next() else {
        return entries;
    };
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    let Some(hostname_col) = columns.iter().position(|name| *name == "hostname") else {
        return entries;
    };
    let port_col = columns.iter().position(|name| *name == "port");
    let path_col = columns.iter().position(|name| *name == "path");

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();

        let hostname = fields
            .get(hostname_col)
            .map(|field| field.trim().to_ascii_lowercase())
            .unwrap_or_default();
        if hostname.is_empty() {
            continue;
        }

        entries.insert(FeedEntry {
            hostname,
            port: field_port(port_col.and_then(|idx| fields.get(idx).copied())),
            path: field_path(path_col.and_then(|idx| fields.get(idx).copied())),
        });
    }

    entries
}

/// Parse a JSON feed: either a top-level array of entries or an object
/// holding the array under one of the keys `urls`, `malware_urls`,
/// `entries`, `data`.
fn parse_json_feed(content: &str) -> Result<HashSet<FeedEntry>, String> {
    let value: Value = serde_json::from_str(content).map_err(|error| error.to_string())?;

    let empty: &[Value] = &[];
    let items: &[Value] = match &value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => ["urls", "malware_urls", "entries", "data"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .map(Vec::as_slice)
            .unwrap_or(empty),
        _ => empty,
    };

    let mut entries = HashSet::new();
    for item in items {
        let Some(entry) = item.as_object() else {
            continue;
        };

        let hostname = entry
            .get("hostname")
            .and_then(Value::as_str)
            .map(|hostname| hostname.trim().to_ascii_lowercase())
            .unwrap_or_default();
        if hostname.is_empty() {
            continue;
        }

        entries.insert(FeedEntry {
            hostname,
            port: json_port(entry.get("port")),
            path: field_path(entry.get("path").and_then(Value::as_str)),
        });
    }

    Ok(entries)
}

fn field_port(field: Option<&str>) -> u16 {
    field
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(80)
}

fn json_port(value: Option<&Value>) -> u16 {
    match value {
        Some(Value::Number(number)) => number
            .as_u64()
            .and_then(|port| u16::try_from(port).ok())
            .unwrap_or(80),
        Some(Value::String(text)) => field_port(Some(text)),
        _ => 80,
    }
}

fn field_path(field: Option<&str>) -> String {
    match field.map(str::trim) {
        Some(path) if !path.is_empty() => path.to_owned(),
        _ => String::from("/"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_feed_parses_rows_and_defaults() {
        let content = "hostname,port,path\n\
                       Example.com,80,/\n\
                       evil.net,443,/trojan\n\
                       bad.org,not-a-port,\n\
                       ,80,/skipped\n";
        let entries = parse_csv_feed(content);

        assert_eq!(entries.len(), 3);
        assert!(entries.contains(&FeedEntry {
            hostname: String::from("example.com"),
            port: 80,
            path: String::from("/"),
        }));
        // Unparsable port falls back to 80, blank path to "/".
        assert!(entries.contains(&FeedEntry {
            hostname: String::from("bad.org"),
            port: 80,
            path: String::from("/"),
        }));
    }

    #[test]
    fn csv_feed_without_hostname_column_is_empty() {
        let entries = parse_csv_feed("host,port\nexample.com,80\n");
        assert!(entries.is_empty());
    }

    #[test]
    fn json_feed_accepts_array_and_wrapped_shapes() {
        let array = r#"[{"hostname": "evil.net", "port": 443, "path": "/trojan"}]"#;
        let wrapped = r#"{"urls": [{"hostname": "evil.net", "port": "443", "path": "/trojan"}]}"#;

        for content in [array, wrapped] {
            let entries = parse_json_feed(content).expect("valid feed");
            assert!(entries.contains(&FeedEntry {
                hostname: String::from("evil.net"),
                port: 443,
                path: String::from("/trojan"),
            }));
        }
    }

    #[test]
    fn json_feed_rejects_invalid_json() {
        assert!(parse_json_feed("{not json").is_err());
    }

    #[test]
    fn unsupported_format_is_a_configuration_error() {
        let err = FileSource::new("feed", "/tmp/feed.xml", "xml").expect_err("must fail");
        assert!(matches!(err, SourceConfigError::UnsupportedFormat { .. }));
    }
}
