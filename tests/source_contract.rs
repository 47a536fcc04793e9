//! Contract tests: every source adapter variant satisfies the
//! four-operation contract the checker is written against.

use std::io::Write;
use std::sync::Arc;

use tempfile::NamedTempFile;
use urlguard_core::{
    CircuitBreakerConfig, FileSource, HttpError, HttpResponse, HttpSource, NoopHttpClient,
    SourceConfigError, StaticHttpClient, ThreatLevel, ThreatSource, ThreatType, UrlQuery,
};

const MALWARE_CSV: &str = "hostname,port,path\n\
                           example.com,80,/\n\
                           evil.net,443,/trojan\n\
                           bad.org,8080,/malware.exe\n";

const MALWARE_JSON: &str =
    r#"{"urls": [{"hostname": "evil.net", "port": 443, "path": "/trojan"}]}"#;

fn write_feed(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp feed file");
    file.write_all(content.as_bytes()).expect("write feed");
    file
}

fn query(hostname: &str, port: u16, path: &str) -> UrlQuery {
    UrlQuery::new(hostname, port, path).expect("valid query")
}

struct SourceCase {
    label: &'static str,
    source: Arc<dyn ThreatSource>,
    _feed: Option<NamedTempFile>,
}

fn contract_cases() -> Vec<SourceCase> {
    let csv_feed = write_feed(MALWARE_CSV);
    let json_feed = write_feed(MALWARE_JSON);

    vec![
        SourceCase {
            label: "file-csv",
            source: Arc::new(
                FileSource::new("file-csv", csv_feed.path(), "csv").expect("valid source"),
            ),
            _feed: Some(csv_feed),
        },
        SourceCase {
            label: "file-json",
            source: Arc::new(
                FileSource::new("file-json", json_feed.path(), "json").expect("valid source"),
            ),
            _feed: Some(json_feed),
        },
        SourceCase {
            label: "http",
            source: Arc::new(
                HttpSource::new("http", "https://intel.example.test/check", "GET")
                    .expect("valid source")
                    .with_http_client(Arc::new(NoopHttpClient)),
            ),
            _feed: None,
        },
    ]
}

#[tokio::test]
async fn sources_become_ready_after_initialize() {
    for case in contract_cases() {
        assert!(
            !case.source.is_ready(),
            "source '{}': must not be ready before initialize",
            case.label
        );

        case.source
            .initialize()
            .await
            .unwrap_or_else(|error| panic!("source '{}' failed: {error}", case.label));

        assert!(
            case.source.is_ready(),
            "source '{}': must be ready after initialize",
            case.label
        );
    }
}

#[tokio::test]
async fn lookup_before_initialize_reports_not_ready_as_metadata() {
    for case in contract_cases() {
        let verdict = case.source.lookup(query("evil.net", 443, "/trojan")).await;

        assert!(
            !verdict.is_malicious,
            "source '{}': unready lookup must not flag",
            case.label
        );
        assert_eq!(
            verdict.error_reason(),
            Some("source not ready"),
            "source '{}': unready reason",
            case.label
        );
    }
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    for case in contract_cases() {
        case.source.initialize().await.expect("initialize");
        case.source.shutdown().await;
        case.source.shutdown().await;
        assert!(
            !case.source.is_ready(),
            "source '{}': must not be ready after shutdown",
            case.label
        );
    }
}

#[tokio::test]
async fn missing_feed_file_still_initializes_ready() {
    let source = FileSource::new("file-absent", "/nonexistent/feed.csv", "csv")
        .expect("valid source");

    source.initialize().await.expect("absent feed is not an outage");
    assert!(source.is_ready());
    assert_eq!(source.database_size(), 0);

    let verdict = source.lookup(query("evil.net", 443, "/trojan")).await;
    assert!(!verdict.is_malicious);
}

#[tokio::test]
async fn malformed_json_feed_is_a_configuration_error() {
    let feed = write_feed("{this is not json");
    let source = FileSource::new("file-bad", feed.path(), "json").expect("valid source");

    let error = source.initialize().await.expect_err("must fail");
    assert!(matches!(error, SourceConfigError::MalformedFeed { .. }));
    assert!(!source.is_ready());
}

#[tokio::test]
async fn file_source_flags_exact_and_hostname_port_matches() {
    let feed = write_feed(MALWARE_CSV);
    let source = FileSource::new("file-malware", feed.path(), "csv").expect("valid source");
    source.initialize().await.expect("initialize");
    assert_eq!(source.database_size(), 3);

    let exact = source.lookup(query("evil.net", 443, "/trojan")).await;
    assert!(exact.is_malicious);
    assert_eq!(exact.threat_type, Some(ThreatType::Malware));
    assert_eq!(exact.threat_level, ThreatLevel::High);
    assert_eq!(exact.confidence_score, 1.0);
    assert_eq!(exact.detected_by.as_deref(), Some("file-malware"));

    // A listed hostname+port flags every path under it.
    let lenient = source.lookup(query("evil.net", 443, "/other")).await;
    assert!(lenient.is_malicious);

    // Same hostname on an unlisted port does not match.
    let other_port = source.lookup(query("evil.net", 80, "/trojan")).await;
    assert!(!other_port.is_malicious);
    assert_eq!(
        other_port.metadata.get("database_size"),
        Some(&serde_json::Value::from(3))
    );
}

#[tokio::test]
async fn file_source_lookup_is_case_insensitive_on_hostname() {
    let feed = write_feed(MALWARE_CSV);
    let source = FileSource::new("file-malware", feed.path(), "csv").expect("valid source");
    source.initialize().await.expect("initialize");

    let verdict = source.lookup(query("EVIL.net", 443, "/trojan")).await;
    assert!(verdict.is_malicious);
}

#[tokio::test]
async fn http_source_parses_upstream_verdict() {
    let transport = StaticHttpClient::with_responses([
        // Initialization probe.
        Ok(HttpResponse::ok_json("{}")),
        Ok(HttpResponse::ok_json(
            r#"{"is_malicious": true, "threat_type": "phishing", "threat_level": "high", "confidence_score": 0.9}"#,
        )),
    ]);
    let source = HttpSource::new("online-api", "https://intel.example.test/check", "GET")
        .expect("valid source")
        .with_http_client(Arc::new(transport));

    source.initialize().await.expect("initialize");
    let verdict = source.lookup(query("evil.net", 443, "/trojan")).await;

    assert!(verdict.is_malicious);
    assert_eq!(verdict.threat_type, Some(ThreatType::Phishing));
    assert_eq!(verdict.threat_level, ThreatLevel::High);
    assert_eq!(verdict.confidence_score, 0.9);
    assert_eq!(verdict.detected_by.as_deref(), Some("online-api"));
}

#[tokio::test]
async fn http_source_absorbs_upstream_failure_modes() {
    let transport = StaticHttpClient::with_responses([
        Ok(HttpResponse::ok_json("{}")),
        Err(HttpError::new("connection refused")),
        Ok(HttpResponse::with_status(500, "upstream exploded")),
        Ok(HttpResponse::ok_json("not json at all")),
    ]);
    let source = HttpSource::new("online-api", "https://intel.example.test/check", "GET")
        .expect("valid source")
        .with_http_client(Arc::new(transport));
    source.initialize().await.expect("initialize");

    let transport_error = source.lookup(query("evil.net", 443, "/")).await;
    assert!(!transport_error.is_malicious);
    assert_eq!(transport_error.error_reason(), Some("connection refused"));

    let bad_status = source.lookup(query("evil.net", 443, "/")).await;
    assert!(!bad_status.is_malicious);
    assert_eq!(
        bad_status.metadata.get("http_status"),
        Some(&serde_json::Value::from(500))
    );

    let malformed = source.lookup(query("evil.net", 443, "/")).await;
    assert!(!malformed.is_malicious);
    assert!(malformed
        .error_reason()
        .expect("reason present")
        .starts_with("malformed upstream payload"));
}

#[tokio::test]
async fn http_source_probe_failure_still_marks_ready() {
    let transport =
        StaticHttpClient::with_responses([Err(HttpError::new("endpoint unreachable"))]);
    let source = HttpSource::new("online-api", "https://intel.example.test/check", "GET")
        .expect("valid source")
        .with_http_client(Arc::new(transport));

    source.initialize().await.expect("optimistic availability");
    assert!(source.is_ready());
}

#[tokio::test]
async fn http_source_circuit_opens_after_repeated_failures() {
    let transport = StaticHttpClient::with_responses([
        Ok(HttpResponse::ok_json("{}")),
        Err(HttpError::new("connection refused")),
        Err(HttpError::new("connection refused")),
    ]);
    let source = HttpSource::new("online-api", "https://intel.example.test/check", "GET")
        .expect("valid source")
        .with_http_client(Arc::new(transport))
        .with_circuit_breaker(CircuitBreakerConfig {
            trip_threshold: 2,
            cooldown: std::time::Duration::from_secs(60),
        });
    source.initialize().await.expect("initialize");

    for _ in 0..2 {
        let verdict = source.lookup(query("evil.net", 443, "/")).await;
        assert_eq!(verdict.error_reason(), Some("connection refused"));
    }

    // Breaker is open: the next lookup short-circuits without a request
    // (the transport queue is drained and would otherwise succeed).
    let short_circuited = source.lookup(query("evil.net", 443, "/")).await;
    assert_eq!(short_circuited.error_reason(), Some("upstream circuit open"));
    assert!(source.is_ready(), "open circuit does not unready the source");
}
