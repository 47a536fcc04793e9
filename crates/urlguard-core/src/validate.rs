//! URL input validation and normalization.
//!
//! The checker trusts well-formed input; this module is what the
//! request-handling layer runs first. Hostname rules are deliberately
//! permissive about internationalized names (any byte above ASCII is
//! accepted) while still rejecting obviously malformed input.

use crate::source::UrlQuery;
use crate::ValidationError;

pub const MAX_URL_LENGTH: usize = 2048;
pub const MIN_HOSTNAME_LENGTH: usize = 2;

const HTTPS_PORT: u16 = 443;

/// Split a `host` or `host:port` segment. A missing port defaults to 80;
/// a present-but-unparsable one is rejected.
pub fn parse_host_port(raw: &str) -> Result<(String, u16), ValidationError> {
    match raw.rsplit_once(':') {
        Some((hostname, port)) => {
            let port: u16 = port.parse().map_err(|_| ValidationError::InvalidPort {
                value: port.to_owned(),
            })?;
            if port == 0 {
                return Err(ValidationError::InvalidPort {
                    value: String::from("0"),
                });
            }
            Ok((hostname.to_owned(), port))
        }
        None => Ok((raw.to_owned(), 80)),
    }
}

/// Validate a hostname and return its normalized (lowercased) form.
pub fn validate_hostname(hostname: &str) -> Result<String, ValidationError> {
    let hostname = hostname.trim().to_ascii_lowercase();
    if hostname.is_empty() {
        return Err(ValidationError::EmptyHostname);
    }
    if hostname.len() < MIN_HOSTNAME_LENGTH {
        return Err(ValidationError::HostnameTooShort {
            value: hostname,
            min: MIN_HOSTNAME_LENGTH,
        });
    }

    if let Some(ch) = hostname
        .chars()
        .find(|ch| !ch.is_alphanumeric() && !matches!(ch, '.' | '-' | ':') && ch.is_ascii())
    {
        return Err(ValidationError::HostnameInvalidChar { ch });
    }

    if hostname == "localhost" || is_valid_ipv4(&hostname) {
        return Ok(hostname);
    }

    if !hostname.contains('.') {
        return Err(ValidationError::HostnameTooFewLabels { value: hostname });
    }

    Ok(hostname)
}

/// Build the validated, normalized lookup query. The length of the
/// reconstructed URL is checked first, the way the request layer bounds
/// oversized input before doing anything else with it.
pub fn build_query(hostname: &str, port: u16, path: &str) -> Result<UrlQuery, ValidationError> {
    let url_len = url_display_len(hostname, port, path);
    if url_len > MAX_URL_LENGTH {
        return Err(ValidationError::UrlTooLong {
            len: url_len,
            max: MAX_URL_LENGTH,
        });
    }

    let hostname = validate_hostname(hostname)?;
    UrlQuery::new(hostname, port, path)
}

/// The full URL form reported back to callers, scheme inferred from the
/// port (443 means https, anything else http).
pub fn display_url(query: &UrlQuery) -> String {
    format!(
        "{}://{}:{}{}",
        scheme_for_port(query.port()),
        query.hostname(),
        query.port(),
        query.path(),
    )
}

fn scheme_for_port(port: u16) -> &'static str {
    if port == HTTPS_PORT {
        "https"
    } else {
        "http"
    }
}

fn url_display_len(hostname: &str, port: u16, path: &str) -> usize {
    let path_len = if path.is_empty() { 1 } else { path.len() };
    scheme_for_port(port).len() + "://".len() + hostname.len() + 1 + digits(port) + path_len
}

fn digits(port: u16) -> usize {
    match port {
        0..=9 => 1,
        10..=99 => 2,
        100..=999 => 3,
        1000..=9999 => 4,
        _ => 5,
    }
}

fn is_valid_ipv4(value: &str) -> bool {
    let octets: Vec<&str> = value.split('.').collect();
    if octets.len() != 4 {
        return false;
    }
    octets
        .iter()
        .all(|octet| !octet.is_empty() && octet.parse::<u8>().is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_host_and_port() {
        assert_eq!(
            parse_host_port("example.com:8443").expect("valid"),
            (String::from("example.com"), 8443)
        );
        assert_eq!(
            parse_host_port("example.com").expect("valid"),
            (String::from("example.com"), 80)
        );
    }

    #[test]
    fn rejects_unparsable_or_zero_port() {
        assert!(matches!(
            parse_host_port("example.com:eighty"),
            Err(ValidationError::InvalidPort { .. })
        ));
        assert!(matches!(
            parse_host_port("example.com:0"),
            Err(ValidationError::InvalidPort { .. })
        ));
        assert!(matches!(
            parse_host_port("example.com:70000"),
            Err(ValidationError::InvalidPort { .. })
        ));
    }

    #[test]
    fn accepts_domains_localhost_ipv4_and_idn() {
        assert!(validate_hostname("example.com").is_ok());
        assert!(validate_hostname("localhost").is_ok());
        assert!(validate_hostname("192.168.1.1").is_ok());
        assert!(validate_hostname("münchen.de").is_ok());
    }

    #[test]
    fn normalizes_hostname_case() {
        assert_eq!(
            validate_hostname("Example.COM").expect("valid"),
            "example.com"
        );
    }

    #[test]
    fn rejects_bad_hostnames() {
        assert!(matches!(
            validate_hostname(""),
            Err(ValidationError::EmptyHostname)
        ));
        assert!(matches!(
            validate_hostname("x"),
            Err(ValidationError::HostnameTooShort { .. })
        ));
        assert!(matches!(
            validate_hostname("bad host.com"),
            Err(ValidationError::HostnameInvalidChar { ch: ' ' })
        ));
        assert!(matches!(
            validate_hostname("intranet"),
            Err(ValidationError::HostnameTooFewLabels { .. })
        ));
    }

    #[test]
    fn bounds_total_url_length() {
        let long_path = format!("/{}", "a".repeat(MAX_URL_LENGTH));
        let err = build_query("example.com", 80, &long_path).expect_err("must fail");
        assert!(matches!(err, ValidationError::UrlTooLong { .. }));
    }

    #[test]
    fn display_url_infers_scheme_from_port() {
        let https = build_query("example.com", 443, "/x").expect("valid");
        assert_eq!(display_url(&https), "https://example.com:443/x");

        let http = build_query("example.com", 8080, "/").expect("valid");
        assert_eq!(display_url(&http), "http://example.com:8080/");
    }
}
