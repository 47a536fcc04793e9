//! Verdict domain model: the malicious/safe determination produced by each
//! threat source and by the merged aggregate.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

use crate::ValidationError;

/// RFC3339 timestamp guaranteed to be UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcDateTime(OffsetDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let parsed = OffsetDateTime::parse(input, &Rfc3339).map_err(|_| {
            ValidationError::TimestampNotUtc {
                value: input.to_owned(),
            }
        })?;

        if parsed.offset() != UtcOffset::UTC {
            return Err(ValidationError::TimestampNotUtc {
                value: input.to_owned(),
            });
        }

        Ok(Self(parsed))
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    pub fn format_rfc3339(self) -> String {
        self.0
            .format(&Rfc3339)
            .expect("UtcDateTime must be RFC3339 formattable")
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}

impl Serialize for UtcDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_rfc3339())
    }
}

impl<'de> Deserialize<'de> for UtcDateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

/// Ordered threat severity. The derived ordering is the merge ordering:
/// `Safe < Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl Display for ThreatLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreatLevel {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "safe" => Ok(Self::Safe),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(ValidationError::InvalidThreatLevel {
                value: other.to_owned(),
            }),
        }
    }
}

/// Threat classification tag attached to malicious verdicts.
///
/// Remote feeds report free-form strings; anything outside the known set is
/// preserved as [`ThreatType::Unknown`] rather than rejected, so a lenient
/// upstream cannot fail a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatType {
    Malware,
    Phishing,
    Ransomware,
    Spam,
    Scam,
    Unknown,
}

impl ThreatType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Malware => "malware",
            Self::Phishing => "phishing",
            Self::Ransomware => "ransomware",
            Self::Spam => "spam",
            Self::Scam => "scam",
            Self::Unknown => "unknown",
        }
    }

    /// Lenient parse for feed payloads.
    pub fn from_feed(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "malware" => Self::Malware,
            "phishing" => Self::Phishing,
            "ransomware" => Self::Ransomware,
            "spam" => Self::Spam,
            "scam" => Self::Scam,
            _ => Self::Unknown,
        }
    }
}

impl Display for ThreatType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single source's (or the merged) malicious/safe determination.
///
/// Verdicts are created fresh per query and never mutated afterwards. A
/// source that fails operationally still produces a verdict — non-malicious,
/// zero confidence, with the failure reason under the `error` metadata key —
/// so the aggregator always receives a value per source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_malicious: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threat_type: Option<ThreatType>,
    pub threat_level: ThreatLevel,
    pub confidence_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_by: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub timestamp: UtcDateTime,
}

impl Verdict {
    /// Construct a verdict, normalizing the invariants the model guarantees:
    /// a malicious verdict may never report `safe` severity (it is raised to
    /// `medium`), and the confidence score is clamped into `[0.0, 1.0]`.
    pub fn new(
        is_malicious: bool,
        threat_type: Option<ThreatType>,
        threat_level: ThreatLevel,
        confidence_score: f64,
        detected_by: Option<String>,
    ) -> Self {
        let threat_level = if is_malicious && threat_level == ThreatLevel::Safe {
            ThreatLevel::Medium
        } else {
            threat_level
        };

        Self {
            is_malicious,
            threat_type,
            threat_level,
            confidence_score: confidence_score.clamp(0.0, 1.0),
            detected_by,
            metadata: BTreeMap::new(),
            timestamp: UtcDateTime::now(),
        }
    }

    /// Non-malicious verdict from a named source that found nothing.
    pub fn safe(detected_by: impl Into<String>) -> Self {
        Self::new(false, None, ThreatLevel::Safe, 0.0, Some(detected_by.into()))
    }

    /// Pre-merge default: non-malicious with no producing source.
    pub fn safe_default() -> Self {
        Self::new(false, None, ThreatLevel::Safe, 0.0, None)
    }

    /// Malicious verdict from a named source.
    pub fn malicious(
        detected_by: impl Into<String>,
        threat_type: ThreatType,
        threat_level: ThreatLevel,
        confidence_score: f64,
    ) -> Self {
        Self::new(
            true,
            Some(threat_type),
            threat_level,
            confidence_score,
            Some(detected_by.into()),
        )
    }

    /// Synthetic verdict for an operational source failure: non-malicious,
    /// zero confidence, failure reason recorded under `metadata.error`.
    pub fn source_failure(detected_by: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::safe(detected_by).with_metadata("error", serde_json::Value::String(reason.into()))
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The failure reason attached by [`Verdict::source_failure`], if any.
    pub fn error_reason(&self) -> Option<&str> {
        self.metadata.get("error").and_then(serde_json::Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malicious_verdict_never_reports_safe_severity() {
        let verdict = Verdict::new(true, Some(ThreatType::Malware), ThreatLevel::Safe, 1.0, None);
        assert_eq!(verdict.threat_level, ThreatLevel::Medium);
    }

    #[test]
    fn non_malicious_verdict_keeps_safe_severity() {
        let verdict = Verdict::safe("file-a");
        assert_eq!(verdict.threat_level, ThreatLevel::Safe);
        assert_eq!(verdict.confidence_score, 0.0);
        assert_eq!(verdict.detected_by.as_deref(), Some("file-a"));
    }

    #[test]
    fn confidence_is_clamped_into_unit_interval() {
        let verdict = Verdict::new(true, None, ThreatLevel::High, 3.5, None);
        assert_eq!(verdict.confidence_score, 1.0);

        let verdict = Verdict::new(false, None, ThreatLevel::Safe, -0.25, None);
        assert_eq!(verdict.confidence_score, 0.0);
    }

    #[test]
    fn source_failure_records_reason_in_metadata() {
        let verdict = Verdict::source_failure("http-endpoint-0", "connection refused");
        assert!(!verdict.is_malicious);
        assert_eq!(verdict.error_reason(), Some("connection refused"));
    }

    #[test]
    fn threat_levels_order_by_severity() {
        assert!(ThreatLevel::Safe < ThreatLevel::Low);
        assert!(ThreatLevel::Low < ThreatLevel::Medium);
        assert!(ThreatLevel::Medium < ThreatLevel::High);
        assert!(ThreatLevel::High < ThreatLevel::Critical);
    }

    #[test]
    fn threat_level_round_trips_through_str() {
        for level in ["safe", "low", "medium", "high", "critical"] {
            let parsed: ThreatLevel = level.parse().expect("must parse");
            assert_eq!(parsed.as_str(), level);
        }

        let err = "severe".parse::<ThreatLevel>().expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidThreatLevel { .. }));
    }

    #[test]
    fn unrecognized_feed_threat_type_maps_to_unknown() {
        assert_eq!(ThreatType::from_feed("Phishing"), ThreatType::Phishing);
        assert_eq!(ThreatType::from_feed("cryptojacking"), ThreatType::Unknown);
    }

    #[test]
    fn parses_utc_timestamp() {
        let parsed = UtcDateTime::parse("2024-01-01T00:00:00Z").expect("must parse");
        assert_eq!(parsed.format_rfc3339(), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn rejects_non_utc_timestamp() {
        let err = UtcDateTime::parse("2024-01-01T01:00:00+01:00").expect_err("must fail");
        assert!(matches!(err, ValidationError::TimestampNotUtc { .. }));
    }
}
