use thiserror::Error;

/// Validation and contract errors exposed by `urlguard-core`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("hostname cannot be empty")]
    EmptyHostname,
    #[error("hostname must be at least {min} characters: '{value}'")]
    HostnameTooShort { value: String, min: usize },
    #[error("hostname contains invalid character '{ch}'")]
    HostnameInvalidChar { ch: char },
    #[error("hostname '{value}' must contain a dot, be localhost, or be an IPv4 address")]
    HostnameTooFewLabels { value: String },

    #[error("port must be between 1 and 65535: '{value}'")]
    InvalidPort { value: String },
    #[error("path must start with '/': '{value}'")]
    PathMissingSlash { value: String },
    #[error("url length {len} exceeds maximum of {max} characters")]
    UrlTooLong { len: usize, max: usize },

    #[error("invalid threat level '{value}', expected one of safe, low, medium, high, critical")]
    InvalidThreatLevel { value: String },
    #[error("confidence score must be within [0.0, 1.0]: {value}")]
    ConfidenceOutOfRange { value: f64 },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
}

/// Static configuration errors raised when a source is constructed,
/// registered, or initialized. Fatal to that source only; the checker keeps
/// serving with whatever sources remain.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceConfigError {
    #[error("unsupported feed format '{value}', expected csv or json")]
    UnsupportedFormat { value: String },
    #[error("unsupported HTTP method '{value}', expected GET or POST")]
    UnsupportedMethod { value: String },
    #[error("feed file '{path}' could not be parsed: {reason}")]
    MalformedFeed { path: String, reason: String },
    #[error("source name cannot be empty")]
    EmptyName,
    #[error("duplicate source name '{name}'")]
    DuplicateName { name: String },
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    SourceConfig(#[from] SourceConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
