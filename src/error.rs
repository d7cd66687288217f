use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Failure kinds an individual provider can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    AuthRejected,
    RateLimited,
    NotFound,
    Unreachable,
    MalformedPayload,
    UnsupportedTimeframe,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::AuthRejected => write!(f, "auth_rejected"),
            FailureKind::RateLimited => write!(f, "rate_limited"),
            FailureKind::NotFound => write!(f, "not_found"),
            FailureKind::Unreachable => write!(f, "unreachable"),
            FailureKind::MalformedPayload => write!(f, "malformed_payload"),
            FailureKind::UnsupportedTimeframe => write!(f, "unsupported_timeframe"),
        }
    }
}

/// One failed attempt recorded by the fallback chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceFailure {
    pub source: String,
    pub kind: FailureKind,
    pub message: String,
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.source, self.kind, self.message)
    }
}

/// Candle fetch error types.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("{provider} rejected credentials: {message}")]
    AuthRejected {
        provider: String,
        message: String,
        /// Set when the upstream refused service based on caller location.
        geo_restricted: bool,
    },

    #[error("{provider} rate limited: {message}")]
    RateLimited { provider: String, message: String },

    #[error("{provider} has no data for {what}")]
    NotFound { provider: String, what: String },

    #[error("{provider} unreachable: {message}")]
    Unreachable { provider: String, message: String },

    #[error("malformed payload from {provider}: {message}")]
    MalformedPayload { provider: String, message: String },

    #[error("{provider} does not support timeframe {timeframe}")]
    UnsupportedTimeframe { provider: String, timeframe: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("all sources exhausted: {}", format_failures(.0))]
    AllSourcesExhausted(Vec<SourceFailure>),
}

fn format_failures(failures: &[SourceFailure]) -> String {
    if failures.is_empty() {
        return "no source attempted".to_string();
    }
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl FetchError {
    pub fn auth_rejected(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AuthRejected {
            provider: provider.into(),
            message: message.into(),
            geo_restricted: false,
        }
    }

    pub fn geo_restricted(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AuthRejected {
            provider: provider.into(),
            message: message.into(),
            geo_restricted: true,
        }
    }

    pub fn rate_limited(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RateLimited {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn not_found(provider: impl Into<String>, what: impl Into<String>) -> Self {
        Self::NotFound {
            provider: provider.into(),
            what: what.into(),
        }
    }

    pub fn unreachable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unreachable {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn malformed(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn unsupported_timeframe(provider: impl Into<String>, timeframe: impl Into<String>) -> Self {
        Self::UnsupportedTimeframe {
            provider: provider.into(),
            timeframe: timeframe.into(),
        }
    }

    /// Per-provider failure kind, `None` for request-level errors.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            FetchError::AuthRejected { .. } => Some(FailureKind::AuthRejected),
            FetchError::RateLimited { .. } => Some(FailureKind::RateLimited),
            FetchError::NotFound { .. } => Some(FailureKind::NotFound),
            FetchError::Unreachable { .. } => Some(FailureKind::Unreachable),
            FetchError::MalformedPayload { .. } => Some(FailureKind::MalformedPayload),
            FetchError::UnsupportedTimeframe { .. } => Some(FailureKind::UnsupportedTimeframe),
            FetchError::InvalidRequest(_) | FetchError::AllSourcesExhausted(_) => None,
        }
    }

    pub fn is_geo_restricted(&self) -> bool {
        matches!(
            self,
            FetchError::AuthRejected {
                geo_restricted: true,
                ..
            }
        )
    }

    /// Convert a provider-level error into a failure record.
    pub fn to_failure(&self, source: &str) -> SourceFailure {
        let message = match self {
            FetchError::AuthRejected { message, .. }
            | FetchError::RateLimited { message, .. }
            | FetchError::Unreachable { message, .. }
            | FetchError::MalformedPayload { message, .. } => message.clone(),
            FetchError::NotFound { what, .. } => format!("no data for {}", what),
            FetchError::UnsupportedTimeframe { timeframe, .. } => {
                format!("timeframe {} not supported", timeframe)
            }
            other => other.to_string(),
        };

        SourceFailure {
            source: source.to_string(),
            kind: self.kind().unwrap_or(FailureKind::Unreachable),
            message,
        }
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            FetchError::rate_limited("binance-public", "429").kind(),
            Some(FailureKind::RateLimited)
        );
        assert_eq!(
            FetchError::geo_restricted("binance-auth", "restricted location").kind(),
            Some(FailureKind::AuthRejected)
        );
        assert_eq!(FetchError::InvalidRequest("limit".into()).kind(), None);
        assert_eq!(FetchError::AllSourcesExhausted(vec![]).kind(), None);
    }

    #[test]
    fn test_geo_restriction_flag() {
        assert!(FetchError::geo_restricted("binance-auth", "x").is_geo_restricted());
        assert!(!FetchError::auth_rejected("binance-auth", "x").is_geo_restricted());
        assert!(!FetchError::unreachable("binance-auth", "x").is_geo_restricted());
    }

    #[test]
    fn test_to_failure_keeps_message() {
        let failure = FetchError::unreachable("okx", "timed out").to_failure("okx");
        assert_eq!(failure.source, "okx");
        assert_eq!(failure.kind, FailureKind::Unreachable);
        assert_eq!(failure.message, "timed out");
    }

    #[test]
    fn test_exhausted_display_lists_every_source() {
        let err = FetchError::AllSourcesExhausted(vec![
            FetchError::rate_limited("binance-public", "429").to_failure("binance-public"),
            FetchError::not_found("coingecko", "DOGEUSDT").to_failure("coingecko"),
        ]);
        let text = err.to_string();
        assert!(text.contains("binance-public (rate_limited)"));
        assert!(text.contains("coingecko (not_found)"));
    }
}
