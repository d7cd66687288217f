//! Shared HTTP plumbing and upstream error classification.

use crate::error::{FetchError, Result};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub const USER_AGENT: &str = "Banshee/0.1";

/// Build the HTTP client shared by all providers.
pub fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Send a GET and decode the JSON body, classifying failures.
pub async fn get_json(provider: &str, request: RequestBuilder) -> Result<Value> {
    let response = request
        .send()
        .await
        .map_err(|e| transport_error(provider, &e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(provider, &e))?;

    if !status.is_success() {
        warn!(
            "{} returned {}: {}",
            provider,
            status,
            snippet(&body)
        );
        return Err(classify_status(provider, status.as_u16(), &body));
    }

    debug!("{} returned {} bytes", provider, body.len());

    serde_json::from_str(&body)
        .map_err(|e| FetchError::malformed(provider, format!("invalid JSON: {}", e)))
}

/// Decode a JSON body into a typed response envelope.
pub fn decode<T: DeserializeOwned>(provider: &str, body: &Value) -> Result<T> {
    <T as serde::Deserialize>::deserialize(body)
        .map_err(|e| FetchError::malformed(provider, format!("unexpected payload: {}", e)))
}

fn transport_error(provider: &str, e: &reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::unreachable(provider, "request timed out")
    } else if e.is_connect() {
        FetchError::unreachable(provider, format!("connection failed: {}", e))
    } else {
        FetchError::unreachable(provider, e.to_string())
    }
}

/// First 200 characters of a response body.
pub fn snippet(body: &str) -> String {
    body.chars().take(200).collect()
}

/// Whether an upstream message refuses service based on caller location.
pub fn is_geo_restriction(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("restricted location")
        || lower.contains("service unavailable from a restricted")
        || lower.contains("eligibility")
        || lower.contains("not available in your region")
}

/// Map a non-2xx HTTP response onto a failure kind.
pub fn classify_status(provider: &str, status: u16, body: &str) -> FetchError {
    let text = snippet(body);

    if status == 451 || is_geo_restriction(body) {
        return FetchError::geo_restricted(provider, text);
    }

    match status {
        429 | 418 => FetchError::rate_limited(provider, format!("HTTP {}: {}", status, text)),
        401 | 403 => FetchError::auth_rejected(provider, format!("HTTP {}: {}", status, text)),
        404 => FetchError::not_found(provider, text),
        _ if status < 500 => classify_message(provider, body)
            .unwrap_or_else(|| FetchError::unreachable(provider, format!("HTTP {}: {}", status, text))),
        _ => FetchError::unreachable(provider, format!("HTTP {}: {}", status, text)),
    }
}

/// Classify an error message carried inside a response envelope.
///
/// Returns `None` when the message matches no known failure.
pub fn classify_message(provider: &str, message: &str) -> Option<FetchError> {
    let lower = message.to_lowercase();
    let text = snippet(message);

    if is_geo_restriction(&lower) {
        return Some(FetchError::geo_restricted(provider, text));
    }
    if lower.contains("rate limit") || lower.contains("too many") || lower.contains("too frequent") {
        return Some(FetchError::rate_limited(provider, text));
    }
    if lower.contains("interval") || lower.contains("period") || lower.contains("granularity") {
        return Some(FetchError::unsupported_timeframe(provider, text));
    }
    if lower.contains("invalid symbol")
        || lower.contains("unknown asset pair")
        || lower.contains("not exist")
        || lower.contains("doesn't exist")
        || lower.contains("unsupported trading pair")
        || lower.contains("invalid-parameter")
        || lower.contains("no data")
    {
        return Some(FetchError::not_found(provider, text));
    }
    if lower.contains("api-key") || lower.contains("api key") || lower.contains("signature") || lower.contains("permission") {
        return Some(FetchError::auth_rejected(provider, text));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    #[test]
    fn test_restricted_location_is_geo_auth_rejection() {
        let body = r#"{"code":0,"msg":"Service unavailable from a restricted location according to 'b. Eligibility'"}"#;
        let err = classify_status("binance-auth", 451, body);
        assert_eq!(err.kind(), Some(FailureKind::AuthRejected));
        assert!(err.is_geo_restricted());

        // Same message on an unexpected status still counts as geo restriction
        let err = classify_status("binance-auth", 403, body);
        assert!(err.is_geo_restricted());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(classify_status("x", 429, "").kind(), Some(FailureKind::RateLimited));
        assert_eq!(classify_status("x", 418, "").kind(), Some(FailureKind::RateLimited));
        assert_eq!(classify_status("x", 401, "").kind(), Some(FailureKind::AuthRejected));
        assert_eq!(classify_status("x", 404, "").kind(), Some(FailureKind::NotFound));
        assert_eq!(classify_status("x", 502, "bad gateway").kind(), Some(FailureKind::Unreachable));
        assert_eq!(classify_status("x", 400, "weird").kind(), Some(FailureKind::Unreachable));
    }

    #[test]
    fn test_binance_400_bodies() {
        let err = classify_status("binance-public", 400, r#"{"code":-1121,"msg":"Invalid symbol."}"#);
        assert_eq!(err.kind(), Some(FailureKind::NotFound));

        let err = classify_status("binance-public", 400, r#"{"code":-1120,"msg":"Invalid interval."}"#);
        assert_eq!(err.kind(), Some(FailureKind::UnsupportedTimeframe));
    }

    #[test]
    fn test_classify_message_unknown() {
        assert!(classify_message("okx", "System busy").is_none());
    }

    #[test]
    fn test_classify_message_venue_errors() {
        assert_eq!(
            classify_message("kraken", "EQuery:Unknown asset pair").and_then(|e| e.kind()),
            Some(FailureKind::NotFound)
        );
        assert_eq!(
            classify_message("kraken", "EAPI:Rate limit exceeded").and_then(|e| e.kind()),
            Some(FailureKind::RateLimited)
        );
        assert_eq!(
            classify_message("okx", "Instrument ID does not exist").and_then(|e| e.kind()),
            Some(FailureKind::NotFound)
        );
    }

    #[test]
    fn test_snippet_respects_char_boundaries() {
        let body = "é".repeat(300);
        assert_eq!(snippet(&body).chars().count(), 200);
    }
}
