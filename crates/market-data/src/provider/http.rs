//! HTTP plumbing shared by the upstream adapters.

use std::time::Duration;

use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::{ConfigError, QuoteError};

pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Build the client an adapter keeps for its lifetime.
pub(crate) fn build_client(provider: &str, timeout: Duration) -> Result<Client, ConfigError> {
    Client::builder()
        .timeout(timeout)
        .default_headers({
            let mut headers = header::HeaderMap::new();
            headers.insert(header::USER_AGENT, header::HeaderValue::from_static(USER_AGENT));
            headers
        })
        .build()
        .map_err(|e| ConfigError::HttpClient {
            provider: provider.to_string(),
            message: e.to_string(),
        })
}

/// Send a request and return the body of a 2xx response.
///
/// Status mapping:
/// - timeout -> `Timeout`
/// - 404 -> `NotFound(symbol)`
/// - 429 -> `RateLimited`
/// - anything else non-2xx -> `UpstreamError`
pub(crate) async fn send(
    provider: &str,
    symbol: &str,
    request: RequestBuilder,
) -> Result<String, QuoteError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            QuoteError::Timeout {
                provider: provider.to_string(),
            }
        } else {
            QuoteError::upstream(provider, format!("Request failed: {}", e))
        }
    })?;

    let status = response.status();
    debug!("{} responded {} for '{}'", provider, status, symbol);

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(QuoteError::RateLimited {
            provider: provider.to_string(),
        });
    }

    if status == StatusCode::NOT_FOUND {
        return Err(QuoteError::NotFound(symbol.to_string()));
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(QuoteError::upstream(
            provider,
            format!("HTTP {} - invalid or missing API key", status),
        ));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(QuoteError::upstream(
            provider,
            format!("HTTP {} - {}", status, truncate(&body, 200)),
        ));
    }

    response
        .text()
        .await
        .map_err(|e| QuoteError::upstream(provider, format!("Failed to read response: {}", e)))
}

/// Parse a JSON body into an adapter DTO.
pub(crate) fn parse<T: DeserializeOwned>(provider: &str, body: &str) -> Result<T, QuoteError> {
    serde_json::from_str(body)
        .map_err(|e| QuoteError::upstream(provider, format!("Failed to parse response: {}", e)))
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("abc", 10), "abc");
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ééé", 2), "éé");
    }

    #[test]
    fn test_parse_error_is_upstream() {
        let err = parse::<Vec<u32>>("FMP", "{not json").unwrap_err();
        assert!(matches!(err, QuoteError::UpstreamError { ref provider, .. } if provider == "FMP"));
    }
}
