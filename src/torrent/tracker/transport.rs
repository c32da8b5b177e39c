//! HTTP transport contract for tracker requests.

use async_trait::async_trait;

use crate::config::NetworkConfig;

/// Errors raised by the HTTP transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {reason}")]
    ConnectionFailed { reason: String },
}

/// Blocking-style GET capability used by the tracker engines.
///
/// Implementations return the response body regardless of HTTP status; the
/// caller interprets the bytes (a non-tracker body simply fails to decode).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues a GET request for `url` with `query` appended.
    ///
    /// # Errors
    ///
    /// - `TransportError::ConnectionFailed` - If the request could not be
    ///   completed (connection refused, timeout, body read failure)
    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>, TransportError>;
}

/// Appends query parameters as `?key=value&key=value`.
///
/// Values are appended verbatim; everything the engines send (hex digests,
/// decimal counters, event names) is already URL-safe.
pub(crate) fn with_query(url: &str, query: &[(&str, String)]) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let joined: Vec<String> = query
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    format!("{}?{}", url, joined.join("&"))
}

/// HTTP transport backed by a shared `reqwest` client.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport with timeout and user agent from configuration.
    pub fn new(config: &NetworkConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(config.tracker_timeout)
                .user_agent(config.user_agent)
                .redirect(reqwest::redirect::Policy::limited(3))
                .build()
                .expect("HTTP client creation should not fail"),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>, TransportError> {
        let full_url = with_query(url, query);

        let response = self.client.get(&full_url).send().await.map_err(|e| {
            tracing::warn!("HTTP request to {url} failed: {e}");
            TransportError::ConnectionFailed {
                reason: e.to_string(),
            }
        })?;

        let body = response.bytes().await.map_err(|e| {
            tracing::warn!("Failed to read response body from {url}: {e}");
            TransportError::ConnectionFailed {
                reason: e.to_string(),
            }
        })?;

        Ok(body.to_vec())
    }
}
