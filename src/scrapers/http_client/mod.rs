//! HTTP client with timeout retries and request pacing.

mod response;

pub use response::{parse_link_header, HttpResponse};

use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use thiserror::Error;

/// Base backoff between retries of a timed-out request; doubles per attempt.
const RETRY_BACKOFF: Duration = Duration::from_secs(2);
/// Ceiling on a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Failures talking to the catalog or document endpoints.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: StatusCode },

    #[error("Timed out after {attempts} attempt(s) fetching {url}")]
    Timeout { url: String, attempts: u32 },

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        source: reqwest::Error,
    },

    #[error("Malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),
}

impl UpstreamError {
    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }
}

/// Shared HTTP client for catalog, detail-page and document requests.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    request_delay: Duration,
    max_retries: u32,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new(
        user_agent: &str,
        timeout: Duration,
        request_delay: Duration,
        max_retries: u32,
    ) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(UpstreamError::Client)?;

        Ok(Self {
            client,
            request_delay,
            max_retries,
        })
    }

    /// GET a URL. Timeouts, throttling and server errors are retried with exponential
    /// backoff; any other non-success status is returned immediately.
    pub async fn get(&self, url: &str) -> Result<HttpResponse, UpstreamError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.get_once(url, attempt).await {
                Err(e) if e.is_retryable() && attempt <= self.max_retries => {
                    let backoff = retry_backoff(attempt);
                    tracing::warn!("{} (attempt {}), retrying in {:?}", e, attempt, backoff);
                    tokio::time::sleep(backoff).await;
                }
                result => return result,
            }
        }
    }

    async fn get_once(&self, url: &str, attempt: u32) -> Result<HttpResponse, UpstreamError> {
        let start = Instant::now();
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout {
                    url: url.to_string(),
                    attempts: attempt,
                }
            } else {
                UpstreamError::Request {
                    url: url.to_string(),
                    source: e,
                }
            }
        })?;

        let status = response.status();
        tracing::debug!(
            "GET {} -> {} in {}ms",
            url,
            status.as_u16(),
            start.elapsed().as_millis()
        );

        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.to_string(), v.to_string());
            }
        }

        // Base delay keeps us polite with the public endpoints.
        tokio::time::sleep(self.request_delay).await;

        if !status.is_success() {
            return Err(UpstreamError::Status {
                url: url.to_string(),
                status,
            });
        }

        Ok(HttpResponse {
            url: url.to_string(),
            status,
            headers,
            response,
        })
    }

    /// Get page content as text.
    pub async fn get_text(&self, url: &str) -> Result<String, UpstreamError> {
        self.get(url).await?.text().await
    }

    /// Get a binary body.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, UpstreamError> {
        self.get(url).await?.bytes().await
    }
}

/// Sleep before retry `attempt` (1-based), capped at [`MAX_BACKOFF`].
fn retry_backoff(attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    RETRY_BACKOFF.saturating_mul(factor).min(MAX_BACKOFF)
}
