//! HTTP response wrapper.

use std::collections::HashMap;

use reqwest::{Response, StatusCode};

use super::UpstreamError;

/// Successful HTTP response.
pub struct HttpResponse {
    pub url: String,
    pub status: StatusCode,
    pub headers: HashMap<String, String>,
    pub(crate) response: Response,
}

impl HttpResponse {
    /// Target of the `Link` header, if any.
    pub fn link(&self) -> Option<String> {
        self.headers.get("link").and_then(|h| parse_link_header(h))
    }

    /// Get response body as bytes.
    pub async fn bytes(self) -> Result<Vec<u8>, UpstreamError> {
        let url = self.url;
        self.response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| body_error(url, e))
    }

    /// Get response body as text.
    pub async fn text(self) -> Result<String, UpstreamError> {
        let url = self.url;
        self.response.text().await.map_err(|e| body_error(url, e))
    }
}

fn body_error(url: String, e: reqwest::Error) -> UpstreamError {
    if e.is_timeout() {
        UpstreamError::Timeout { url, attempts: 1 }
    } else {
        UpstreamError::Request { url, source: e }
    }
}

/// Extract the URL between the angle brackets of a `Link` header value
/// (`<https://...>; rel="next"`).
pub fn parse_link_header(header: &str) -> Option<String> {
    let start = header.find('<')? + 1;
    let end = start + header[start..].find('>')?;
    let target = header[start..end].trim();
    if target.is_empty() {
        None
    } else {
        Some(target.to_string())
    }
}
