//! Paginated access to the openFDA 510(k) endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::http_client::{HttpClient, UpstreamError};
use crate::models::{ResultRecord, HAS_SUMMARY};

/// One page of catalog results.
#[derive(Debug, Clone, Default)]
pub struct CatalogPage {
    pub records: Vec<ResultRecord>,
    /// Offset suggested by the `Link` header. Advisory only: the cursor store is
    /// the source of truth for pagination.
    pub next_offset_hint: Option<u64>,
    /// Total matching records reported by the API.
    pub total: Option<u64>,
}

impl CatalogPage {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records that have a summary document to process.
    pub fn eligible(&self) -> impl Iterator<Item = &ResultRecord> {
        self.records.iter().filter(|r| r.has_summary())
    }
}

/// A source of catalog pages.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn fetch_page(&self, offset: u64, page_size: u32) -> Result<CatalogPage, UpstreamError>;
}

#[derive(Deserialize)]
struct CatalogBody {
    #[serde(default)]
    meta: Option<CatalogMeta>,
    results: Option<Vec<Value>>,
}

#[derive(Deserialize)]
struct CatalogMeta {
    #[serde(default)]
    results: Option<CatalogMetaResults>,
}

#[derive(Deserialize)]
struct CatalogMetaResults {
    #[serde(default)]
    total: Option<u64>,
}

/// HTTP implementation against `{api_base}/510k.json`.
pub struct CatalogFetcher {
    client: HttpClient,
    api_base: String,
}

impl CatalogFetcher {
    pub fn new(client: HttpClient, api_base: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Query URL for one page of clearances that have a summary.
    pub fn page_url(&self, offset: u64, page_size: u32) -> Result<String, UpstreamError> {
        let base = format!("{}/510k.json", self.api_base);
        let search = format!("statement_or_summary:\"{}\"", HAS_SUMMARY);
        let url = Url::parse_with_params(
            &base,
            &[
                ("search", search),
                ("limit", page_size.to_string()),
                ("skip", offset.to_string()),
            ],
        )
        .map_err(|e| UpstreamError::Malformed {
            url: base.clone(),
            reason: e.to_string(),
        })?;
        Ok(url.to_string())
    }
}

#[async_trait]
impl Catalog for CatalogFetcher {
    async fn fetch_page(&self, offset: u64, page_size: u32) -> Result<CatalogPage, UpstreamError> {
        let url = self.page_url(offset, page_size)?;
        tracing::debug!("Fetching catalog page at offset {}: {}", offset, url);

        let response = self.client.get(&url).await?;
        let link = response.link();
        let body = response.text().await?;
        parse_catalog_page(&url, &body, link.as_deref())
    }
}

/// Parse a catalog response body. Entries without an identifier are dropped.
pub fn parse_catalog_page(
    url: &str,
    body: &str,
    link: Option<&str>,
) -> Result<CatalogPage, UpstreamError> {
    let parsed: CatalogBody = serde_json::from_str(body).map_err(|e| UpstreamError::Malformed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let results = parsed.results.ok_or_else(|| UpstreamError::Malformed {
        url: url.to_string(),
        reason: "missing 'results' array".to_string(),
    })?;

    let mut records = Vec::with_capacity(results.len());
    for value in results {
        match ResultRecord::from_value(value) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!("Skipping malformed catalog entry: {}", e),
        }
    }

    Ok(CatalogPage {
        records,
        next_offset_hint: link.and_then(skip_from_link),
        total: parsed.meta.and_then(|m| m.results).and_then(|r| r.total),
    })
}

fn skip_from_link(link: &str) -> Option<u64> {
    let url = Url::parse(link).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "skip")
        .and_then(|(_, v)| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fetcher() -> CatalogFetcher {
        let client = HttpClient::new("test", Duration::from_secs(5), Duration::ZERO, 0).unwrap();
        CatalogFetcher::new(client, "https://api.fda.gov/device/")
    }

    #[test]
    fn test_page_url() {
        let url = fetcher().page_url(1000, 500).unwrap();
        assert!(url.starts_with("https://api.fda.gov/device/510k.json?search="));
        assert!(url.contains("limit=500"));
        assert!(url.ends_with("skip=1000"));
        let parsed = Url::parse(&url).unwrap();
        let search = parsed
            .query_pairs()
            .find(|(k, _)| k == "search")
            .map(|(_, v)| v.to_string());
        assert_eq!(search.as_deref(), Some("statement_or_summary:\"Summary\""));
    }

    #[test]
    fn test_parse_catalog_page() {
        let body = r#"{
            "meta": {"results": {"skip": 0, "limit": 3, "total": 81234}},
            "results": [
                {"k_number": "K190001", "statement_or_summary": "Summary", "product_code": "HWC"},
                {"k_number": "K190002", "statement_or_summary": "Statement"},
                {"device_name": "no identifier"}
            ]
        }"#;
        let link = "https://api.fda.gov/device/510k.json?search=x&limit=3&skip=3";
        let page = parse_catalog_page("u", body, Some(link)).unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.eligible().count(), 1);
        assert_eq!(page.next_offset_hint, Some(3));
        assert_eq!(page.total, Some(81234));
    }

    #[test]
    fn test_parse_empty_and_malformed() {
        let page = parse_catalog_page("u", r#"{"results": []}"#, None).unwrap();
        assert!(page.is_empty());
        assert_eq!(page.next_offset_hint, None);

        assert!(matches!(
            parse_catalog_page("u", r#"{"error": {"code": "NOT_FOUND"}}"#, None),
            Err(UpstreamError::Malformed { .. })
        ));
        assert!(matches!(
            parse_catalog_page("u", "<html>", None),
            Err(UpstreamError::Malformed { .. })
        ));
    }
}
