//! Resolves a clearance to its summary document link.

use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use super::http_client::{HttpClient, UpstreamError};
use crate::models::ResultRecord;

/// Visible text that marks the summary document link on a detail page.
const SUMMARY_LABEL: &str = "Summary";

/// Outcome of resolving a record. Absence is expected: some clearances never
/// published a summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
    Found(String),
    NotFound,
}

#[async_trait]
pub trait Locator: Send + Sync {
    async fn resolve(&self, record: &ResultRecord) -> Result<Located, UpstreamError>;
}

/// Reads the public 510(k) detail page.
pub struct DocumentLocator {
    client: HttpClient,
    detail_base: String,
}

impl DocumentLocator {
    pub fn new(client: HttpClient, detail_base: &str) -> Self {
        Self {
            client,
            detail_base: detail_base.to_string(),
        }
    }

    pub fn detail_url(&self, k_number: &str) -> Result<Url, UpstreamError> {
        Url::parse_with_params(&self.detail_base, &[("ID", k_number)]).map_err(|e| {
            UpstreamError::Malformed {
                url: self.detail_base.clone(),
                reason: e.to_string(),
            }
        })
    }
}

#[async_trait]
impl Locator for DocumentLocator {
    async fn resolve(&self, record: &ResultRecord) -> Result<Located, UpstreamError> {
        let url = self.detail_url(&record.k_number)?;
        let html = self.client.get_text(url.as_str()).await?;
        let located = find_summary_link(&html, &url);
        if located == Located::NotFound {
            tracing::debug!("{}: no summary link on detail page", record.k_number);
        }
        Ok(located)
    }
}

/// First anchor whose visible text contains the summary label, resolved against
/// the page URL. Anchors with an empty target count as missing.
pub fn find_summary_link(html: &str, page_url: &Url) -> Located {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a") else {
        return Located::NotFound;
    };

    let Some(anchor) = document.select(&selector).find(|a| {
        a.text()
            .collect::<String>()
            .contains(SUMMARY_LABEL)
    }) else {
        return Located::NotFound;
    };

    let href = anchor.value().attr("href").map(str::trim).unwrap_or("");
    if href.is_empty() {
        return Located::NotFound;
    }

    match page_url.join(href) {
        Ok(url) => Located::Found(url.to_string()),
        Err(e) => {
            tracing::debug!("Unusable summary href '{}': {}", href, e);
            Located::NotFound
        }
    }
}
