//! Network side of the pipeline: catalog paging and summary-link resolution.

pub mod catalog;
mod http_client;
pub mod locator;

pub use catalog::{Catalog, CatalogFetcher, CatalogPage};
pub use http_client::{parse_link_header, HttpClient, HttpResponse, UpstreamError};
pub use locator::{DocumentLocator, Located, Locator};
