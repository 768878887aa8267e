//! Crawler module for web page fetching and processing
//!
//! This module contains the crawling logic, including:
//! - Gate-checked HTTP fetching with manual redirect handling
//! - Sitemap discovery and section discovery
//! - HTML parsing into per-page signals
//! - Overall crawl coordination and broken-link probing

mod discovery;
mod engine;
mod fetcher;
mod parser;
mod readability;
mod report;
mod sitemap;

pub use discovery::{DiscoveryEvent, ScoredSection, SectionDiscovery};
pub use engine::{CrawlRequest, Crawler};
pub use fetcher::{build_http_client, FetchError, FetchedResponse, Fetcher};
pub use parser::{extract_links_simple, parse_page};
pub use readability::flesch_kincaid_grade;
pub use report::{
    summarize_sections, BrokenLink, CrawlReport, CrawledPage, PageError, RedirectChain,
    SectionSummary, SiteFlags,
};
pub use sitemap::{discover_sitemap_urls, parse_sitemap, SitemapDiscovery, SitemapDocument};

use crate::url::SafetyError;
use thiserror::Error;

/// Crawl-level failures
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Invalid root URL {url}: {reason}")]
    InvalidRoot { url: String, reason: String },

    #[error("Root URL {url} refused by safety gate: {source}")]
    Unsafe {
        url: String,
        #[source]
        source: SafetyError,
    },

    #[error("No pages could be fetched from {root}: {reason}")]
    NoPages { root: String, reason: String },

    #[error("HTTP client error: {0}")]
    Client(reqwest::Error),
}

impl CrawlError {
    /// True when retrying the same crawl cannot succeed
    ///
    /// A crawl that produced no pages is terminal for its job, as are roots
    /// that are malformed or refused by the safety gate.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Client(_))
    }
}
