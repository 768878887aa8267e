//! Data produced by a crawl
//!
//! Everything here is immutable once the crawl returns. A re-crawl produces a
//! fresh report that replaces the previous one wholesale.

use serde::{Deserialize, Serialize};

/// Signals extracted from one fetched HTML page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawledPage {
    /// Normalized URL the page was served from
    pub url: String,
    /// HTTP status of the final response
    pub status_code: u16,
    pub title: Option<String>,
    /// First `<h1>` text
    pub h1: Option<String>,
    pub h1_count: usize,
    pub h2s: Vec<String>,
    pub h3s: Vec<String>,
    pub meta_description: Option<String>,
    pub canonical: Option<String>,
    pub has_viewport: bool,
    /// Visible body text, whitespace-collapsed and capped
    pub content: String,
    /// Word count of the full (uncapped) body text
    pub word_count: usize,
    /// First path segment, or `root`
    pub section: String,
    /// Same-host links, normalized and deduplicated, in document order
    pub internal_links: Vec<String>,
    pub has_schema: bool,
    pub schema_types: Vec<String>,
    /// Flesch-Kincaid grade level of the body text
    pub readability_grade: f64,
    pub code_block_count: usize,
    pub image_count: usize,
    pub images_missing_alt: usize,
}

/// A request that was redirected at least twice before reaching its destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectChain {
    /// Original URL first, final destination last
    pub urls: Vec<String>,
    pub hops: usize,
}

impl RedirectChain {
    /// Hop count from which a chain is recorded
    pub const MIN_RECORDED_HOPS: usize = 2;

    /// Hop count a chain must exceed to be reported
    pub const REPORT_ABOVE_HOPS: usize = 2;

    /// Builds a chain from the visited URLs; `None` for fewer than two hops
    pub fn from_urls(urls: Vec<String>) -> Option<Self> {
        let hops = urls.len().saturating_sub(1);
        if hops >= Self::MIN_RECORDED_HOPS {
            Some(Self { urls, hops })
        } else {
            None
        }
    }

    pub fn is_reportable(&self) -> bool {
        self.hops > Self::REPORT_ABOVE_HOPS
    }

    pub fn origin(&self) -> &str {
        self.urls.first().map(String::as_str).unwrap_or_default()
    }

    pub fn destination(&self) -> &str {
        self.urls.last().map(String::as_str).unwrap_or_default()
    }
}

/// An internal link whose target answers with an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokenLink {
    pub source_url: String,
    pub target_url: String,
    /// `None` when the target failed without an HTTP status (network error)
    pub status: Option<u16>,
}

/// Site-wide facts discovered while crawling
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteFlags {
    pub has_robots_txt: bool,
    pub has_sitemap: bool,
    pub sitemap_url_count: usize,
    pub uses_https: bool,
}

/// Page count per site section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSummary {
    pub name: String,
    pub page_count: usize,
}

/// A URL that could not be turned into a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageError {
    pub url: String,
    pub message: String,
}

/// Complete result of one crawl
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlReport {
    pub root_url: String,
    pub pages: Vec<CrawledPage>,
    pub sections: Vec<SectionSummary>,
    /// Only chains longer than [`RedirectChain::REPORT_ABOVE_HOPS`]
    pub redirect_chains: Vec<RedirectChain>,
    pub broken_links: Vec<BrokenLink>,
    pub site: SiteFlags,
    pub errors: Vec<PageError>,
}

impl CrawlReport {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, url: &str) -> Option<&CrawledPage> {
        self.pages.iter().find(|p| p.url == url)
    }
}

/// Groups pages by section, largest section first
pub fn summarize_sections(pages: &[CrawledPage]) -> Vec<SectionSummary> {
    let mut counts: std::collections::BTreeMap<&str, usize> = std::collections::BTreeMap::new();
    for page in pages {
        *counts.entry(page.section.as_str()).or_default() += 1;
    }

    let mut sections: Vec<SectionSummary> = counts
        .into_iter()
        .map(|(name, page_count)| SectionSummary {
            name: name.to_string(),
            page_count,
        })
        .collect();
    sections.sort_by(|a, b| b.page_count.cmp(&a.page_count).then(a.name.cmp(&b.name)));
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://example.com/r{}", i)).collect()
    }

    #[test]
    fn test_single_redirect_is_not_recorded() {
        assert!(RedirectChain::from_urls(urls(2)).is_none());
    }

    #[test]
    fn test_two_hops_recorded_but_not_reported() {
        let chain = RedirectChain::from_urls(urls(3)).unwrap();
        assert_eq!(chain.hops, 2);
        assert!(!chain.is_reportable());
    }

    #[test]
    fn test_three_hops_reported() {
        let chain = RedirectChain::from_urls(urls(4)).unwrap();
        assert_eq!(chain.hops, 3);
        assert!(chain.is_reportable());
        assert_eq!(chain.origin(), "https://example.com/r0");
        assert_eq!(chain.destination(), "https://example.com/r3");
    }
}
