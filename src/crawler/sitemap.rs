//! Sitemap discovery
//!
//! Sitemaps are located at well-known paths and through robots.txt `Sitemap:`
//! lines. Sitemap indexes are expanded recursively up to a fixed depth. Only
//! same-host page URLs are kept.

use crate::crawler::fetcher::Fetcher;
use crate::url::{normalize_url, same_host};
use scraper::{Html, Selector};
use std::collections::{HashSet, VecDeque};
use url::Url;

/// Paths probed for a sitemap when robots.txt does not name one
const WELL_KNOWN_SITEMAP_PATHS: &[&str] = &["/sitemap.xml", "/sitemap_index.xml"];

/// Maximum number of sitemap documents fetched for one site
const MAX_SITEMAP_DOCUMENTS: usize = 50;

/// Maximum number of page URLs collected from sitemaps
const MAX_SITEMAP_URLS: usize = 50_000;

/// A parsed sitemap document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// `<sitemapindex>`: locations of further sitemaps
    Index(Vec<String>),
    /// `<urlset>`: page locations
    UrlSet(Vec<String>),
}

/// Parses a sitemap or sitemap index
///
/// Returns `None` when the document is neither.
pub fn parse_sitemap(xml: &str) -> Option<SitemapDocument> {
    let document = Html::parse_document(xml);

    let is_index = Selector::parse("sitemapindex")
        .map(|sel| document.select(&sel).next().is_some())
        .unwrap_or(false);
    let is_urlset = Selector::parse("urlset")
        .map(|sel| document.select(&sel).next().is_some())
        .unwrap_or(false);

    let locations = |css: &str| -> Vec<String> {
        Selector::parse(css)
            .map(|sel| {
                document
                    .select(&sel)
                    .map(|loc| loc.text().collect::<String>().trim().to_string())
                    .filter(|loc| !loc.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    };

    if is_index {
        Some(SitemapDocument::Index(locations("sitemap > loc")))
    } else if is_urlset {
        Some(SitemapDocument::UrlSet(locations("url > loc")))
    } else {
        None
    }
}

/// Result of sitemap discovery for one site
#[derive(Debug, Clone, Default)]
pub struct SitemapDiscovery {
    /// Number of sitemap documents that parsed successfully
    pub documents_found: usize,
    /// Same-host page URLs, normalized, deduplicated, in discovery order
    pub page_urls: Vec<Url>,
}

impl SitemapDiscovery {
    pub fn found_sitemap(&self) -> bool {
        self.documents_found > 0
    }
}

/// Fetches and expands every sitemap reachable from `root`
///
/// # Arguments
///
/// * `fetcher` - Gate-checked fetcher; every sitemap URL passes the safety gate
/// * `root` - The site root
/// * `advertised` - Sitemap URLs listed in robots.txt
/// * `max_depth` - Maximum sitemap-index nesting followed
pub async fn discover_sitemap_urls(
    fetcher: &Fetcher,
    root: &Url,
    advertised: &[String],
    max_depth: u32,
) -> SitemapDiscovery {
    let mut queue: VecDeque<(Url, u32)> = VecDeque::new();
    let mut seen_documents: HashSet<String> = HashSet::new();

    let candidates = advertised
        .iter()
        .filter_map(|s| Url::parse(s).ok())
        .chain(
            WELL_KNOWN_SITEMAP_PATHS
                .iter()
                .filter_map(|path| root.join(path).ok()),
        );
    for candidate in candidates {
        if seen_documents.insert(candidate.to_string()) {
            queue.push_back((candidate, 0));
        }
    }

    let mut discovery = SitemapDiscovery::default();
    let mut seen_pages: HashSet<String> = HashSet::new();
    let mut fetched = 0;

    while let Some((sitemap_url, depth)) = queue.pop_front() {
        if fetched >= MAX_SITEMAP_DOCUMENTS || discovery.page_urls.len() >= MAX_SITEMAP_URLS {
            break;
        }
        fetched += 1;

        let body = match fetcher.fetch_text(&sitemap_url).await {
            Ok(Some(body)) => body,
            Ok(None) => {
                tracing::debug!("No sitemap at {}", sitemap_url);
                continue;
            }
            Err(e) => {
                tracing::debug!("Sitemap fetch failed for {}: {}", sitemap_url, e);
                continue;
            }
        };

        match parse_sitemap(&body) {
            Some(SitemapDocument::Index(children)) => {
                discovery.documents_found += 1;
                if depth >= max_depth {
                    tracing::debug!("Sitemap index {} exceeds depth {}", sitemap_url, max_depth);
                    continue;
                }
                for child in children {
                    if let Ok(child_url) = sitemap_url.join(&child) {
                        if seen_documents.insert(child_url.to_string()) {
                            queue.push_back((child_url, depth + 1));
                        }
                    }
                }
            }
            Some(SitemapDocument::UrlSet(locations)) => {
                discovery.documents_found += 1;
                for location in locations {
                    let Ok(page) = normalize_url(&location) else {
                        continue;
                    };
                    if !same_host(&page, root) {
                        continue;
                    }
                    if seen_pages.insert(page.to_string()) {
                        discovery.page_urls.push(page);
                    }
                }
            }
            None => tracing::debug!("{} is not a sitemap document", sitemap_url),
        }
    }

    tracing::info!(
        "Sitemap discovery for {}: {} documents, {} URLs",
        root,
        discovery.documents_found,
        discovery.page_urls.len()
    );

    discovery
}
