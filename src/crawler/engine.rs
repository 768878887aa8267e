//! Crawl engine - main crawl orchestration logic
//!
//! This module contains the crawl loop that coordinates:
//! - Root validation and robots.txt lookup
//! - Sitemap discovery with link-following fallback
//! - FIFO fetching under the page budget, paced by the fetcher
//! - Redirect chain and broken link bookkeeping
//! - Broken-link probing of referenced but uncrawled pages

use crate::config::{Config, CrawlerConfig, UserAgentConfig};
use crate::crawler::discovery::SectionDiscovery;
use crate::crawler::fetcher::{FetchError, Fetcher};
use crate::crawler::parser::{extract_links_simple, parse_page};
use crate::crawler::report::{
    summarize_sections, BrokenLink, CrawlReport, CrawledPage, PageError, RedirectChain, SiteFlags,
};
use crate::crawler::sitemap::{discover_sitemap_urls, SitemapDiscovery};
use crate::crawler::CrawlError;
use crate::robots::RobotsLookup;
use crate::url::{has_non_html_extension, is_denylisted, normalize_url, same_host, section_of};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use url::Url;

/// Parameters of one crawl
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRequest {
    pub root_url: String,
    /// Maximum number of HTML pages collected
    pub page_budget: usize,
    /// When set, only pages in this section (plus the root) are fetched
    pub section_filter: Option<String>,
}

/// A URL waiting in the crawl queue
#[derive(Debug, Clone)]
struct QueuedUrl {
    url: Url,
    /// Page (or sitemap) the URL was found on
    referrer: String,
}

/// Mutable bookkeeping for one crawl
#[derive(Default)]
struct CrawlState {
    visited: HashSet<String>,
    enqueued: HashSet<String>,
    pages: Vec<CrawledPage>,
    redirect_chains: Vec<RedirectChain>,
    broken_links: Vec<BrokenLink>,
    errors: Vec<PageError>,
}

/// Website crawler
///
/// One crawler can run many crawls; each crawl is independent.
#[derive(Debug, Clone)]
pub struct Crawler {
    fetcher: Fetcher,
    config: CrawlerConfig,
    robots_agent: String,
}

impl Crawler {
    /// Creates a crawler from the full configuration
    pub fn new(config: &Config) -> Result<Self, CrawlError> {
        Self::from_parts(config.crawler.clone(), &config.user_agent)
    }

    /// Creates a crawler from its own configuration sections
    pub fn from_parts(
        config: CrawlerConfig,
        user_agent: &UserAgentConfig,
    ) -> Result<Self, CrawlError> {
        let fetcher = Fetcher::from_config(&config, user_agent).map_err(CrawlError::Client)?;
        Ok(Self {
            fetcher,
            config,
            robots_agent: user_agent.crawler_name.clone(),
        })
    }

    /// Crawls a site
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - At least one page was fetched
    /// * `Err(CrawlError::NoPages)` - Nothing could be fetched; callers treat
    ///   this as terminal, distinct from a crawl with few results
    pub async fn crawl(&self, request: &CrawlRequest) -> Result<CrawlReport, CrawlError> {
        let root = self.validate_root(&request.root_url)?;
        let section_filter = request.section_filter.as_ref().map(|s| s.to_lowercase());

        tracing::info!(
            "Starting crawl of {} (budget {}, section {:?})",
            root,
            request.page_budget,
            section_filter
        );

        // Pacing covers robots.txt, sitemaps, pages and probes alike
        let fetcher = self.fetcher.paced(self.config.politeness_delay());
        let robots = self.lookup_robots(&fetcher, &root).await;
        fetcher.set_delay(self.effective_delay(&robots));

        let sitemap = discover_sitemap_urls(
            &fetcher,
            &root,
            robots.robots.sitemaps(),
            self.config.sitemap_depth,
        )
        .await;

        let follow_links = sitemap.page_urls.is_empty();
        let mut state = CrawlState::default();
        let mut queue: VecDeque<QueuedUrl> = VecDeque::new();

        let filter = section_filter.as_deref();
        self.enqueue(&mut state, &mut queue, root.clone(), root.to_string(), &root, filter);

        let sitemap_referrer = root
            .join("/sitemap.xml")
            .map(|u| u.to_string())
            .unwrap_or_else(|_| root.to_string());
        for url in &sitemap.page_urls {
            let referrer = sitemap_referrer.clone();
            self.enqueue(&mut state, &mut queue, url.clone(), referrer, &root, filter);
        }

        while state.pages.len() < request.page_budget {
            let Some(queued) = queue.pop_front() else {
                tracing::debug!("Crawl queue exhausted");
                break;
            };

            if !state.visited.insert(queued.url.to_string()) {
                continue;
            }

            if self.config.respect_robots
                && !robots.robots.is_allowed(queued.url.as_str(), &self.robots_agent)
            {
                tracing::debug!("URL {} disallowed by robots.txt", queued.url);
                continue;
            }

            if let Some(page) = self.fetch_page(&fetcher, &mut state, &queued, &root).await {
                if follow_links {
                    for link in &page.internal_links {
                        if let Ok(url) = Url::parse(link) {
                            let referrer = page.url.clone();
                            self.enqueue(&mut state, &mut queue, url, referrer, &root, filter);
                        }
                    }
                }
                state.pages.push(page);
            }
        }

        if state.pages.is_empty() {
            let reason = state
                .errors
                .last()
                .map(|e| format!("{}: {}", e.url, e.message))
                .unwrap_or_else(|| "no HTML pages were reachable".to_string());
            tracing::warn!("Crawl of {} fetched no pages: {}", root, reason);
            return Err(CrawlError::NoPages {
                root: root.to_string(),
                reason,
            });
        }

        self.probe_unvisited_links(&fetcher, &mut state, &root).await;

        tracing::info!(
            "Crawl of {} finished: {} pages, {} redirect chains, {} broken links, {} errors",
            root,
            state.pages.len(),
            state.redirect_chains.len(),
            state.broken_links.len(),
            state.errors.len()
        );

        Ok(CrawlReport {
            root_url: root.to_string(),
            sections: summarize_sections(&state.pages),
            pages: state.pages,
            redirect_chains: state.redirect_chains,
            broken_links: state.broken_links,
            site: SiteFlags {
                has_robots_txt: robots.present,
                has_sitemap: sitemap.found_sitemap(),
                sitemap_url_count: sitemap.page_urls.len(),
                uses_https: root.scheme() == "https",
            },
            errors: state.errors,
        })
    }

    /// Discovers a site's sections before crawling
    ///
    /// Uses sitemap URLs when available, otherwise the links on the root page.
    pub async fn discover_sections(&self, root_url: &str) -> Result<SectionDiscovery, CrawlError> {
        let root = self.validate_root(root_url)?;
        let fetcher = self.fetcher.paced(self.config.politeness_delay());
        let robots = self.lookup_robots(&fetcher, &root).await;
        fetcher.set_delay(self.effective_delay(&robots));

        let SitemapDiscovery { page_urls, .. } = discover_sitemap_urls(
            &fetcher,
            &root,
            robots.robots.sitemaps(),
            self.config.sitemap_depth,
        )
        .await;

        if !page_urls.is_empty() {
            return Ok(SectionDiscovery::from_urls(page_urls.len(), &page_urls));
        }

        let response = fetcher.fetch(&root).await.map_err(|e| CrawlError::NoPages {
            root: root.to_string(),
            reason: e.to_string(),
        })?;
        let links: Vec<Url> = extract_links_simple(&response.body, response.final_url())
            .iter()
            .filter_map(|l| Url::parse(l).ok())
            .collect();

        Ok(SectionDiscovery::from_urls(0, &links))
    }

    fn validate_root(&self, root_url: &str) -> Result<Url, CrawlError> {
        let root = normalize_url(root_url).map_err(|e| CrawlError::InvalidRoot {
            url: root_url.to_string(),
            reason: e.to_string(),
        })?;
        self.fetcher.gate().check_url(&root).map_err(|source| CrawlError::Unsafe {
            url: root.to_string(),
            source,
        })?;
        Ok(root)
    }

    async fn lookup_robots(&self, fetcher: &Fetcher, root: &Url) -> RobotsLookup {
        let Ok(robots_url) = root.join("/robots.txt") else {
            return RobotsLookup::missing();
        };

        match fetcher.fetch_text(&robots_url).await {
            Ok(Some(content)) => RobotsLookup::found(&content),
            Ok(None) => RobotsLookup::missing(),
            Err(e) => {
                tracing::debug!("robots.txt unavailable for {}: {}", root, e);
                RobotsLookup::missing()
            }
        }
    }

    fn effective_delay(&self, robots: &RobotsLookup) -> Duration {
        let configured = self.config.politeness_delay();
        match robots.capped_crawl_delay(&self.robots_agent) {
            Some(requested) if requested > configured => requested,
            _ => configured,
        }
    }

    fn enqueue(
        &self,
        state: &mut CrawlState,
        queue: &mut VecDeque<QueuedUrl>,
        url: Url,
        referrer: String,
        root: &Url,
        section_filter: Option<&str>,
    ) {
        if !same_host(&url, root) {
            return;
        }

        if url != *root {
            if is_denylisted(&url) || has_non_html_extension(&url) {
                return;
            }
            if section_filter.is_some_and(|filter| section_of(&url) != filter) {
                return;
            }
        }

        let key = url.to_string();
        if state.visited.contains(&key) || !state.enqueued.insert(key) {
            return;
        }

        queue.push_back(QueuedUrl { url, referrer });
    }

    /// Fetches one queued URL and turns it into a page when possible
    async fn fetch_page(
        &self,
        fetcher: &Fetcher,
        state: &mut CrawlState,
        queued: &QueuedUrl,
        root: &Url,
    ) -> Option<CrawledPage> {
        let response = match fetcher.fetch(&queued.url).await {
            Ok(response) => response,
            Err(e) => {
                self.record_fetch_error(state, queued, e);
                return None;
            }
        };

        if let Some(chain) =
            RedirectChain::from_urls(response.chain.iter().map(Url::to_string).collect())
        {
            if chain.is_reportable() {
                tracing::debug!("Redirect chain of {} hops from {}", chain.hops, chain.origin());
                state.redirect_chains.push(chain);
            }
        }

        if response.status >= 400 {
            state.errors.push(PageError {
                url: queued.url.to_string(),
                message: format!("HTTP {}", response.status),
            });
            state.broken_links.push(BrokenLink {
                source_url: queued.referrer.clone(),
                target_url: queued.url.to_string(),
                status: Some(response.status),
            });
            return None;
        }

        let final_url = match normalize_url(response.final_url().as_str()) {
            Ok(url) => url,
            Err(e) => {
                state.errors.push(PageError {
                    url: queued.url.to_string(),
                    message: e.to_string(),
                });
                return None;
            }
        };

        if !same_host(&final_url, root) {
            state.errors.push(PageError {
                url: queued.url.to_string(),
                message: format!("redirected off-site to {}", final_url),
            });
            return None;
        }

        if final_url != queued.url && !state.visited.insert(final_url.to_string()) {
            tracing::debug!("{} redirects to already crawled {}", queued.url, final_url);
            return None;
        }

        if !response.is_html() {
            tracing::debug!("Skipping non-HTML {} ({})", final_url, response.content_type);
            return None;
        }

        Some(parse_page(
            &response.body,
            &final_url,
            response.status,
            self.config.max_content_chars,
        ))
    }

    fn record_fetch_error(&self, state: &mut CrawlState, queued: &QueuedUrl, error: FetchError) {
        if error.is_safety_violation() {
            tracing::warn!("Safety gate refused {}: {}", queued.url, error);
        } else {
            tracing::debug!("Fetch failed for {}: {}", queued.url, error);
            state.broken_links.push(BrokenLink {
                source_url: queued.referrer.clone(),
                target_url: queued.url.to_string(),
                status: None,
            });
        }

        state.errors.push(PageError {
            url: queued.url.to_string(),
            message: error.to_string(),
        });
    }

    /// Probes a sample of links that pages reference but the crawl never fetched
    async fn probe_unvisited_links(&self, fetcher: &Fetcher, state: &mut CrawlState, root: &Url) {
        let reported: HashSet<String> = state
            .broken_links
            .iter()
            .map(|b| b.target_url.clone())
            .collect();

        let mut candidates: Vec<(Url, String)> = Vec::new();
        let mut seen = HashSet::new();
        for page in &state.pages {
            for link in &page.internal_links {
                if state.visited.contains(link)
                    || reported.contains(link)
                    || !seen.insert(link.clone())
                {
                    continue;
                }
                let Ok(url) = Url::parse(link) else {
                    continue;
                };
                if !same_host(&url, root) || is_denylisted(&url) || has_non_html_extension(&url) {
                    continue;
                }
                candidates.push((url, page.url.clone()));
            }
        }

        for (url, source) in candidates.into_iter().take(self.config.broken_link_sample) {
            match fetcher.probe_status(&url).await {
                Ok(status) if status >= 400 => state.broken_links.push(BrokenLink {
                    source_url: source,
                    target_url: url.to_string(),
                    status: Some(status),
                }),
                Ok(_) => {}
                Err(e) if e.is_safety_violation() => {
                    tracing::warn!("Safety gate refused probe of {}: {}", url, e);
                }
                Err(e) => {
                    tracing::debug!("Probe failed for {}: {}", url, e);
                    state.broken_links.push(BrokenLink {
                        source_url: source,
                        target_url: url.to_string(),
                        status: None,
                    });
                }
            }
        }
    }
}
