//! Robots.txt handling module
//!
//! robots.txt is read once per crawl. Its presence is reported as a site flag,
//! its `Sitemap:` lines feed sitemap discovery, and its rules gate which
//! URLs the crawler fetches.

mod parser;

pub use parser::ParsedRobots;

/// Upper bound on a robots.txt crawl delay we are willing to honour (seconds)
pub const MAX_HONOURED_CRAWL_DELAY_SECS: f64 = 10.0;

/// Outcome of looking up robots.txt for a site
#[derive(Debug, Clone)]
pub struct RobotsLookup {
    /// True when the server answered robots.txt with a success status
    pub present: bool,
    /// Parsed rules; permissive when the file is absent
    pub robots: ParsedRobots,
}

impl RobotsLookup {
    pub fn missing() -> Self {
        Self {
            present: false,
            robots: ParsedRobots::allow_all(),
        }
    }

    pub fn found(content: &str) -> Self {
        Self {
            present: true,
            robots: ParsedRobots::from_content(content),
        }
    }

    /// Crawl delay for `user_agent`, capped at [`MAX_HONOURED_CRAWL_DELAY_SECS`]
    pub fn capped_crawl_delay(&self, user_agent: &str) -> Option<std::time::Duration> {
        self.robots
            .crawl_delay(user_agent)
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| std::time::Duration::from_secs_f64(d.min(MAX_HONOURED_CRAWL_DELAY_SECS)))
    }
}
