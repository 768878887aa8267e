//! Section discovery stream
//!
//! Before a crawl, callers can inspect how a site's URLs split into sections
//! and choose one as the crawl's section filter. The stream yields, in order:
//! the sitemap URL count, the section list, one scored entry per section,
//! then `Done`. It is finite and cannot be restarted.

use crate::crawler::report::SectionSummary;
use crate::url::{is_denylisted, section_of};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::iter::FusedIterator;
use url::Url;

/// Number of example URLs kept per scored section
const SAMPLE_URLS_PER_SECTION: usize = 3;

/// A section ranked by its share of the site's URLs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredSection {
    pub name: String,
    pub url_count: usize,
    /// Share of all discovered URLs, 0-100
    pub score: u8,
    pub sample_urls: Vec<String>,
}

/// One element of the discovery stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscoveryEvent {
    SitemapCount(usize),
    Sections(Vec<SectionSummary>),
    ScoredSection(ScoredSection),
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    SitemapCount,
    Sections,
    Scored,
    Finished,
}

/// Iterator over [`DiscoveryEvent`]s for one site
#[derive(Debug)]
pub struct SectionDiscovery {
    phase: Phase,
    sitemap_count: usize,
    sections: Vec<SectionSummary>,
    scored: VecDeque<ScoredSection>,
}

impl SectionDiscovery {
    /// Builds the stream from discovered URLs
    ///
    /// # Arguments
    ///
    /// * `sitemap_count` - URLs found in sitemaps (0 when discovery fell back to links)
    /// * `urls` - URLs to group into sections; denylisted sections are dropped
    pub fn from_urls(sitemap_count: usize, urls: &[Url]) -> Self {
        let mut grouped: BTreeMap<String, Vec<&Url>> = BTreeMap::new();
        for url in urls.iter().filter(|u| !is_denylisted(u)) {
            grouped.entry(section_of(url)).or_default().push(url);
        }

        let total: usize = grouped.values().map(Vec::len).sum();

        let mut scored: Vec<ScoredSection> = grouped
            .into_iter()
            .map(|(name, members)| ScoredSection {
                score: ((members.len() * 100) as f64 / total.max(1) as f64).round() as u8,
                url_count: members.len(),
                sample_urls: members
                    .iter()
                    .take(SAMPLE_URLS_PER_SECTION)
                    .map(|u| u.to_string())
                    .collect(),
                name,
            })
            .collect();
        scored.sort_by(|a, b| b.url_count.cmp(&a.url_count).then(a.name.cmp(&b.name)));

        let sections = scored
            .iter()
            .map(|s| SectionSummary {
                name: s.name.clone(),
                page_count: s.url_count,
            })
            .collect();

        Self {
            phase: Phase::SitemapCount,
            sitemap_count,
            sections,
            scored: scored.into(),
        }
    }
}

impl Iterator for SectionDiscovery {
    type Item = DiscoveryEvent;

    fn next(&mut self) -> Option<Self::Item> {
        match self.phase {
            Phase::SitemapCount => {
                self.phase = Phase::Sections;
                Some(DiscoveryEvent::SitemapCount(self.sitemap_count))
            }
            Phase::Sections => {
                self.phase = Phase::Scored;
                Some(DiscoveryEvent::Sections(std::mem::take(&mut self.sections)))
            }
            Phase::Scored => match self.scored.pop_front() {
                Some(section) => Some(DiscoveryEvent::ScoredSection(section)),
                None => {
                    self.phase = Phase::Finished;
                    Some(DiscoveryEvent::Done)
                }
            },
            Phase::Finished => None,
        }
    }
}

impl FusedIterator for SectionDiscovery {}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(paths: &[&str]) -> Vec<Url> {
        paths
            .iter()
            .map(|p| Url::parse(&format!("https://example.com{}", p)).unwrap())
            .collect()
    }

    #[test]
    fn test_event_order_and_termination() {
        let mut stream = SectionDiscovery::from_urls(
            5,
            &urls(&["/", "/blog/a", "/blog/b", "/blog/c", "/docs/x", "/login"]),
        );

        assert_eq!(stream.next(), Some(DiscoveryEvent::SitemapCount(5)));

        match stream.next() {
            Some(DiscoveryEvent::Sections(sections)) => {
                let names: Vec<_> = sections.iter().map(|s| s.name.as_str()).collect();
                assert_eq!(names, vec!["blog", "docs", "root"]);
            }
            other => panic!("expected sections, got {:?}", other),
        }

        match stream.next() {
            Some(DiscoveryEvent::ScoredSection(s)) => {
                assert_eq!(s.name, "blog");
                assert_eq!(s.url_count, 3);
                assert_eq!(s.score, 60);
            }
            other => panic!("expected scored section, got {:?}", other),
        }

        assert!(matches!(stream.next(), Some(DiscoveryEvent::ScoredSection(_))));
        assert!(matches!(stream.next(), Some(DiscoveryEvent::ScoredSection(_))));
        assert_eq!(stream.next(), Some(DiscoveryEvent::Done));
        assert_eq!(stream.next(), None);
        assert_eq!(stream.next(), None);
    }

    #[test]
    fn test_empty_stream() {
        let events: Vec<_> = SectionDiscovery::from_urls(0, &[]).collect();
        assert_eq!(
            events,
            vec![
                DiscoveryEvent::SitemapCount(0),
                DiscoveryEvent::Sections(vec![]),
                DiscoveryEvent::Done
            ]
        );
    }
}
