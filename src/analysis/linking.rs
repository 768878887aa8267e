//! Internal link graph analysis

use crate::crawler::CrawlReport;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Pages with at least one but fewer than this many inbound links are underlinked
pub const UNDERLINKED_THRESHOLD: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkingReport {
    /// Inbound internal-link count per crawled URL
    pub inbound: BTreeMap<String, usize>,
    /// Crawled pages no other crawled page links to (the root is exempt)
    pub orphans: Vec<String>,
    /// Crawled pages with fewer than [`UNDERLINKED_THRESHOLD`] inbound links
    pub underlinked: Vec<String>,
}

impl LinkingReport {
    pub fn page_count(&self) -> usize {
        self.inbound.len()
    }

    /// Pages with at least [`UNDERLINKED_THRESHOLD`] inbound links
    pub fn well_linked_count(&self) -> usize {
        self.inbound
            .values()
            .filter(|&&count| count >= UNDERLINKED_THRESHOLD)
            .count()
    }
}

/// Builds inbound-link counts for every crawled page
///
/// Only links between crawled pages count. A page linking to itself, or
/// linking to the same target twice, contributes nothing extra.
pub fn analyze_internal_links(report: &CrawlReport) -> LinkingReport {
    let mut inbound: BTreeMap<String, usize> = report
        .pages
        .iter()
        .map(|p| (p.url.clone(), 0))
        .collect();

    for page in &report.pages {
        let targets: HashSet<&str> = page
            .internal_links
            .iter()
            .map(String::as_str)
            .filter(|target| *target != page.url)
            .collect();
        for target in targets {
            if let Some(count) = inbound.get_mut(target) {
                *count += 1;
            }
        }
    }

    let orphans = inbound
        .iter()
        .filter(|(url, &count)| count == 0 && **url != report.root_url)
        .map(|(url, _)| url.clone())
        .collect();

    let underlinked = inbound
        .iter()
        .filter(|(_, &count)| count > 0 && count < UNDERLINKED_THRESHOLD)
        .map(|(url, _)| url.clone())
        .collect();

    LinkingReport {
        inbound,
        orphans,
        underlinked,
    }
}
