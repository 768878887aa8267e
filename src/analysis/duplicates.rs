//! Duplicate content detection
//!
//! Two passes: exact duplicates bucketed by a SHA-256 of the page text, then
//! near duplicates by Jaccard similarity of word sets over the pages the exact
//! pass left ungrouped. The pairwise pass is capped so large sites stay cheap.

use crate::crawler::CrawledPage;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};

/// Pages with less text than this take part in neither pass
const MIN_CONTENT_CHARS: usize = 100;

/// Only words longer than this count towards similarity
const MIN_WORD_CHARS: usize = 3;

/// Upper bound on pairwise comparisons in the near-duplicate pass
const MAX_COMPARISONS: usize = 5_000;

/// Jaccard similarity at or above which two pages are near duplicates
pub const NEAR_DUPLICATE_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKind {
    Exact,
    Near,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub kind: DuplicateKind,
    /// Member URLs in crawl order
    pub urls: Vec<String>,
    /// 1.0 for exact groups
    pub similarity: f64,
}

/// Finds exact and near duplicate pages
///
/// Exact groups come first (ordered by their first member), followed by one
/// group per near-duplicate pair.
pub fn detect_duplicates(pages: &[CrawledPage]) -> Vec<DuplicateGroup> {
    let candidates: Vec<&CrawledPage> = pages
        .iter()
        .filter(|p| p.content.trim().chars().count() >= MIN_CONTENT_CHARS)
        .collect();

    let mut buckets: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (index, page) in candidates.iter().enumerate() {
        buckets
            .entry(content_hash(&page.content))
            .or_default()
            .push(index);
    }

    let mut exact: Vec<Vec<usize>> = buckets
        .into_values()
        .filter(|members| members.len() > 1)
        .collect();
    exact.sort_by_key(|members| members[0]);

    let grouped: HashSet<usize> = exact.iter().flatten().copied().collect();

    let mut groups: Vec<DuplicateGroup> = exact
        .iter()
        .map(|members| DuplicateGroup {
            kind: DuplicateKind::Exact,
            urls: members.iter().map(|&i| candidates[i].url.clone()).collect(),
            similarity: 1.0,
        })
        .collect();

    let remaining: Vec<(&CrawledPage, HashSet<String>)> = candidates
        .iter()
        .enumerate()
        .filter(|(index, _)| !grouped.contains(index))
        .map(|(_, page)| (*page, word_set(&page.content)))
        .filter(|(_, words)| !words.is_empty())
        .collect();

    let mut comparisons = 0;
    'outer: for (i, (left, left_words)) in remaining.iter().enumerate() {
        for (right, right_words) in &remaining[i + 1..] {
            if comparisons >= MAX_COMPARISONS {
                tracing::debug!(
                    "Near-duplicate pass stopped after {} comparisons",
                    MAX_COMPARISONS
                );
                break 'outer;
            }
            comparisons += 1;

            let similarity = jaccard(left_words, right_words);
            if similarity >= NEAR_DUPLICATE_THRESHOLD {
                groups.push(DuplicateGroup {
                    kind: DuplicateKind::Near,
                    urls: vec![left.url.clone(), right.url.clone()],
                    similarity,
                });
            }
        }
    }

    groups
}

fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.trim().as_bytes());
    hex::encode(hasher.finalize())
}

fn word_set(content: &str) -> HashSet<String> {
    content
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| w.chars().count() > MIN_WORD_CHARS)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}
