//! Health score aggregation
//!
//! Six weighted sub-scores summing to 100, each a pure function of specific
//! accumulator fields. Restricted tiers compute only the sub-scores their
//! inputs allow, and the total is renormalized over those sub-scores' weights.

use crate::analysis::{Severity, UNDERLINKED_THRESHOLD};
use crate::pipeline::{ResultAccumulator, Tier};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

pub const RANKING_COVERAGE_WEIGHT: f64 = 30.0;
pub const TOPICAL_AUTHORITY_WEIGHT: f64 = 20.0;
pub const TECHNICAL_HEALTH_WEIGHT: f64 = 15.0;
pub const CONTENT_QUALITY_WEIGHT: f64 = 15.0;
pub const INTERNAL_LINKING_WEIGHT: f64 = 10.0;
pub const COMPETITIVE_POSITION_WEIGHT: f64 = 10.0;

/// Weighted issues per page at which technical health reaches zero
const TECHNICAL_PENALTY_CEILING: f64 = 5.0;

/// Word count from which a page counts as substantial
const SUBSTANTIAL_WORD_COUNT: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Excellent,
    Good,
    NeedsWork,
    Poor,
}

impl Grade {
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => Self::Excellent,
            60..=79 => Self::Good,
            40..=59 => Self::NeedsWork,
            _ => Self::Poor,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::NeedsWork => "needs work",
            Self::Poor => "poor",
        })
    }
}

/// Which inputs a job's tier provides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierFlags {
    /// External-data and AI inputs are unavailable
    pub restricted: bool,
}

impl TierFlags {
    pub fn for_tier(tier: Tier) -> Self {
        Self {
            restricted: tier.is_restricted(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubScore {
    pub name: String,
    pub value: f64,
    pub max: f64,
    /// False when the tier does not provide this sub-score's inputs
    pub computed: bool,
}

impl SubScore {
    fn computed(name: &str, ratio: f64, max: f64) -> Self {
        Self {
            name: name.to_string(),
            value: round_tenth(ratio.clamp(0.0, 1.0) * max),
            max,
            computed: true,
        }
    }

    fn placeholder(name: &str, max: f64) -> Self {
        Self {
            name: name.to_string(),
            value: 0.0,
            max,
            computed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthScore {
    /// 0-100
    pub score: u8,
    pub grade: Grade,
    pub breakdown: Vec<SubScore>,
}

impl HealthScore {
    /// Aggregates sub-scores into a 0-100 score
    ///
    /// Only computed sub-scores count, each against its own maximum.
    pub fn from_breakdown(breakdown: Vec<SubScore>) -> Self {
        let (earned, possible) = breakdown
            .iter()
            .filter(|s| s.computed)
            .fold((0.0, 0.0), |(earned, possible), s| {
                (earned + s.value, possible + s.max)
            });

        let score = if possible > 0.0 {
            ((earned / possible) * 100.0).round().clamp(0.0, 100.0) as u8
        } else {
            0
        };

        Self {
            score,
            grade: Grade::from_score(score),
            breakdown,
        }
    }

    pub fn sub_score(&self, name: &str) -> Option<&SubScore> {
        self.breakdown.iter().find(|s| s.name == name)
    }
}

/// Computes the health score of a job's results
///
/// # Arguments
///
/// * `results` - The job's accumulated component outputs
/// * `page_count` - Number of pages the crawl fetched
/// * `flags` - Which inputs the job's tier provides
pub fn score(results: &ResultAccumulator, page_count: usize, flags: TierFlags) -> HealthScore {
    let pages = page_count.max(1) as f64;

    let gated = |name: &str, max: f64, ratio: fn(&ResultAccumulator, f64) -> f64| {
        if flags.restricted {
            SubScore::placeholder(name, max)
        } else {
            SubScore::computed(name, ratio(results, pages), max)
        }
    };

    let breakdown = vec![
        gated("ranking_coverage", RANKING_COVERAGE_WEIGHT, ranking_coverage),
        gated("topical_authority", TOPICAL_AUTHORITY_WEIGHT, topical_authority),
        SubScore::computed(
            "technical_health",
            technical_health(results, pages),
            TECHNICAL_HEALTH_WEIGHT,
        ),
        gated("content_quality", CONTENT_QUALITY_WEIGHT, content_quality),
        SubScore::computed(
            "internal_linking",
            internal_linking(results),
            INTERNAL_LINKING_WEIGHT,
        ),
        gated(
            "competitive_position",
            COMPETITIVE_POSITION_WEIGHT,
            competitive_position,
        ),
    ];

    HealthScore::from_breakdown(breakdown)
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Distinct ranking URLs per crawled page
fn ranking_coverage(results: &ResultAccumulator, pages: f64) -> f64 {
    let ranked: HashSet<&str> = results
        .keyword_rankings()
        .unwrap_or_default()
        .iter()
        .map(|r| r.url.as_str())
        .collect();
    ranked.len() as f64 / pages
}

/// Share of crawled pages that belong to a topic cluster
fn topical_authority(results: &ResultAccumulator, pages: f64) -> f64 {
    let crawled: HashSet<&str> = results
        .crawl()
        .map(|c| c.pages.iter().map(|p| p.url.as_str()).collect())
        .unwrap_or_default();
    let clustered: HashSet<&str> = results
        .topic_clusters()
        .unwrap_or_default()
        .iter()
        .flat_map(|c| c.urls.iter().map(String::as_str))
        .filter(|url| crawled.contains(url))
        .collect();
    clustered.len() as f64 / pages
}

/// One minus severity-weighted issues per page, relative to a ceiling
fn technical_health(results: &ResultAccumulator, pages: f64) -> f64 {
    let weighted: f64 = results
        .technical_issues()
        .unwrap_or_default()
        .iter()
        .map(|issue| match issue.severity {
            Severity::Critical => 1.0,
            Severity::Warning => 0.5,
            Severity::Notice => 0.1,
        })
        .sum();
    1.0 - (weighted / pages) / TECHNICAL_PENALTY_CEILING
}

/// Share of substantial pages, less the share of pages with duplicate copies
fn content_quality(results: &ResultAccumulator, pages: f64) -> f64 {
    let Some(crawl) = results.crawl() else {
        return 0.0;
    };
    let substantial = crawl
        .pages
        .iter()
        .filter(|p| p.word_count >= SUBSTANTIAL_WORD_COUNT)
        .count() as f64;
    let duplicated: HashSet<&str> = results
        .duplicate_content()
        .unwrap_or_default()
        .iter()
        .flat_map(|g| g.urls.iter().map(String::as_str))
        .collect();
    (substantial - duplicated.len() as f64) / pages
}

/// Orphans count nothing, underlinked pages half, well-linked pages fully
fn internal_linking(results: &ResultAccumulator) -> f64 {
    let Some(linking) = results.internal_linking() else {
        return 0.0;
    };
    let total = linking.page_count();
    if total == 0 {
        return 0.0;
    }
    let well_linked = linking.well_linked_count() as f64;
    let underlinked = linking
        .inbound
        .values()
        .filter(|&&count| count > 0 && count < UNDERLINKED_THRESHOLD)
        .count() as f64;
    (well_linked + 0.5 * underlinked) / total as f64
}

/// One minus the mean keyword overlap of competitors; full marks without competitors
fn competitive_position(results: &ResultAccumulator, _pages: f64) -> f64 {
    let competitors = results.competitors().unwrap_or_default();
    if competitors.is_empty() {
        return 1.0;
    }
    let mean_overlap =
        competitors.iter().map(|c| c.overlap).sum::<f64>() / competitors.len() as f64;
    1.0 - mean_overlap
}
