//! Component identities, outputs and failures

use crate::analysis::{DuplicateGroup, LinkingReport, TechnicalIssue};
use crate::crawler::CrawlReport;
use crate::providers::{Competitor, ContentBrief, RankingEntry, TopicCluster};
use crate::scoring::HealthScore;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Every unit of work an audit is made of
///
/// Declaration order is a valid topological order of the standard graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKey {
    Crawl,
    TechnicalIssues,
    InternalLinking,
    DuplicateContent,
    KeywordRankings,
    Competitors,
    TopicClusters,
    ContentBriefs,
    HealthScore,
}

/// Where a component gets its data from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Crawl,
    /// Pure function of the crawl; never fails
    Local,
    ExternalData,
    Ai,
    Aggregation,
}

impl ComponentKey {
    pub const ALL: [ComponentKey; 9] = [
        Self::Crawl,
        Self::TechnicalIssues,
        Self::InternalLinking,
        Self::DuplicateContent,
        Self::KeywordRankings,
        Self::Competitors,
        Self::TopicClusters,
        Self::ContentBriefs,
        Self::HealthScore,
    ];

    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::Crawl => ComponentKind::Crawl,
            Self::TechnicalIssues | Self::InternalLinking | Self::DuplicateContent => {
                ComponentKind::Local
            }
            Self::KeywordRankings | Self::Competitors => ComponentKind::ExternalData,
            Self::TopicClusters | Self::ContentBriefs => ComponentKind::Ai,
            Self::HealthScore => ComponentKind::Aggregation,
        }
    }

    pub fn is_local(&self) -> bool {
        self.kind() == ComponentKind::Local
    }

    /// Local analyzers, in declaration order
    pub fn local() -> impl Iterator<Item = ComponentKey> {
        Self::ALL.into_iter().filter(ComponentKey::is_local)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crawl => "crawl",
            Self::TechnicalIssues => "technical_issues",
            Self::InternalLinking => "internal_linking",
            Self::DuplicateContent => "duplicate_content",
            Self::KeywordRankings => "keyword_rankings",
            Self::Competitors => "competitors",
            Self::TopicClusters => "topic_clusters",
            Self::ContentBriefs => "content_briefs",
            Self::HealthScore => "health_score",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result a component stores in the job's accumulator
///
/// One variant per component key, so each consumer knows the exact payload
/// type of every component it depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "component", content = "data", rename_all = "snake_case")]
pub enum ComponentOutput {
    Crawl(CrawlReport),
    TechnicalIssues(Vec<TechnicalIssue>),
    InternalLinking(LinkingReport),
    DuplicateContent(Vec<DuplicateGroup>),
    KeywordRankings(Vec<RankingEntry>),
    Competitors(Vec<Competitor>),
    TopicClusters(Vec<TopicCluster>),
    ContentBriefs(Vec<ContentBrief>),
    HealthScore(HealthScore),
}

impl ComponentOutput {
    /// The component that owns this output
    pub fn key(&self) -> ComponentKey {
        match self {
            Self::Crawl(_) => ComponentKey::Crawl,
            Self::TechnicalIssues(_) => ComponentKey::TechnicalIssues,
            Self::InternalLinking(_) => ComponentKey::InternalLinking,
            Self::DuplicateContent(_) => ComponentKey::DuplicateContent,
            Self::KeywordRankings(_) => ComponentKey::KeywordRankings,
            Self::Competitors(_) => ComponentKey::Competitors,
            Self::TopicClusters(_) => ComponentKey::TopicClusters,
            Self::ContentBriefs(_) => ComponentKey::ContentBriefs,
            Self::HealthScore(_) => ComponentKey::HealthScore,
        }
    }
}

/// A component run that did not produce output
///
/// Recorded on the component's progress entry; never returned to the caller
/// of the scheduler. `fatal` marks failures that end the whole job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ComponentError {
    pub message: String,
    pub fatal: bool,
}

impl ComponentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: false,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: true,
        }
    }

    /// A dependency's output was expected in the accumulator but is absent
    pub fn missing_input(key: ComponentKey) -> Self {
        Self::new(format!("missing output of {}", key))
    }
}
