//! Data exchanged with external collaborators

use serde::{Deserialize, Serialize};

/// A keyword a site ranks for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub keyword: String,
    /// Page that ranks for the keyword
    pub url: String,
    /// Search result position, 1-based
    pub position: u32,
    pub search_volume: u32,
}

/// A domain competing for the same keywords
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competitor {
    pub domain: String,
    pub shared_keywords: usize,
    /// Share of the audited site's keywords where this domain ranks higher, 0.0-1.0
    pub overlap: f64,
}

/// A group of pages and keywords around one topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicCluster {
    pub name: String,
    pub pillar_url: Option<String>,
    pub urls: Vec<String>,
    pub keywords: Vec<String>,
}

/// A suggested piece of content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBrief {
    pub title: String,
    pub target_keyword: String,
    pub cluster: String,
    pub outline: Vec<String>,
}
