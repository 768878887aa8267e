//! Per-job store of component results
//!
//! Each component owns exactly one slot, keyed by the output's own
//! [`ComponentKey`]. Writing a slot replaces it whole; a failed component
//! writes nothing, so siblings never see a partial update.

use crate::analysis::{DuplicateGroup, LinkingReport, TechnicalIssue};
use crate::crawler::CrawlReport;
use crate::pipeline::{ComponentKey, ComponentOutput};
use crate::providers::{Competitor, ContentBrief, RankingEntry, TopicCluster};
use crate::scoring::HealthScore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultAccumulator {
    outputs: BTreeMap<ComponentKey, ComponentOutput>,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an output in its component's slot, returning the one it replaced
    pub fn insert(&mut self, output: ComponentOutput) -> Option<ComponentOutput> {
        self.outputs.insert(output.key(), output)
    }

    pub fn get(&self, key: ComponentKey) -> Option<&ComponentOutput> {
        self.outputs.get(&key)
    }

    pub fn contains(&self, key: ComponentKey) -> bool {
        self.outputs.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentOutput> {
        self.outputs.values()
    }

    pub fn crawl(&self) -> Option<&CrawlReport> {
        match self.get(ComponentKey::Crawl) {
            Some(ComponentOutput::Crawl(report)) => Some(report),
            _ => None,
        }
    }

    pub fn technical_issues(&self) -> Option<&[TechnicalIssue]> {
        match self.get(ComponentKey::TechnicalIssues) {
            Some(ComponentOutput::TechnicalIssues(issues)) => Some(issues),
            _ => None,
        }
    }

    pub fn internal_linking(&self) -> Option<&LinkingReport> {
        match self.get(ComponentKey::InternalLinking) {
            Some(ComponentOutput::InternalLinking(report)) => Some(report),
            _ => None,
        }
    }

    pub fn duplicate_content(&self) -> Option<&[DuplicateGroup]> {
        match self.get(ComponentKey::DuplicateContent) {
            Some(ComponentOutput::DuplicateContent(groups)) => Some(groups),
            _ => None,
        }
    }

    pub fn keyword_rankings(&self) -> Option<&[RankingEntry]> {
        match self.get(ComponentKey::KeywordRankings) {
            Some(ComponentOutput::KeywordRankings(entries)) => Some(entries),
            _ => None,
        }
    }

    pub fn competitors(&self) -> Option<&[Competitor]> {
        match self.get(ComponentKey::Competitors) {
            Some(ComponentOutput::Competitors(competitors)) => Some(competitors),
            _ => None,
        }
    }

    pub fn topic_clusters(&self) -> Option<&[TopicCluster]> {
        match self.get(ComponentKey::TopicClusters) {
            Some(ComponentOutput::TopicClusters(clusters)) => Some(clusters),
            _ => None,
        }
    }

    pub fn content_briefs(&self) -> Option<&[ContentBrief]> {
        match self.get(ComponentKey::ContentBriefs) {
            Some(ComponentOutput::ContentBriefs(briefs)) => Some(briefs),
            _ => None,
        }
    }

    pub fn health_score(&self) -> Option<&HealthScore> {
        match self.get(ComponentKey::HealthScore) {
            Some(ComponentOutput::HealthScore(score)) => Some(score),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_slot() {
        let mut results = ResultAccumulator::new();
        assert!(results.insert(ComponentOutput::KeywordRankings(vec![])).is_none());

        let entry = RankingEntry {
            keyword: "rust crawler".to_string(),
            url: "https://example.com/".to_string(),
            position: 3,
            search_volume: 100,
        };
        let previous = results.insert(ComponentOutput::KeywordRankings(vec![entry.clone()]));

        assert_eq!(previous, Some(ComponentOutput::KeywordRankings(vec![])));
        assert_eq!(results.keyword_rankings(), Some(&[entry][..]));
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_typed_accessors_ignore_other_slots() {
        let mut results = ResultAccumulator::new();
        results.insert(ComponentOutput::Competitors(vec![]));
        assert!(results.competitors().is_some());
        assert!(results.topic_clusters().is_none());
        assert!(results.crawl().is_none());
    }

    #[test]
    fn test_serde_round_trip() {
        let mut results = ResultAccumulator::new();
        results.insert(ComponentOutput::DuplicateContent(vec![]));
        results.insert(ComponentOutput::ContentBriefs(vec![]));

        let json = serde_json::to_string(&results).unwrap();
        let back: ResultAccumulator = serde_json::from_str(&json).unwrap();
        assert_eq!(back, results);
    }
}
