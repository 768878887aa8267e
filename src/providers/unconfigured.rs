//! Provider used when no external data or AI backend is configured
//!
//! Every call fails, so the components that depend on it are recorded as
//! failed and stay eligible for retry once a backend is wired in.

use crate::crawler::CrawledPage;
use crate::providers::{
    AiProvider, Competitor, ContentBrief, ProviderError, RankingEntry, RankingProvider,
    TopicCluster,
};
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredProvider;

impl UnconfiguredProvider {
    fn unavailable(what: &str) -> ProviderError {
        ProviderError::Unavailable(format!("no {} backend configured", what))
    }
}

#[async_trait]
impl RankingProvider for UnconfiguredProvider {
    async fn rankings(&self, _domain: &str) -> Result<Vec<RankingEntry>, ProviderError> {
        Err(Self::unavailable("ranking"))
    }

    async fn competitors(
        &self,
        _domain: &str,
        _rankings: &[RankingEntry],
        _limit: usize,
    ) -> Result<Vec<Competitor>, ProviderError> {
        Err(Self::unavailable("competitor"))
    }
}

#[async_trait]
impl AiProvider for UnconfiguredProvider {
    async fn cluster_topics(
        &self,
        _pages: &[CrawledPage],
        _rankings: &[RankingEntry],
    ) -> Result<Vec<TopicCluster>, ProviderError> {
        Err(Self::unavailable("AI clustering"))
    }

    async fn content_briefs(
        &self,
        _clusters: &[TopicCluster],
        _competitors: &[Competitor],
        _limit: usize,
    ) -> Result<Vec<ContentBrief>, ProviderError> {
        Err(Self::unavailable("AI brief"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_call_is_unavailable() {
        let provider = UnconfiguredProvider;
        assert!(matches!(
            provider.rankings("example.com").await,
            Err(ProviderError::Unavailable(_))
        ));
        assert!(matches!(
            provider.cluster_topics(&[], &[]).await,
            Err(ProviderError::Unavailable(_))
        ));
    }
}
