//! Component execution
//!
//! The scheduler decides *when* a component runs; an executor decides *what*
//! running it means. Executors receive a read-only snapshot of the job taken
//! before the pass started, so every dependency's output is already present.

use crate::analysis::{analyze_internal_links, detect_duplicates, detect_technical_issues};
use crate::crawler::{CrawlReport, Crawler};
use crate::pipeline::{ComponentError, ComponentKey, ComponentOutput, Job};
use crate::providers::{AiProvider, RankingProvider};
use crate::scoring::{score, TierFlags};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait ComponentExecutor: Send + Sync {
    async fn execute(&self, key: ComponentKey, job: &Job) -> Result<ComponentOutput, ComponentError>;
}

/// Runs a local analyzer over a crawl
///
/// Returns `None` for keys that are not local analyzers.
pub fn run_local(key: ComponentKey, crawl: &CrawlReport) -> Option<ComponentOutput> {
    match key {
        ComponentKey::TechnicalIssues => Some(ComponentOutput::TechnicalIssues(
            detect_technical_issues(crawl),
        )),
        ComponentKey::InternalLinking => Some(ComponentOutput::InternalLinking(
            analyze_internal_links(crawl),
        )),
        ComponentKey::DuplicateContent => Some(ComponentOutput::DuplicateContent(
            detect_duplicates(&crawl.pages),
        )),
        _ => None,
    }
}

/// Executor backed by the real crawler, analyzers and providers
pub struct DefaultExecutor {
    crawler: Crawler,
    rankings: Arc<dyn RankingProvider>,
    ai: Arc<dyn AiProvider>,
}

impl DefaultExecutor {
    pub fn new(
        crawler: Crawler,
        rankings: Arc<dyn RankingProvider>,
        ai: Arc<dyn AiProvider>,
    ) -> Self {
        Self {
            crawler,
            rankings,
            ai,
        }
    }

    async fn crawl(&self, job: &Job) -> Result<ComponentOutput, ComponentError> {
        match self.crawler.crawl(&job.crawl_request()).await {
            Ok(report) => Ok(ComponentOutput::Crawl(report)),
            Err(e) if e.is_terminal() => Err(ComponentError::fatal(e.to_string())),
            Err(e) => Err(ComponentError::new(e.to_string())),
        }
    }

    async fn keyword_rankings(&self, job: &Job) -> Result<ComponentOutput, ComponentError> {
        let domain = domain_of(job)?;
        let rankings = self
            .rankings
            .rankings(&domain)
            .await
            .map_err(|e| ComponentError::new(e.to_string()))?;
        Ok(ComponentOutput::KeywordRankings(rankings))
    }

    async fn competitors(&self, job: &Job) -> Result<ComponentOutput, ComponentError> {
        let domain = domain_of(job)?;
        let rankings = job
            .results
            .keyword_rankings()
            .ok_or_else(|| ComponentError::missing_input(ComponentKey::KeywordRankings))?;
        let competitors = self
            .rankings
            .competitors(&domain, rankings, job.tier.limits().competitors)
            .await
            .map_err(|e| ComponentError::new(e.to_string()))?;
        Ok(ComponentOutput::Competitors(competitors))
    }

    async fn topic_clusters(&self, job: &Job) -> Result<ComponentOutput, ComponentError> {
        let crawl = crawl_of(job)?;
        let rankings = job
            .results
            .keyword_rankings()
            .ok_or_else(|| ComponentError::missing_input(ComponentKey::KeywordRankings))?;
        let clusters = self
            .ai
            .cluster_topics(&crawl.pages, rankings)
            .await
            .map_err(|e| ComponentError::new(e.to_string()))?;
        Ok(ComponentOutput::TopicClusters(clusters))
    }

    async fn content_briefs(&self, job: &Job) -> Result<ComponentOutput, ComponentError> {
        let clusters = job
            .results
            .topic_clusters()
            .ok_or_else(|| ComponentError::missing_input(ComponentKey::TopicClusters))?;
        let competitors = job
            .results
            .competitors()
            .ok_or_else(|| ComponentError::missing_input(ComponentKey::Competitors))?;
        let briefs = self
            .ai
            .content_briefs(clusters, competitors, job.tier.limits().briefs)
            .await
            .map_err(|e| ComponentError::new(e.to_string()))?;
        Ok(ComponentOutput::ContentBriefs(briefs))
    }
}

#[async_trait]
impl ComponentExecutor for DefaultExecutor {
    async fn execute(&self, key: ComponentKey, job: &Job) -> Result<ComponentOutput, ComponentError> {
        match key {
            ComponentKey::Crawl => self.crawl(job).await,
            ComponentKey::TechnicalIssues
            | ComponentKey::InternalLinking
            | ComponentKey::DuplicateContent => {
                let crawl = crawl_of(job)?;
                run_local(key, crawl).ok_or_else(|| ComponentError::missing_input(key))
            }
            ComponentKey::KeywordRankings => self.keyword_rankings(job).await,
            ComponentKey::Competitors => self.competitors(job).await,
            ComponentKey::TopicClusters => self.topic_clusters(job).await,
            ComponentKey::ContentBriefs => self.content_briefs(job).await,
            ComponentKey::HealthScore => {
                let crawl = crawl_of(job)?;
                Ok(ComponentOutput::HealthScore(score(
                    &job.results,
                    crawl.page_count(),
                    TierFlags::for_tier(job.tier),
                )))
            }
        }
    }
}

fn crawl_of(job: &Job) -> Result<&CrawlReport, ComponentError> {
    job.results
        .crawl()
        .ok_or_else(|| ComponentError::missing_input(ComponentKey::Crawl))
}

fn domain_of(job: &Job) -> Result<String, ComponentError> {
    job.domain()
        .ok_or_else(|| ComponentError::new(format!("no hostname in {}", job.root_url)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::{page, report};
    use crate::config::{CrawlerConfig, UserAgentConfig};
    use crate::pipeline::{JobId, NewJob, Tier};
    use crate::providers::UnconfiguredProvider;
    use chrono::Utc;

    fn executor() -> DefaultExecutor {
        let user_agent = UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/bot".to_string(),
            contact_email: "bot@example.com".to_string(),
        };
        let crawler = Crawler::from_parts(CrawlerConfig::default(), &user_agent).unwrap();
        let provider = Arc::new(UnconfiguredProvider);
        DefaultExecutor::new(crawler, provider.clone(), provider)
    }

    fn job(root: &str, tier: Tier) -> Job {
        NewJob::new(root, tier).into_job(JobId(1), Utc::now())
    }

    #[tokio::test]
    async fn test_invalid_root_is_fatal() {
        let err = executor()
            .execute(ComponentKey::Crawl, &job("not a url", Tier::Free))
            .await
            .unwrap_err();
        assert!(err.fatal);
    }

    #[tokio::test]
    async fn test_local_component_needs_crawl() {
        let err = executor()
            .execute(ComponentKey::TechnicalIssues, &job("https://example.com/", Tier::Free))
            .await
            .unwrap_err();
        assert!(!err.fatal);
        assert_eq!(err, ComponentError::missing_input(ComponentKey::Crawl));
    }

    #[tokio::test]
    async fn test_unconfigured_provider_fails_retryably() {
        let mut job = job("https://example.com/", Tier::Pro);
        job.results
            .insert(ComponentOutput::Crawl(report(vec![page("https://example.com/")])));

        let err = executor()
            .execute(ComponentKey::KeywordRankings, &job)
            .await
            .unwrap_err();
        assert!(!err.fatal);
    }

    #[tokio::test]
    async fn test_health_score_uses_stored_results() {
        let executor = executor();
        let mut job = job("https://example.com/", Tier::Free);
        job.results
            .insert(ComponentOutput::Crawl(report(vec![page("https://example.com/")])));
        for key in ComponentKey::local() {
            let output = executor.execute(key, &job).await.unwrap();
            job.results.insert(output);
        }

        let output = executor.execute(ComponentKey::HealthScore, &job).await.unwrap();
        let ComponentOutput::HealthScore(health) = output else {
            panic!("expected a health score");
        };
        assert!(health.sub_score("technical_health").is_some_and(|s| s.computed));
        assert!(health.sub_score("ranking_coverage").is_some_and(|s| !s.computed));
    }
}
