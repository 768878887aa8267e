//! Collaborator interfaces
//!
//! The pipeline reaches everything outside the crate through these traits:
//! keyword and competitor data, AI clustering and brief generation, the
//! notification sink, and the retry queue. Errors from providers surface as
//! component failures; notification errors are logged and dropped.

mod notify;
mod types;
mod unconfigured;

pub use notify::{Notification, NotificationKind, TracingNotifier};
pub use types::{Competitor, ContentBrief, RankingEntry, TopicCluster};
pub use unconfigured::UnconfiguredProvider;

use crate::crawler::CrawledPage;
use crate::pipeline::JobId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    Unavailable(String),

    #[error("Provider call failed: {0}")]
    Failed(String),
}

/// Keyword ranking and competitor data
#[async_trait]
pub trait RankingProvider: Send + Sync {
    /// Keywords the domain ranks for
    async fn rankings(&self, domain: &str) -> Result<Vec<RankingEntry>, ProviderError>;

    /// Up to `limit` domains competing for the given keywords
    async fn competitors(
        &self,
        domain: &str,
        rankings: &[RankingEntry],
        limit: usize,
    ) -> Result<Vec<Competitor>, ProviderError>;
}

/// AI-derived analysis
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Groups crawled pages and ranked keywords into topics
    async fn cluster_topics(
        &self,
        pages: &[CrawledPage],
        rankings: &[RankingEntry],
    ) -> Result<Vec<TopicCluster>, ProviderError>;

    /// Up to `limit` briefs filling gaps the competitors cover
    async fn content_briefs(
        &self,
        clusters: &[TopicCluster],
        competitors: &[Competitor],
        limit: usize,
    ) -> Result<Vec<ContentBrief>, ProviderError>;
}

/// Fire-and-forget notification sink
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), ProviderError>;
}

/// Wakes the retry sweep for a job at or after `at`
#[async_trait]
pub trait RetryQueue: Send + Sync {
    async fn schedule_retry(&self, job: JobId, at: DateTime<Utc>) -> Result<(), ProviderError>;
}

/// Sends a notification, logging instead of failing when the sink errors
pub async fn notify_best_effort(notifier: &dyn Notifier, notification: Notification) {
    if let Err(e) = notifier.notify(&notification).await {
        tracing::warn!(
            "Failed to send {:?} notification for job {}: {}",
            notification.kind,
            notification.job_id,
            e
        );
    }
}
