//! Audit jobs and plan tiers

use crate::crawler::CrawlRequest;
use crate::pipeline::ResultAccumulator;
use crate::state::{JobStatus, Progress};
use crate::AuditError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Plan level; ordered from most to least restricted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    Starter,
    Pro,
    Agency,
}

/// Limits a tier places on one audit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLimits {
    pub page_budget: usize,
    pub competitors: usize,
    pub briefs: usize,
}

impl Tier {
    pub fn limits(&self) -> TierLimits {
        match self {
            Self::Free => TierLimits {
                page_budget: 25,
                competitors: 0,
                briefs: 0,
            },
            Self::Starter => TierLimits {
                page_budget: 100,
                competitors: 3,
                briefs: 3,
            },
            Self::Pro => TierLimits {
                page_budget: 500,
                competitors: 5,
                briefs: 10,
            },
            Self::Agency => TierLimits {
                page_budget: 2000,
                competitors: 10,
                briefs: 25,
            },
        }
    }

    /// Restricted tiers run only the crawl, local analyzers and the score
    pub fn is_restricted(&self) -> bool {
        *self == Self::Free
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Starter => "starter",
            Self::Pro => "pro",
            Self::Agency => "agency",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "starter" => Ok(Self::Starter),
            "pro" => Ok(Self::Pro),
            "agency" => Ok(Self::Agency),
            other => Err(format!(
                "unknown tier '{}' (expected free, starter, pro or agency)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parameters of a job that does not exist yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub root_url: String,
    pub section_filter: Option<String>,
    pub tier: Tier,
    pub config_hash: Option<String>,
}

impl NewJob {
    pub fn new(root_url: impl Into<String>, tier: Tier) -> Self {
        Self {
            root_url: root_url.into(),
            section_filter: None,
            tier,
            config_hash: None,
        }
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section_filter = Some(section.into());
        self
    }

    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    /// The job as first persisted
    pub fn into_job(self, id: JobId, now: DateTime<Utc>) -> Job {
        Job {
            id,
            root_url: self.root_url,
            section_filter: self.section_filter,
            tier: self.tier,
            status: JobStatus::Created,
            progress: Progress::new(),
            results: ResultAccumulator::new(),
            pages_found: 0,
            sitemap_url_count: 0,
            retry_count: 0,
            delay_notice_sent: false,
            support_alert_sent: false,
            next_retry_at: None,
            config_hash: self.config_hash,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One audit
///
/// Mutated only by the scheduler and the retry sweep, always through a
/// persisted [`JobPatch`](crate::storage::JobPatch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub root_url: String,
    pub section_filter: Option<String>,
    pub tier: Tier,
    pub status: JobStatus,
    pub progress: Progress,
    pub results: ResultAccumulator,
    pub pages_found: usize,
    pub sitemap_url_count: usize,
    /// Number of retries scheduled for the job
    pub retry_count: u32,
    pub delay_notice_sent: bool,
    pub support_alert_sent: bool,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub config_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    pub fn crawl_request(&self) -> CrawlRequest {
        CrawlRequest {
            root_url: self.root_url.clone(),
            page_budget: self.tier.limits().page_budget,
            section_filter: self.section_filter.clone(),
        }
    }

    /// Hostname of the audited site, used as the domain for provider calls
    pub fn domain(&self) -> Option<String> {
        url::Url::parse(&self.root_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }

    /// Checks that the job may move to `next`
    pub fn check_transition(&self, next: JobStatus) -> Result<(), AuditError> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(AuditError::InvalidTransition {
                from: self.status,
                to: next,
            })
        }
    }
}
