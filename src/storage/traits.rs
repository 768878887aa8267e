//! Storage traits and error types
//!
//! This module defines the persistence contract the pipeline relies on, the
//! patch type every job mutation goes through, and associated error types.

use crate::pipeline::{ComponentKey, ComponentOutput, Job, JobId, NewJob};
use crate::state::{ComponentProgress, JobStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A partial update of one job
///
/// Unset fields are left alone. Progress entries and results replace the
/// stored entry for their component. A store applies a patch atomically:
/// readers see all of it or none of it.
#[derive(Debug, Clone, PartialEq)]
pub struct JobPatch {
    /// Time the patch was made; becomes the job's `updated_at`
    pub at: DateTime<Utc>,
    pub status: Option<JobStatus>,
    pub progress: Vec<(ComponentKey, ComponentProgress)>,
    pub results: Vec<ComponentOutput>,
    pub pages_found: Option<usize>,
    pub sitemap_url_count: Option<usize>,
    pub retry_count: Option<u32>,
    pub delay_notice_sent: Option<bool>,
    pub support_alert_sent: Option<bool>,
    /// `Some(None)` clears the retry time
    pub next_retry_at: Option<Option<DateTime<Utc>>>,
}

impl JobPatch {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            at,
            status: None,
            progress: Vec::new(),
            results: Vec::new(),
            pages_found: None,
            sitemap_url_count: None,
            retry_count: None,
            delay_notice_sent: None,
            support_alert_sent: None,
            next_retry_at: None,
        }
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn progress(mut self, key: ComponentKey, progress: ComponentProgress) -> Self {
        self.progress.push((key, progress));
        self
    }

    pub fn result(mut self, output: ComponentOutput) -> Self {
        self.results.push(output);
        self
    }

    pub fn next_retry_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.next_retry_at = Some(at);
        self
    }

    pub fn retry_count(mut self, count: u32) -> Self {
        self.retry_count = Some(count);
        self
    }

    /// Returns true if applying the patch would change nothing but `updated_at`
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.progress.is_empty()
            && self.results.is_empty()
            && self.pages_found.is_none()
            && self.sitemap_url_count.is_none()
            && self.retry_count.is_none()
            && self.delay_notice_sent.is_none()
            && self.support_alert_sent.is_none()
            && self.next_retry_at.is_none()
    }

    /// Applies the patch to an in-memory job
    pub fn apply_to(&self, job: &mut Job) {
        if let Some(status) = self.status {
            job.status = status;
        }
        for (key, progress) in &self.progress {
            job.progress.insert(*key, progress.clone());
        }
        for output in &self.results {
            job.results.insert(output.clone());
        }
        if let Some(pages) = self.pages_found {
            job.pages_found = pages;
        }
        if let Some(count) = self.sitemap_url_count {
            job.sitemap_url_count = count;
        }
        if let Some(count) = self.retry_count {
            job.retry_count = count;
        }
        if let Some(sent) = self.delay_notice_sent {
            job.delay_notice_sent = sent;
        }
        if let Some(sent) = self.support_alert_sent {
            job.support_alert_sent = sent;
        }
        if let Some(at) = self.next_retry_at {
            job.next_retry_at = at;
        }
        job.updated_at = self.at;
    }
}

/// Persistence contract for audit jobs
///
/// The single source of truth for job state. Implementations must be safe to
/// share between the initial run and concurrent sweeps.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persists a new job in the `Created` state
    async fn create_job(&self, job: NewJob, now: DateTime<Utc>) -> StorageResult<Job>;

    /// Loads a job with its progress and results
    async fn load_job(&self, id: JobId) -> StorageResult<Option<Job>>;

    /// Applies a patch atomically
    async fn save_job(&self, id: JobId, patch: &JobPatch) -> StorageResult<()>;

    /// Non-terminal jobs whose retry time is at or before `now`
    async fn due_jobs(&self, now: DateTime<Utc>) -> StorageResult<Vec<JobId>>;
}
