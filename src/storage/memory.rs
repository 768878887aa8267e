//! In-memory job store
//!
//! Keeps every job in a map behind a mutex. Used by tests and by embedders
//! that persist elsewhere. Also records retry requests so callers can see
//! what the sweep asked for.

use crate::pipeline::{Job, JobId, NewJob};
use crate::providers::{ProviderError, RetryQueue};
use crate::storage::traits::{JobPatch, JobStore, StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    jobs: BTreeMap<JobId, Job>,
    next_id: i64,
    scheduled: Vec<(JobId, DateTime<Utc>)>,
    saves: usize,
}

#[derive(Debug, Default)]
pub struct MemoryJobStore {
    state: Mutex<MemoryState>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StorageError::Database("memory store lock poisoned".to_string()))
    }

    /// Stores a job as-is, replacing any job with the same id
    pub fn insert(&self, job: Job) -> StorageResult<()> {
        let mut state = self.lock()?;
        state.next_id = state.next_id.max(job.id.0);
        state.jobs.insert(job.id, job);
        Ok(())
    }

    /// Current persisted copy of a job
    pub fn snapshot(&self, id: JobId) -> Option<Job> {
        self.lock().ok().and_then(|state| state.jobs.get(&id).cloned())
    }

    /// Every retry the store was asked to schedule, oldest first
    pub fn scheduled_retries(&self) -> Vec<(JobId, DateTime<Utc>)> {
        self.lock()
            .map(|state| state.scheduled.clone())
            .unwrap_or_default()
    }

    /// Number of patches applied so far
    pub fn save_count(&self) -> usize {
        self.lock().map(|state| state.saves).unwrap_or_default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_job(&self, job: NewJob, now: DateTime<Utc>) -> StorageResult<Job> {
        let mut state = self.lock()?;
        state.next_id += 1;
        let job = job.into_job(JobId(state.next_id), now);
        state.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn load_job(&self, id: JobId) -> StorageResult<Option<Job>> {
        Ok(self.lock()?.jobs.get(&id).cloned())
    }

    async fn save_job(&self, id: JobId, patch: &JobPatch) -> StorageResult<()> {
        let mut state = self.lock()?;
        let job = state
            .jobs
            .get_mut(&id)
            .ok_or(StorageError::JobNotFound(id))?;
        patch.apply_to(job);
        state.saves += 1;
        Ok(())
    }

    async fn due_jobs(&self, now: DateTime<Utc>) -> StorageResult<Vec<JobId>> {
        Ok(self
            .lock()?
            .jobs
            .values()
            .filter(|job| job.status.is_retryable())
            .filter(|job| job.next_retry_at.is_some_and(|at| at <= now))
            .map(|job| job.id)
            .collect())
    }
}

#[async_trait]
impl RetryQueue for MemoryJobStore {
    async fn schedule_retry(&self, job: JobId, at: DateTime<Utc>) -> Result<(), ProviderError> {
        let mut state = self
            .lock()
            .map_err(|e| ProviderError::Failed(e.to_string()))?;
        state.scheduled.push((job, at));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Tier;
    use crate::state::JobStatus;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_ids() {
        let store = MemoryJobStore::new();
        let a = store
            .create_job(NewJob::new("https://a.example/", Tier::Free), t(0))
            .await
            .unwrap();
        let b = store
            .create_job(NewJob::new("https://b.example/", Tier::Pro), t(0))
            .await
            .unwrap();
        assert!(a.id < b.id);
        assert_eq!(store.load_job(b.id).await.unwrap().unwrap().tier, Tier::Pro);
    }

    #[tokio::test]
    async fn test_save_unknown_job_fails() {
        let store = MemoryJobStore::new();
        let result = store.save_job(JobId(42), &JobPatch::new(t(0))).await;
        assert!(matches!(result, Err(StorageError::JobNotFound(JobId(42)))));
    }

    #[tokio::test]
    async fn test_due_jobs() {
        let store = MemoryJobStore::new();
        let job = store
            .create_job(NewJob::new("https://a.example/", Tier::Free), t(0))
            .await
            .unwrap();
        assert!(store.due_jobs(t(100)).await.unwrap().is_empty());

        let patch = JobPatch::new(t(1))
            .status(JobStatus::Retrying)
            .next_retry_at(Some(t(0) + Duration::seconds(60)));
        store.save_job(job.id, &patch).await.unwrap();

        assert!(store.due_jobs(t(59)).await.unwrap().is_empty());
        assert_eq!(store.due_jobs(t(60)).await.unwrap(), vec![job.id]);

        let done = JobPatch::new(t(2)).status(JobStatus::Failed);
        store.save_job(job.id, &done).await.unwrap();
        assert!(store.due_jobs(t(60)).await.unwrap().is_empty());
    }
}
