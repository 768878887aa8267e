//! Audit pipeline
//!
//! Owns a job from submission to its first conclusion: move it out of
//! `Created`, let the scheduler advance it, then either complete it, fail it
//! or hand it to the retry sweep.

use crate::config::PipelineConfig;
use crate::pipeline::{AdvanceReport, ComponentExecutor, Job, JobId, NewJob, Scheduler};
use crate::providers::{notify_best_effort, Notification, NotificationKind, Notifier, RetryQueue};
use crate::state::{ComponentStatus, JobStatus};
use crate::storage::{JobPatch, JobStore};
use crate::AuditError;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// How a run or sweep left a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every component completed
    Completed { score: Option<u8> },
    /// The job failed permanently
    Failed { reason: String },
    /// Work remains; the job will be retried at `at`
    Rescheduled { at: DateTime<Utc> },
    /// The job was not in a state this call acts on
    Skipped,
}

pub struct AuditPipeline {
    scheduler: Scheduler,
    store: Arc<dyn JobStore>,
    notifier: Arc<dyn Notifier>,
    retry_queue: Arc<dyn RetryQueue>,
    retry_interval: Duration,
}

impl AuditPipeline {
    pub fn new(
        store: Arc<dyn JobStore>,
        executor: Arc<dyn ComponentExecutor>,
        notifier: Arc<dyn Notifier>,
        retry_queue: Arc<dyn RetryQueue>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            scheduler: Scheduler::new(store.clone(), executor, config),
            store,
            notifier,
            retry_queue,
            retry_interval: config.retry_interval(),
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Persists a new job in the `Created` state
    pub async fn submit(&self, job: NewJob) -> Result<Job, AuditError> {
        let job = self.store.create_job(job, Utc::now()).await?;
        tracing::info!("Job {}: created for {} ({})", job.id, job.root_url, job.tier);
        Ok(job)
    }

    /// Runs a freshly created job using the current time
    pub async fn run(&self, id: JobId) -> Result<RunOutcome, AuditError> {
        self.run_at(id, Utc::now()).await
    }

    /// Runs a freshly created job as if the call started at `now`
    ///
    /// Jobs that already left `Created` are skipped; the sweep owns them.
    pub async fn run_at(&self, id: JobId, now: DateTime<Utc>) -> Result<RunOutcome, AuditError> {
        let mut job = self.load(id).await?;
        if job.status != JobStatus::Created {
            tracing::debug!("Job {}: already {}, not starting", id, job.status);
            return Ok(RunOutcome::Skipped);
        }

        job.check_transition(JobStatus::Crawling)?;
        // The retry time doubles as a lease: a sweep only picks the job up
        // if this run dies before concluding.
        let patch = JobPatch::new(now)
            .status(JobStatus::Crawling)
            .next_retry_at(Some(now + self.retry_interval));
        self.persist(&mut job, patch).await?;
        tracing::info!("Job {}: crawling {}", id, job.root_url);

        let report = self.scheduler.advance_at(&mut job, now).await?;
        self.conclude(&mut job, &report, now).await
    }

    pub(crate) async fn load(&self, id: JobId) -> Result<Job, AuditError> {
        self.store
            .load_job(id)
            .await?
            .ok_or(AuditError::JobNotFound(id))
    }

    pub(crate) async fn persist(&self, job: &mut Job, patch: JobPatch) -> Result<(), AuditError> {
        self.store.save_job(job.id, &patch).await?;
        patch.apply_to(job);
        Ok(())
    }

    pub(crate) async fn notify(&self, kind: NotificationKind, job: &Job, message: String) {
        notify_best_effort(
            self.notifier.as_ref(),
            Notification::new(kind, job.id, message),
        )
        .await;
    }

    /// Moves a job to `Failed` and tells the requester
    pub(crate) async fn fail(
        &self,
        job: &mut Job,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<RunOutcome, AuditError> {
        job.check_transition(JobStatus::Failed)?;
        let now = now.max(job.updated_at);
        let patch = JobPatch::new(now)
            .status(JobStatus::Failed)
            .next_retry_at(None);
        self.persist(job, patch).await?;

        tracing::error!("Job {}: failed: {}", job.id, reason);
        self.notify(
            NotificationKind::JobFailed,
            job,
            format!("Audit of {} failed: {}", job.root_url, reason),
        )
        .await;
        Ok(RunOutcome::Failed { reason })
    }

    /// Settles a job after the scheduler advanced it
    pub(crate) async fn conclude(
        &self,
        job: &mut Job,
        report: &AdvanceReport,
        now: DateTime<Utc>,
    ) -> Result<RunOutcome, AuditError> {
        if let Some(reason) = &report.fatal {
            return self.fail(job, reason.clone(), now).await;
        }

        let now = now.max(job.updated_at);

        // A crawl that has not completed yet still leaves the job analyzable
        if job.status == JobStatus::Crawling {
            job.check_transition(JobStatus::Analyzing)?;
            self.persist(job, JobPatch::new(now).status(JobStatus::Analyzing))
                .await?;
        }

        if report.all_done {
            job.check_transition(JobStatus::Completed)?;
            let patch = JobPatch::new(now)
                .status(JobStatus::Completed)
                .next_retry_at(None);
            self.persist(job, patch).await?;

            let health = job.results.health_score().cloned();
            let message = match &health {
                Some(health) => format!(
                    "Audit of {} completed with score {} ({})",
                    job.root_url, health.score, health.grade
                ),
                None => format!("Audit of {} completed", job.root_url),
            };
            tracing::info!("Job {}: completed", job.id);
            self.notify(NotificationKind::JobCompleted, job, message).await;
            return Ok(RunOutcome::Completed {
                score: health.map(|h| h.score),
            });
        }

        let at = now + self.retry_interval;
        let mut patch = JobPatch::new(now)
            .status(JobStatus::Retrying)
            .retry_count(job.retry_count + 1)
            .next_retry_at(Some(at));
        for key in job.progress.with_status(ComponentStatus::Failed) {
            if let Some(progress) = job.progress.get(key) {
                let mut progress = progress.clone();
                progress.mark_retrying(now);
                patch = patch.progress(key, progress);
            }
        }
        job.check_transition(JobStatus::Retrying)?;
        self.persist(job, patch).await?;

        tracing::info!(
            "Job {}: incomplete after attempt {}, retrying at {}",
            job.id,
            job.retry_count,
            at
        );
        if let Err(e) = self.retry_queue.schedule_retry(job.id, at).await {
            tracing::warn!("Job {}: failed to schedule retry: {}", job.id, e);
        }
        Ok(RunOutcome::Rescheduled { at })
    }
}
