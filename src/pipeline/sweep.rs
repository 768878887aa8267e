//! Retry sweep
//!
//! Periodically re-enters unfinished jobs. Before scheduling anything the
//! sweep escalates in a fixed order: a delay notice once the job is old, a
//! support alert once it has been retried too often, and a permanent failure
//! once it hits the hard timeout. Each notice is sent at most once per job.

use crate::config::EscalationConfig;
use crate::pipeline::{seed_patch, AuditPipeline, Job, JobId, RunOutcome};
use crate::providers::NotificationKind;
use crate::state::JobStatus;
use crate::storage::JobPatch;
use crate::AuditError;
use chrono::{DateTime, Duration, Utc};

pub struct RetrySweep {
    pipeline: AuditPipeline,
    escalation: EscalationConfig,
}

impl RetrySweep {
    pub fn new(pipeline: AuditPipeline, escalation: EscalationConfig) -> Self {
        Self {
            pipeline,
            escalation,
        }
    }

    pub fn pipeline(&self) -> &AuditPipeline {
        &self.pipeline
    }

    /// Sweeps one job using the current time
    pub async fn tick(&self, id: JobId) -> Result<RunOutcome, AuditError> {
        self.tick_at(id, Utc::now()).await
    }

    /// Sweeps one job as if the call started at `now`
    pub async fn tick_at(&self, id: JobId, now: DateTime<Utc>) -> Result<RunOutcome, AuditError> {
        let mut job = self.pipeline.load(id).await?;
        if job.status.is_terminal() {
            tracing::debug!("Job {}: already {}, nothing to sweep", id, job.status);
            return Ok(RunOutcome::Skipped);
        }

        let age = job.age(now);
        self.escalate(&mut job, age, now).await?;

        if age >= self.escalation.hard_timeout() {
            let reason = format!(
                "still incomplete after {} hours",
                self.escalation.hard_timeout().num_hours()
            );
            return self.pipeline.fail(&mut job, reason, now).await;
        }

        if let Some(patch) = seed_patch(&job, now) {
            tracing::info!("Job {}: restoring progress from stored crawl", id);
            self.pipeline.persist(&mut job, patch).await?;
        }

        self.enter_analysis(&mut job, now).await?;
        let report = self.pipeline.scheduler().advance_at(&mut job, now).await?;
        self.pipeline.conclude(&mut job, &report, now).await
    }

    /// Sweeps every job whose retry time has passed
    ///
    /// A job that errors is logged and skipped so one bad record cannot
    /// stall the rest.
    pub async fn run_due(&self, now: DateTime<Utc>) -> Result<Vec<(JobId, RunOutcome)>, AuditError> {
        let due = self.pipeline.store().due_jobs(now).await?;
        tracing::info!("{} job(s) due for retry", due.len());

        let mut outcomes = Vec::with_capacity(due.len());
        for id in due {
            match self.tick_at(id, now).await {
                Ok(outcome) => outcomes.push((id, outcome)),
                Err(e) => tracing::error!("Job {}: sweep failed: {}", id, e),
            }
        }
        Ok(outcomes)
    }

    async fn escalate(&self, job: &mut Job, age: Duration, now: DateTime<Utc>) -> Result<(), AuditError> {
        // Flags are persisted before sending so a crash never repeats a notice
        if !job.delay_notice_sent && age >= self.escalation.delay_notice() {
            let mut patch = JobPatch::new(now);
            patch.delay_notice_sent = Some(true);
            self.pipeline.persist(job, patch).await?;

            tracing::info!("Job {}: sending delay notice", job.id);
            let message = format!(
                "Audit of {} is taking longer than expected",
                job.root_url
            );
            self.pipeline
                .notify(NotificationKind::DelayNotice, job, message)
                .await;
        }

        if !job.support_alert_sent && job.retry_count >= self.escalation.support_alert_retries {
            let mut patch = JobPatch::new(now);
            patch.support_alert_sent = Some(true);
            self.pipeline.persist(job, patch).await?;

            tracing::warn!("Job {}: alerting support after {} retries", job.id, job.retry_count);
            let message = format!(
                "Audit of {} has been retried {} times",
                job.root_url, job.retry_count
            );
            self.pipeline
                .notify(NotificationKind::SupportAlert, job, message)
                .await;
        }

        Ok(())
    }

    /// Moves the job into analysis and renews its lease
    async fn enter_analysis(&self, job: &mut Job, now: DateTime<Utc>) -> Result<(), AuditError> {
        let mut patch =
            JobPatch::new(now).next_retry_at(Some(now + self.pipeline.retry_interval()));
        let next = match job.status {
            JobStatus::Created => Some(JobStatus::Crawling),
            JobStatus::Retrying => Some(JobStatus::Analyzing),
            _ => None,
        };
        if let Some(next) = next {
            job.check_transition(next)?;
            patch = patch.status(next);
        }
        self.pipeline.persist(job, patch).await
    }
}
