//! Component scheduler
//!
//! Advances one job as far as its dependency graph allows. Each call:
//! - Fails components left `running` past the stale threshold
//! - Runs every ready component of a pass concurrently
//! - Commits each outcome as soon as it arrives, one commit at a time
//! - Repeats until no component it has not already tried becomes ready
//!
//! Components that fail are not started again within the same call; the
//! retry sweep picks them up later.

use crate::config::PipelineConfig;
use crate::pipeline::{
    run_local, ComponentError, ComponentExecutor, ComponentKey, ComponentOutput, DependencyGraph,
    Job,
};
use crate::state::{ComponentProgress, JobStatus, STALE_ERROR};
use crate::storage::{JobPatch, JobStore};
use crate::AuditError;
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// What one call to [`Scheduler::advance`] did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvanceReport {
    /// Components started, in start order
    pub ran: Vec<ComponentKey>,
    /// Components that failed during this call
    pub failed: Vec<ComponentKey>,
    /// Components found stuck in `running` and failed before scheduling
    pub recovered_stale: Vec<ComponentKey>,
    /// Every component of the job's graph is completed
    pub all_done: bool,
    /// Message of a failure the job cannot recover from
    pub fatal: Option<String>,
}

/// Job state shared by the components of one pass
struct PassState<'a> {
    job: &'a mut Job,
    failed: Vec<ComponentKey>,
    fatal: Option<String>,
}

pub struct Scheduler {
    store: Arc<dyn JobStore>,
    executor: Arc<dyn ComponentExecutor>,
    stale_threshold: Duration,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn JobStore>,
        executor: Arc<dyn ComponentExecutor>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            store,
            executor,
            stale_threshold: config.stale_threshold(),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Advances a job using the current time
    pub async fn advance(&self, job: &mut Job) -> Result<AdvanceReport, AuditError> {
        self.advance_at(job, Utc::now()).await
    }

    /// Advances a job as if the call started at `now`
    ///
    /// `job` must be the latest persisted copy; it is kept in step with every
    /// commit so it matches the store when the call returns.
    pub async fn advance_at(
        &self,
        job: &mut Job,
        now: DateTime<Utc>,
    ) -> Result<AdvanceReport, AuditError> {
        let graph = DependencyGraph::for_tier(job.tier);
        let started = Instant::now();

        let mut report = AdvanceReport {
            recovered_stale: self.fail_stale(job, &graph, now).await?,
            ..AdvanceReport::default()
        };

        let mut attempted = BTreeSet::new();
        loop {
            let ready: Vec<ComponentKey> = graph
                .ready(|key| job.progress.status_of(key))
                .into_iter()
                .filter(|key| !attempted.contains(key))
                .collect();
            if ready.is_empty() {
                break;
            }
            attempted.extend(ready.iter().copied());

            let (failed, fatal) = self.run_pass(job, &ready, now, started).await?;
            report.ran.extend(ready);
            report.failed.extend(failed);

            if fatal.is_some() {
                report.fatal = fatal;
                break;
            }
        }

        report.all_done = graph.all_completed(|key| job.progress.status_of(key));
        tracing::debug!(
            "Job {}: ran {} component(s), {} failed, all done: {}",
            job.id,
            report.ran.len(),
            report.failed.len(),
            report.all_done
        );
        Ok(report)
    }

    async fn fail_stale(
        &self,
        job: &mut Job,
        graph: &DependencyGraph<ComponentKey>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ComponentKey>, AuditError> {
        let mut patch = JobPatch::new(now);
        let mut stale = Vec::new();

        for &key in graph.nodes() {
            let Some(progress) = job.progress.get(key) else {
                continue;
            };
            if !progress.is_stale(now, self.stale_threshold) {
                continue;
            }
            tracing::warn!(
                "Job {}: {} has been running since {}, marking failed",
                job.id,
                key,
                progress.updated_at
            );
            let mut progress = progress.clone();
            progress.mark_failed(STALE_ERROR, now);
            patch = patch.progress(key, progress);
            stale.push(key);
        }

        if !stale.is_empty() {
            self.persist(job, patch).await?;
        }
        Ok(stale)
    }

    async fn run_pass(
        &self,
        job: &mut Job,
        ready: &[ComponentKey],
        now: DateTime<Utc>,
        started: Instant,
    ) -> Result<(Vec<ComponentKey>, Option<String>), AuditError> {
        // Persist the running marks before any work starts
        let marked_at = commit_time(now, started);
        let mut patch = JobPatch::new(marked_at);
        for &key in ready {
            let mut progress = job
                .progress
                .get(key)
                .cloned()
                .unwrap_or_else(|| ComponentProgress::pending(marked_at));
            progress.mark_running(marked_at);
            patch = patch.progress(key, progress);
            tracing::info!("Job {}: starting {}", job.id, key);
        }
        self.persist(job, patch).await?;

        let snapshot = job.clone();
        let shared = Mutex::new(PassState {
            job,
            failed: Vec::new(),
            fatal: None,
        });

        let runs = ready.iter().map(|&key| {
            let snapshot = &snapshot;
            let shared = &shared;
            async move {
                let result = self.executor.execute(key, snapshot).await;
                let mut state = shared.lock().await;
                self.commit(&mut state, key, result, commit_time(now, started))
                    .await
            }
        });
        let commits = join_all(runs).await;

        let state = shared.into_inner();
        commits.into_iter().collect::<Result<Vec<()>, AuditError>>()?;
        Ok((state.failed, state.fatal))
    }

    async fn commit(
        &self,
        state: &mut PassState<'_>,
        key: ComponentKey,
        result: Result<ComponentOutput, ComponentError>,
        at: DateTime<Utc>,
    ) -> Result<(), AuditError> {
        let job_id = state.job.id;
        let mut progress = state
            .job
            .progress
            .get(key)
            .cloned()
            .unwrap_or_else(|| ComponentProgress::pending(at));
        let mut patch = JobPatch::new(at);

        match result {
            Ok(output) => {
                if let ComponentOutput::Crawl(report) = &output {
                    patch.pages_found = Some(report.page_count());
                    patch.sitemap_url_count = Some(report.site.sitemap_url_count);
                    if state.job.status == JobStatus::Crawling {
                        patch = patch.status(JobStatus::Analyzing);
                    }
                }
                tracing::info!("Job {}: {} completed", job_id, key);
                progress.mark_completed(at);
                patch = patch.result(output);
            }
            Err(error) => {
                if error.fatal {
                    tracing::error!("Job {}: {} failed fatally: {}", job_id, key, error);
                    state.fatal = Some(error.message.clone());
                } else {
                    tracing::warn!("Job {}: {} failed: {}", job_id, key, error);
                }
                progress.mark_failed(error.message, at);
                state.failed.push(key);
            }
        }

        patch = patch.progress(key, progress);
        self.persist(state.job, patch).await
    }

    async fn persist(&self, job: &mut Job, patch: JobPatch) -> Result<(), AuditError> {
        self.store.save_job(job.id, &patch).await?;
        patch.apply_to(job);
        Ok(())
    }
}

/// Progress for a job whose crawl output exists but whose progress was lost
///
/// Marks the crawl and every local analyzer completed, computing any local
/// output that is missing from the crawl already stored. Returns `None` when
/// the job has progress or has no crawl output to seed from.
pub fn seed_patch(job: &Job, now: DateTime<Utc>) -> Option<JobPatch> {
    if !job.progress.is_empty() {
        return None;
    }
    let crawl = job.results.crawl()?;
    let graph = DependencyGraph::for_tier(job.tier);

    let mut patch = JobPatch::new(now).progress(ComponentKey::Crawl, ComponentProgress::seeded(now));
    patch.pages_found = Some(crawl.page_count());
    patch.sitemap_url_count = Some(crawl.site.sitemap_url_count);

    for key in ComponentKey::local().filter(|key| graph.contains(*key)) {
        if !job.results.contains(key) {
            if let Some(output) = run_local(key, crawl) {
                patch = patch.result(output);
            }
        }
        patch = patch.progress(key, ComponentProgress::seeded(now));
    }
    Some(patch)
}

fn commit_time(now: DateTime<Utc>, started: Instant) -> DateTime<Utc> {
    now + Duration::from_std(started.elapsed()).unwrap_or_else(|_| Duration::zero())
}
