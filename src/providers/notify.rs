//! Notification events and the tracing-backed sink

use crate::pipeline::JobId;
use crate::providers::{Notifier, ProviderError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// The job is taking longer than expected; sent at most once per job
    DelayNotice,
    /// The job needs manual attention; sent at most once per job
    SupportAlert,
    /// The job reached its terminal failed state
    JobFailed,
    /// Every component of the job completed
    JobCompleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub job_id: JobId,
    pub message: String,
}

impl Notification {
    pub fn new(kind: NotificationKind, job_id: JobId, message: impl Into<String>) -> Self {
        Self {
            kind,
            job_id,
            message: message.into(),
        }
    }
}

/// Writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), ProviderError> {
        match notification.kind {
            NotificationKind::JobCompleted => tracing::info!(
                "Job {} completed: {}",
                notification.job_id,
                notification.message
            ),
            NotificationKind::DelayNotice => tracing::info!(
                "Job {} delayed: {}",
                notification.job_id,
                notification.message
            ),
            NotificationKind::SupportAlert => tracing::warn!(
                "Job {} needs attention: {}",
                notification.job_id,
                notification.message
            ),
            NotificationKind::JobFailed => tracing::error!(
                "Job {} failed: {}",
                notification.job_id,
                notification.message
            ),
        }
        Ok(())
    }
}
