//! Per-component progress tracking
//!
//! Each analysis component of a job carries its own status, retry counter and
//! last error. `Completed` is terminal for a component within its job;
//! `Failed` and `Retrying` may be re-entered.

use crate::pipeline::ComponentKey;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Error recorded when a running component is presumed crashed
pub const STALE_ERROR: &str = "stale: component was still running past the stale threshold";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Retrying,
}

impl ComponentStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true if the scheduler may start the component from this state
    pub fn is_runnable(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed | Self::Retrying)
    }

    pub fn can_transition_to(&self, next: ComponentStatus) -> bool {
        use ComponentStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Failed, Running)
                | (Failed, Retrying)
                | (Retrying, Running)
        )
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Retrying => "retrying",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "retrying" => Some(Self::Retrying),
            _ => None,
        }
    }
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Progress of one component within one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentProgress {
    pub status: ComponentStatus,
    /// Number of times the component was started again after a failure
    pub retry_count: u32,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Time of the last status change
    pub updated_at: DateTime<Utc>,
}

impl ComponentProgress {
    pub fn pending(now: DateTime<Utc>) -> Self {
        Self {
            status: ComponentStatus::Pending,
            retry_count: 0,
            last_retry_at: None,
            last_error: None,
            updated_at: now,
        }
    }

    /// A component whose work is known to be done without running it
    pub fn seeded(now: DateTime<Utc>) -> Self {
        Self {
            status: ComponentStatus::Completed,
            ..Self::pending(now)
        }
    }

    /// Marks the component as started; a restart after failure counts as a retry
    pub fn mark_running(&mut self, now: DateTime<Utc>) {
        self.check_transition(ComponentStatus::Running);
        if matches!(
            self.status,
            ComponentStatus::Failed | ComponentStatus::Retrying
        ) {
            self.retry_count += 1;
            self.last_retry_at = Some(now);
        }
        self.status = ComponentStatus::Running;
        self.updated_at = now;
    }

    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.check_transition(ComponentStatus::Completed);
        self.status = ComponentStatus::Completed;
        self.last_error = None;
        self.updated_at = now;
    }

    pub fn mark_failed(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.check_transition(ComponentStatus::Failed);
        self.status = ComponentStatus::Failed;
        self.last_error = Some(error.into());
        self.updated_at = now;
    }

    /// Marks a failed component as waiting for the next sweep
    pub fn mark_retrying(&mut self, now: DateTime<Utc>) {
        if self.status.can_transition_to(ComponentStatus::Retrying) {
            self.status = ComponentStatus::Retrying;
            self.updated_at = now;
        }
    }

    fn check_transition(&self, next: ComponentStatus) {
        debug_assert!(
            self.status.can_transition_to(next),
            "component cannot move from {} to {}",
            self.status,
            next
        );
    }

    /// Returns true if the component has been `Running` for longer than `threshold`
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.status == ComponentStatus::Running && now - self.updated_at > threshold
    }
}

/// Progress of every component in a job, keyed by component
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress(BTreeMap<ComponentKey, ComponentProgress>);

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: ComponentKey) -> Option<&ComponentProgress> {
        self.0.get(&key)
    }

    /// Status of `key`; components without an entry are `Pending`
    pub fn status_of(&self, key: ComponentKey) -> ComponentStatus {
        self.0
            .get(&key)
            .map(|p| p.status)
            .unwrap_or(ComponentStatus::Pending)
    }

    /// Entry for `key`, created as `Pending` when absent
    pub fn entry(&mut self, key: ComponentKey, now: DateTime<Utc>) -> &mut ComponentProgress {
        self.0
            .entry(key)
            .or_insert_with(|| ComponentProgress::pending(now))
    }

    pub fn insert(&mut self, key: ComponentKey, progress: ComponentProgress) {
        self.0.insert(key, progress);
    }

    pub fn iter(&self) -> impl Iterator<Item = (ComponentKey, &ComponentProgress)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    /// Components currently in `status`
    pub fn with_status(&self, status: ComponentStatus) -> Vec<ComponentKey> {
        self.iter()
            .filter(|(_, p)| p.status == status)
            .map(|(k, _)| k)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_component_transitions() {
        use ComponentStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(Failed.can_transition_to(Running));
        assert!(Retrying.can_transition_to(Running));

        assert!(!Pending.can_transition_to(Completed));
        for next in [Pending, Running, Completed, Failed, Retrying] {
            assert!(!Completed.can_transition_to(next));
        }
    }

    #[test]
    fn test_runnable_states() {
        assert!(ComponentStatus::Pending.is_runnable());
        assert!(ComponentStatus::Failed.is_runnable());
        assert!(ComponentStatus::Retrying.is_runnable());
        assert!(!ComponentStatus::Running.is_runnable());
        assert!(!ComponentStatus::Completed.is_runnable());
    }

    #[test]
    fn test_retry_counting() {
        let mut progress = ComponentProgress::pending(t(0));
        progress.mark_running(t(1));
        assert_eq!(progress.retry_count, 0);

        progress.mark_failed("boom", t(2));
        assert_eq!(progress.last_error.as_deref(), Some("boom"));

        progress.mark_retrying(t(3));
        assert_eq!(progress.status, ComponentStatus::Retrying);

        progress.mark_running(t(4));
        assert_eq!(progress.retry_count, 1);
        assert_eq!(progress.last_retry_at, Some(t(4)));

        progress.mark_completed(t(5));
        assert_eq!(progress.status, ComponentStatus::Completed);
        assert_eq!(progress.last_error, None);
    }

    #[test]
    fn test_retrying_only_from_failed() {
        let mut progress = ComponentProgress::pending(t(0));
        progress.mark_retrying(t(1));
        assert_eq!(progress.status, ComponentStatus::Pending);

        progress.mark_running(t(2));
        progress.mark_completed(t(3));
        progress.mark_retrying(t(4));
        assert_eq!(progress.status, ComponentStatus::Completed);
        assert_eq!(progress.updated_at, t(3));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "component cannot move from completed to running")]
    fn test_completed_component_cannot_restart() {
        let mut progress = ComponentProgress::seeded(t(0));
        progress.mark_running(t(1));
    }

    #[test]
    fn test_staleness() {
        let mut progress = ComponentProgress::pending(t(0));
        assert!(!progress.is_stale(t(10_000), Duration::seconds(600)));

        progress.mark_running(t(0));
        assert!(!progress.is_stale(t(600), Duration::seconds(600)));
        assert!(progress.is_stale(t(601), Duration::seconds(600)));
    }

    #[test]
    fn test_progress_defaults_to_pending() {
        let mut progress = Progress::new();
        assert_eq!(progress.status_of(ComponentKey::Crawl), ComponentStatus::Pending);

        progress.entry(ComponentKey::Crawl, t(0)).mark_running(t(0));
        assert_eq!(progress.status_of(ComponentKey::Crawl), ComponentStatus::Running);
        assert_eq!(progress.with_status(ComponentStatus::Running), vec![ComponentKey::Crawl]);
    }

    #[test]
    fn test_db_string_round_trip() {
        use ComponentStatus::*;
        for status in [Pending, Running, Completed, Failed, Retrying] {
            assert_eq!(ComponentStatus::from_db_string(status.to_db_string()), Some(status));
        }
    }
}
