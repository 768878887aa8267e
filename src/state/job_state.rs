/// Job status definitions for tracking an audit through its lifecycle
///
/// This module defines every state an audit job can be in, and which moves
/// between them are legal.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the overall state of an audit job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    // ===== Active States =====
    /// Job exists but nothing has run yet
    Created,

    /// The crawl component is running
    Crawling,

    /// Analysis components are being scheduled
    Analyzing,

    /// Some components failed; a sweep will advance the job again later
    Retrying,

    // ===== Terminal States =====
    /// Every component completed
    Completed,

    /// The crawl found nothing or the hard timeout passed
    Failed,
}

impl JobStatus {
    /// Returns true if this is a terminal state (no sweep will touch the job again)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if a retry sweep may advance a job in this state
    ///
    /// Everything that is not terminal qualifies: a job left in `Crawling` or
    /// `Analyzing` was interrupted mid-run and is recovered by the sweep.
    pub fn is_retryable(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if the job may move from this state to `next`
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Created, Crawling)
                | (Created, Failed)
                | (Crawling, Analyzing)
                | (Crawling, Failed)
                | (Analyzing, Analyzing)
                | (Analyzing, Completed)
                | (Analyzing, Failed)
                | (Analyzing, Retrying)
                | (Retrying, Analyzing)
                | (Retrying, Failed)
        )
    }

    /// Converts the job status to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Crawling => "crawling",
            Self::Analyzing => "analyzing",
            Self::Retrying => "retrying",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a job status from a database string representation
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "crawling" => Some(Self::Crawling),
            "analyzing" => Some(Self::Analyzing),
            "retrying" => Some(Self::Retrying),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible job states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Created,
            Self::Crawling,
            Self::Analyzing,
            Self::Retrying,
            Self::Completed,
            Self::Failed,
        ]
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());

        assert!(!JobStatus::Created.is_terminal());
        assert!(!JobStatus::Crawling.is_terminal());
        assert!(!JobStatus::Analyzing.is_terminal());
        assert!(!JobStatus::Retrying.is_terminal());
    }

    #[test]
    fn test_lifecycle_transitions() {
        assert!(JobStatus::Created.can_transition_to(JobStatus::Crawling));
        assert!(JobStatus::Crawling.can_transition_to(JobStatus::Analyzing));
        assert!(JobStatus::Analyzing.can_transition_to(JobStatus::Retrying));
        assert!(JobStatus::Retrying.can_transition_to(JobStatus::Analyzing));
        assert!(JobStatus::Retrying.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Analyzing.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for next in JobStatus::all_states() {
            assert!(!JobStatus::Completed.can_transition_to(next));
            assert!(!JobStatus::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!JobStatus::Created.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Retrying.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Crawling.can_transition_to(JobStatus::Retrying));
    }

    #[test]
    fn test_db_string_round_trip() {
        for status in JobStatus::all_states() {
            assert_eq!(JobStatus::from_db_string(status.to_db_string()), Some(status));
        }
        assert_eq!(JobStatus::from_db_string("bogus"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", JobStatus::Retrying), "retrying");
    }
}
