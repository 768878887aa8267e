//! State module for tracking audit progress
//!
//! This module provides the state machines for jobs and for the individual
//! components that make up a job.
//!
//! # Components
//!
//! - `JobStatus`: Overall job lifecycle (created, crawling, analyzing, retrying, completed, failed)
//! - `ComponentStatus`: Per-component status (pending, running, completed, failed, retrying)
//! - `Progress`: Per-component status, retry count and last error for one job

mod component_state;
mod job_state;

// Re-export main types
pub use component_state::{ComponentProgress, ComponentStatus, Progress, STALE_ERROR};
pub use job_state::JobStatus;
