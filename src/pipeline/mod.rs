//! Audit pipeline module
//!
//! This module turns a submitted audit into a finished one:
//! - Component identities, outputs and the dependency graph between them
//! - Jobs, tiers and the per-job result accumulator
//! - The scheduler that runs ready components and commits their outcomes
//! - The initial run and the retry sweep that finishes what it left behind

mod accumulator;
mod component;
mod executor;
mod graph;
mod job;
mod run;
mod scheduler;
mod sweep;

pub use accumulator::ResultAccumulator;
pub use component::{ComponentError, ComponentKey, ComponentKind, ComponentOutput};
pub use executor::{run_local, ComponentExecutor, DefaultExecutor};
pub use graph::DependencyGraph;
pub use job::{Job, JobId, NewJob, Tier, TierLimits};
pub use run::{AuditPipeline, RunOutcome};
pub use scheduler::{seed_patch, AdvanceReport, Scheduler};
pub use sweep::RetrySweep;
