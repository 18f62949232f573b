// src/engine/mod.rs

//! Sweep orchestration.
//!
//! - [`scheduler`] drives the angle sets of one location through a sweep
//!   under the FIFO or depth-of-graph policy.
//! - [`retry`] bounds every polling loop so a stalled peer becomes an error
//!   instead of a hang.
//! - [`timing`] records repeatable sweep and chunk timers.
//! - [`solver`] wraps repeated sweeps in a source iteration.
//! - [`runtime`] is the IO shell that runs every location of a problem.

pub mod retry;
pub mod runtime;
pub mod scheduler;
pub mod solver;
pub mod timing;

pub use retry::{BoundedRetry, PollOutcome};
pub use runtime::{ClusterReport, LocationReport, RunMode, run_cluster, run_location};
pub use scheduler::{RankedAngleSet, SchedulerOptions, SweepScheduler};
pub use solver::{IterationReport, Material, SourceIteration};
pub use timing::{CHUNK_TAG, SWEEP_TAG, SweepTimings, TimingLog};
