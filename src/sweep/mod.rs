// src/sweep/mod.rs

//! Angle sets and everything they sweep with.
//!
//! - [`fluds`] stores face values between cells and partitions.
//! - [`boundary`] provides incoming values on domain boundaries.
//! - [`angle_set`] is the per-plan state machine advanced by the scheduler.
//! - [`group`] sequences the angle sets of one octant.
//! - [`aggregation`] builds the groups from a quadrature.

pub mod aggregation;
pub mod angle_set;
pub mod boundary;
pub mod fluds;
pub mod group;

pub use aggregation::{AggregationOptions, AngleAggregation, SweepDiagnostics};
pub use angle_set::{AngleSet, SweepContext};
pub use boundary::{Boundaries, BoundaryKind, SweepBoundary};
pub use fluds::{FaceKey, Fluds};
pub use group::AngleSetGroup;
