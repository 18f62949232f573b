// src/dag/mod.rs

//! Sweep dependency graphs.
//!
//! - [`graph`] wraps a weighted petgraph digraph with deterministic queries.
//! - [`builder`] classifies faces and builds the per-direction local graph.
//! - [`cycles`] removes cyclic edges, locally and across partitions.
//! - [`plan`] combines them into a [`SweepPlan`] per direction.

pub mod builder;
pub mod cycles;
pub mod graph;
pub mod plan;

pub use builder::{BoundaryFaceCounts, DirectionDependencies, FaceOrientation, build_direction_dependencies};
pub use cycles::{find_cycle, remove_cyclic_edges};
pub use graph::SweepGraph;
pub use plan::{DepSlot, DependencySet, PlanOptions, StageGraph, SweepPlan};
