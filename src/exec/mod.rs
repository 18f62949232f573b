// src/exec/mod.rs

//! Per-cell computation layer.
//!
//! - [`chunk`] provides the `SweepChunk` trait the angle sets call for every
//!   (cell, direction) pair in sweep order.
//! - [`kernels`] holds the production transport kernels, one discretisation
//!   per geometry class.

pub mod chunk;
pub mod kernels;

pub use chunk::{CellSweepInput, SweepChunk};
pub use kernels::{GeometryKernel, TransportChunk};
