// src/exec/chunk.rs

//! Pluggable per-cell sweep kernel abstraction.
//!
//! The angle sets own ordering, upwind lookup and downwind routing; a
//! `SweepChunk` only sees one cell and one direction at a time:
//!
//! - it gets the upwind values on every incoming face,
//! - it writes the downwind values on every outgoing face,
//! - it accumulates whatever moments it keeps internally.
//!
//! Production code uses [`TransportChunk`](super::kernels::TransportChunk);
//! tests can provide their own implementation that, for example, records
//! the order cells were visited in.

use crate::dag::FaceOrientation;
use crate::errors::Result;
use crate::mesh::CellView;
use crate::quadrature::Direction;

/// Everything the kernel may read for one (cell, direction) solve.
#[derive(Debug, Clone, Copy)]
pub struct CellSweepInput<'a> {
    pub cell: &'a CellView,
    pub direction: &'a Direction,
    pub angle_index: usize,
    /// `orientations[face]` for this cell and direction.
    pub orientations: &'a [FaceOrientation],
    /// `incoming[face]` holds one value per group on incoming faces and is
    /// empty on all others.
    pub incoming: &'a [Vec<f64>],
}

pub trait SweepChunk {
    fn num_groups(&self) -> usize;

    /// Solve one cell for one direction.
    ///
    /// `outgoing` has one entry per face. Implementations must leave exactly
    /// `num_groups()` values in every entry whose face is
    /// [`FaceOrientation::Outgoing`]; other entries are ignored.
    fn sweep_cell(&mut self, input: &CellSweepInput<'_>, outgoing: &mut [Vec<f64>]) -> Result<()>;
}
