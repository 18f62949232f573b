// src/mesh/mod.rs

//! Read-only mesh adjacency consumed by the sweep subsystem.
//!
//! Mesh generation and partitioning live outside this crate; what the
//! scheduler needs is a per-partition arena of cells, each with its faces,
//! referencing neighbours purely by integer ids.
//!
//! - [`grid`] is a small orthogonal grid generator with block partitioning,
//!   used by the CLI and the tests.

pub mod grid;

pub use grid::OrthoGrid;

use crate::errors::{Result, SweepError};
use crate::types::{CellIndex, GeometryKind, LocationId};

/// Neighbour on the other side of an interior face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceNeighbor {
    /// Index of the neighbour inside its owning partition.
    pub local_id: CellIndex,
    /// Mesh-wide id of the neighbour.
    pub global_id: usize,
    /// Partition owning the neighbour.
    pub location: LocationId,
    /// Index of the neighbour's face that points back at this cell.
    pub associated_face: usize,
}

/// What lies across a face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FaceConnection {
    Boundary { boundary_id: usize },
    Interior(FaceNeighbor),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaceView {
    /// Outward unit normal.
    pub normal: [f64; 3],
    pub area: f64,
    pub connection: FaceConnection,
}

impl FaceView {
    pub fn neighbor(&self) -> Option<&FaceNeighbor> {
        match &self.connection {
            FaceConnection::Interior(n) => Some(n),
            FaceConnection::Boundary { .. } => None,
        }
    }

    pub fn is_boundary(&self) -> bool {
        matches!(self.connection, FaceConnection::Boundary { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellView {
    pub local_id: CellIndex,
    pub global_id: usize,
    pub volume: f64,
    pub faces: Vec<FaceView>,
}

/// Cells owned by one partition, stored contiguously by local index.
#[derive(Debug, Clone)]
pub struct LocalMesh {
    location_id: LocationId,
    num_locations: usize,
    geometry: GeometryKind,
    cells: Vec<CellView>,
}

impl LocalMesh {
    /// Build a local mesh, checking that `cells[i].local_id == i`.
    pub fn new(
        location_id: LocationId,
        num_locations: usize,
        geometry: GeometryKind,
        cells: Vec<CellView>,
    ) -> Result<Self> {
        if location_id >= num_locations {
            return Err(SweepError::MeshError(format!(
                "location {location_id} out of range for {num_locations} locations"
            )));
        }
        for (idx, cell) in cells.iter().enumerate() {
            if cell.local_id != idx {
                return Err(SweepError::MeshError(format!(
                    "cell at arena slot {idx} reports local id {}",
                    cell.local_id
                )));
            }
            if cell.volume <= 0.0 {
                return Err(SweepError::MeshError(format!(
                    "cell {idx} (global {}) has non-positive volume {}",
                    cell.global_id, cell.volume
                )));
            }
        }
        Ok(Self {
            location_id,
            num_locations,
            geometry,
            cells,
        })
    }

    pub fn location_id(&self) -> LocationId {
        self.location_id
    }

    pub fn num_locations(&self) -> usize {
        self.num_locations
    }

    pub fn geometry(&self) -> GeometryKind {
        self.geometry
    }

    pub fn cells(&self) -> &[CellView] {
        &self.cells
    }

    pub fn cell(&self, idx: CellIndex) -> &CellView {
        &self.cells[idx]
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }
}

pub(crate) fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}
