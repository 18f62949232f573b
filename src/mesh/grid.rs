// src/mesh/grid.rs

//! Orthogonal grid generator with block partitioning.
//!
//! Faces are ordered `-x, +x, -y, +y, -z, +z` over the active dimensions and
//! boundary ids follow the same numbering, so face `f` of a boundary cell
//! always sits on boundary `f`. Partitions are `px × py` blocks in the x/y
//! plane; z is never split.

use crate::errors::{Result, SweepError};
use crate::mesh::{CellView, FaceConnection, FaceNeighbor, FaceView, LocalMesh};
use crate::types::{GeometryKind, LocationId};

/// Boundary names in boundary-id order.
pub const BOUNDARY_NAMES: [&str; 6] = ["xmin", "xmax", "ymin", "ymax", "zmin", "zmax"];

#[derive(Debug, Clone, PartialEq)]
pub struct OrthoGrid {
    pub geometry: GeometryKind,
    /// Cells per axis; inactive axes must be 1.
    pub cells: [usize; 3],
    /// Physical length per axis.
    pub extent: [f64; 3],
    /// Partition blocks along x and y.
    pub partitions: [usize; 2],
}

impl OrthoGrid {
    pub fn slab(cells: usize, length: f64, partitions: usize) -> Self {
        Self {
            geometry: GeometryKind::Slab,
            cells: [cells, 1, 1],
            extent: [length, 1.0, 1.0],
            partitions: [partitions, 1],
        }
    }

    pub fn rectangle(cells: [usize; 2], extent: [f64; 2], partitions: [usize; 2]) -> Self {
        Self {
            geometry: GeometryKind::Polygon,
            cells: [cells[0], cells[1], 1],
            extent: [extent[0], extent[1], 1.0],
            partitions,
        }
    }

    pub fn num_locations(&self) -> usize {
        self.partitions[0] * self.partitions[1]
    }

    pub fn num_cells(&self) -> usize {
        self.cells.iter().product()
    }

    pub fn validate(&self) -> Result<()> {
        let dim = self.geometry.dimension();
        for axis in 0..3 {
            if self.cells[axis] == 0 {
                return Err(SweepError::MeshError(format!("axis {axis} has zero cells")));
            }
            if axis >= dim && self.cells[axis] != 1 {
                return Err(SweepError::MeshError(format!(
                    "{:?} geometry needs exactly one cell along inactive axis {axis}",
                    self.geometry
                )));
            }
            if self.extent[axis] <= 0.0 {
                return Err(SweepError::MeshError(format!(
                    "axis {axis} has non-positive extent {}",
                    self.extent[axis]
                )));
            }
        }
        for axis in 0..2 {
            let p = self.partitions[axis];
            if p == 0 || p > self.cells[axis] {
                return Err(SweepError::MeshError(format!(
                    "cannot split {} cells along axis {axis} into {p} partitions",
                    self.cells[axis]
                )));
            }
        }
        Ok(())
    }

    /// Build the local mesh of every partition.
    pub fn build(&self) -> Result<Vec<LocalMesh>> {
        (0..self.num_locations())
            .map(|loc| self.build_location(loc))
            .collect()
    }

    /// Build the local mesh of one partition.
    pub fn build_location(&self, location: LocationId) -> Result<LocalMesh> {
        self.validate()?;
        let owners = self.ownership();
        let dim = self.geometry.dimension();
        let [nx, ny, _] = self.cells;
        let spacing = [
            self.extent[0] / self.cells[0] as f64,
            self.extent[1] / self.cells[1] as f64,
            self.extent[2] / self.cells[2] as f64,
        ];
        let volume: f64 = spacing[..dim].iter().product();

        let mut cells = Vec::new();
        for (global_id, &(owner, local_id)) in owners.iter().enumerate() {
            if owner != location {
                continue;
            }
            let ijk = [global_id % nx, (global_id / nx) % ny, global_id / (nx * ny)];
            let mut faces = Vec::with_capacity(2 * dim);
            for axis in 0..dim {
                let area: f64 = (0..dim)
                    .filter(|&a| a != axis)
                    .map(|a| spacing[a])
                    .product();
                for side in 0..2 {
                    let face_index = 2 * axis + side;
                    let mut normal = [0.0; 3];
                    normal[axis] = if side == 0 { -1.0 } else { 1.0 };

                    let neighbor_ijk = if side == 0 {
                        ijk[axis].checked_sub(1)
                    } else if ijk[axis] + 1 < self.cells[axis] {
                        Some(ijk[axis] + 1)
                    } else {
                        None
                    };

                    let connection = match neighbor_ijk {
                        Some(n) => {
                            let mut nb = ijk;
                            nb[axis] = n;
                            let nb_global = nb[0] + nx * (nb[1] + ny * nb[2]);
                            let (nb_loc, nb_local) = owners[nb_global];
                            FaceConnection::Interior(FaceNeighbor {
                                local_id: nb_local,
                                global_id: nb_global,
                                location: nb_loc,
                                associated_face: face_index ^ 1,
                            })
                        }
                        None => FaceConnection::Boundary {
                            boundary_id: face_index,
                        },
                    };
                    faces.push(FaceView {
                        normal,
                        area,
                        connection,
                    });
                }
            }
            cells.push(CellView {
                local_id,
                global_id,
                volume,
                faces,
            });
        }

        LocalMesh::new(location, self.num_locations(), self.geometry, cells)
    }

    /// `(owner location, local index)` for every global cell id.
    fn ownership(&self) -> Vec<(LocationId, usize)> {
        let [nx, ny, nz] = self.cells;
        let [px, py] = self.partitions;
        let mut next_local = vec![0usize; px * py];
        let mut owners = Vec::with_capacity(nx * ny * nz);
        for _k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let bx = block_of(i, nx, px);
                    let by = block_of(j, ny, py);
                    let loc = bx + px * by;
                    owners.push((loc, next_local[loc]));
                    next_local[loc] += 1;
                }
            }
        }
        owners
    }
}

/// Block index of `i` when `n` items are split into `p` contiguous blocks.
fn block_of(i: usize, n: usize, p: usize) -> usize {
    // Block b covers [b*n/p, (b+1)*n/p).
    (0..p)
        .find(|&b| i < (b + 1) * n / p)
        .unwrap_or(p - 1)
}
