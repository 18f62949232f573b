// src/dag/builder.rs

use std::collections::BTreeSet;

use tracing::trace;

use crate::dag::graph::SweepGraph;
use crate::errors::{Result, SweepError};
use crate::mesh::{FaceConnection, LocalMesh, dot};
use crate::types::LocationId;

/// How a face is crossed by the current direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceOrientation {
    /// Upwind values flow in through this face.
    Incoming,
    /// This cell produces the downwind value on this face.
    Outgoing,
    /// `|ω·n| <= ε`; the face carries no flux.
    Parallel,
}

impl FaceOrientation {
    pub fn classify(mu: f64, epsilon: f64) -> Self {
        if mu > epsilon {
            FaceOrientation::Outgoing
        } else if mu < -epsilon {
            FaceOrientation::Incoming
        } else {
            FaceOrientation::Parallel
        }
    }
}

/// Boundary faces seen for one direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundaryFaceCounts {
    pub incoming: usize,
    pub outgoing: usize,
}

impl BoundaryFaceCounts {
    pub fn merge(&mut self, other: &BoundaryFaceCounts) {
        self.incoming += other.incoming;
        self.outgoing += other.outgoing;
    }
}

/// Local cell graph plus the partition-level neighbours for one direction.
#[derive(Debug, Clone)]
pub struct DirectionDependencies {
    /// Locations this partition waits on, ascending.
    pub location_dependencies: Vec<LocationId>,
    /// Locations waiting on this partition, ascending.
    pub location_successors: Vec<LocationId>,
    /// Edge `c -> n` when `c` must be solved before local neighbour `n`,
    /// weighted by `ω·n · area`.
    pub local_graph: SweepGraph,
    /// `orientations[cell][face]`.
    pub orientations: Vec<Vec<FaceOrientation>>,
    pub boundary_faces: BoundaryFaceCounts,
}

/// Classify every face of `mesh` against `omega` and build the local graph.
///
/// Each pair of local cells is visited from both sides, but only the
/// outgoing side adds the edge, so no edge is added twice.
pub fn build_direction_dependencies(
    mesh: &LocalMesh,
    omega: &[f64; 3],
    epsilon: f64,
) -> Result<DirectionDependencies> {
    let me = mesh.location_id();
    let mut graph = SweepGraph::with_vertices(mesh.num_cells());
    let mut deps: BTreeSet<LocationId> = BTreeSet::new();
    let mut succs: BTreeSet<LocationId> = BTreeSet::new();
    let mut orientations = Vec::with_capacity(mesh.num_cells());
    let mut boundary_faces = BoundaryFaceCounts::default();

    for cell in mesh.cells() {
        let mut cell_orient = Vec::with_capacity(cell.faces.len());
        for (f, face) in cell.faces.iter().enumerate() {
            let mu = dot(omega, &face.normal);
            let orient = FaceOrientation::classify(mu, epsilon);
            cell_orient.push(orient);

            match &face.connection {
                FaceConnection::Boundary { .. } => match orient {
                    FaceOrientation::Incoming => boundary_faces.incoming += 1,
                    FaceOrientation::Outgoing => boundary_faces.outgoing += 1,
                    FaceOrientation::Parallel => {}
                },
                FaceConnection::Interior(nb) => {
                    if nb.location >= mesh.num_locations() {
                        return Err(SweepError::ConnectivityError {
                            location: me,
                            neighbor_location: nb.location,
                            detail: format!(
                                "cell {} face {f} points at a location outside 0..{}",
                                cell.local_id,
                                mesh.num_locations()
                            ),
                        });
                    }
                    if nb.location == me {
                        if nb.local_id >= mesh.num_cells() || nb.local_id == cell.local_id {
                            return Err(SweepError::ConnectivityError {
                                location: me,
                                neighbor_location: me,
                                detail: format!(
                                    "cell {} face {f} names invalid local neighbour {}",
                                    cell.local_id, nb.local_id
                                ),
                            });
                        }
                        if orient == FaceOrientation::Outgoing {
                            graph.add_edge(cell.local_id, nb.local_id, mu * face.area);
                        }
                    } else {
                        match orient {
                            FaceOrientation::Outgoing => {
                                succs.insert(nb.location);
                            }
                            FaceOrientation::Incoming => {
                                deps.insert(nb.location);
                            }
                            FaceOrientation::Parallel => {}
                        }
                    }
                }
            }
        }
        orientations.push(cell_orient);
    }

    trace!(
        location = me,
        edges = graph.num_edges(),
        deps = ?deps,
        succs = ?succs,
        "built direction dependencies"
    );

    Ok(DirectionDependencies {
        location_dependencies: deps.into_iter().collect(),
        location_successors: succs.into_iter().collect(),
        local_graph: graph,
        orientations,
        boundary_faces,
    })
}
