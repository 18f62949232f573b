// src/dag/plan.rs

//! Per-direction sweep plan: local cell order, partition dependencies and
//! the global stage graph.
//!
//! Building a plan is collective: every location must call
//! [`SweepPlan::build`] for the same directions in the same order.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::comm::Communicator;
use crate::dag::builder::{BoundaryFaceCounts, FaceOrientation, build_direction_dependencies};
use crate::dag::cycles::remove_cyclic_edges;
use crate::dag::graph::SweepGraph;
use crate::errors::{GraphScope, Result, SweepError};
use crate::mesh::LocalMesh;
use crate::quadrature::Direction;
use crate::types::{CellIndex, LocationId};

/// Position of a neighbouring location inside a [`DependencySet`].
///
/// Live and delayed partners are indexed in separate lists, so the slot
/// kind always says which buffers to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepSlot {
    Live(usize),
    Delayed(usize),
}

/// Locations this partition exchanges data with for one direction.
///
/// A location appears in at most one of the two dependency lists and at most
/// one of the two successor lists. All lists are ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    pub location_dependencies: Vec<LocationId>,
    pub location_successors: Vec<LocationId>,
    pub delayed_location_dependencies: Vec<LocationId>,
    pub delayed_location_successors: Vec<LocationId>,
}

impl DependencySet {
    pub fn map_dependency(&self, location: LocationId) -> Option<DepSlot> {
        lookup(
            &self.location_dependencies,
            &self.delayed_location_dependencies,
            location,
        )
    }

    pub fn map_successor(&self, location: LocationId) -> Option<DepSlot> {
        lookup(
            &self.location_successors,
            &self.delayed_location_successors,
            location,
        )
    }

    fn delay_dependency(&mut self, location: LocationId) {
        if let Some(pos) = self.location_dependencies.iter().position(|&l| l == location) {
            self.location_dependencies.remove(pos);
            insert_sorted(&mut self.delayed_location_dependencies, location);
        }
    }

    fn delay_successor(&mut self, location: LocationId) {
        if let Some(pos) = self.location_successors.iter().position(|&l| l == location) {
            self.location_successors.remove(pos);
            insert_sorted(&mut self.delayed_location_successors, location);
        }
    }
}

fn lookup(live: &[LocationId], delayed: &[LocationId], location: LocationId) -> Option<DepSlot> {
    if let Ok(i) = live.binary_search(&location) {
        return Some(DepSlot::Live(i));
    }
    delayed.binary_search(&location).ok().map(DepSlot::Delayed)
}

fn insert_sorted(list: &mut Vec<LocationId>, location: LocationId) {
    if let Err(pos) = list.binary_search(&location) {
        list.insert(pos, location);
    }
}

/// Global partition DAG after cycle removal (the stage graph).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageGraph {
    /// `levels[k]`: locations whose longest upstream chain has length `k`.
    pub levels: Vec<Vec<LocationId>>,
    /// Longest downstream chain per location.
    pub heights: Vec<usize>,
    /// Dependency edges `(upstream, downstream)` removed to break cycles.
    pub removed_edges: Vec<(LocationId, LocationId)>,
}

impl StageGraph {
    pub fn num_stages(&self) -> usize {
        self.levels.len()
    }

    pub fn stage_of(&self, location: LocationId) -> Option<usize> {
        self.levels.iter().position(|l| l.contains(&location))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanOptions {
    /// Faces with `|ω·n| <= epsilon` are parallel.
    pub epsilon: f64,
    pub max_cycle_passes: usize,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            epsilon: 1e-12,
            max_cycle_passes: 10_000,
        }
    }
}

/// Immutable sweep plan for one direction on one location.
#[derive(Debug, Clone)]
pub struct SweepPlan {
    pub location_id: LocationId,
    pub direction: Direction,
    /// Sweep plane local subgrid: local cells in dependency order.
    pub spls: Vec<CellIndex>,
    pub dependencies: DependencySet,
    /// `orientations[cell][face]`.
    pub orientations: Vec<Vec<FaceOrientation>>,
    /// Local edges `(upstream, downstream)` removed to break cycles; the
    /// downstream cell reads the previous sweep's value across them.
    pub local_delayed_edges: BTreeSet<(CellIndex, CellIndex)>,
    pub stage_graph: StageGraph,
    pub boundary_faces: BoundaryFaceCounts,
}

impl SweepPlan {
    /// Collective. Builds the local order, then agrees on the global DAG.
    pub fn build<C: Communicator>(
        mesh: &LocalMesh,
        direction: &Direction,
        comm: &mut C,
        options: &PlanOptions,
    ) -> Result<Self> {
        let me = mesh.location_id();
        if mesh.num_locations() != comm.num_locations() {
            return Err(SweepError::MeshError(format!(
                "mesh on location {me} is split over {} locations but the communicator spans {}",
                mesh.num_locations(),
                comm.num_locations()
            )));
        }
        let deps = build_direction_dependencies(mesh, &direction.omega, options.epsilon)?;

        let mut local = deps.local_graph;
        let local_removed =
            remove_cyclic_edges(&mut local, GraphScope::Local, options.max_cycle_passes)?;
        let spls = local.topological_order().ok_or(SweepError::CycleResolutionFailure {
            scope: GraphScope::Local,
            passes: options.max_cycle_passes,
            edges: local_removed.clone(),
        })?;

        let mut dependencies = DependencySet {
            location_dependencies: deps.location_dependencies,
            location_successors: deps.location_successors,
            ..DependencySet::default()
        };

        let gathered = comm.all_gather_ids(dependencies.location_dependencies.clone())?;
        let mut global = SweepGraph::with_vertices(gathered.len());
        for (loc, loc_deps) in gathered.iter().enumerate() {
            for &dep in loc_deps {
                global.add_edge(dep, loc, 1.0);
            }
        }
        let global_removed =
            remove_cyclic_edges(&mut global, GraphScope::Global, options.max_cycle_passes)?;

        for &(upstream, downstream) in &global_removed {
            if downstream == me {
                dependencies.delay_dependency(upstream);
            }
            if upstream == me {
                dependencies.delay_successor(downstream);
            }
        }

        let failure = || SweepError::CycleResolutionFailure {
            scope: GraphScope::Global,
            passes: options.max_cycle_passes,
            edges: global_removed.clone(),
        };
        let level_of = global.levels().ok_or_else(failure)?;
        let height_of = global.heights().ok_or_else(failure)?;

        let num_stages = level_of.values().copied().max().map_or(0, |m| m + 1);
        let mut levels = vec![Vec::new(); num_stages];
        for (&loc, &lvl) in &level_of {
            levels[lvl].push(loc);
        }
        let stage_graph = StageGraph {
            levels,
            heights: height_of.values().copied().collect(),
            removed_edges: global_removed,
        };

        if me == 0 && !stage_graph.removed_edges.is_empty() {
            info!(
                omega = ?direction.omega,
                removed = ?stage_graph.removed_edges,
                "broke cycles in global sweep graph"
            );
        }
        debug!(
            location = me,
            omega = ?direction.omega,
            deps = ?dependencies.location_dependencies,
            delayed_deps = ?dependencies.delayed_location_dependencies,
            stages = stage_graph.num_stages(),
            "sweep plan ready"
        );

        Ok(Self {
            location_id: me,
            direction: *direction,
            spls,
            dependencies,
            orientations: deps.orientations,
            local_delayed_edges: local_removed.into_iter().collect(),
            stage_graph,
            boundary_faces: deps.boundary_faces,
        })
    }

    /// Height of this location in the stage graph (longest chain to a sink).
    pub fn depth_of_graph(&self) -> usize {
        self.stage_graph
            .heights
            .get(self.location_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn is_delayed_local_edge(&self, upstream: CellIndex, downstream: CellIndex) -> bool {
        self.local_delayed_edges.contains(&(upstream, downstream))
    }

    /// Slot of the location feeding `cell`'s face `face`.
    pub fn dependency_slot(&self, location: LocationId, cell: CellIndex, face: usize) -> Result<DepSlot> {
        self.dependencies
            .map_dependency(location)
            .ok_or_else(|| SweepError::ConnectivityError {
                location: self.location_id,
                neighbor_location: location,
                detail: format!("cell {cell} face {face} reads from a location that is not a dependency"),
            })
    }

    /// Slot of the location fed by `cell`'s face `face`.
    pub fn successor_slot(&self, location: LocationId, cell: CellIndex, face: usize) -> Result<DepSlot> {
        self.dependencies
            .map_successor(location)
            .ok_or_else(|| SweepError::ConnectivityError {
                location: self.location_id,
                neighbor_location: location,
                detail: format!("cell {cell} face {face} writes to a location that is not a successor"),
            })
    }

    /// Local half of the structure test used when merging directions into
    /// one angle set. Callers must still agree across all locations.
    pub fn same_sweep_structure(&self, other: &SweepPlan) -> bool {
        self.spls == other.spls
            && self.dependencies == other.dependencies
            && self.orientations == other.orientations
            && self.local_delayed_edges == other.local_delayed_edges
    }
}
