// src/sweep/aggregation.rs

//! Grouping of quadrature directions into angle sets and octant groups.
//!
//! Directions are bucketed by octant (one [`AngleSetGroup`] per sign
//! pattern, in order of first appearance). Inside an octant, directions
//! whose plans are structurally identical on every location share one
//! angle set, up to `angles_per_set` directions each.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::comm::Communicator;
use crate::dag::{BoundaryFaceCounts, PlanOptions, SweepPlan};
use crate::errors::Result;
use crate::mesh::LocalMesh;
use crate::quadrature::AngularQuadrature;
use crate::sweep::angle_set::AngleSet;
use crate::sweep::boundary::Boundaries;
use crate::sweep::group::AngleSetGroup;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregationOptions {
    pub angles_per_set: usize,
    pub message_face_limit: usize,
    pub num_groups: usize,
    pub plan: PlanOptions,
}

impl Default for AggregationOptions {
    fn default() -> Self {
        Self {
            angles_per_set: 1,
            message_face_limit: 256,
            num_groups: 1,
            plan: PlanOptions::default(),
        }
    }
}

/// Local sweep statistics summed over all directions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepDiagnostics {
    pub boundary_faces: BoundaryFaceCounts,
    pub local_edges_removed: usize,
    pub global_edges_removed: usize,
    /// Largest number of stages of any direction's stage graph.
    pub max_stages: usize,
    pub num_angle_sets: usize,
}

/// Everything one location sweeps: mesh, directions, angle sets, boundaries.
#[derive(Debug)]
pub struct AngleAggregation {
    pub(crate) mesh: Arc<LocalMesh>,
    pub(crate) quadrature: Arc<AngularQuadrature>,
    pub(crate) groups: Vec<AngleSetGroup>,
    pub(crate) boundaries: Boundaries,
    diagnostics: SweepDiagnostics,
}

impl AngleAggregation {
    /// Collective: builds one plan per direction on every location.
    pub fn build<C: Communicator>(
        mesh: Arc<LocalMesh>,
        quadrature: Arc<AngularQuadrature>,
        boundaries: Boundaries,
        comm: &mut C,
        options: &AggregationOptions,
    ) -> Result<Self> {
        let plans = quadrature
            .directions()
            .iter()
            .map(|d| SweepPlan::build(&mesh, d, comm, &options.plan))
            .collect::<Result<Vec<_>>>()?;

        let mut diagnostics = SweepDiagnostics::default();
        for plan in &plans {
            diagnostics.boundary_faces.merge(&plan.boundary_faces);
            diagnostics.local_edges_removed += plan.local_delayed_edges.len();
            diagnostics.global_edges_removed += plan.stage_graph.removed_edges.len();
            diagnostics.max_stages = diagnostics.max_stages.max(plan.stage_graph.num_stages());
        }

        // Class of each direction: the first earlier direction in the same
        // octant with an identical local plan.
        let signs: Vec<[i8; 3]> = quadrature.directions().iter().map(|d| d.octant_signs()).collect();
        let local_class: Vec<usize> = (0..plans.len())
            .map(|i| {
                (0..i)
                    .find(|&j| signs[j] == signs[i] && plans[j].same_sweep_structure(&plans[i]))
                    .unwrap_or(i)
            })
            .collect();
        let all_classes = comm.all_gather_ids(local_class)?;
        let signature = |i: usize| -> Vec<usize> { all_classes.iter().map(|c| c[i]).collect() };

        let mut octants: Vec<[i8; 3]> = Vec::new();
        for s in &signs {
            if !octants.contains(s) {
                octants.push(*s);
            }
        }

        let plans: Vec<Arc<SweepPlan>> = plans.into_iter().map(Arc::new).collect();
        let per_set = options.angles_per_set.max(1);
        let mut groups = Vec::with_capacity(octants.len());
        let mut next_id = 0;

        for (group_id, octant) in octants.iter().enumerate() {
            let mut buckets: Vec<Vec<usize>> = Vec::new();
            let mut bucket_of: HashMap<Vec<usize>, usize> = HashMap::new();
            for i in (0..plans.len()).filter(|&i| signs[i] == *octant) {
                let b = *bucket_of.entry(signature(i)).or_insert_with(|| {
                    buckets.push(Vec::new());
                    buckets.len() - 1
                });
                buckets[b].push(i);
            }

            let mut sets = Vec::new();
            for bucket in buckets {
                for angles in bucket.chunks(per_set) {
                    let plan = Arc::clone(&plans[angles[0]]);
                    sets.push(AngleSet::new(
                        next_id,
                        angles.to_vec(),
                        plan,
                        &mesh,
                        options.num_groups,
                        options.message_face_limit,
                    )?);
                    next_id += 1;
                }
            }
            groups.push(AngleSetGroup::new(group_id, sets));
        }
        diagnostics.num_angle_sets = next_id;

        info!(
            location = mesh.location_id(),
            directions = quadrature.len(),
            groups = groups.len(),
            angle_sets = next_id,
            "angle aggregation built"
        );

        Ok(Self {
            mesh,
            quadrature,
            groups,
            boundaries,
            diagnostics,
        })
    }

    pub fn mesh(&self) -> &LocalMesh {
        &self.mesh
    }

    pub fn quadrature(&self) -> &AngularQuadrature {
        &self.quadrature
    }

    pub fn groups(&self) -> &[AngleSetGroup] {
        &self.groups
    }

    pub fn boundaries(&self) -> &Boundaries {
        &self.boundaries
    }

    pub fn diagnostics(&self) -> SweepDiagnostics {
        self.diagnostics
    }

    pub fn angle_sets(&self) -> impl Iterator<Item = &AngleSet> {
        self.groups.iter().flat_map(|g| g.angle_sets().iter())
    }

    pub fn angle_sets_mut(&mut self) -> impl Iterator<Item = &mut AngleSet> {
        self.groups.iter_mut().flat_map(|g| g.angle_sets_mut().iter_mut())
    }

    /// Reset every group and boundary for the next sweep.
    pub fn reset_sweep(&mut self) {
        self.groups.iter_mut().for_each(AngleSetGroup::reset_sweep);
        self.boundaries.reset_sweep();
    }
}
