// src/engine/runtime.rs

use std::sync::Arc;

use tracing::{error, info};

use crate::comm::{Communicator, channel_cluster};
use crate::config::ProblemConfig;
use crate::engine::scheduler::SweepScheduler;
use crate::engine::solver::{Material, SourceIteration};
use crate::engine::timing::SweepTimings;
use crate::errors::{Result, SweepError};
use crate::exec::TransportChunk;
use crate::mesh::LocalMesh;
use crate::sweep::{AngleAggregation, Boundaries, SweepDiagnostics};
use crate::types::LocationId;

/// How many sweeps a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Iterate until the configured tolerance or iteration cap.
    SourceIteration,
    /// Exactly this many sweeps, no convergence test.
    Sweeps(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationReport {
    pub location: LocationId,
    /// Global cell id of every local cell, by local index.
    pub global_ids: Vec<usize>,
    pub flux: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
    pub residual: f64,
    pub timings: SweepTimings,
    pub diagnostics: SweepDiagnostics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterReport {
    pub num_groups: usize,
    pub locations: Vec<LocationReport>,
}

impl ClusterReport {
    /// Scalar flux over the whole mesh, `[global_cell * groups + group]`.
    pub fn global_flux(&self) -> Vec<f64> {
        let g = self.num_groups;
        let cells: usize = self.locations.iter().map(|l| l.global_ids.len()).sum();
        let mut out = vec![0.0; cells * g];
        for loc in &self.locations {
            for (local, &global) in loc.global_ids.iter().enumerate() {
                out[global * g..(global + 1) * g].copy_from_slice(&loc.flux[local * g..(local + 1) * g]);
            }
        }
        out
    }

    pub fn iterations(&self) -> usize {
        self.locations.first().map_or(0, |l| l.iterations)
    }

    pub fn converged(&self) -> bool {
        self.locations.iter().all(|l| l.converged)
    }
}

/// Run one location to completion on the calling thread.
///
/// Collective with every other location of the same cluster. On error the
/// communicator is dropped without finalizing, which aborts the peers.
pub fn run_location<C: Communicator>(
    mesh: LocalMesh,
    mut comm: C,
    problem: &ProblemConfig,
    mode: RunMode,
) -> Result<LocationReport> {
    let location = comm.location_id();
    let groups = problem.material.groups;
    let mesh = Arc::new(mesh);
    let quadrature = Arc::new(problem.build_quadrature()?);
    let boundaries = Boundaries::new(problem.boundary_kinds(), groups);

    let aggregation = AngleAggregation::build(
        Arc::clone(&mesh),
        quadrature,
        boundaries,
        &mut comm,
        &problem.aggregation_options(),
    )?;
    let mut scheduler = SweepScheduler::new(aggregation, comm, problem.scheduler_options())?;

    let mut chunk = TransportChunk::new(mesh.geometry(), mesh.num_cells(), groups, problem.material.sigma_t);
    let iteration = match mode {
        RunMode::SourceIteration => problem.source_iteration(),
        RunMode::Sweeps(n) => SourceIteration {
            max_iterations: n,
            tolerance: 0.0,
        },
    };
    let material = Material {
        sigma_s: problem.material.sigma_s,
        source: problem.material.source,
    };
    let report = iteration.solve(&mut scheduler, &mut chunk, material)?;

    let diagnostics = scheduler.diagnostics();
    scheduler.comm_mut().finalize()?;

    Ok(LocationReport {
        location,
        global_ids: mesh.cells().iter().map(|c| c.global_id).collect(),
        flux: report.flux,
        iterations: report.iterations,
        converged: report.converged,
        residual: report.residual,
        timings: report.timings,
        diagnostics,
    })
}

/// Run every location of `problem` on the blocking thread pool.
pub async fn run_cluster(problem: &ProblemConfig, mode: RunMode) -> Result<ClusterReport> {
    let meshes = problem.grid.build()?;
    let comms = channel_cluster(problem.num_locations(), problem.config.channel_capacity)?;
    info!(locations = meshes.len(), policy = %problem.config.policy, "starting cluster");

    let handles: Vec<_> = meshes
        .into_iter()
        .zip(comms)
        .map(|(mesh, comm)| {
            let problem = problem.clone();
            tokio::task::spawn_blocking(move || run_location(mesh, comm, &problem, mode))
        })
        .collect();

    let mut locations = Vec::with_capacity(handles.len());
    let mut failure: Option<SweepError> = None;
    for handle in handles {
        let result = handle
            .await
            .map_err(|e| SweepError::Other(anyhow::Error::new(e)))
            .and_then(|r| r);
        match result {
            Ok(report) => locations.push(report),
            Err(e) => {
                error!(error = %e, "location failed");
                // Peers aborted by the first failure report a CommError;
                // keep the root cause.
                let replace = match &failure {
                    None => true,
                    Some(SweepError::CommError(_)) => !matches!(e, SweepError::CommError(_)),
                    Some(_) => false,
                };
                if replace {
                    failure = Some(e);
                }
            }
        }
    }

    if let Some(e) = failure {
        return Err(e);
    }
    Ok(ClusterReport {
        num_groups: problem.material.groups,
        locations,
    })
}
