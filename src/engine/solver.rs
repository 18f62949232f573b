// src/engine/solver.rs

use tracing::{debug, info};

use crate::comm::Communicator;
use crate::engine::scheduler::SweepScheduler;
use crate::engine::timing::SweepTimings;
use crate::errors::Result;
use crate::exec::TransportChunk;

/// Uniform isotropic material data used to rebuild the source each iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub sigma_s: f64,
    pub source: f64,
}

/// Source iteration: `q = σ_s φ + Q`, sweep, repeat until `φ` settles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceIteration {
    pub max_iterations: usize,
    /// Stop once the largest relative change of `φ` on any location drops
    /// below this.
    pub tolerance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    pub iterations: usize,
    pub converged: bool,
    pub residual: f64,
    /// Local scalar flux, `[cell * groups + group]`.
    pub flux: Vec<f64>,
    pub timings: SweepTimings,
}

impl SourceIteration {
    /// Collective: every location must run the same number of iterations,
    /// which the global residual reduction guarantees.
    pub fn solve<C: Communicator>(
        &self,
        scheduler: &mut SweepScheduler<C>,
        chunk: &mut TransportChunk,
        material: Material,
    ) -> Result<IterationReport> {
        let mut phi = vec![0.0; chunk.flux_moments().len()];
        let mut timings = SweepTimings::default();
        let mut residual = f64::INFINITY;
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iterations {
            let q = phi.iter().map(|p| material.sigma_s * p + material.source).collect();
            chunk.set_source_moments(q)?;
            chunk.zero_flux_moments();
            timings.accumulate(&scheduler.sweep(chunk)?);
            iterations += 1;

            let next = chunk.flux_moments();
            let local = next
                .iter()
                .zip(&phi)
                .map(|(n, o)| (n - o).abs() / n.abs().max(f64::MIN_POSITIVE))
                .fold(0.0, f64::max);
            residual = scheduler.comm_mut().all_reduce_max_f64(local)?;
            phi.copy_from_slice(next);

            debug!(location = scheduler.location_id(), iterations, residual, "source iteration");
            if residual < self.tolerance {
                converged = true;
                break;
            }
        }

        if scheduler.location_id() == 0 {
            info!(iterations, residual, converged, "source iteration finished");
        }

        Ok(IterationReport {
            iterations,
            converged,
            residual,
            flux: phi,
            timings,
        })
    }
}
