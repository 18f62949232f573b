// src/exec/kernels.rs

use crate::dag::FaceOrientation;
use crate::errors::{Result, SweepError};
use crate::exec::chunk::{CellSweepInput, SweepChunk};
use crate::mesh::dot;
use crate::types::GeometryKind;

/// Spatial discretisation used for one geometry class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKernel {
    /// Diamond difference with a set-to-zero fixup.
    Slab,
    /// Step characteristics on polygons.
    Polygon,
    /// Step characteristics on polyhedra.
    Polyhedron,
}

impl From<GeometryKind> for GeometryKernel {
    fn from(kind: GeometryKind) -> Self {
        match kind {
            GeometryKind::Slab => GeometryKernel::Slab,
            GeometryKind::Polygon => GeometryKernel::Polygon,
            GeometryKind::Polyhedron => GeometryKernel::Polyhedron,
        }
    }
}

/// One-cell balance in a single group.
#[derive(Debug, Clone, Copy)]
struct Balance {
    /// `Σ |ω·n| A` over incoming faces.
    in_coeff: f64,
    /// `Σ |ω·n| A ψ_in` over incoming faces.
    in_flux: f64,
    /// `Σ ω·n A` over outgoing faces.
    out_coeff: f64,
    /// `q V`.
    source: f64,
    /// `σ_t V`.
    removal: f64,
}

impl GeometryKernel {
    /// Returns `(ψ_cell, ψ_out)` for one group.
    fn solve(self, b: Balance) -> (f64, f64) {
        if b.in_coeff == 0.0 && b.out_coeff == 0.0 {
            let psi = if b.removal > 0.0 { b.source / b.removal } else { 0.0 };
            return (psi, psi);
        }
        match self {
            GeometryKernel::Slab => {
                let psi_in = if b.in_coeff > 0.0 { b.in_flux / b.in_coeff } else { 0.0 };
                let psi_c = (b.source + 2.0 * b.in_flux) / (b.removal + 2.0 * b.out_coeff);
                let psi_out = 2.0 * psi_c - psi_in;
                if psi_out < 0.0 && b.removal > 0.0 {
                    ((b.source + b.in_flux) / b.removal, 0.0)
                } else {
                    (psi_c, psi_out)
                }
            }
            GeometryKernel::Polygon | GeometryKernel::Polyhedron => {
                let psi_c = (b.source + b.in_flux) / (b.removal + b.out_coeff);
                (psi_c, psi_c)
            }
        }
    }
}

/// Isotropic-source transport kernel accumulating the scalar flux.
///
/// Source and flux moments are stored as `[cell * groups + group]`.
#[derive(Debug, Clone)]
pub struct TransportChunk {
    kernel: GeometryKernel,
    num_groups: usize,
    sigma_t: Vec<f64>,
    source_moments: Vec<f64>,
    flux_moments: Vec<f64>,
}

impl TransportChunk {
    pub fn new(geometry: GeometryKind, num_cells: usize, num_groups: usize, sigma_t: f64) -> Self {
        Self {
            kernel: geometry.into(),
            num_groups,
            sigma_t: vec![sigma_t; num_cells],
            source_moments: vec![0.0; num_cells * num_groups],
            flux_moments: vec![0.0; num_cells * num_groups],
        }
    }

    pub fn kernel(&self) -> GeometryKernel {
        self.kernel
    }

    pub fn set_source_moments(&mut self, q: Vec<f64>) -> Result<()> {
        if q.len() != self.source_moments.len() {
            return Err(SweepError::ConfigError(format!(
                "source moments have {} entries, expected {}",
                q.len(),
                self.source_moments.len()
            )));
        }
        self.source_moments = q;
        Ok(())
    }

    pub fn zero_flux_moments(&mut self) {
        self.flux_moments.iter_mut().for_each(|v| *v = 0.0);
    }

    pub fn flux_moments(&self) -> &[f64] {
        &self.flux_moments
    }
}

impl SweepChunk for TransportChunk {
    fn num_groups(&self) -> usize {
        self.num_groups
    }

    fn sweep_cell(&mut self, input: &CellSweepInput<'_>, outgoing: &mut [Vec<f64>]) -> Result<()> {
        let cell = input.cell;
        let c = cell.local_id;
        let g_count = self.num_groups;
        let omega = &input.direction.omega;

        for (f, orient) in input.orientations.iter().enumerate() {
            if *orient == FaceOrientation::Outgoing {
                outgoing[f].clear();
                outgoing[f].resize(g_count, 0.0);
            }
        }

        for g in 0..g_count {
            let mut b = Balance {
                in_coeff: 0.0,
                in_flux: 0.0,
                out_coeff: 0.0,
                source: self.source_moments[c * g_count + g] * cell.volume,
                removal: self.sigma_t[c] * cell.volume,
            };
            for (f, face) in cell.faces.iter().enumerate() {
                let mu = dot(omega, &face.normal);
                match input.orientations[f] {
                    FaceOrientation::Incoming => {
                        let a = mu.abs() * face.area;
                        b.in_coeff += a;
                        b.in_flux += a * input.incoming[f].get(g).copied().unwrap_or(0.0);
                    }
                    FaceOrientation::Outgoing => b.out_coeff += mu * face.area,
                    FaceOrientation::Parallel => {}
                }
            }

            let (psi_c, psi_out) = self.kernel.solve(b);
            for (f, orient) in input.orientations.iter().enumerate() {
                if *orient == FaceOrientation::Outgoing {
                    outgoing[f][g] = psi_out;
                }
            }
            self.flux_moments[c * g_count + g] += input.direction.weight * psi_c;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance(in_coeff: f64, in_flux: f64, out_coeff: f64, source: f64, removal: f64) -> Balance {
        Balance {
            in_coeff,
            in_flux,
            out_coeff,
            source,
            removal,
        }
    }

    #[test]
    fn diamond_difference_conserves_balance() {
        let b = balance(0.5, 0.5 * 2.0, 0.5, 1.0, 1.0);
        let (psi_c, psi_out) = GeometryKernel::Slab.solve(b);
        // a ψ_out - a ψ_in + σV ψ_c = qV
        let residual = 0.5 * psi_out - b.in_flux + b.removal * psi_c - b.source;
        assert!(residual.abs() < 1e-12);
        assert!((psi_c - 0.5 * (2.0 + psi_out)).abs() < 1e-12);
    }

    #[test]
    fn negative_outflow_is_fixed_up() {
        // Thick cell with a large inflow and no source drives ψ_out negative.
        let b = balance(0.1, 0.1 * 10.0, 0.1, 0.0, 50.0);
        let (psi_c, psi_out) = GeometryKernel::Slab.solve(b);
        assert_eq!(psi_out, 0.0);
        assert!((psi_c - 1.0 / 50.0).abs() < 1e-12);
    }

    #[test]
    fn step_scheme_is_upwinded() {
        let b = balance(1.0, 3.0, 1.0, 0.0, 1.0);
        let (psi_c, psi_out) = GeometryKernel::Polygon.solve(b);
        assert!((psi_c - 1.5).abs() < 1e-12);
        assert_eq!(psi_c, psi_out);
    }
}
