// src/quadrature.rs

//! Angular quadrature: the set of directions swept each iteration.
//!
//! Weights are normalised to sum to one, so the scalar flux is simply
//! `Σ w ψ` and an infinite medium settles at `Q / (σ_t - σ_s)`.

use std::f64::consts::PI;

use crate::errors::{Result, SweepError};
use crate::mesh::dot;

/// One discrete ordinate. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Direction {
    pub omega: [f64; 3],
    pub polar: f64,
    pub azimuthal: f64,
    pub weight: f64,
}

impl Direction {
    /// Build a direction from a (not necessarily normalised) vector.
    pub fn new(omega: [f64; 3], weight: f64) -> Result<Self> {
        let norm = dot(&omega, &omega).sqrt();
        if !(norm > 0.0) || !norm.is_finite() {
            return Err(SweepError::ConfigError(format!(
                "direction {omega:?} has no length"
            )));
        }
        let omega = [omega[0] / norm, omega[1] / norm, omega[2] / norm];
        Ok(Self {
            omega,
            polar: omega[2].clamp(-1.0, 1.0).acos(),
            azimuthal: omega[1].atan2(omega[0]),
            weight,
        })
    }

    /// Sign of each component of ω (`0` for an exactly zero component).
    pub fn octant_signs(&self) -> [i8; 3] {
        self.omega.map(|c| {
            if c > 0.0 {
                1
            } else if c < 0.0 {
                -1
            } else {
                0
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AngularQuadrature {
    directions: Vec<Direction>,
}

impl AngularQuadrature {
    /// Use an explicit direction list; weights are renormalised to sum to one.
    pub fn from_directions(mut directions: Vec<Direction>) -> Result<Self> {
        if directions.is_empty() {
            return Err(SweepError::ConfigError(
                "quadrature needs at least one direction".to_string(),
            ));
        }
        let total: f64 = directions.iter().map(|d| d.weight).sum();
        if !(total > 0.0) {
            return Err(SweepError::ConfigError(format!(
                "quadrature weights must sum to a positive value (got {total})"
            )));
        }
        for d in directions.iter_mut() {
            d.weight /= total;
        }
        Ok(Self { directions })
    }

    /// Gauss–Legendre ordinates along x for slab problems.
    pub fn slab(num_polar: usize) -> Result<Self> {
        let dirs = gauss_legendre(num_polar)
            .into_iter()
            .map(|(mu, w)| Direction::new([mu, (1.0 - mu * mu).max(0.0).sqrt(), 0.0], w))
            .collect::<Result<Vec<_>>>()?;
        Self::from_directions(dirs)
    }

    /// Gauss–Legendre in cos(θ) times equally spaced azimuthal angles.
    pub fn product(num_polar: usize, num_azimuthal: usize) -> Result<Self> {
        if num_azimuthal == 0 {
            return Err(SweepError::ConfigError(
                "product quadrature needs at least one azimuthal angle".to_string(),
            ));
        }
        let mut dirs = Vec::with_capacity(num_polar * num_azimuthal);
        for (mu, w) in gauss_legendre(num_polar) {
            let sin_theta = (1.0 - mu * mu).max(0.0).sqrt();
            for k in 0..num_azimuthal {
                let phi = (k as f64 + 0.5) * 2.0 * PI / num_azimuthal as f64;
                dirs.push(Direction::new(
                    [sin_theta * phi.cos(), sin_theta * phi.sin(), mu],
                    w / num_azimuthal as f64,
                )?);
            }
        }
        Self::from_directions(dirs)
    }

    pub fn len(&self) -> usize {
        self.directions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }

    pub fn direction(&self, idx: usize) -> &Direction {
        &self.directions[idx]
    }

    pub fn directions(&self) -> &[Direction] {
        &self.directions
    }

    /// Index of the ordinate that reflects into `angle` across a face with
    /// outward `normal`, if the set contains it.
    pub fn reflected_index(&self, angle: usize, normal: &[f64; 3]) -> Option<usize> {
        let omega = &self.directions[angle].omega;
        let proj = dot(omega, normal);
        let reflected = [
            omega[0] - 2.0 * proj * normal[0],
            omega[1] - 2.0 * proj * normal[1],
            omega[2] - 2.0 * proj * normal[2],
        ];
        self.directions
            .iter()
            .enumerate()
            .map(|(j, d)| (j, dot(&d.omega, &reflected)))
            .filter(|(_, c)| *c > 1.0 - 1e-8)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(j, _)| j)
    }
}

/// Gauss–Legendre nodes and weights on [-1, 1], nodes ascending.
fn gauss_legendre(n: usize) -> Vec<(f64, f64)> {
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        for _ in 0..100 {
            let dx = legendre_ratio(n, x);
            x -= dx;
            if dx.abs() < 1e-15 {
                break;
            }
        }
        let dp = legendre_derivative(n, x);
        out.push((x, 2.0 / ((1.0 - x * x) * dp * dp)));
    }
    out.sort_by(|a, b| a.0.total_cmp(&b.0));
    out
}

/// Newton step `P_n(x) / P_n'(x)`.
fn legendre_ratio(n: usize, x: f64) -> f64 {
    legendre(n, x).0 / legendre_derivative(n, x)
}

fn legendre_derivative(n: usize, x: f64) -> f64 {
    let (p, p_prev) = legendre(n, x);
    n as f64 * (x * p - p_prev) / (x * x - 1.0)
}

/// `(P_n(x), P_{n-1}(x))` by the three-term recurrence.
fn legendre(n: usize, x: f64) -> (f64, f64) {
    let mut p_prev = 1.0;
    let mut p = x;
    if n == 0 {
        return (1.0, 0.0);
    }
    for k in 2..=n {
        let next = ((2 * k - 1) as f64 * x * p - (k - 1) as f64 * p_prev) / k as f64;
        p_prev = p;
        p = next;
    }
    (p, p_prev)
}
