// src/sweep/boundary.rs

use tracing::trace;

use crate::errors::{Result, SweepError};
use crate::quadrature::AngularQuadrature;
use crate::sweep::fluds::{FaceKey, FaceTable};

#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryKind {
    Vacuum,
    /// Fixed incoming angular flux in every group.
    Isotropic { value: f64 },
    /// Specular reflection, lagged by one sweep.
    Reflecting,
}

/// Incoming-value provider for one boundary id.
#[derive(Debug, Clone)]
pub struct SweepBoundary {
    kind: BoundaryKind,
    ready: bool,
    current: FaceTable,
    previous: FaceTable,
}

impl SweepBoundary {
    pub fn new(kind: BoundaryKind) -> Self {
        Self {
            kind,
            ready: false,
            current: FaceTable::new(),
            previous: FaceTable::new(),
        }
    }

    pub fn kind(&self) -> &BoundaryKind {
        &self.kind
    }

    /// True once this sweep has deposited any outgoing value here.
    pub fn is_ready(&self) -> bool {
        self.ready
    }
}

/// All boundaries of a partition, indexed by boundary id.
#[derive(Debug, Clone)]
pub struct Boundaries {
    num_groups: usize,
    boundaries: Vec<SweepBoundary>,
}

impl Boundaries {
    pub fn new(kinds: Vec<BoundaryKind>, num_groups: usize) -> Self {
        Self {
            num_groups,
            boundaries: kinds.into_iter().map(SweepBoundary::new).collect(),
        }
    }

    pub fn vacuum(num_boundaries: usize, num_groups: usize) -> Self {
        Self::new(vec![BoundaryKind::Vacuum; num_boundaries], num_groups)
    }

    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    pub fn get(&self, boundary_id: usize) -> Option<&SweepBoundary> {
        self.boundaries.get(boundary_id)
    }

    fn boundary(&self, boundary_id: usize) -> Result<&SweepBoundary> {
        self.boundaries.get(boundary_id).ok_or_else(|| {
            SweepError::MeshError(format!(
                "face references boundary {boundary_id}, only {} defined",
                self.boundaries.len()
            ))
        })
    }

    /// Append the incoming values for `key` to `out`.
    pub fn incoming(
        &self,
        boundary_id: usize,
        key: FaceKey,
        normal: &[f64; 3],
        quadrature: &AngularQuadrature,
        out: &mut Vec<f64>,
    ) -> Result<()> {
        let boundary = self.boundary(boundary_id)?;
        match &boundary.kind {
            BoundaryKind::Vacuum => out.extend(std::iter::repeat_n(0.0, self.num_groups)),
            BoundaryKind::Isotropic { value } => {
                out.extend(std::iter::repeat_n(*value, self.num_groups))
            }
            BoundaryKind::Reflecting => {
                let reflected = quadrature.reflected_index(key.angle, normal).ok_or_else(|| {
                    SweepError::ConfigError(format!(
                        "quadrature has no reflection of angle {} across boundary {boundary_id}",
                        key.angle
                    ))
                })?;
                let source = FaceKey::new(key.cell, key.face, reflected);
                match boundary.previous.get(&source) {
                    Some(v) => out.extend_from_slice(v),
                    None => out.extend(std::iter::repeat_n(0.0, self.num_groups)),
                }
            }
        }
        Ok(())
    }

    /// Record an outgoing value leaving through a boundary face.
    pub fn deposit(&mut self, boundary_id: usize, key: FaceKey, values: &[f64]) -> Result<()> {
        self.boundary(boundary_id)?;
        let Some(boundary) = self.boundaries.get_mut(boundary_id) else {
            return Ok(());
        };
        boundary.ready = true;
        if boundary.kind == BoundaryKind::Reflecting {
            boundary.current.insert(key, values.to_vec());
        }
        Ok(())
    }

    pub fn reset_ready_flags(&mut self) {
        for b in self.boundaries.iter_mut() {
            b.ready = false;
        }
    }

    /// Make this sweep's outgoing values the next sweep's incoming ones.
    pub fn reset_sweep(&mut self) {
        for (id, b) in self.boundaries.iter_mut().enumerate() {
            if b.kind == BoundaryKind::Reflecting {
                trace!(boundary = id, faces = b.current.len(), "rotating reflected values");
                b.previous = std::mem::take(&mut b.current);
            }
            b.ready = false;
        }
    }
}
