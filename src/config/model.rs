// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::dag::PlanOptions;
use crate::engine::scheduler::SchedulerOptions;
use crate::engine::solver::SourceIteration;
use crate::errors::Result;
use crate::mesh::OrthoGrid;
use crate::mesh::grid::BOUNDARY_NAMES;
use crate::quadrature::AngularQuadrature;
use crate::sweep::{AggregationOptions, BoundaryKind};
use crate::types::{GeometryKind, SchedulingPolicy};

/// Problem file as read from TOML, before validation.
///
/// ```toml
/// [config]
/// policy = "depth_of_graph"
/// message_face_limit = 64
///
/// [mesh]
/// geometry = "polygon"
/// cells = [8, 8]
/// extent = [1.0, 1.0]
/// partitions = [2, 2]
///
/// [quadrature]
/// polar = 2
/// azimuthal = 4
///
/// [material]
/// sigma_t = 1.0
/// sigma_s = 0.5
/// source = 1.0
///
/// [boundary.xmin]
/// type = "reflecting"
/// ```
///
/// Only `[mesh]` is required.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawProblemConfig {
    #[serde(default)]
    pub config: ConfigSection,

    pub mesh: MeshSection,

    #[serde(default)]
    pub quadrature: QuadratureSection,

    #[serde(default)]
    pub material: MaterialSection,

    /// Keyed by boundary name (`xmin`, `xmax`, ...). Missing names are vacuum.
    #[serde(default)]
    pub boundary: BTreeMap<String, BoundaryConfig>,

    #[serde(default)]
    pub solver: SolverSection,
}

/// `[config]` section: scheduler and communication tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    #[serde(default)]
    pub policy: SchedulingPolicy,

    /// Faces with `|ω·n|` below this are treated as parallel.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,

    /// Maximum face records per message.
    #[serde(default = "default_message_face_limit")]
    pub message_face_limit: usize,

    /// Per-location inbound message capacity.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    #[serde(default = "default_max_idle_polls")]
    pub max_idle_polls: usize,

    #[serde(default = "default_max_cycle_passes")]
    pub max_cycle_passes: usize,
}

fn default_epsilon() -> f64 {
    1e-12
}

fn default_message_face_limit() -> usize {
    256
}

fn default_channel_capacity() -> usize {
    64
}

fn default_max_idle_polls() -> usize {
    10_000_000
}

fn default_max_cycle_passes() -> usize {
    10_000
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            policy: SchedulingPolicy::default(),
            epsilon: default_epsilon(),
            message_face_limit: default_message_face_limit(),
            channel_capacity: default_channel_capacity(),
            max_idle_polls: default_max_idle_polls(),
            max_cycle_passes: default_max_cycle_passes(),
        }
    }
}

/// `[mesh]` section describing an orthogonal grid.
#[derive(Debug, Clone, Deserialize)]
pub struct MeshSection {
    #[serde(default)]
    pub geometry: GeometryKind,

    /// Cells per active axis.
    pub cells: Vec<usize>,

    /// Length per active axis; defaults to 1 each.
    #[serde(default)]
    pub extent: Vec<f64>,

    /// Blocks along x (and y).
    #[serde(default)]
    pub partitions: Vec<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuadratureSection {
    #[serde(default = "default_polar")]
    pub polar: usize,

    /// Ignored for slab geometry.
    #[serde(default = "default_azimuthal")]
    pub azimuthal: usize,

    #[serde(default = "default_angles_per_set")]
    pub angles_per_set: usize,
}

fn default_polar() -> usize {
    4
}

fn default_azimuthal() -> usize {
    4
}

fn default_angles_per_set() -> usize {
    1
}

impl Default for QuadratureSection {
    fn default() -> Self {
        Self {
            polar: default_polar(),
            azimuthal: default_azimuthal(),
            angles_per_set: default_angles_per_set(),
        }
    }
}

/// One uniform material over the whole mesh.
#[derive(Debug, Clone, Deserialize)]
pub struct MaterialSection {
    #[serde(default = "default_sigma_t")]
    pub sigma_t: f64,

    #[serde(default)]
    pub sigma_s: f64,

    /// Isotropic volumetric source.
    #[serde(default = "default_source")]
    pub source: f64,

    #[serde(default = "default_groups")]
    pub groups: usize,
}

fn default_sigma_t() -> f64 {
    1.0
}

fn default_source() -> f64 {
    1.0
}

fn default_groups() -> usize {
    1
}

impl Default for MaterialSection {
    fn default() -> Self {
        Self {
            sigma_t: default_sigma_t(),
            sigma_s: 0.0,
            source: default_source(),
            groups: default_groups(),
        }
    }
}

/// `[boundary.<name>]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BoundaryConfig {
    Vacuum,
    Reflecting,
    Isotropic { value: f64 },
}

impl From<&BoundaryConfig> for BoundaryKind {
    fn from(cfg: &BoundaryConfig) -> Self {
        match cfg {
            BoundaryConfig::Vacuum => BoundaryKind::Vacuum,
            BoundaryConfig::Reflecting => BoundaryKind::Reflecting,
            BoundaryConfig::Isotropic { value } => BoundaryKind::Isotropic { value: *value },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolverSection {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_max_iterations() -> usize {
    100
}

fn default_tolerance() -> f64 {
    1e-8
}

impl Default for SolverSection {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
        }
    }
}

/// Validated problem description.
///
/// Constructed through `TryFrom<RawProblemConfig>`, which checks every
/// section and resolves the grid.
#[derive(Debug, Clone)]
pub struct ProblemConfig {
    pub config: ConfigSection,
    pub grid: OrthoGrid,
    pub quadrature: QuadratureSection,
    pub material: MaterialSection,
    pub boundary: BTreeMap<String, BoundaryConfig>,
    pub solver: SolverSection,
}

impl ProblemConfig {
    /// Internal constructor that assumes the input is already valid.
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        grid: OrthoGrid,
        quadrature: QuadratureSection,
        material: MaterialSection,
        boundary: BTreeMap<String, BoundaryConfig>,
        solver: SolverSection,
    ) -> Self {
        Self {
            config,
            grid,
            quadrature,
            material,
            boundary,
            solver,
        }
    }

    pub fn num_locations(&self) -> usize {
        self.grid.num_locations()
    }

    pub fn build_quadrature(&self) -> Result<AngularQuadrature> {
        match self.grid.geometry {
            GeometryKind::Slab => AngularQuadrature::slab(self.quadrature.polar),
            GeometryKind::Polygon | GeometryKind::Polyhedron => {
                AngularQuadrature::product(self.quadrature.polar, self.quadrature.azimuthal)
            }
        }
    }

    /// Boundary kinds in boundary-id order.
    pub fn boundary_kinds(&self) -> Vec<BoundaryKind> {
        BOUNDARY_NAMES
            .iter()
            .map(|name| {
                self.boundary
                    .get(*name)
                    .map_or(BoundaryKind::Vacuum, BoundaryKind::from)
            })
            .collect()
    }

    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            epsilon: self.config.epsilon,
            max_cycle_passes: self.config.max_cycle_passes,
        }
    }

    pub fn aggregation_options(&self) -> AggregationOptions {
        AggregationOptions {
            angles_per_set: self.quadrature.angles_per_set,
            message_face_limit: self.config.message_face_limit,
            num_groups: self.material.groups,
            plan: self.plan_options(),
        }
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            policy: self.config.policy,
            max_idle_polls: self.config.max_idle_polls,
        }
    }

    pub fn source_iteration(&self) -> SourceIteration {
        SourceIteration {
            max_iterations: self.solver.max_iterations,
            tolerance: self.solver.tolerance,
        }
    }
}
