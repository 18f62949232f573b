// src/config/validate.rs

use crate::config::model::{ProblemConfig, RawProblemConfig};
use crate::errors::{Result, SweepError};
use crate::mesh::OrthoGrid;
use crate::mesh::grid::BOUNDARY_NAMES;

impl TryFrom<RawProblemConfig> for ProblemConfig {
    type Error = crate::errors::SweepError;

    fn try_from(raw: RawProblemConfig) -> std::result::Result<Self, Self::Error> {
        validate_config_section(&raw)?;
        let grid = resolve_grid(&raw)?;
        validate_quadrature(&raw)?;
        validate_material(&raw)?;
        validate_boundaries(&raw)?;
        validate_solver(&raw)?;
        Ok(ProblemConfig::new_unchecked(
            raw.config,
            grid,
            raw.quadrature,
            raw.material,
            raw.boundary,
            raw.solver,
        ))
    }
}

fn config_error(msg: impl Into<String>) -> SweepError {
    SweepError::ConfigError(msg.into())
}

fn validate_config_section(cfg: &RawProblemConfig) -> Result<()> {
    let c = &cfg.config;
    if !(c.epsilon >= 0.0 && c.epsilon.is_finite()) {
        return Err(config_error(format!(
            "[config].epsilon must be a finite value >= 0 (got {})",
            c.epsilon
        )));
    }
    for (name, value) in [
        ("message_face_limit", c.message_face_limit),
        ("channel_capacity", c.channel_capacity),
        ("max_idle_polls", c.max_idle_polls),
        ("max_cycle_passes", c.max_cycle_passes),
    ] {
        if value == 0 {
            return Err(config_error(format!("[config].{name} must be >= 1 (got 0)")));
        }
    }
    Ok(())
}

/// Pad the per-axis lists to three axes and build the grid.
fn resolve_grid(cfg: &RawProblemConfig) -> Result<OrthoGrid> {
    let mesh = &cfg.mesh;
    let dim = mesh.geometry.dimension();

    if mesh.cells.len() != dim {
        return Err(config_error(format!(
            "[mesh].cells must list {dim} value(s) for {:?} geometry (got {})",
            mesh.geometry,
            mesh.cells.len()
        )));
    }
    if !mesh.extent.is_empty() && mesh.extent.len() != dim {
        return Err(config_error(format!(
            "[mesh].extent must list {dim} value(s) (got {})",
            mesh.extent.len()
        )));
    }
    if mesh.partitions.len() > 2 || (dim == 1 && mesh.partitions.len() > 1) {
        return Err(config_error(
            "[mesh].partitions may only split x (and y for 2D/3D)".to_string(),
        ));
    }

    let mut cells = [1usize; 3];
    let mut extent = [1.0f64; 3];
    let mut partitions = [1usize; 2];
    cells[..dim].copy_from_slice(&mesh.cells);
    if !mesh.extent.is_empty() {
        extent[..dim].copy_from_slice(&mesh.extent);
    }
    partitions[..mesh.partitions.len()].copy_from_slice(&mesh.partitions);

    let grid = OrthoGrid {
        geometry: mesh.geometry,
        cells,
        extent,
        partitions,
    };
    grid.validate()
        .map_err(|e| config_error(format!("[mesh] is invalid: {e}")))?;
    Ok(grid)
}

fn validate_quadrature(cfg: &RawProblemConfig) -> Result<()> {
    let q = &cfg.quadrature;
    if q.polar == 0 {
        return Err(config_error("[quadrature].polar must be >= 1 (got 0)"));
    }
    if q.azimuthal == 0 {
        return Err(config_error("[quadrature].azimuthal must be >= 1 (got 0)"));
    }
    if q.angles_per_set == 0 {
        return Err(config_error("[quadrature].angles_per_set must be >= 1 (got 0)"));
    }
    Ok(())
}

fn validate_material(cfg: &RawProblemConfig) -> Result<()> {
    let m = &cfg.material;
    if !(m.sigma_t > 0.0) {
        return Err(config_error(format!(
            "[material].sigma_t must be > 0 (got {})",
            m.sigma_t
        )));
    }
    if !(m.sigma_s >= 0.0) || m.sigma_s >= m.sigma_t {
        return Err(config_error(format!(
            "[material].sigma_s must satisfy 0 <= sigma_s < sigma_t (got {})",
            m.sigma_s
        )));
    }
    if !(m.source >= 0.0) {
        return Err(config_error(format!(
            "[material].source must be >= 0 (got {})",
            m.source
        )));
    }
    if m.groups == 0 {
        return Err(config_error("[material].groups must be >= 1 (got 0)"));
    }
    Ok(())
}

fn validate_boundaries(cfg: &RawProblemConfig) -> Result<()> {
    let dim = cfg.mesh.geometry.dimension();
    for name in cfg.boundary.keys() {
        match BOUNDARY_NAMES.iter().position(|b| b == name) {
            Some(id) if id < 2 * dim => {}
            Some(_) => {
                return Err(config_error(format!(
                    "boundary '{name}' does not exist for {:?} geometry",
                    cfg.mesh.geometry
                )));
            }
            None => {
                return Err(config_error(format!(
                    "unknown boundary '{name}' (expected one of {BOUNDARY_NAMES:?})"
                )));
            }
        }
    }
    Ok(())
}

fn validate_solver(cfg: &RawProblemConfig) -> Result<()> {
    let s = &cfg.solver;
    if s.max_iterations == 0 {
        return Err(config_error("[solver].max_iterations must be >= 1 (got 0)"));
    }
    if !(s.tolerance > 0.0) {
        return Err(config_error(format!(
            "[solver].tolerance must be > 0 (got {})",
            s.tolerance
        )));
    }
    Ok(())
}
