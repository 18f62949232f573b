// src/lib.rs

pub mod cli;
pub mod comm;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod mesh;
pub mod quadrature;
pub mod sweep;
pub mod types;

use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::ProblemConfig;
use crate::config::loader::load_and_validate;
use crate::engine::{ClusterReport, RunMode, run_cluster};
use crate::mesh::grid::BOUNDARY_NAMES;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - problem loading and validation
/// - CLI overrides
/// - one scheduler per partition on the blocking pool
/// - the run summary on stdout
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let mut cfg = load_and_validate(&config_path)?;

    if let Some(policy) = args.policy {
        cfg.config.policy = policy.into();
    }

    if args.dry_run {
        print_dry_run(&cfg)?;
        return Ok(());
    }

    let mode = match args.sweeps {
        Some(n) => RunMode::Sweeps(n),
        None => RunMode::SourceIteration,
    };
    info!(config = %config_path.display(), ?mode, "running problem");

    let report = run_cluster(&cfg, mode).await?;
    print_summary(&cfg, &report);
    Ok(())
}

/// Print the problem as understood after validation.
fn print_dry_run(cfg: &ProblemConfig) -> Result<()> {
    let quadrature = cfg.build_quadrature()?;

    println!("sweepdag dry-run");
    println!("  config.policy = {}", cfg.config.policy);
    println!("  config.epsilon = {:e}", cfg.config.epsilon);
    println!("  config.message_face_limit = {}", cfg.config.message_face_limit);
    println!("  config.channel_capacity = {}", cfg.config.channel_capacity);
    println!();

    println!("mesh:");
    println!("  geometry: {:?}", cfg.grid.geometry);
    println!("  cells: {:?} ({} total)", cfg.grid.cells, cfg.grid.num_cells());
    println!("  extent: {:?}", cfg.grid.extent);
    println!("  partitions: {:?} ({} locations)", cfg.grid.partitions, cfg.num_locations());
    println!();

    println!(
        "quadrature: {} directions, up to {} per angle set",
        quadrature.len(),
        cfg.quadrature.angles_per_set
    );
    println!(
        "material: sigma_t = {}, sigma_s = {}, source = {}, groups = {}",
        cfg.material.sigma_t, cfg.material.sigma_s, cfg.material.source, cfg.material.groups
    );
    println!("boundaries:");
    let dim = cfg.grid.geometry.dimension();
    for (name, kind) in BOUNDARY_NAMES.iter().zip(cfg.boundary_kinds()).take(2 * dim) {
        println!("  - {name}: {kind:?}");
    }

    debug!("dry-run complete (no sweeps)");
    Ok(())
}

fn print_summary(cfg: &ProblemConfig, report: &ClusterReport) {
    let flux = report.global_flux();
    let (min, max) = flux
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    let mean = if flux.is_empty() {
        0.0
    } else {
        flux.iter().sum::<f64>() / flux.len() as f64
    };

    println!("sweepdag: {} locations, policy {}", report.locations.len(), cfg.config.policy);
    println!(
        "  iterations: {} (converged: {})",
        report.iterations(),
        report.converged()
    );
    println!("  scalar flux: min {min:.6e}, mean {mean:.6e}, max {max:.6e}");
    for loc in &report.locations {
        let d = &loc.diagnostics;
        println!(
            "  location {}: {} cells, {} angle sets, {} stages, removed edges {} local / {} global, \
             boundary faces {} in / {} out, compute ratio {:.3}",
            loc.location,
            loc.global_ids.len(),
            d.num_angle_sets,
            d.max_stages,
            d.local_edges_removed,
            d.global_edges_removed,
            d.boundary_faces.incoming,
            d.boundary_faces.outgoing,
            loc.timings.ratio()
        );
    }
}
