// src/config/mod.rs

//! Problem configuration for sweepdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a problem file from disk (`loader.rs`).
//! - Validate it into a [`ProblemConfig`] (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{
    BoundaryConfig, ConfigSection, MaterialSection, MeshSection, ProblemConfig,
    QuadratureSection, RawProblemConfig, SolverSection,
};
