// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{ProblemConfig, RawProblemConfig};
use crate::errors::Result;

/// Read and deserialize a problem file without semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawProblemConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    let raw: RawProblemConfig = toml::from_str(&contents)?;
    Ok(raw)
}

/// Read, deserialize and validate a problem file.
///
/// This is the entry point the CLI uses; everything downstream works with
/// the validated [`ProblemConfig`].
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ProblemConfig> {
    let raw = load_from_path(&path)?;
    ProblemConfig::try_from(raw)
}
