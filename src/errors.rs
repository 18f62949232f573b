// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! The first four variants are the fatal scheduler conditions; the rest cover
//! configuration, IO and the communicator layer.

use thiserror::Error;

use crate::types::LocationId;

/// Which graph a cycle-resolution failure was raised for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphScope {
    /// Cells of a single partition.
    Local,
    /// Partitions of the whole mesh.
    Global,
}

#[derive(Error, Debug)]
pub enum SweepError {
    #[error(
        "Connectivity error on location {location}: {detail} (neighbor location {neighbor_location})"
    )]
    ConnectivityError {
        location: LocationId,
        neighbor_location: LocationId,
        detail: String,
    },

    #[error("Cycle resolution failed for {scope:?} graph after {passes} passes; removed edges: {edges:?}")]
    CycleResolutionFailure {
        scope: GraphScope,
        passes: usize,
        edges: Vec<(usize, usize)>,
    },

    #[error(
        "Communication stall on location {location} after {attempts} idle polls; pending locations: {pending:?}"
    )]
    CommunicationStall {
        location: LocationId,
        attempts: usize,
        pending: Vec<LocationId>,
    },

    #[error(
        "Buffer overrun in angle set {angle_set}: {requested} messages requested, negotiated maximum is {negotiated}"
    )]
    BufferOverrun {
        angle_set: usize,
        requested: usize,
        negotiated: usize,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Mesh error: {0}")]
    MeshError(String),

    #[error("Communicator error: {0}")]
    CommError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SweepError>;
