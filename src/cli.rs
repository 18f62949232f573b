// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::SchedulingPolicy;

/// Command-line arguments for `sweepdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sweepdag",
    version,
    about = "Run distributed discrete-ordinates sweeps over a partitioned mesh.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the problem file (TOML).
    ///
    /// Default: `Sweep.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Sweep.toml")]
    pub config: String,

    /// Scheduling policy; overrides `[config].policy`.
    #[arg(long, value_enum, value_name = "POLICY")]
    pub policy: Option<PolicyArg>,

    /// Run this many plain sweeps instead of source iteration.
    #[arg(long, value_name = "N")]
    pub sweeps: Option<usize>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SWEEPDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the problem summary, but don't sweep.
    #[arg(long)]
    pub dry_run: bool,
}

/// Scheduling policy as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum PolicyArg {
    Fifo,
    DepthOfGraph,
}

impl From<PolicyArg> for SchedulingPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Fifo => SchedulingPolicy::Fifo,
            PolicyArg::DepthOfGraph => SchedulingPolicy::DepthOfGraph,
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
