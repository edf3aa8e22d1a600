//! CLI argument definitions.
//!
//! All Clap derive structs for `roomkeeper` command-line parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::gateway::{BACK_END, DEFAULT_MAX_FRAME_SIZE};
use crate::observability::LogFormat;

// ============================================================================
// Root CLI
// ============================================================================

/// Coordinator for an escape room's device fleet.
#[derive(Parser, Debug)]
#[command(name = "roomkeeper", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log output format.
    #[arg(
        long,
        default_value = "human",
        global = true,
        env = "ROOMKEEPER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the coordinator, reading bus frames on stdin and writing them on stdout.
    Run(RunArgs),

    /// Validate a room configuration without starting.
    Validate(ValidateArgs),
}

// ============================================================================
// Run
// ============================================================================

/// Arguments for `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the room configuration (JSON).
    #[arg(short, long, env = "ROOMKEEPER_CONFIG")]
    pub config: PathBuf,

    /// Identity on the bus; origin of every outbound message.
    #[arg(long, default_value = BACK_END, env = "ROOMKEEPER_IDENTITY")]
    pub identity: String,

    /// Timer tick interval (e.g. `100ms`, `1s`).
    #[arg(long, default_value = "100ms", value_parser = humantime::parse_duration, env = "ROOMKEEPER_TICK")]
    pub tick: Duration,

    /// Expose Prometheus metrics on this port.
    #[arg(long, env = "ROOMKEEPER_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Maximum inbound frame size in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame_size: usize,

    /// Keep accepted configurations in memory only.
    #[arg(long)]
    pub no_persist: bool,
}

// ============================================================================
// Validate
// ============================================================================

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}
