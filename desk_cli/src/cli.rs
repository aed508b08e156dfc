//! CLI argument definitions and shared statics.

use clap::{ArgAction, ArgGroup, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "desk", version, about = "Standing desk controller")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/desk.toml")]
    pub config: PathBuf,

    /// Log as JSON lines and print results as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Move to a position and exit once the desk settles
    Move {
        /// Target position in percent of the calibrated range
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        target: u8,
        /// Give up if the desk has not settled within this many ms
        #[arg(long, value_name = "MS", default_value_t = 30_000)]
        timeout_ms: u64,
    },
    /// Keep the controller running until Ctrl-C
    Run {
        /// Optional initial target in percent
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        target: Option<u8>,
        /// Stop on its own after this many ms
        #[arg(long, value_name = "MS")]
        for_ms: Option<u64>,
    },
    /// Convert between native height and position percent
    #[command(group(ArgGroup::new("value").required(true).args(["height", "percent"])))]
    Convert {
        /// Height in native units
        #[arg(long)]
        height: Option<f64>,
        /// Position in percent
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: Option<u8>,
    },
    /// Validate config, connect once and disconnect
    SelfCheck,
}
