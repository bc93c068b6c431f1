//! Command-line argument parsing for gridstream
//!
//! This module defines the CLI structure using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// gridstream - stream a job's output through the grid caching layer
#[derive(Parser, Debug)]
#[command(
    name = "gridstream",
    version,
    about = "Run a command and stream its output through the grid caching layer",
    long_about = "Runs a local command while draining its stdout and stderr into disk-backed \
stream caches, follows the streams the way a remote grid client would, and reports the exit \
status once the job completes."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a command with cached output streaming
    Run(RunArgs),
}

/// Arguments for the run command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Instance working directory (defaults to a directory under the
    /// configured instance root)
    #[arg(long, value_name = "DIR")]
    pub instance_dir: Option<PathBuf>,

    /// Keep the cached stream files after the job completes
    #[arg(long)]
    pub keep_cache: bool,

    /// Do not echo the job's output while it runs
    #[arg(long)]
    pub no_follow: bool,

    /// The command to run, with its arguments
    #[arg(required = true, last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Determine the log level from verbosity flags
    pub fn log_level(&self) -> &'static str {
        if self.global.very_verbose {
            "debug"
        } else if self.global.verbose {
            "info"
        } else if self.global.quiet {
            "error"
        } else {
            "warn"
        }
    }
}
