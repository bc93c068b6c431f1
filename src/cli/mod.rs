//! Command-line interface for gridstream
//!
//! The CLI exercises the streaming subsystem end-to-end without any
//! network transport: it runs a local command, gobbles its output
//! through caching stream readers, follows the streams the way a remote
//! client would, and reports the exit status through the gate.
//!
//! # Components
//!
//! - [`args`] - Argument parsing structures (clap derive)
//! - [`commands`] - Command handlers

pub mod args;
pub mod commands;

pub use args::{Cli, Commands, GlobalArgs, RunArgs};
pub use commands::handle_run;
