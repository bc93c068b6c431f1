//! Caching stream reader
//!
//! The public-facing component of the streaming subsystem. Each reader
//! owns one disk-backed cache, one pending read queue, and (while a
//! stream is being consumed) one background gobbler task, and exposes the
//! `start_reading` / `read` / `purge_client` / `delete` surface the
//! protocol layer drives.
//!
//! A reader moves through `Idle → Reading → {Finished | Errored}` and may
//! be reused for a new run of the same logical stream: a fresh
//! `start_reading` discards the previous run's cache and starts a new
//! generation.
//!
//! # Components
//!
//! - [`config`] - Reader tuning knobs
//! - [`core`] - The reader façade and its shared state

pub mod config;
pub mod core;

pub use config::ReaderConfig;
pub use core::{CachingStreamReader, ReaderPhase, ReaderStats};
