//! Prelude module for the gridstream library
//!
//! Re-exports the most commonly used items so typical integrations need a
//! single `use gridstream::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use gridstream::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let instance = JobInstance::new("/work/inst-7", ReaderConfig::default());
//!     instance.register_stream("stdout").await?;
//!
//!     // Continue with stream attachment...
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Essential streaming components
pub use crate::app::{
    CachingStreamReader, ClientId, ExitStatusGate, JobInstance, ReadOutcome, ReaderConfig,
    ReaderPhase, ReaderStats, StreamCache, Tag,
};

// Error types callers match on
pub use crate::errors::{GateError, InstanceError, StreamError};

// Application configuration
pub use crate::config::AppConfig;
