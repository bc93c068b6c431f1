//! Core streaming subsystem for gridstream
//!
//! This module contains the components that let remote clients read the
//! partial, still-growing output of a running job: the disk-backed cache,
//! the pending read queue, the background gobbler, the caching reader
//! façade, the single-resolution exit-status gate, and the per-instance
//! stream registry.
//!
//! # Examples
//!
//! ```rust,no_run
//! use gridstream::app::{CachingStreamReader, ClientId, ReaderConfig, Tag};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let reader = CachingStreamReader::create(
//!     "/work/inst-7/streams/stdout.stream",
//!     ReaderConfig::default(),
//! )
//! .await?;
//!
//! // Attach the job's output; the gobbler drains it in the background.
//! let (source, _producer) = tokio::io::simplex(8 * 1024);
//! reader.start_reading(source).await?;
//!
//! // A read past the committed length suspends until data arrives,
//! // the stream ends, or it fails.
//! let outcome = reader.read(ClientId(1), Tag(1), 0, 8192).await?;
//! println!("got {} bytes", outcome.bytes().len());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod gate;
pub mod gobbler;
pub mod instance;
pub mod queue;
pub mod reader;

// Re-export main public API
pub use cache::{StreamCache, StreamPathGenerator};
pub use gate::ExitStatusGate;
pub use gobbler::StreamGobbler;
pub use instance::JobInstance;
pub use queue::{ClientId, PendingReadQueue, QueueStats, ReadOutcome, ReadRequest, Tag};
pub use reader::{CachingStreamReader, ReaderConfig, ReaderPhase, ReaderStats};
