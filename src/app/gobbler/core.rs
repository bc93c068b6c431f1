//! Core stream gobbler implementation
//!
//! The gobbler reads the source outside the reader lock (a slow producer
//! must not block client reads) and takes the lock only to append and
//! drain. The committed length is therefore advanced strictly after the
//! bytes are on disk, and every pending read is re-evaluated before the
//! lock is released again.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::app::reader::core::ReaderState;
use crate::errors::StreamFault;

/// Background worker draining one source stream into the cache
///
/// Exactly one gobbler generation is active per reader at a time; the
/// reader enforces this in `start_reading`. A gobbler that observes a
/// newer generation (the reader was restarted or deleted underneath it)
/// stands down without mutating state.
pub struct StreamGobbler;

impl StreamGobbler {
    /// Spawn the gobbler task for one reader generation
    pub fn spawn<S>(
        source: S,
        shared: Arc<Mutex<ReaderState>>,
        generation: u64,
        buffer_size: usize,
    ) -> JoinHandle<()>
    where
        S: AsyncRead + Send + Unpin + 'static,
    {
        tokio::spawn(Self::run(source, shared, generation, buffer_size))
    }

    /// Drain the source until end of stream, an I/O failure, or a
    /// generation change
    async fn run<S>(
        mut source: S,
        shared: Arc<Mutex<ReaderState>>,
        generation: u64,
        buffer_size: usize,
    ) where
        S: AsyncRead + Send + Unpin,
    {
        debug!("Gobbler generation {} starting", generation);
        let mut buf = vec![0u8; buffer_size];
        let mut total: u64 = 0;

        loop {
            match source.read(&mut buf).await {
                // End of stream: no more data will ever arrive.
                Ok(0) => {
                    let mut state = shared.lock().await;
                    if state.generation != generation {
                        debug!("Gobbler generation {} superseded, exiting", generation);
                        return;
                    }
                    state.finish().await;
                    state.gobbler = None;
                    info!(
                        "Gobbler generation {} finished after {} bytes",
                        generation, total
                    );
                    return;
                }
                Ok(n) => {
                    let mut state = shared.lock().await;
                    if state.generation != generation {
                        debug!("Gobbler generation {} superseded, exiting", generation);
                        return;
                    }
                    if state.absorb(&buf[..n]).await.is_err() {
                        // absorb recorded the cache fault and flushed the
                        // queue; nothing left for this generation to do.
                        state.gobbler = None;
                        return;
                    }
                    total += n as u64;
                }
                Err(e) => {
                    let mut state = shared.lock().await;
                    if state.generation != generation {
                        debug!("Gobbler generation {} superseded, exiting", generation);
                        return;
                    }
                    state
                        .record_fault(StreamFault::source(format!(
                            "read from source failed after {} bytes: {}",
                            total, e
                        )))
                        .await;
                    state.gobbler = None;
                    return;
                }
            }
        }
    }
}
