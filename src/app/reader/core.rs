//! Core caching stream reader implementation
//!
//! All state shared between the gobbler and client reads (the cache's
//! committed length, the pending queue, the phase and its sticky fault)
//! lives behind one async mutex per reader: the single mutual-exclusion
//! domain that makes check-then-enqueue atomic with respect to new data
//! arriving. Cross-reader state is fully independent.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::io::AsyncRead;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::cache::StreamCache;
use crate::app::gobbler::StreamGobbler;
use crate::app::queue::{
    ClientId, PendingRead, PendingReadQueue, QueueStats, ReadOutcome, ReadRequest, Resolution, Tag,
    evaluate,
};
use crate::constants::requests;
use crate::errors::{StreamError, StreamFault, StreamResult};

use super::config::ReaderConfig;

/// Lifecycle phase of a stream reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderPhase {
    /// No stream attached yet (or deleted)
    Idle,
    /// A gobbler is actively draining the source
    Reading,
    /// The source reached end of stream; the cache holds the full output
    Finished,
    /// The stream failed; the fault is sticky until the next restart
    Errored(StreamFault),
}

impl ReaderPhase {
    /// Whether a gobbler is currently active
    pub fn is_reading(&self) -> bool {
        matches!(self, ReaderPhase::Reading)
    }

    /// Whether the source reached a normal end of stream
    pub fn is_finished(&self) -> bool {
        matches!(self, ReaderPhase::Finished)
    }

    /// The sticky fault, if the reader is errored
    pub fn fault(&self) -> Option<&StreamFault> {
        match self {
            ReaderPhase::Errored(fault) => Some(fault),
            _ => None,
        }
    }
}

/// Counters for one reader across all its generations
#[derive(Debug, Clone)]
pub struct ReaderStats {
    /// Read requests received
    pub total_reads: u64,
    /// Reads satisfied synchronously from the cache
    pub immediate_reads: u64,
    /// Reads that had to be queued
    pub queued_reads: u64,
    /// Reads answered with EOF
    pub eof_reads: u64,
    /// Reads answered with an error
    pub error_reads: u64,
    /// Stream generations started (`start_reading` calls)
    pub generations: u64,
    /// Reader creation time
    pub created_at: DateTime<Utc>,
}

impl ReaderStats {
    fn new() -> Self {
        Self {
            total_reads: 0,
            immediate_reads: 0,
            queued_reads: 0,
            eof_reads: 0,
            error_reads: 0,
            generations: 0,
            created_at: Utc::now(),
        }
    }
}

/// Shared state guarded by the reader's single lock
#[derive(Debug)]
pub(crate) struct ReaderState {
    /// Lifecycle phase (carries the sticky fault when errored)
    pub(crate) phase: ReaderPhase,
    /// Disk-backed byte store
    pub(crate) cache: StreamCache,
    /// Requests waiting for data, EOF, or an error
    pub(crate) queue: PendingReadQueue,
    /// Incremented on every restart or delete; a gobbler holding a stale
    /// generation stands down without touching the new run's state
    pub(crate) generation: u64,
    /// Handle of the active gobbler task, if any
    pub(crate) gobbler: Option<JoinHandle<()>>,
    /// Read counters
    pub(crate) stats: ReaderStats,
}

/// Build a cache fault from a cache-layer error without re-wrapping the
/// error's own prefix
fn cache_fault(e: StreamError) -> StreamFault {
    match e {
        StreamError::CacheIo { message } => StreamFault::cache(message),
        other => StreamFault::cache(other.to_string()),
    }
}

impl ReaderState {
    /// Append freshly gobbled bytes and wake every newly resolvable read
    pub(crate) async fn absorb(&mut self, bytes: &[u8]) -> StreamResult<()> {
        match self.cache.append(bytes).await {
            Ok(_) => {
                self.drain_and_fulfil().await;
                Ok(())
            }
            Err(e) => {
                let fault = cache_fault(e);
                self.record_fault(fault.clone()).await;
                Err(fault.to_error())
            }
        }
    }

    /// Record a terminal fault and flush it to every pending read
    pub(crate) async fn record_fault(&mut self, fault: StreamFault) {
        warn!("Stream fault recorded: {}", fault.message);
        self.phase = ReaderPhase::Errored(fault);
        self.drain_and_fulfil().await;
    }

    /// Mark a normal end of stream and resolve the remaining queue
    pub(crate) async fn finish(&mut self) {
        self.phase = ReaderPhase::Finished;
        self.drain_and_fulfil().await;
    }

    /// Re-evaluate the queue against the current state and fulfil, in
    /// FIFO order, every request that became resolvable
    pub(crate) async fn drain_and_fulfil(&mut self) {
        let committed_len = self.cache.committed_len();
        let finished = self.phase.is_finished();
        let fault = self.phase.fault().cloned();

        let ready = self.queue.drain_ready(committed_len, finished, fault.as_ref());
        if ready.is_empty() {
            return;
        }

        // A cache read failure mid-drain becomes the sticky fault for the
        // rest of this drain and for all later reads.
        let mut late_fault: Option<StreamFault> = None;

        for (pending, resolution) in ready {
            let result = if let Some(fault) = &late_fault {
                Err(fault.to_error())
            } else {
                match resolution {
                    Resolution::Data => {
                        let request = pending.request;
                        match self.cache.read_range(request.offset, request.count).await {
                            Ok(bytes) => Ok(ReadOutcome::Data(bytes)),
                            Err(e) => {
                                let fault = cache_fault(e);
                                late_fault = Some(fault.clone());
                                Err(fault.to_error())
                            }
                        }
                    }
                    Resolution::Eof => Ok(ReadOutcome::Eof),
                    Resolution::Error(fault) => Err(fault.to_error()),
                    Resolution::StillPending => continue,
                }
            };

            if pending.responder.send(result).is_err() {
                debug!(
                    "Dropping resolution for {} {}: caller went away",
                    pending.request.client, pending.request.tag
                );
            }
        }

        if let Some(fault) = late_fault {
            self.phase = ReaderPhase::Errored(fault.clone());
            for (pending, _) in self.queue.drain_ready(committed_len, false, Some(&fault)) {
                let _ = pending.responder.send(Err(fault.to_error()));
            }
        }
    }
}

/// Caching reader for one unbounded output stream
///
/// Owns one disk-backed cache, one pending read queue, and one gobbler
/// task per active generation. Clients read committed bytes at arbitrary
/// offsets while the stream is still producing; reads past the committed
/// length suspend until data arrives, the stream ends, or it fails.
#[derive(Debug)]
pub struct CachingStreamReader {
    config: ReaderConfig,
    cache_path: PathBuf,
    shared: Arc<Mutex<ReaderState>>,
}

impl CachingStreamReader {
    /// Create a reader backed by a cache file at `cache_path`
    ///
    /// # Errors
    ///
    /// Returns `StreamError::CacheIo` if the cache file cannot be created.
    pub async fn create(
        cache_path: impl Into<PathBuf>,
        config: ReaderConfig,
    ) -> StreamResult<Self> {
        if let Err(reason) = config.validate() {
            return Err(StreamError::IllegalState { reason });
        }

        let cache_path = cache_path.into();
        let cache = StreamCache::create(&cache_path).await?;

        info!("Created stream reader: {}", cache_path.display());

        Ok(Self {
            shared: Arc::new(Mutex::new(ReaderState {
                phase: ReaderPhase::Idle,
                cache,
                queue: PendingReadQueue::new(config.max_pending_reads),
                generation: 0,
                gobbler: None,
                stats: ReaderStats::new(),
            })),
            config,
            cache_path,
        })
    }

    /// Begin draining `source` into the cache
    ///
    /// Discards any previous run's cached bytes, clears the EOF/fault
    /// flags, and spawns a fresh gobbler generation.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::IllegalState` if a gobbler is already
    /// running, or if pending requests from a prior run have not been
    /// resolved or purged (a clean reset is required first).
    pub async fn start_reading<S>(&self, source: S) -> StreamResult<()>
    where
        S: AsyncRead + Send + Unpin + 'static,
    {
        let mut state = self.shared.lock().await;

        if state.phase.is_reading() {
            return Err(StreamError::IllegalState {
                reason: "stream is already being read".to_string(),
            });
        }
        if !state.queue.is_empty() {
            return Err(StreamError::IllegalState {
                reason: format!(
                    "{} pending requests remain from a previous run",
                    state.queue.len()
                ),
            });
        }

        state.cache.reset().await?;
        state.phase = ReaderPhase::Reading;
        state.generation += 1;
        state.stats.generations += 1;

        let generation = state.generation;
        let handle = StreamGobbler::spawn(
            source,
            Arc::clone(&self.shared),
            generation,
            self.config.gobble_buffer_size,
        );
        state.gobbler = Some(handle);

        info!(
            "Started reading generation {} into {}",
            generation,
            self.cache_path.display()
        );
        Ok(())
    }

    /// Read up to `count` bytes at `offset` on behalf of a client
    ///
    /// Resolves immediately when the offset lies below the committed
    /// length (with the count clamped to the committed range), when the
    /// stream has ended (EOF), or when it has failed (the sticky error).
    /// Otherwise the request is queued and this call suspends, with no
    /// timeout, until a later cache growth, end-of-stream, or error
    /// event resolves it, or `purge_client` removes it.
    pub async fn read(
        &self,
        client: ClientId,
        tag: Tag,
        offset: u64,
        count: u32,
    ) -> StreamResult<ReadOutcome> {
        let count = count.min(requests::MAX_READ_COUNT);
        let request = ReadRequest {
            client,
            tag,
            offset,
            count,
        };

        let receiver = {
            let mut state = self.shared.lock().await;
            state.stats.total_reads += 1;

            let committed_len = state.cache.committed_len();
            let finished = state.phase.is_finished();
            let fault = state.phase.fault().cloned();

            match evaluate(offset, committed_len, finished, fault.as_ref()) {
                Resolution::Data => {
                    return match state.cache.read_range(offset, count).await {
                        Ok(bytes) => {
                            state.stats.immediate_reads += 1;
                            Ok(ReadOutcome::Data(bytes))
                        }
                        Err(e) => {
                            state.stats.error_reads += 1;
                            let fault = cache_fault(e);
                            state.record_fault(fault.clone()).await;
                            Err(fault.to_error())
                        }
                    };
                }
                Resolution::Eof => {
                    state.stats.eof_reads += 1;
                    return Ok(ReadOutcome::Eof);
                }
                Resolution::Error(fault) => {
                    state.stats.error_reads += 1;
                    return Err(fault.to_error());
                }
                Resolution::StillPending => {
                    let (pending, receiver) = PendingRead::new(request);
                    state.queue.enqueue(pending)?;
                    state.stats.queued_reads += 1;
                    receiver
                }
            }
            // Lock released here: the request is registered, and any
            // append that happens from now on will drain it.
        };

        match receiver.await {
            Ok(result) => {
                let mut state = self.shared.lock().await;
                match &result {
                    Ok(ReadOutcome::Eof) => state.stats.eof_reads += 1,
                    Ok(ReadOutcome::Data(_)) => {}
                    Err(_) => state.stats.error_reads += 1,
                }
                result
            }
            // Responder dropped without a resolution: the request was
            // purged by a connection close.
            Err(_) => Err(StreamError::RequestPurged),
        }
    }

    /// Remove all of `client`'s pending requests without resolving them
    ///
    /// Called when the owning connection/session terminates. The cache is
    /// untouched; no response is produced for the closed connection.
    pub async fn purge_client(&self, client: ClientId) -> usize {
        let mut state = self.shared.lock().await;
        state.queue.purge_client(client)
    }

    /// Close and remove the backing cache file
    ///
    /// Safe to call mid-stream: the gobbler generation is retired, any
    /// pending requests are flushed with a cache fault rather than left
    /// dangling, and the reader returns to `Idle` ready for a fresh
    /// `start_reading`.
    pub async fn delete(&self) -> StreamResult<()> {
        let mut state = self.shared.lock().await;

        state.generation += 1;
        if let Some(handle) = state.gobbler.take() {
            handle.abort();
        }

        if !state.queue.is_empty() {
            let fault = StreamFault::cache("stream cache deleted".to_string());
            state.record_fault(fault).await;
        }

        state.cache.delete().await?;
        state.phase = ReaderPhase::Idle;

        info!("Deleted stream reader: {}", self.cache_path.display());
        Ok(())
    }

    /// Current lifecycle phase
    pub async fn phase(&self) -> ReaderPhase {
        self.shared.lock().await.phase.clone()
    }

    /// Bytes committed to the cache so far in the current generation
    pub async fn committed_len(&self) -> u64 {
        self.shared.lock().await.cache.committed_len()
    }

    /// Read counters for this reader
    pub async fn stats(&self) -> ReaderStats {
        self.shared.lock().await.stats.clone()
    }

    /// Pending-queue counters for this reader
    pub async fn queue_stats(&self) -> QueueStats {
        self.shared.lock().await.queue.stats().clone()
    }

    /// Location of the backing cache file
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::{AsyncWriteExt, duplex};

    async fn create_test_reader(temp_dir: &TempDir) -> CachingStreamReader {
        CachingStreamReader::create(
            temp_dir.path().join("streams").join("stdout.stream"),
            ReaderConfig::for_testing(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_immediate_read_from_cache() {
        let temp_dir = TempDir::new().unwrap();
        let reader = create_test_reader(&temp_dir).await;

        let (mut producer, source) = duplex(64);
        reader.start_reading(source).await.unwrap();

        producer.write_all(b"hello").await.unwrap();
        drop(producer);

        // Wait for the gobbler to finish the stream.
        while !reader.phase().await.is_finished() {
            tokio::task::yield_now().await;
        }

        let outcome = reader.read(ClientId(1), Tag(1), 0, 5).await.unwrap();
        assert_eq!(outcome, ReadOutcome::Data(b"hello".to_vec()));

        let stats = reader.stats().await;
        assert_eq!(stats.immediate_reads, 1);
    }

    #[tokio::test]
    async fn test_queued_read_resolves_when_data_arrives() {
        let temp_dir = TempDir::new().unwrap();
        let reader = Arc::new(create_test_reader(&temp_dir).await);

        let (mut producer, source) = duplex(64);
        reader.start_reading(source).await.unwrap();

        let pending = tokio::spawn({
            let reader = Arc::clone(&reader);
            async move { reader.read(ClientId(1), Tag(1), 0, 5).await }
        });

        // Give the read a chance to queue before any data exists.
        tokio::task::yield_now().await;

        producer.write_all(b"hello").await.unwrap();
        producer.flush().await.unwrap();

        let outcome = pending.await.unwrap().unwrap();
        assert_eq!(outcome, ReadOutcome::Data(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_read_past_end_returns_eof() {
        let temp_dir = TempDir::new().unwrap();
        let reader = create_test_reader(&temp_dir).await;

        let (mut producer, source) = duplex(64);
        reader.start_reading(source).await.unwrap();
        producer.write_all(b"hello").await.unwrap();
        drop(producer);

        while !reader.phase().await.is_finished() {
            tokio::task::yield_now().await;
        }

        let outcome = reader.read(ClientId(1), Tag(1), 5, 10).await.unwrap();
        assert_eq!(outcome, ReadOutcome::Eof);
        assert_eq!(reader.committed_len().await, 5);
    }

    #[tokio::test]
    async fn test_start_reading_twice_fails() {
        let temp_dir = TempDir::new().unwrap();
        let reader = create_test_reader(&temp_dir).await;

        let (_producer, source) = duplex(64);
        reader.start_reading(source).await.unwrap();

        let (_producer2, source2) = duplex(64);
        let err = reader.start_reading(source2).await.unwrap_err();
        assert!(matches!(err, StreamError::IllegalState { .. }));
    }

    #[tokio::test]
    async fn test_restart_discards_previous_generation() {
        let temp_dir = TempDir::new().unwrap();
        let reader = create_test_reader(&temp_dir).await;

        let (mut producer, source) = duplex(64);
        reader.start_reading(source).await.unwrap();
        producer.write_all(b"first run bytes").await.unwrap();
        drop(producer);

        while !reader.phase().await.is_finished() {
            tokio::task::yield_now().await;
        }

        // Second run: committed length restarts at zero and old bytes
        // are gone.
        let (mut producer, source) = duplex(64);
        reader.start_reading(source).await.unwrap();
        assert_eq!(reader.committed_len().await, 0);

        producer.write_all(b"xy").await.unwrap();
        drop(producer);
        while !reader.phase().await.is_finished() {
            tokio::task::yield_now().await;
        }

        let outcome = reader.read(ClientId(1), Tag(1), 0, 100).await.unwrap();
        assert_eq!(outcome, ReadOutcome::Data(b"xy".to_vec()));
        assert_eq!(reader.read(ClientId(1), Tag(2), 2, 1).await.unwrap(), ReadOutcome::Eof);
    }

    #[tokio::test]
    async fn test_purge_client_removes_pending() {
        let temp_dir = TempDir::new().unwrap();
        let reader = Arc::new(create_test_reader(&temp_dir).await);

        let (_producer, source) = duplex(64);
        reader.start_reading(source).await.unwrap();

        let pending = tokio::spawn({
            let reader = Arc::clone(&reader);
            async move { reader.read(ClientId(9), Tag(1), 0, 5).await }
        });

        // Let the request queue, then purge its client.
        loop {
            tokio::task::yield_now().await;
            if reader.queue_stats().await.current_pending == 1 {
                break;
            }
        }
        assert_eq!(reader.purge_client(ClientId(9)).await, 1);

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, StreamError::RequestPurged));
    }
}
