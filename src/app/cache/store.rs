//! Append-only disk store with committed-length tracking
//!
//! The store holds the bytes produced so far by one stream. Appends land
//! at the current committed length and the length is advanced only after
//! the bytes are flushed, so a reader that observes a committed length of
//! `L` can always read every byte below `L`. The committed length never
//! decreases within one generation of the store; `reset` starts a fresh
//! generation at length zero.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::errors::{StreamError, StreamResult};

/// Append-only persistent byte store backing one stream
#[derive(Debug)]
pub struct StreamCache {
    /// Backing file location
    path: PathBuf,
    /// Append handle; `None` once the cache has been deleted
    writer: Option<File>,
    /// Bytes durably written and readable
    committed_len: u64,
}

impl StreamCache {
    /// Create a fresh, empty cache at `path`
    ///
    /// Any existing file at that location is truncated (restart
    /// semantics: a new run of the same logical stream discards the
    /// previous run's bytes). Parent directories are created as needed.
    pub async fn create(path: impl Into<PathBuf>) -> StreamResult<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| cache_io(&path, "create cache directory", e))?;
        }

        let writer = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .await
            .map_err(|e| cache_io(&path, "create cache file", e))?;

        debug!("Created stream cache file: {}", path.display());

        Ok(Self {
            path,
            writer: Some(writer),
            committed_len: 0,
        })
    }

    /// Bytes committed so far
    pub fn committed_len(&self) -> u64 {
        self.committed_len
    }

    /// Backing file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append bytes at the current committed length
    ///
    /// Returns the new committed length. The length is advanced only
    /// after the write has been flushed, so concurrent readers (who
    /// observe the length under the owning reader's lock) never see a
    /// length covering bytes that are not yet readable.
    pub async fn append(&mut self, bytes: &[u8]) -> StreamResult<u64> {
        let writer = self.writer.as_mut().ok_or_else(|| StreamError::CacheIo {
            message: format!("cache deleted: {}", self.path.display()),
        })?;

        writer
            .write_all(bytes)
            .await
            .map_err(|e| cache_io(&self.path, "append", e))?;
        writer
            .flush()
            .await
            .map_err(|e| cache_io(&self.path, "flush", e))?;

        self.committed_len += bytes.len() as u64;
        Ok(self.committed_len)
    }

    /// Read up to `max_count` bytes starting at `offset`
    ///
    /// Valid for `offset < committed_len`; returns exactly
    /// `min(max_count, committed_len - offset)` bytes. The count is
    /// clamped to the committed range rather than trusting the caller's
    /// requested count to be available. An `offset` at or past the
    /// committed length yields an empty result.
    pub async fn read_range(&self, offset: u64, max_count: u32) -> StreamResult<Vec<u8>> {
        if offset >= self.committed_len {
            return Ok(Vec::new());
        }

        let available = self.committed_len - offset;
        let len = (max_count as u64).min(available) as usize;

        // Committed bytes are immutable, so a short-lived read handle
        // cannot race the append handle.
        let mut reader = File::open(&self.path)
            .await
            .map_err(|e| cache_io(&self.path, "open for read", e))?;
        reader
            .seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| cache_io(&self.path, "seek", e))?;

        let mut buf = vec![0u8; len];
        reader
            .read_exact(&mut buf)
            .await
            .map_err(|e| cache_io(&self.path, "read", e))?;

        Ok(buf)
    }

    /// Discard all cached bytes and start a fresh empty store
    pub async fn reset(&mut self) -> StreamResult<()> {
        self.close_writer();

        let writer = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .await
            .map_err(|e| cache_io(&self.path, "reset cache file", e))?;

        self.writer = Some(writer);
        self.committed_len = 0;
        debug!("Reset stream cache: {}", self.path.display());
        Ok(())
    }

    /// Close and remove the backing file
    ///
    /// Safe to call mid-stream: subsequent appends fail with a cache
    /// error, which the owning reader treats as an orderly shutdown.
    pub async fn delete(&mut self) -> StreamResult<()> {
        self.close_writer();
        self.committed_len = 0;

        match fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!("Deleted stream cache file: {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!(
                    "Failed to delete stream cache file {}: {}",
                    self.path.display(),
                    e
                );
                Err(cache_io(&self.path, "delete", e))
            }
        }
    }

    fn close_writer(&mut self) {
        self.writer = None;
    }
}

/// Map an I/O failure into the cache error carried up to readers
fn cache_io(path: &Path, operation: &str, err: std::io::Error) -> StreamError {
    StreamError::CacheIo {
        message: format!("{} failed for {}: {}", operation, path.display(), err),
    }
}
