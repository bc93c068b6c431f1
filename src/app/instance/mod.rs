//! Job instance stream registry
//!
//! A service instance exposes a set of named output streams (stdout,
//! stderr, custom output files) plus service data elements such as the
//! exit status. This module ties one instance's streams and exit gate
//! together under its working directory: streams are registered by name,
//! read requests are routed to the owning reader, and a request against
//! an unknown name fails immediately (it is never queued).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::app::cache::StreamPathGenerator;
use crate::app::gate::ExitStatusGate;
use crate::app::queue::{ClientId, ReadOutcome, Tag};
use crate::app::reader::{CachingStreamReader, ReaderConfig};
use crate::errors::{InstanceError, InstanceResult};

/// One job instance's named streams and exit-status element
#[derive(Debug)]
pub struct JobInstance {
    /// Instance working directory; cache files live underneath it
    working_dir: PathBuf,
    /// Reader configuration applied to every stream of this instance
    reader_config: ReaderConfig,
    /// Streams by logical name
    streams: RwLock<HashMap<String, Arc<CachingStreamReader>>>,
    /// Single-resolution exit status
    exit_gate: ExitStatusGate,
}

impl JobInstance {
    /// Create an instance rooted at `working_dir`
    pub fn new(working_dir: impl Into<PathBuf>, reader_config: ReaderConfig) -> Self {
        let working_dir = working_dir.into();
        info!("Created job instance at {}", working_dir.display());
        Self {
            working_dir,
            reader_config,
            streams: RwLock::new(HashMap::new()),
            exit_gate: ExitStatusGate::new(),
        }
    }

    /// Instance working directory
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Exit-status gate, fed by the job-completion notification
    pub fn exit_gate(&self) -> &ExitStatusGate {
        &self.exit_gate
    }

    /// Register a named output stream
    ///
    /// Creates the stream's cache file under the instance working
    /// directory. Registering a name twice is rejected.
    pub async fn register_stream(
        &self,
        name: &str,
    ) -> InstanceResult<Arc<CachingStreamReader>> {
        StreamPathGenerator::validate_stream_name(name)?;

        let mut streams = self.streams.write().await;
        if streams.contains_key(name) {
            return Err(InstanceError::DuplicateStream {
                name: name.to_string(),
            });
        }

        let cache_path = StreamPathGenerator::cache_file_path(&self.working_dir, name);
        let reader =
            Arc::new(CachingStreamReader::create(cache_path, self.reader_config.clone()).await?);

        streams.insert(name.to_string(), Arc::clone(&reader));
        debug!("Registered stream '{}'", name);
        Ok(reader)
    }

    /// Look up a registered stream by name
    pub async fn stream(&self, name: &str) -> InstanceResult<Arc<CachingStreamReader>> {
        let streams = self.streams.read().await;
        streams
            .get(name)
            .cloned()
            .ok_or_else(|| InstanceError::StreamNotFound {
                name: name.to_string(),
            })
    }

    /// Names of all registered streams
    pub async fn stream_names(&self) -> Vec<String> {
        let streams = self.streams.read().await;
        let mut names: Vec<String> = streams.keys().cloned().collect();
        names.sort();
        names
    }

    /// Begin draining `source` into the named stream's cache
    pub async fn start_stream<S>(&self, name: &str, source: S) -> InstanceResult<()>
    where
        S: AsyncRead + Send + Unpin + 'static,
    {
        let reader = self.stream(name).await?;
        reader.start_reading(source).await?;
        Ok(())
    }

    /// Read from a named stream on behalf of a client
    ///
    /// An unknown stream name fails immediately with `StreamNotFound`;
    /// it is never queued.
    pub async fn read_stream(
        &self,
        name: &str,
        client: ClientId,
        tag: Tag,
        offset: u64,
        count: u32,
    ) -> InstanceResult<ReadOutcome> {
        let reader = self.stream(name).await?;
        Ok(reader.read(client, tag, offset, count).await?)
    }

    /// Record the job's exit status, resolving all queued requests
    pub async fn set_exit_status(&self, code: i32) -> InstanceResult<()> {
        self.exit_gate.set_value(code).await?;
        Ok(())
    }

    /// Wait for the job's exit status
    pub async fn wait_exit_status(&self, client: ClientId) -> InstanceResult<i32> {
        Ok(self.exit_gate.get(client).await?)
    }

    /// Read the exit status as a small virtual file
    ///
    /// The status is rendered in decimal; a read at offset zero returns
    /// the full contents, a read at or past the end returns EOF. Like
    /// any other read, the call suspends until the value exists.
    pub async fn read_exit_status(
        &self,
        client: ClientId,
        offset: u64,
        count: u32,
    ) -> InstanceResult<ReadOutcome> {
        let code = self.exit_gate.get(client).await?;
        let rendered = code.to_string().into_bytes();

        if offset >= rendered.len() as u64 {
            return Ok(ReadOutcome::Eof);
        }
        let start = offset as usize;
        let end = rendered.len().min(start + count as usize);
        Ok(ReadOutcome::Data(rendered[start..end].to_vec()))
    }

    /// Purge a disconnecting client from every stream and the exit gate
    pub async fn purge_client(&self, client: ClientId) -> usize {
        let mut purged = self.exit_gate.purge_client(client).await;
        let streams = self.streams.read().await;
        for reader in streams.values() {
            purged += reader.purge_client(client).await;
        }
        if purged > 0 {
            debug!("Purged {} requests for {} across instance", purged, client);
        }
        purged
    }

    /// Delete every stream's cache file
    pub async fn delete(&self) -> InstanceResult<()> {
        let streams = self.streams.read().await;
        for (name, reader) in streams.iter() {
            debug!("Deleting stream '{}'", name);
            reader.delete().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::{duplex, AsyncWriteExt};

    fn create_test_instance(temp_dir: &TempDir) -> JobInstance {
        JobInstance::new(temp_dir.path(), ReaderConfig::for_testing())
    }

    #[tokio::test]
    async fn test_register_and_read_stream() {
        let temp_dir = TempDir::new().unwrap();
        let instance = create_test_instance(&temp_dir);

        instance.register_stream("stdout").await.unwrap();

        let (mut producer, source) = duplex(64);
        instance.start_stream("stdout", source).await.unwrap();
        producer.write_all(b"job output").await.unwrap();
        drop(producer);

        let reader = instance.stream("stdout").await.unwrap();
        while !reader.phase().await.is_finished() {
            tokio::task::yield_now().await;
        }

        let outcome = instance
            .read_stream("stdout", ClientId(1), Tag(1), 0, 100)
            .await
            .unwrap();
        assert_eq!(outcome, ReadOutcome::Data(b"job output".to_vec()));
    }

    #[tokio::test]
    async fn test_unknown_stream_fails_immediately() {
        let temp_dir = TempDir::new().unwrap();
        let instance = create_test_instance(&temp_dir);

        let err = instance
            .read_stream("no-such-stream", ClientId(1), Tag(1), 0, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, InstanceError::StreamNotFound { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_stream_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let instance = create_test_instance(&temp_dir);

        instance.register_stream("stdout").await.unwrap();
        let err = instance.register_stream("stdout").await.unwrap_err();
        assert!(matches!(err, InstanceError::DuplicateStream { .. }));
    }

    #[tokio::test]
    async fn test_invalid_stream_name_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let instance = create_test_instance(&temp_dir);

        let err = instance.register_stream("../escape").await.unwrap_err();
        assert!(matches!(err, InstanceError::InvalidStreamName { .. }));
    }

    #[tokio::test]
    async fn test_exit_status_as_virtual_file() {
        let temp_dir = TempDir::new().unwrap();
        let instance = create_test_instance(&temp_dir);

        instance.set_exit_status(137).await.unwrap();

        let outcome = instance
            .read_exit_status(ClientId(1), 0, 100)
            .await
            .unwrap();
        assert_eq!(outcome, ReadOutcome::Data(b"137".to_vec()));

        // Offset past the rendered value reads as end of file.
        let outcome = instance.read_exit_status(ClientId(1), 3, 100).await.unwrap();
        assert_eq!(outcome, ReadOutcome::Eof);

        // Partial read honors offset and count.
        let outcome = instance.read_exit_status(ClientId(1), 1, 1).await.unwrap();
        assert_eq!(outcome, ReadOutcome::Data(b"3".to_vec()));
    }

    #[tokio::test]
    async fn test_stream_names_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let instance = create_test_instance(&temp_dir);

        instance.register_stream("stdout").await.unwrap();
        instance.register_stream("stderr").await.unwrap();
        instance.register_stream("output.dat").await.unwrap();

        assert_eq!(
            instance.stream_names().await,
            vec!["output.dat", "stderr", "stdout"]
        );
    }
}
