//! Reader configuration

use serde::{Deserialize, Serialize};

use crate::constants::{gobbler, queue};

/// Tuning knobs for one caching stream reader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Read buffer size used by the gobbler when draining the source
    ///
    /// Larger buffers cost fewer syscalls but delay the moment new bytes
    /// become visible to pending readers.
    pub gobble_buffer_size: usize,
    /// Bound on simultaneously queued reads (0 = unbounded)
    pub max_pending_reads: usize,
}

impl ReaderConfig {
    /// Create a configuration with production defaults
    pub fn new() -> Self {
        Self {
            gobble_buffer_size: gobbler::GOBBLE_BUFFER_SIZE,
            max_pending_reads: queue::DEFAULT_MAX_PENDING_READS,
        }
    }

    /// Create a configuration optimized for testing
    ///
    /// A tiny gobble buffer forces multi-chunk appends even for short
    /// test payloads.
    pub fn for_testing() -> Self {
        Self {
            gobble_buffer_size: 4,
            max_pending_reads: 8,
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.gobble_buffer_size == 0 {
            return Err("gobble_buffer_size must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self::new()
    }
}
