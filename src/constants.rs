//! Application constants for gridstream
//!
//! This module centralizes all constants used throughout the streaming
//! subsystem, organized by functional domain for maintainability.

/// Stream naming and cache file layout
pub mod streams {
    /// Logical name of the standard-output stream
    pub const STDOUT: &str = "stdout";

    /// Logical name of the standard-error stream
    pub const STDERR: &str = "stderr";

    /// Name of the exit-status service data element
    pub const EXIT_STATUS: &str = "exitCode";

    /// Subdirectory of the instance working directory holding cache files
    pub const CACHE_SUBDIR: &str = "streams";

    /// File extension for stream cache files
    pub const CACHE_FILE_EXTENSION: &str = "stream";

    /// Maximum length of a stream name
    pub const MAX_STREAM_NAME_LENGTH: usize = 128;
}

/// Gobbler (source-draining) configuration
pub mod gobbler {
    /// Read buffer size for draining a source stream (8 KiB)
    ///
    /// Larger buffers reduce syscall overhead but delay visibility of new
    /// data to pending readers; smaller buffers do the opposite.
    pub const GOBBLE_BUFFER_SIZE: usize = 8 * 1024;
}

/// Pending read queue configuration
pub mod queue {
    /// Default bound on queued reads per stream (0 = unbounded)
    pub const DEFAULT_MAX_PENDING_READS: usize = 1024;
}

/// Read request limits
pub mod requests {
    /// Maximum byte count a single read request may ask for (1 MiB)
    ///
    /// Mirrors the maximum message payload the transport layer will carry;
    /// larger requests are clamped, not rejected.
    pub const MAX_READ_COUNT: u32 = 1024 * 1024;
}

/// Logging and debugging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "info";
}

/// CLI follow-mode behavior
pub mod follow {
    /// Chunk size requested per read when following a stream
    pub const FOLLOW_READ_COUNT: u32 = 16 * 1024;
}

// Re-export commonly used constants for convenience
pub use gobbler::GOBBLE_BUFFER_SIZE;
pub use queue::DEFAULT_MAX_PENDING_READS;
pub use streams::{STDERR, STDOUT};
