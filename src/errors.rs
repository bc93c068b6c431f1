//! Error types for gridstream
//!
//! This module defines the error types for all components of the streaming
//! subsystem. Errors are designed to be actionable: a remote client must be
//! able to distinguish "stream ended normally" (an empty read result) from
//! "stream failed" (an explicit error reply).

use std::path::PathBuf;

use thiserror::Error;

/// Which side of the pipeline a terminal stream failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The source stream (the running process's output) failed mid-read
    Source,
    /// The local disk cache failed on write or read
    Cache,
}

/// Sticky terminal failure record for a stream
///
/// Once a gobbler records a fault, every pending and future read on that
/// stream resolves to the same error until the reader is restarted via a
/// fresh `start_reading`. Kept as a small cloneable record so it can be
/// stored in shared state and handed to any number of waiting requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFault {
    /// Failure origin
    pub kind: FaultKind,
    /// Human-readable failure description
    pub message: String,
}

impl StreamFault {
    /// Record a source-side failure
    pub fn source(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Source,
            message: message.into(),
        }
    }

    /// Record a cache-side failure
    pub fn cache(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Cache,
            message: message.into(),
        }
    }

    /// Convert the fault into the error returned to a reader
    pub fn to_error(&self) -> StreamError {
        match self.kind {
            FaultKind::Source => StreamError::SourceRead {
                message: self.message.clone(),
            },
            FaultKind::Cache => StreamError::CacheIo {
                message: self.message.clone(),
            },
        }
    }
}

/// Stream reading and caching errors
#[derive(Error, Debug)]
pub enum StreamError {
    /// The underlying process/source stream failed mid-read
    #[error("source stream read failed: {message}")]
    SourceRead { message: String },

    /// Local disk cache write/read failure (disk full, permissions)
    #[error("stream cache I/O failed: {message}")]
    CacheIo { message: String },

    /// Invalid use of the reader API (e.g. `start_reading` while running)
    #[error("illegal reader state: {reason}")]
    IllegalState { reason: String },

    /// A request with this (client, tag) pair is already outstanding
    #[error("duplicate outstanding tag {tag} for client {client}")]
    DuplicateTag { client: u64, tag: u16 },

    /// The owning connection closed while this request was queued
    #[error("read request purged by connection close")]
    RequestPurged,
}

impl StreamError {
    /// Whether this error flips the reader into its sticky ERRORED phase
    ///
    /// Sticky errors are repeated to every pending and future read until
    /// the next `start_reading`. Usage errors are returned synchronously
    /// to the caller and never reach the queue.
    pub fn is_sticky(&self) -> bool {
        matches!(
            self,
            StreamError::SourceRead { .. } | StreamError::CacheIo { .. }
        )
    }
}

/// Exit-status gate errors
#[derive(Error, Debug)]
pub enum GateError {
    /// `set_value` called on a gate that already resolved
    #[error("exit status already resolved to {value}")]
    AlreadyResolved { value: i32 },

    /// The waiting request was purged before the gate resolved
    #[error("gate request purged by connection close")]
    Purged,
}

/// Job-instance registry errors
#[derive(Error, Debug)]
pub enum InstanceError {
    /// No stream with this name exists on the instance
    #[error("no such stream: {name}")]
    StreamNotFound { name: String },

    /// A stream with this name is already registered
    #[error("stream already registered: {name}")]
    DuplicateStream { name: String },

    /// Invalid stream name (empty or contains path separators)
    #[error("invalid stream name: {name}")]
    InvalidStreamName { name: String },

    /// Error from an individual stream reader
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Error from the exit-status gate
    #[error(transparent)]
    Gate(#[from] GateError),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// I/O error reading configuration
    #[error("I/O error reading configuration")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Stream error
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Gate error
    #[error(transparent)]
    Gate(#[from] GateError),

    /// Instance error
    #[error(transparent)]
    Instance(#[from] InstanceError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Get error category for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Stream(_) => "stream",
            AppError::Gate(_) => "gate",
            AppError::Instance(_) => "instance",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Stream result type alias
pub type StreamResult<T> = std::result::Result<T, StreamError>;

/// Gate result type alias
pub type GateResult<T> = std::result::Result<T, GateError>;

/// Instance result type alias
pub type InstanceResult<T> = std::result::Result<T, InstanceError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
