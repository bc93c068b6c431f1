//! gridstream library
//!
//! Asynchronous output streaming for remote job-execution grid services.
//! Remote clients read the partial output of a still-running job through
//! `read(offset, count)` requests; reads past the data produced so far are
//! queued and resolved the moment new data, end-of-stream, or a failure
//! arrives. Single-resolution values such as the job's exit status follow
//! the same discipline through a one-shot gate.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use constants::*;

    #[test]
    fn test_constants_accessible() {
        assert_eq!(GOBBLE_BUFFER_SIZE, 8 * 1024);
        assert_eq!(STDOUT, "stdout");
        assert_eq!(STDERR, "stderr");
    }

    #[test]
    fn test_error_types() {
        let stream_error = errors::StreamError::SourceRead {
            message: "pipe closed".to_string(),
        };
        assert!(stream_error.is_sticky());

        let app_error = AppError::Stream(stream_error);
        assert_eq!(app_error.category(), "stream");
    }
}
