//! Cache file path generation
//!
//! Cache files are named deterministically from the owning job instance's
//! working directory and the stream's logical name, so a restarted service
//! finds (and replaces) the same file the previous run used.

use std::path::{Path, PathBuf};

use crate::constants::streams;
use crate::errors::{InstanceError, InstanceResult};

/// Path generation utility for stream cache files
pub struct StreamPathGenerator;

impl StreamPathGenerator {
    /// Get the cache file path for a named stream of an instance
    ///
    /// Structure: `{instance_dir}/streams/{name}.stream`
    pub fn cache_file_path(instance_dir: &Path, stream_name: &str) -> PathBuf {
        let mut path = instance_dir.to_path_buf();
        path.push(streams::CACHE_SUBDIR);
        path.push(format!(
            "{}.{}",
            stream_name,
            streams::CACHE_FILE_EXTENSION
        ));
        path
    }

    /// Validate a logical stream name
    ///
    /// Names become file names, so path separators and traversal
    /// components are rejected outright.
    pub fn validate_stream_name(name: &str) -> InstanceResult<()> {
        let invalid = name.is_empty()
            || name.len() > streams::MAX_STREAM_NAME_LENGTH
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
            || name.contains('\0');

        if invalid {
            return Err(InstanceError::InvalidStreamName {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_file_path_layout() {
        let path = StreamPathGenerator::cache_file_path(Path::new("/work/inst-7"), "stdout");
        assert_eq!(path, PathBuf::from("/work/inst-7/streams/stdout.stream"));
    }

    #[test]
    fn test_cache_file_path_custom_stream() {
        let path = StreamPathGenerator::cache_file_path(Path::new("/work/inst-7"), "output.dat");
        assert_eq!(
            path,
            PathBuf::from("/work/inst-7/streams/output.dat.stream")
        );
    }

    #[test]
    fn test_valid_stream_names() {
        assert!(StreamPathGenerator::validate_stream_name("stdout").is_ok());
        assert!(StreamPathGenerator::validate_stream_name("stderr").is_ok());
        assert!(StreamPathGenerator::validate_stream_name("output.dat").is_ok());
    }

    #[test]
    fn test_invalid_stream_names() {
        assert!(StreamPathGenerator::validate_stream_name("").is_err());
        assert!(StreamPathGenerator::validate_stream_name("..").is_err());
        assert!(StreamPathGenerator::validate_stream_name("a/b").is_err());
        assert!(StreamPathGenerator::validate_stream_name("a\\b").is_err());

        let long_name = "x".repeat(streams::MAX_STREAM_NAME_LENGTH + 1);
        assert!(StreamPathGenerator::validate_stream_name(&long_name).is_err());
    }
}
