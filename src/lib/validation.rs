//! Input validation utilities
//!
//! Common validation functions for command-line parameters and file paths
//! with consistent error messages. All checks run before any stage starts,
//! so a bad configuration never leaves partial outputs behind.

use std::path::Path;

use crate::errors::{FusepipeError, Result};

/// Validate that a mandatory input file exists and is a non-empty regular file.
///
/// # Arguments
/// * `path` - Path to validate
/// * `role` - Human-readable description of the file (e.g., "genome index")
///
/// # Errors
/// Returns an error if the file does not exist, is not a regular file, or is empty
///
/// # Example
/// ```
/// use fusepipe_lib::validation::validate_input_file;
///
/// let result = validate_input_file("/nonexistent/genome.gem", "genome index");
/// assert!(result.is_err());
/// ```
pub fn validate_input_file<P: AsRef<Path>>(path: P, role: &str) -> Result<()> {
    let path_ref = path.as_ref();
    let metadata = match path_ref.metadata() {
        Ok(metadata) => metadata,
        Err(_) => {
            return Err(FusepipeError::MissingInput {
                role: role.to_string(),
                path: path_ref.to_path_buf(),
                reason: "file does not exist".to_string(),
            });
        }
    };
    if !metadata.is_file() {
        return Err(FusepipeError::MissingInput {
            role: role.to_string(),
            path: path_ref.to_path_buf(),
            reason: "not a regular file".to_string(),
        });
    }
    if metadata.len() == 0 {
        return Err(FusepipeError::MissingInput {
            role: role.to_string(),
            path: path_ref.to_path_buf(),
            reason: "file is empty".to_string(),
        });
    }
    Ok(())
}

/// Validate that a directory option points at an existing directory.
///
/// # Errors
/// Returns an error naming `option` if the path is missing or not a directory
pub fn validate_dir_exists<P: AsRef<Path>>(path: P, option: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !path_ref.is_dir() {
        return Err(FusepipeError::InvalidParameter {
            parameter: option.to_string(),
            reason: format!("'{}' is not an existing directory", path_ref.display()),
        });
    }
    Ok(())
}

/// Validate that the sample identifier is usable as a file-name stem.
///
/// # Errors
/// Returns an error if the identifier is empty or contains a path separator
pub fn validate_sample_id(sample: &str) -> Result<()> {
    if sample.is_empty() {
        return Err(FusepipeError::InvalidParameter {
            parameter: "--sample".to_string(),
            reason: "sample identifier must not be empty".to_string(),
        });
    }
    if sample.contains('/') || sample.contains('\\') {
        return Err(FusepipeError::InvalidParameter {
            parameter: "--sample".to_string(),
            reason: format!("sample identifier must not contain path separators, got: '{sample}'"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_missing_file_rejected() {
        let result = validate_input_file("/nonexistent/file.bam", "alignment");
        assert!(matches!(result, Err(FusepipeError::MissingInput { .. })));
    }

    #[test]
    fn test_empty_file_rejected() {
        let file = NamedTempFile::new().unwrap();
        let result = validate_input_file(file.path(), "alignment");
        let err = result.unwrap_err();
        assert!(format!("{err}").contains("file is empty"));
    }

    #[test]
    fn test_nonempty_file_accepted() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "content").unwrap();
        assert!(validate_input_file(file.path(), "alignment").is_ok());
    }

    #[test]
    fn test_directory_rejected_as_input_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = validate_input_file(dir.path(), "annotation").unwrap_err();
        assert!(format!("{err}").contains("not a regular file"));
    }

    #[test]
    fn test_sample_id() {
        assert!(validate_sample_id("S1").is_ok());
        assert!(validate_sample_id("").is_err());
        assert!(validate_sample_id("a/b").is_err());
    }

    #[test]
    fn test_dir_exists() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(validate_dir_exists(dir.path(), "--output-dir").is_ok());
        assert!(validate_dir_exists("/nonexistent/dir", "--output-dir").is_err());
    }
}
