//! Custom error types for fusepipe operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for fusepipe operations
pub type Result<T> = std::result::Result<T, FusepipeError>;

/// Error type for fusepipe operations
#[derive(Error, Debug)]
pub enum FusepipeError {
    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// A mandatory input file is missing or unusable
    #[error("Missing {role} '{path}': {reason}")]
    MissingInput {
        /// What the file was supposed to be (e.g., "genome index")
        role: String,
        /// Path that was checked
        path: PathBuf,
        /// Explanation of the problem
        reason: String,
    },

    /// File content error
    #[error("Invalid {file_type} file '{path}': {reason}")]
    InvalidFormat {
        /// Type of file (e.g., "orientation stats", "candidate matrix")
        file_type: String,
        /// Path to the file
        path: String,
        /// Explanation of the problem
        reason: String,
    },

    /// A pipeline stage failed; the run is aborted
    #[error("Stage '{stage}' failed: {reason}")]
    StageFailed {
        /// Name of the failing stage
        stage: String,
        /// Explanation of the failure
        reason: String,
    },

    /// The library-type classifier could not reach a decision
    #[error(
        "Cannot infer the library protocol from read orientations \
         (mate1-sense {mate1}%, mate2-sense {mate2}%); \
         rerun with --library-protocol"
    )]
    IndeterminateLibrary {
        /// Truncated percentage of mate1-sense pairs
        mate1: u64,
        /// Truncated percentage of mate2-sense pairs
        mate2: u64,
    },

    /// Copying a reference file into the scratch directory failed
    #[error("Failed to stage {role} '{path}': {source}")]
    Staging {
        /// Which reference role was being staged
        role: String,
        /// The source path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// An external tool could not be started
    #[error("Failed to start '{command}': {source}")]
    ToolSpawn {
        /// The resolved command line
        command: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// An external tool exited abnormally
    #[error("Command '{command}' {status}")]
    ToolExit {
        /// The resolved command line
        command: String,
        /// The exit status, as reported by the OS
        status: String,
    },

    /// Any other I/O failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter() {
        let error = FusepipeError::InvalidParameter {
            parameter: "--threads".to_string(),
            reason: "must be an unsigned integer, got: '4.0'".to_string(),
        };
        let msg = format!("{error}");
        assert!(msg.contains("Invalid parameter '--threads'"));
        assert!(msg.contains("4.0"));
    }

    #[test]
    fn test_missing_input() {
        let error = FusepipeError::MissingInput {
            role: "genome index".to_string(),
            path: PathBuf::from("/data/genome.gem"),
            reason: "file does not exist".to_string(),
        };
        let msg = format!("{error}");
        assert!(msg.contains("Missing genome index '/data/genome.gem'"));
    }

    #[test]
    fn test_stage_failed() {
        let error = FusepipeError::StageFailed {
            stage: "remap-unmapped".to_string(),
            reason: "expected output is missing or empty".to_string(),
        };
        let msg = format!("{error}");
        assert!(msg.contains("Stage 'remap-unmapped' failed"));
    }

    #[test]
    fn test_indeterminate_library() {
        let error = FusepipeError::IndeterminateLibrary { mate1: 65, mate2: 20 };
        let msg = format!("{error}");
        assert!(msg.contains("65%"));
        assert!(msg.contains("--library-protocol"));
    }
}
