/*!
 * Error types for Cascade
 */

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CascadeError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Error, Debug)]
pub enum CascadeError {
    /// Source file or directory not found
    #[error("Source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// Target cannot receive the requested sources
    #[error("Invalid target {}: {reason}", .path.display())]
    InvalidTarget { path: PathBuf, reason: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Worker pool could not be brought up or has lost all workers
    #[error("Parallel processing error: {0}")]
    Parallel(String),

    /// A single transfer failed; carried inside results, never fatal
    #[error("Transfer failed: {0}")]
    TransferFailed(String),
}

impl CascadeError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        if self.is_fatal() {
            EXIT_FATAL
        } else {
            EXIT_PARTIAL
        }
    }

    /// Check if this error should abort the whole batch
    pub fn is_fatal(&self) -> bool {
        match self {
            CascadeError::Config(_)
            | CascadeError::Parallel(_)
            | CascadeError::InvalidTarget { .. } => true,

            CascadeError::SourceNotFound(_)
            | CascadeError::Io(_)
            | CascadeError::TransferFailed(_) => false,
        }
    }

    /// Get error category for logging and structured output
    pub fn category(&self) -> ErrorCategory {
        match self {
            CascadeError::SourceNotFound(_) | CascadeError::InvalidTarget { .. } => {
                ErrorCategory::Validation
            }
            CascadeError::Io(_) => ErrorCategory::IoError,
            CascadeError::Config(_) => ErrorCategory::Configuration,
            CascadeError::Parallel(_) => ErrorCategory::Concurrency,
            CascadeError::TransferFailed(_) => ErrorCategory::Transfer,
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Path validation errors
    Validation,
    /// I/O operation errors
    IoError,
    /// Configuration errors
    Configuration,
    /// Worker pool errors
    Concurrency,
    /// Per-object transfer errors
    Transfer,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::IoError => write!(f, "io"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Concurrency => write!(f, "concurrency"),
            ErrorCategory::Transfer => write!(f, "transfer"),
        }
    }
}

impl From<toml::de::Error> for CascadeError {
    fn from(err: toml::de::Error) -> Self {
        CascadeError::Config(format!("TOML parse error: {}", err))
    }
}

impl From<toml::ser::Error> for CascadeError {
    fn from(err: toml::ser::Error) -> Self {
        CascadeError::Config(format!("TOML encode error: {}", err))
    }
}

impl From<serde_json::Error> for CascadeError {
    fn from(err: serde_json::Error) -> Self {
        CascadeError::Config(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors() {
        assert!(CascadeError::Config("bad".to_string()).is_fatal());
        assert!(CascadeError::Parallel("no workers".to_string()).is_fatal());
        assert!(CascadeError::InvalidTarget {
            path: PathBuf::from("/tmp/file"),
            reason: "not a directory".to_string(),
        }
        .is_fatal());
    }

    #[test]
    fn test_non_fatal_errors() {
        assert!(!CascadeError::Io(io::Error::other("test")).is_fatal());
        assert!(!CascadeError::SourceNotFound(PathBuf::from("/nope")).is_fatal());
        assert!(!CascadeError::TransferFailed("short write".to_string()).is_fatal());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(CascadeError::Config("x".to_string()).exit_code(), EXIT_FATAL);
        assert_eq!(
            CascadeError::TransferFailed("x".to_string()).exit_code(),
            EXIT_PARTIAL
        );
    }

    #[test]
    fn test_error_display() {
        let err = CascadeError::SourceNotFound(PathBuf::from("/data/missing.bin"));
        assert_eq!(err.to_string(), "Source not found: /data/missing.bin");

        let err = CascadeError::InvalidTarget {
            path: PathBuf::from("/data/file"),
            reason: "not a directory".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid target /data/file: not a directory");
    }

    #[test]
    fn test_io_conversion() {
        let err: CascadeError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, CascadeError::Io(_)));
        assert_eq!(err.category(), ErrorCategory::IoError);
    }

    #[test]
    fn test_toml_conversion() {
        let parse: std::result::Result<toml::Table, toml::de::Error> = toml::from_str("= nope");
        let err: CascadeError = parse.unwrap_err().into();
        assert!(matches!(err, CascadeError::Config(_)));
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Validation.to_string(), "validation");
        assert_eq!(ErrorCategory::Concurrency.to_string(), "concurrency");
        assert_eq!(ErrorCategory::Transfer.to_string(), "transfer");
    }
}
