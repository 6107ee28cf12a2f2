//! Error types for the storage adapter
//!
//! This module provides a unified error handling system using `thiserror` for
//! all components of the crate.

use thiserror::Error;

/// The main error type for the storage adapter
#[derive(Error, Debug)]
pub enum Error {
    /// Storage operation errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Invalid input data
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// What was wrong with the input
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the bad setting
        message: String,
    },

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true when the error means the requested object does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Storage(StorageError::NotFound { .. }))
    }
}

/// Storage-specific error types
#[derive(Error, Debug)]
pub enum StorageError {
    /// The root directory could not be created or validated
    #[error("Storage initialization failed for {root}: {reason}")]
    Initialization {
        /// Root directory of the store
        root: String,
        /// Underlying failure
        reason: String,
    },

    /// Data could not be persisted under a key
    #[error("Storage write failed for {key}: {reason}")]
    Write {
        /// Key being written
        key: String,
        /// Underlying failure
        reason: String,
    },

    /// No object is stored under the key
    #[error("Resource not found: {key}")]
    NotFound {
        /// Key that was looked up
        key: String,
    },

    /// The key is empty, too long, escapes the root or contains invalid characters
    #[error("Invalid key {key:?}: {reason}")]
    InvalidKey {
        /// Rejected key
        key: String,
        /// Which rule the key broke
        reason: String,
    },

    /// No backend is registered for the scheme
    #[error("Unsupported storage scheme: {scheme}")]
    UnsupportedScheme {
        /// Requested scheme name
        scheme: String,
    },

    /// Permission denied
    #[error("Permission denied: {resource}")]
    PermissionDenied {
        /// Key or path access was denied to
        resource: String,
    },

    /// Failure that may succeed when retried
    #[error("Transient failure during {operation}: {reason}")]
    Transient {
        /// Operation that failed
        operation: String,
        /// Underlying failure
        reason: String,
    },

    /// Storage operation failed
    #[error("Storage operation failed: {operation}: {reason}")]
    OperationFailed {
        /// Operation that failed
        operation: String,
        /// Underlying failure
        reason: String,
    },
}

impl StorageError {
    /// Classify an I/O error raised while operating on `resource`
    pub fn from_io(operation: &str, resource: &str, err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            // A file standing where a parent directory should be.
            ErrorKind::NotFound | ErrorKind::NotADirectory => StorageError::NotFound {
                key: resource.to_string(),
            },
            ErrorKind::PermissionDenied => StorageError::PermissionDenied {
                resource: resource.to_string(),
            },
            ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock => {
                StorageError::Transient {
                    operation: operation.to_string(),
                    reason: err.to_string(),
                }
            }
            _ => StorageError::OperationFailed {
                operation: operation.to_string(),
                reason: err.to_string(),
            },
        }
    }

    /// Whether retrying the operation could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Transient { .. })
    }
}

/// Convenience type alias for Results
pub type Result<T> = std::result::Result<T, Error>;

/// Convenience type alias for Storage Results
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_display() {
        let storage_error = StorageError::NotFound {
            key: "missing.txt".to_string(),
        };
        let error = Error::Storage(storage_error);
        assert!(error.to_string().contains("Storage error"));
        assert!(error.to_string().contains("missing.txt"));
        assert!(error.is_not_found());
    }

    #[test]
    fn test_from_io_classification() {
        let err = StorageError::from_io("read", "a.txt", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, StorageError::NotFound { ref key } if key == "a.txt"));

        let err = StorageError::from_io(
            "open_file",
            "a.txt/b",
            io::Error::from(io::ErrorKind::NotADirectory),
        );
        assert!(matches!(err, StorageError::NotFound { ref key } if key == "a.txt/b"));

        let err = StorageError::from_io("read", "a.txt", io::Error::from(io::ErrorKind::Interrupted));
        assert!(err.is_transient());

        let err = StorageError::from_io(
            "write",
            "a.txt",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, StorageError::PermissionDenied { .. }));

        let err = StorageError::from_io("write", "a.txt", io::Error::other("disk full"));
        assert!(matches!(err, StorageError::OperationFailed { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_io_conversion() {
        let error: Error = io::Error::other("boom").into();
        assert!(error.to_string().contains("I/O error"));
        assert!(!error.is_not_found());
    }
}
