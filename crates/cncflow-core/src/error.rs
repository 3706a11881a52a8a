//! Error handling for cncflow
//!
//! Provides error types for each layer the job-control core touches:
//! - Controller errors (command dispatch)
//! - Outline errors (background outline generation)
//! - File errors (program upload and recent-file loading)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Controller error type
///
/// Represents failures handing a command to the controller link.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// Controller is not connected
    #[error("Controller not connected")]
    NotConnected,

    /// Buffer overflow - too many commands queued
    #[error("Buffer overflow: {message}")]
    BufferOverflow {
        /// A message describing the buffer overflow.
        message: String,
    },
}

/// Outline error type
///
/// Raised by the outline channel while a background computation is
/// pending or finishing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutlineError {
    /// The backend could not produce an outline
    #[error("Outline backend failed: {reason}")]
    Backend {
        /// The reason reported by the backend.
        reason: String,
    },

    /// The computation did not finish in time
    #[error("Outline generation timed out after {timeout_ms}ms")]
    TimedOut {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// The worker task panicked or was cancelled
    #[error("Outline worker failed: {reason}")]
    WorkerFailed {
        /// The reason the worker stopped.
        reason: String,
    },
}

/// File error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileError {
    /// A recent-file entry no longer resolves to a file
    #[error("Unable to load file - file may have been moved or renamed.")]
    MissingRecentFile,

    /// The upload collaborator reported a failure
    #[error("Unable to upload {name}: {reason}")]
    UploadFailed {
        /// Program name as given to the uploader.
        name: String,
        /// The reason for the upload failure.
        reason: String,
    },
}

/// Main error type for cncflow
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Controller error
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// Outline error
    #[error(transparent)]
    Outline(#[from] OutlineError),

    /// File error
    #[error(transparent)]
    File(#[from] FileError),
}

impl Error {
    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Outline(OutlineError::TimedOut { .. }))
    }

    /// Check if this is a controller error
    pub fn is_controller_error(&self) -> bool {
        matches!(self, Error::Controller(_))
    }

    /// Check if this is an outline error
    pub fn is_outline_error(&self) -> bool {
        matches!(self, Error::Outline(_))
    }

    /// Check if this is a file error
    pub fn is_file_error(&self) -> bool {
        matches!(self, Error::File(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        let err: Error = ControllerError::NotConnected.into();
        assert!(err.is_controller_error());
        assert!(!err.is_timeout());

        let err: Error = OutlineError::TimedOut { timeout_ms: 500 }.into();
        assert!(err.is_outline_error());
        assert!(err.is_timeout());
        assert_eq!(
            err.to_string(),
            "Outline generation timed out after 500ms"
        );
    }

    #[test]
    fn test_missing_recent_file_message() {
        let err: Error = FileError::MissingRecentFile.into();
        assert!(err.is_file_error());
        assert_eq!(
            err.to_string(),
            "Unable to load file - file may have been moved or renamed."
        );
    }

    #[test]
    fn test_upload_failed_names_program() {
        let err = FileError::UploadFailed {
            name: "bracket.nc".to_string(),
            reason: "disk full".to_string(),
        };
        assert_eq!(err.to_string(), "Unable to upload bracket.nc: disk full");
    }
}
