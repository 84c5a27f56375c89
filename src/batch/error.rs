//! Error types for batch processing.

use std::path::PathBuf;

use crate::CrosswalkError;
use thiserror::Error;

/// Result type for batch operations.
pub type BatchResult<T> = Result<T, BatchError>;

/// Errors that can occur during batch processing.
#[derive(Error, Debug)]
pub enum BatchError {
    /// The input directory could not be listed.
    #[error("Cannot read directory {}: {source}", path.display())]
    Directory {
        /// Directory that was requested.
        path: PathBuf,
        /// The underlying error.
        source: CrosswalkError,
    },

    /// A clip could not be processed. Recorded in the report; never aborts a batch.
    #[error("Error processing {}: {source}", path.display())]
    Clip {
        /// Position of the clip in the directory listing.
        index: usize,
        /// Path of the clip.
        path: PathBuf,
        /// The underlying error.
        source: CrosswalkError,
    },

    /// The batch was cancelled.
    #[error("Batch cancelled after {processed} files")]
    Cancelled {
        /// Files handled before cancellation.
        processed: usize,
    },

    /// Parallel processing error.
    #[cfg(feature = "parallel-processing")]
    #[error("Parallel processing error: {message}")]
    ParallelError {
        /// Description of the failure.
        message: String,
    },
}

impl BatchError {
    /// Create a new clip error.
    pub fn clip(index: usize, path: impl Into<PathBuf>, source: CrosswalkError) -> Self {
        Self::Clip {
            index,
            path: path.into(),
            source,
        }
    }

    /// Create a new parallel processing error.
    #[cfg(feature = "parallel-processing")]
    pub fn parallel_error(message: impl Into<String>) -> Self {
        Self::ParallelError {
            message: message.into(),
        }
    }
}
