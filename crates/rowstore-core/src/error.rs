//! Error types for RowStore operations
//!
//! Operation-local errors (`ColumnOutOfRange`, `ValueNotFound`, `MalformedRow`,
//! `Encode`) go back to the immediate caller and leave the row set unchanged.
//! `Persistence` errors come from the background flush thread and are fatal
//! to it; they are never retried.

use std::path::PathBuf;

use thiserror::Error;

/// RowStore error types with detailed context
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A scan reached a row shorter than the requested column
    #[error("column {column} is out of range for row {row_index} with {row_len} fields")]
    ColumnOutOfRange {
        /// Requested zero-based column index
        column: usize,
        /// Number of fields in the offending row
        row_len: usize,
        /// Position of the offending row in the row set
        row_index: usize,
    },

    /// A targeted lookup, update, or delete matched zero rows
    #[error("no row has {value:?} in column {column}")]
    ValueNotFound {
        /// Column that was scanned
        column: usize,
        /// Value that was searched for
        value: String,
    },

    /// A stored row, a supplied row, or a snapshot line could not be decoded
    #[error("{}", malformed_message(.line, .reason))]
    MalformedRow {
        /// One-based line in the snapshot file, when decoding from disk
        line: Option<usize>,
        /// Description of what was wrong
        reason: String,
    },

    /// A record could not be converted into a row
    #[error("record could not be encoded: {reason}")]
    Encode {
        /// Description from the codec
        reason: String,
    },

    /// Truncate, seek, write, sync, or close failed on the backing file
    #[error("{}", persistence_message(.path, .kind, .message))]
    Persistence {
        /// The file path where the error occurred
        path: Option<PathBuf>,
        /// The underlying I/O error kind
        kind: std::io::ErrorKind,
        /// Human-readable description
        message: String,
    },

    /// The operating system refused to start the flush thread
    #[error("failed to spawn persistence worker: {message}")]
    WorkerSpawn {
        /// Spawn failure description
        message: String,
    },

    /// The flush thread panicked before reporting a result
    #[error("persistence worker panicked")]
    WorkerPanicked,

    /// Configuration rejected by `Config::validate`
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Which parameter was rejected and why
        reason: String,
    },
}

fn malformed_message(line: &Option<usize>, reason: &str) -> String {
    match line {
        Some(line) => format!("malformed row at line {}: {}", line, reason),
        None => format!("malformed row: {}", reason),
    }
}

fn persistence_message(
    path: &Option<PathBuf>,
    kind: &std::io::ErrorKind,
    message: &str,
) -> String {
    match path {
        Some(path) => {
            format!("persistence failure in {}: {} ({})", path.display(), message, kind)
        }
        None => format!("persistence failure: {} ({})", message, kind),
    }
}

impl StoreError {
    /// Build a `Persistence` error from an I/O error with file context.
    pub fn persistence(path: &std::path::Path, err: &std::io::Error, action: &str) -> Self {
        StoreError::Persistence {
            path: Some(path.to_path_buf()),
            kind: err.kind(),
            message: format!("{}: {}", action, err),
        }
    }

    /// Shorthand for a `MalformedRow` not tied to a file line.
    pub fn malformed(reason: impl Into<String>) -> Self {
        StoreError::MalformedRow { line: None, reason: reason.into() }
    }

    /// Shorthand for an `Encode` error.
    pub fn encode(reason: impl Into<String>) -> Self {
        StoreError::Encode { reason: reason.into() }
    }

    /// True for errors raised by the backing file rather than by an operation.
    pub fn is_persistence(&self) -> bool {
        matches!(self, StoreError::Persistence { .. })
    }
}

/// Convert std::io::Error to StoreError::Persistence
impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Persistence {
            path: None,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for RowStore operations
pub type StoreResult<T> = Result<T, StoreError>;
