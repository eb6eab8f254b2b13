//! Centralized error types for msg2eml.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the msg2eml library.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("MSG file not found: {0}")]
    FileNotFound(PathBuf),

    /// The file is not an OLE2 compound document.
    #[error("File is not an OLE2 compound document: {path} ({reason})")]
    NotCompoundFile { path: PathBuf, reason: String },

    /// The compound file has no MSG property stream at its root.
    #[error("Compound file has no MSG property stream: {0}")]
    MissingPropertyStream(PathBuf),

    /// Compressed RTF could not be decompressed.
    #[error("Compressed RTF error: {0}")]
    Rtf(String),

    /// Building or serializing the MIME tree failed.
    #[error("MIME assembly error: {0}")]
    Assembly(String),

    /// Reading or converting one file panicked.
    #[error("Converter panicked: {0}")]
    Panicked(String),

    /// An invalid path was provided.
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Convenience alias for `Result<T, ConvertError>`.
pub type Result<T> = std::result::Result<T, ConvertError>;

impl ConvertError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (prefer `ConvertError::io`).
impl From<std::io::Error> for ConvertError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
