//! Error types for zipforge

use std::io;

/// Result type for zipforge operations
pub type Result<T> = std::result::Result<T, ZipError>;

/// Error types that can occur while writing a ZIP archive
#[derive(Debug)]
pub enum ZipError {
    /// I/O error from the underlying sink
    Io(io::Error),
    /// An operation was attempted in a state that forbids it, e.g. mutating
    /// `name` after the entry has started writing, or writing after close.
    InvalidState(String),
    /// A non-ZIP64 entry's compressed or uncompressed size crossed
    /// `2^32 - 1` while `zip64(false)` (the default) was in effect.
    SizeOverflow,
    /// A sanitized entry name was empty.
    InvalidFileName(String),
}

impl std::fmt::Display for ZipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZipError::Io(e) => write!(f, "I/O error: {}", e),
            ZipError::InvalidState(msg) => write!(f, "invalid state: {}", msg),
            ZipError::SizeOverflow => {
                write!(f, "entry size exceeded 2^32-1 without zip64 enabled")
            }
            ZipError::InvalidFileName(name) => write!(f, "invalid file name: {:?}", name),
        }
    }
}

impl std::error::Error for ZipError {}

impl From<io::Error> for ZipError {
    fn from(err: io::Error) -> Self {
        ZipError::Io(err)
    }
}
