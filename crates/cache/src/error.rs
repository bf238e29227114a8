//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Key would escape the cache directory or is otherwise unusable.
    #[display("invalid cache key: {_0}")]
    InvalidKey(#[error(not(source))] String),
    /// Neither a primary nor a fallback directory was configured.
    #[display("no cache directory available")]
    NoDirectory,
    /// Underlying I/O error
    #[display("I/O error on {}: {_1}", _0.display())]
    Io(#[error(not(source))] PathBuf, #[error(source)] IoError),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(..))
    }
}
