//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a scan failure.
///
/// Each variant identifies the subsystem that failed, allowing callers to
/// inspect the error tree without matching on opaque strings.
///
/// ### Dependency Errors
/// - [`ErrorKind::Vfs`]
/// - [`ErrorKind::Archive`]
/// - [`ErrorKind::Playlist`]
///
/// ### Operational Errors
/// - [`ErrorKind::Pipeline`]
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Resolving, listing or reading an object failed.
    Vfs,
    /// Analyzing a file or detecting its modules failed.
    Archive,
    /// A playlist file could not be parsed.
    Playlist,
    /// The persistence side of the pipeline is gone.
    Pipeline,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Vfs)
    }
}
