//! Playlist Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A playlist error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for playlist operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// A stored row could not be turned back into an item.
    #[display("invalid playlist data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
    /// A playlist file could not be parsed.
    #[display("malformed {_0} playlist")]
    Malformed(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database)
    }
}
