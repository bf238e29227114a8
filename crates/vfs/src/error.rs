//! VFS Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Backends raise their own error kinds
//! as children of these, so the tree still shows what went wrong deep down
//! while callers only ever match on [`ErrorKind`].

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// A VFS error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for VFS operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// No backend knows about the object.
    #[display("object not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Text could not be parsed as an identifier, or an identifier was built
    /// from invalid parts.
    #[display("invalid identifier: {_0}")]
    InvalidIdentifier(#[error(not(source))] String),
    /// The object exists but is not the expected kind (e.g. reading a directory).
    #[display("unexpected object kind: {_0}")]
    WrongKind(#[error(not(source))] String),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// The device has no usable network connection. Offer the user a specific
    /// message instead of a generic failure.
    #[display("no network connectivity")]
    NoConnectivity,
    /// Remote content exceeded the configured size cap.
    #[display("content too large")]
    TooLarge,
    /// Remote host or transport failure.
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// Backend-specific error
    #[display("backend error: {_0}")]
    Backend(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Shorthand for [`ErrorKind::NotFound`] from anything printable.
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::NoConnectivity | Self::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exn::ResultExt;

    #[test]
    fn error_kind_display() {
        assert_eq!(
            ErrorKind::not_found("file:///nowhere").to_string(),
            "object not found: file:///nowhere"
        );
        assert_eq!(ErrorKind::NoConnectivity.to_string(), "no network connectivity");
        assert_eq!(ErrorKind::TooLarge.to_string(), "content too large");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(ErrorKind::NoConnectivity.is_retryable());
        assert!(ErrorKind::Network("timeout".into()).is_retryable());
        assert!(!ErrorKind::TooLarge.is_retryable());
        assert!(!ErrorKind::not_found("x").is_retryable());
    }

    #[test]
    fn error_from_io() {
        let result: std::result::Result<(), IoError> =
            Err(IoError::new(std::io::ErrorKind::PermissionDenied, "nope"));
        let err: Result<()> = result.or_raise(|| ErrorKind::Backend("local".into()));
        assert!(matches!(&*err.unwrap_err(), ErrorKind::Backend(name) if name == "local"));
    }
}
