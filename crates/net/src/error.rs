//! Network Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A network error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for network operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The device is offline. Tell the user, don't blame the server.
    #[display("no network connectivity")]
    NoConnectivity,
    /// Content is bigger than the configured cap.
    #[display("content exceeds {limit} bytes")]
    TooLarge { limit: usize },
    /// Server answered with a non-success status.
    #[display("HTTP status {_0}")]
    Status(#[error(not(source))] u16),
    /// Connection, TLS or protocol failure while online.
    #[display("transport error")]
    Transport,
    /// Nothing to fetch from.
    #[display("no sources to fetch from")]
    NoSources,
    /// HTTP client could not be set up.
    #[display("invalid client configuration")]
    Configuration,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NoConnectivity | Self::Transport => true,
            Self::Status(code) => *code >= 500,
            _ => false,
        }
    }

    /// Failures that say nothing about the host that was asked.
    pub fn is_host_independent(&self) -> bool {
        matches!(self, Self::NoConnectivity | Self::TooLarge { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::NoConnectivity, true)]
    #[case(ErrorKind::Transport, true)]
    #[case(ErrorKind::Status(503), true)]
    #[case(ErrorKind::Status(404), false)]
    #[case(ErrorKind::TooLarge { limit: 1 }, false)]
    fn test_retryable(#[case] kind: ErrorKind, #[case] expected: bool) {
        assert_eq!(kind.is_retryable(), expected);
    }
}
