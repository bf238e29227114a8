//! Archive Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. VFS failures underneath an archive
//! operation are kept as children.

use derive_more::{Display, Error};

/// An archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Nothing at this identifier, neither in the VFS nor in its archive.
    #[display("object not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// The content could not be read or probed for modules.
    #[display("failed to analyze {_0}")]
    ArchiveAnalysisFailed(#[error(not(source))] String),
    /// The codec rejected the content or subpath.
    #[display("failed to open module {_0}")]
    CodecOpenFailed(#[error(not(source))] String),
    /// Additional files a module needs could not be supplied.
    #[display("unresolved additional files: {}", _0.join(", "))]
    AdditionalFileUnresolved(#[error(not(source))] Vec<String>),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ArchiveAnalysisFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(
            ErrorKind::AdditionalFileUnresolved(vec!["a.smp".into(), "b.smp".into()]).to_string(),
            "unresolved additional files: a.smp, b.smp"
        );
        assert_eq!(
            ErrorKind::CodecOpenFailed("file:///x.pt3".into()).to_string(),
            "failed to open module file:///x.pt3"
        );
    }
}
