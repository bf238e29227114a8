//! Command Line Error Types

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("configuration")]
    Config,
    /// Opening the cache, the network client or the playlist database.
    #[display("startup")]
    Setup,
    #[display("bad target `{_0}`")]
    Target(#[error(not(source))] String),
    #[display("could not open `{_0}`")]
    Resolve(#[error(not(source))] String),
    #[display("output")]
    Io,
    #[display("scan")]
    Scan,
    #[display("playlist")]
    Playlist,
}

impl ErrorKind {
    /// Returns `true` if running the same command again might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Resolve(_) | Self::Scan)
    }
}
