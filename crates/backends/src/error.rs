//! Lifting lower-level errors into VFS errors.
//!
//! Backends answer every call with a [`trove_vfs::Error`]; the cache, network
//! and playlist errors are kept as children so the tree still shows the cause.

use exn::ResultExt;
use trove_vfs::{ErrorKind, Result};

pub(crate) trait LiftExt<T> {
    fn lift(self) -> Result<T>;
}

impl<T> LiftExt<T> for trove_net::Result<T> {
    fn lift(self) -> Result<T> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => {
                let kind = match &*err {
                    trove_net::ErrorKind::NoConnectivity => ErrorKind::NoConnectivity,
                    trove_net::ErrorKind::TooLarge { .. } => ErrorKind::TooLarge,
                    other => ErrorKind::Network(other.to_string()),
                };
                Err(err).or_raise(|| kind)
            },
        }
    }
}

impl<T> LiftExt<T> for trove_cache::error::Result<T> {
    fn lift(self) -> Result<T> {
        self.or_raise(|| ErrorKind::Backend("content cache".into()))
    }
}

impl<T> LiftExt<T> for trove_playlist::error::Result<T> {
    fn lift(self) -> Result<T> {
        self.or_raise(|| ErrorKind::Backend("playlist store".into()))
    }
}

/// Map filesystem errors so "not there" stays distinguishable.
pub(crate) fn map_io_error(err: std::io::Error, path: &std::path::Path) -> ErrorKind {
    match err.kind() {
        std::io::ErrorKind::NotFound => ErrorKind::not_found(path.display()),
        _ => ErrorKind::Io(err),
    }
}
