//! Cache keys: `{backend}/{backend-specific path}`.

use crate::error::{ErrorKind, Result};
use std::fmt::{Display, Formatter};
use std::path::{Component, Path, PathBuf};

/// Short backend ids that used to be written under a longer directory name.
///
/// Renaming a backend must not orphan everything it cached, so lookups keep
/// using the historical directory.
const COMPAT_IDS: &[(&str, &str)] = &[
    ("amp", "amp.dascene.net"),
    ("joshw", "joshw.info"),
    ("modarchive", "modarchive.org"),
    ("modland", "ftp.modland.com"),
    ("vgmrips", "vgmrips.net"),
    ("zxart", "www.zxart.ee"),
    ("zxtunes", "www.zxtunes.com"),
];

/// Directory name used on disk for a backend id.
///
/// ```
/// use trove_cache::compat_id;
///
/// assert_eq!(compat_id("amp"), "amp.dascene.net");
/// assert_eq!(compat_id("brand-new"), "brand-new");
/// ```
pub fn compat_id(backend: &str) -> &str {
    COMPAT_IDS
        .iter()
        .find(|(id, _)| *id == backend)
        .map(|(_, legacy)| *legacy)
        .unwrap_or(backend)
}

/// Location of one cached object, relative to any cache directory.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    backend: String,
    path: PathBuf,
}

impl CacheKey {
    /// Build a key, rejecting anything that could escape the cache directory.
    pub fn new(backend: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let backend = backend.into();
        if backend.is_empty() || backend.contains(['/', '\\', '\0']) || backend.starts_with('.') {
            exn::bail!(ErrorKind::InvalidKey(backend));
        }
        let path = validate(path.as_ref())?;
        Ok(Self { backend, path })
    }

    /// Split `"backend/some/path"` at the first `/`.
    pub fn parse(text: &str) -> Result<Self> {
        match text.split_once('/') {
            Some((backend, path)) => Self::new(backend, path),
            None => exn::bail!(ErrorKind::InvalidKey(text.to_string())),
        }
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path relative to a cache directory, with the backend id remapped.
    pub fn relative_path(&self) -> PathBuf {
        Path::new(compat_id(&self.backend)).join(&self.path)
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.backend, self.path.display())
    }
}

/// Normalise a key path and make sure it never leaves the cache root.
fn validate(path: &Path) -> Result<PathBuf> {
    let invalid = || ErrorKind::InvalidKey(path.display().to_string());
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(invalid());
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(invalid()),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(invalid());
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(invalid()),
        false => Ok(components.into_iter().collect()),
    }
}
