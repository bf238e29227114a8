use crate::error::{ErrorKind, Result};
use crate::key::CacheKey;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};

/// Content below this size is almost always an error or redirect page.
pub const DEFAULT_MIN_SIZE: usize = 256;

/// Two-tier content cache.
///
/// Reads try the `primary` directory first, then the `fallback` one. Writes
/// only ever go to `primary`. With a single directory configured it serves
/// as both tiers.
///
/// Writes land in a temporary sibling first and are renamed into place, so a
/// reader never sees a half-written file.
#[derive(Clone, Debug)]
pub struct ContentCache {
    primary: PathBuf,
    fallback: Option<PathBuf>,
}

impl ContentCache {
    /// Create a cache over up to two directories.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::NoDirectory`] if neither directory is given.
    pub fn new(primary: Option<PathBuf>, fallback: Option<PathBuf>) -> Result<Self> {
        let (primary, fallback) = match (primary, fallback) {
            (Some(primary), Some(fallback)) if primary != fallback => (primary, Some(fallback)),
            (Some(dir), _) | (None, Some(dir)) => (dir, None),
            (None, None) => exn::bail!(ErrorKind::NoDirectory),
        };
        Ok(Self { primary, fallback })
    }

    pub fn primary(&self) -> &Path {
        &self.primary
    }

    /// The fallback directory, which is the primary one when only one exists.
    pub fn fallback(&self) -> &Path {
        self.fallback.as_deref().unwrap_or(&self.primary)
    }

    /// Read cached content, or `None` if no tier has it.
    #[instrument(level = "debug", skip(self), fields(key = %key))]
    pub async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let relative = key.relative_path();
        for dir in self.tiers() {
            let path = dir.join(&relative);
            match fs::read(&path).await {
                Ok(content) => {
                    debug!(path = %path.display(), size = content.len(), "Cache hit");
                    return Ok(Some(content));
                },
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {},
                Err(err) => exn::bail!(ErrorKind::Io(path, err)),
            }
        }
        debug!("Cache miss");
        Ok(None)
    }

    /// `true` if any tier holds the key.
    pub async fn contains(&self, key: &CacheKey) -> bool {
        let relative = key.relative_path();
        for dir in self.tiers() {
            if fs::try_exists(dir.join(&relative)).await.unwrap_or(false) {
                return true;
            }
        }
        false
    }

    /// Store content in the primary directory if it is at least `min_size`
    /// bytes. Returns whether anything was written.
    #[instrument(level = "debug", skip(self, content), fields(key = %key, size = content.len()))]
    pub async fn put(&self, key: &CacheKey, content: &[u8], min_size: usize) -> Result<bool> {
        if content.len() < min_size {
            debug!(min_size, "Too small to cache");
            return Ok(false);
        }
        let path = self.primary.join(key.relative_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| ErrorKind::Io(parent.to_path_buf(), err))?;
        }
        let mut temporary = path.clone().into_os_string();
        temporary.push(".tmp");
        let temporary = PathBuf::from(temporary);
        if let Err(err) = fs::write(&temporary, content).await {
            _ = fs::remove_file(&temporary).await;
            exn::bail!(ErrorKind::Io(temporary, err));
        }
        fs::rename(&temporary, &path)
            .await
            .map_err(|err| ErrorKind::Io(path.clone(), err))?;
        Ok(true)
    }

    /// [`put`](Self::put) with [`DEFAULT_MIN_SIZE`].
    pub async fn put_default(&self, key: &CacheKey, content: &[u8]) -> Result<bool> {
        self.put(key, content, DEFAULT_MIN_SIZE).await
    }

    fn tiers(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.primary.as_path()).chain(self.fallback.as_deref())
    }
}
