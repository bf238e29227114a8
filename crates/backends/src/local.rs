//! Local filesystem root.
//!
//! Lists the configured mount points at the top and resolves any absolute
//! `file:` URI below them (or anywhere else; mounts are a starting point, not
//! a jail). All I/O goes through `tokio::fs`.

use crate::error::map_io_error;
use async_trait::async_trait;
use exn::OptionExt;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tokio::fs;
use tracing::{debug, instrument};
use trove_vfs::capability::{self, Extension, ids};
use trove_vfs::{Dir, Entry, ErrorKind, File, Object, Result, Root, Url, Visitor, format};

const SCHEME: &str = "file";
const ICON: &str = "local";

pub struct LocalRoot {
    mounts: Vec<PathBuf>,
    this: Weak<LocalRoot>,
}

impl LocalRoot {
    /// Mount points must be absolute; they don't have to exist yet.
    pub fn new(mounts: impl IntoIterator<Item = impl Into<PathBuf>>) -> Result<Arc<Self>> {
        let mounts: Vec<PathBuf> = mounts.into_iter().map(Into::into).collect();
        if let Some(relative) = mounts.iter().find(|mount| !mount.is_absolute()) {
            exn::bail!(ErrorKind::InvalidIdentifier(relative.display().to_string()));
        }
        Ok(Arc::new_cyclic(|this| Self {
            mounts,
            this: this.clone(),
        }))
    }

    pub fn mounts(&self) -> &[PathBuf] {
        &self.mounts
    }

    fn root_uri() -> Url {
        Url::parse("file:///").unwrap_or_else(|_| unreachable!("static file uri"))
    }

    /// Turn a path plus its metadata into a node. Anything that is neither a
    /// file nor a directory (sockets, broken links) is `None`.
    fn node(path: PathBuf, metadata: &Metadata) -> Option<Entry> {
        if metadata.is_dir() {
            Some(Entry::Dir(Arc::new(LocalDir::new(path))))
        } else if metadata.is_file() {
            Some(Entry::File(Arc::new(LocalFile {
                path,
                size: metadata.len(),
            })))
        } else {
            None
        }
    }

    async fn lookup(path: &Path) -> Result<Option<Entry>> {
        match fs::metadata(path).await {
            Ok(metadata) => Ok(Self::node(path.to_path_buf(), &metadata)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(map_io_error(err, path).into()),
        }
    }
}

impl Object for LocalRoot {
    fn uri(&self) -> Url {
        Self::root_uri()
    }

    fn name(&self) -> String {
        "Local files".to_string()
    }

    fn extension(&self, id: &str) -> Option<Extension> {
        match id {
            ids::ICON => capability::ICON.provide(ICON.to_string()),
            _ => None,
        }
    }
}

#[async_trait]
impl Dir for LocalRoot {
    async fn enumerate(&self, visitor: &mut dyn Visitor) -> Result<()> {
        visitor.on_items_count(self.mounts.len());
        for mount in &self.mounts {
            let mut dir = LocalDir::new(mount.clone());
            dir.description = mount.display().to_string();
            visitor.on_dir(Arc::new(dir));
        }
        Ok(())
    }
}

#[async_trait]
impl Root for LocalRoot {
    #[instrument(level = "debug", skip_all, fields(uri = %uri))]
    async fn resolve(&self, uri: &Url) -> Result<Option<Entry>> {
        if uri.scheme() != SCHEME || uri.fragment().is_some() {
            return Ok(None);
        }
        if uri.path() == "/" && uri.host_str().is_none_or(str::is_empty) {
            return Ok(self.this.upgrade().map(|this| Entry::Dir(this)));
        }
        let path = uri
            .to_file_path()
            .ok()
            .ok_or_raise(|| ErrorKind::InvalidIdentifier(uri.to_string()))?;
        let entry = Self::lookup(&path).await?;
        if entry.is_none() {
            debug!(path = %path.display(), "No such local object");
        }
        Ok(entry)
    }
}

fn file_uri(path: &Path) -> Result<Url> {
    Url::from_file_path(path)
        .ok()
        .ok_or_raise(|| ErrorKind::InvalidIdentifier(path.display().to_string()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Parent of a local node: the enclosing directory, `None` at `/`.
fn parent_of(path: &Path) -> Option<Entry> {
    let parent = path.parent()?;
    Some(Entry::Dir(Arc::new(LocalDir::new(parent.to_path_buf()))))
}

struct LocalDir {
    path: PathBuf,
    description: String,
}

impl LocalDir {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            description: String::new(),
        }
    }
}

#[async_trait]
impl Object for LocalDir {
    fn uri(&self) -> Url {
        file_uri(&self.path).unwrap_or_else(|_| LocalRoot::root_uri())
    }

    fn name(&self) -> String {
        file_name(&self.path)
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    async fn parent(&self) -> Result<Option<Entry>> {
        Ok(parent_of(&self.path))
    }
}

#[async_trait]
impl Dir for LocalDir {
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    async fn enumerate(&self, visitor: &mut dyn Visitor) -> Result<()> {
        let mut entries = fs::read_dir(&self.path).await.map_err(|err| map_io_error(err, &self.path))?;
        // Collected first so the count hint is exact.
        let mut nodes = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|err| map_io_error(err, &self.path))? {
            let path = entry.path();
            // Follow symlinks; silently drop dangling ones.
            let Ok(metadata) = fs::metadata(&path).await else {
                continue;
            };
            if let Some(node) = LocalRoot::node(path, &metadata) {
                nodes.push(node);
            }
        }
        visitor.on_items_count(nodes.len());
        for node in nodes {
            match node {
                Entry::Dir(dir) => visitor.on_dir(dir),
                Entry::File(file) => visitor.on_file(file),
                Entry::Object(_) => {},
            }
        }
        Ok(())
    }
}

struct LocalFile {
    path: PathBuf,
    size: u64,
}

#[async_trait]
impl Object for LocalFile {
    fn uri(&self) -> Url {
        file_uri(&self.path).unwrap_or_else(|_| LocalRoot::root_uri())
    }

    fn name(&self) -> String {
        file_name(&self.path)
    }

    async fn parent(&self) -> Result<Option<Entry>> {
        Ok(parent_of(&self.path))
    }
}

#[async_trait]
impl File for LocalFile {
    fn size(&self) -> String {
        format::size(self.size)
    }

    async fn content(&self) -> Result<Vec<u8>> {
        Ok(fs::read(&self.path).await.map_err(|err| map_io_error(err, &self.path))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trove_vfs::Listing;

    fn uri(path: &Path) -> Url {
        Url::from_file_path(path).unwrap()
    }

    #[test]
    fn test_new_requires_absolute_mounts() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalRoot::new([temp_dir.path()]).is_ok());
        assert!(LocalRoot::new(["relative/path"]).is_err());
    }

    #[tokio::test]
    async fn test_enumerate_mounts() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let root = LocalRoot::new([first.path(), second.path()]).unwrap();
        let listing = Listing::of(root.as_ref()).await.unwrap();
        assert_eq!(listing.items_count, Some(2));
        let uris: Vec<_> = listing.entries.iter().map(Entry::uri).collect();
        assert_eq!(uris, vec![uri(first.path()), uri(second.path())]);
        assert_eq!(listing.entries[0].description(), first.path().display().to_string());
    }

    #[tokio::test]
    async fn test_resolve_file_and_read() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("tune.pt3"), b"Vortex Tracker").unwrap();
        let root = LocalRoot::new([temp_dir.path()]).unwrap();
        let entry = root.resolve(&uri(&temp_dir.path().join("tune.pt3"))).await.unwrap().unwrap();
        let file = entry.as_file().unwrap();
        assert_eq!(file.name(), "tune.pt3");
        assert_eq!(file.size(), "14");
        assert_eq!(file.content().await.unwrap(), b"Vortex Tracker");
    }

    #[tokio::test]
    async fn test_enumerate_directory_with_exact_count() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(temp_dir.path().join("sub")).unwrap();
        std::fs::write(temp_dir.path().join("a.mod"), b"a").unwrap();
        std::fs::write(temp_dir.path().join("b.mod"), b"b").unwrap();
        let root = LocalRoot::new([temp_dir.path()]).unwrap();
        let entry = root.resolve(&uri(temp_dir.path())).await.unwrap().unwrap();
        let listing = Listing::of(entry.as_dir().unwrap().as_ref()).await.unwrap();
        assert_eq!(listing.items_count, Some(3));
        assert_eq!(listing.dirs().count(), 1);
        assert_eq!(listing.files().count(), 2);
    }

    #[tokio::test]
    async fn test_parent_is_reresolved() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("x.ay"), b"ZXAYEMUL").unwrap();
        let root = LocalRoot::new([temp_dir.path()]).unwrap();
        let entry = root.resolve(&uri(&temp_dir.path().join("x.ay"))).await.unwrap().unwrap();
        let parent = entry.as_object().parent().await.unwrap().unwrap();
        assert_eq!(parent.uri(), uri(temp_dir.path()));
        assert!(parent.is_dir());
    }

    #[tokio::test]
    async fn test_missing_and_foreign() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = LocalRoot::new([temp_dir.path()]).unwrap();
        let missing = uri(&temp_dir.path().join("nope.mod"));
        assert!(root.resolve(&missing).await.unwrap().is_none());
        let foreign = Url::parse("joshw:/gbs/").unwrap();
        assert!(root.resolve(&foreign).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_root_resolves_itself() {
        let root = LocalRoot::new(Vec::<PathBuf>::new()).unwrap();
        let entry = root.resolve(&Url::parse("file:///").unwrap()).await.unwrap().unwrap();
        assert_eq!(entry.uri(), root.uri());
        assert_eq!(capability::ICON.get_from(&entry).as_deref(), Some(ICON));
    }

    #[tokio::test]
    async fn test_unreadable_directory_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = LocalDir::new(temp_dir.path().join("gone"));
        let err = Listing::of(&dir).await.err().expect("expected Listing::of to fail");
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }
}
