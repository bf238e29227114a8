//! The playlist store as a directory.
//!
//! Rows are files named after their title. They don't own any content: each
//! one exposes the identifier it stands for through
//! [`capability::REFERENCE`] and reads through the composite root, which this
//! backend only holds weakly.

use crate::error::LiftExt;
use async_trait::async_trait;
use exn::OptionExt;
use std::sync::{Arc, Weak};
use tracing::instrument;
use trove_playlist::{StoreHandle, StoredItem};
use trove_vfs::capability::{self, Extension, ids};
use trove_vfs::{Dir, Entry, ErrorKind, File, Object, Result, Root, Url, Visitor, format};

pub const PLAYLIST_SCHEME: &str = "playlist";

#[derive(Clone)]
pub struct PlaylistRoot {
    store: StoreHandle,
    resolver: Weak<dyn Root>,
}

impl PlaylistRoot {
    /// `resolver` is normally the composite root this one is registered in;
    /// see [`trove_vfs::CompositeRoot::new_cyclic`].
    pub fn new(store: StoreHandle, resolver: Weak<dyn Root>) -> Self {
        Self { store, resolver }
    }

    fn root_uri() -> Url {
        Url::parse("playlist:/").unwrap_or_else(|_| unreachable!("static playlist uri"))
    }

    fn item(&self, stored: StoredItem) -> Arc<PlaylistEntry> {
        Arc::new(PlaylistEntry {
            stored,
            root: self.clone(),
        })
    }
}

impl Object for PlaylistRoot {
    fn uri(&self) -> Url {
        Self::root_uri()
    }

    fn name(&self) -> String {
        "Playlist".to_string()
    }

    fn extension(&self, id: &str) -> Option<Extension> {
        match id {
            ids::ICON => capability::ICON.provide(PLAYLIST_SCHEME.to_string()),
            _ => None,
        }
    }
}

#[async_trait]
impl Dir for PlaylistRoot {
    async fn enumerate(&self, visitor: &mut dyn Visitor) -> Result<()> {
        let items = self.store.enumerate().await.lift()?;
        visitor.on_items_count(items.len());
        for stored in items {
            visitor.on_file(self.item(stored));
        }
        Ok(())
    }
}

#[async_trait]
impl Root for PlaylistRoot {
    #[instrument(level = "debug", skip_all, fields(uri = %uri))]
    async fn resolve(&self, uri: &Url) -> Result<Option<Entry>> {
        if uri.scheme() != PLAYLIST_SCHEME || uri.fragment().is_some() {
            return Ok(None);
        }
        let id = uri.path().trim_matches('/');
        if id.is_empty() {
            return Ok(Some(Entry::Dir(Arc::new(self.clone()))));
        }
        let Ok(id) = id.parse::<i64>() else {
            return Ok(None);
        };
        let stored = self.store.get(id).await.lift()?;
        Ok(stored.map(|stored| Entry::File(self.item(stored))))
    }
}

/// One stored row.
struct PlaylistEntry {
    stored: StoredItem,
    root: PlaylistRoot,
}

#[async_trait]
impl Object for PlaylistEntry {
    fn uri(&self) -> Url {
        let mut uri = PlaylistRoot::root_uri();
        uri.set_path(&format!("/{}", self.stored.id));
        uri
    }

    fn name(&self) -> String {
        let item = &self.stored.item;
        match item.title.is_empty() {
            true => item.location.display_name(),
            false => item.title.clone(),
        }
    }

    fn description(&self) -> String {
        self.stored.item.author.clone()
    }

    async fn parent(&self) -> Result<Option<Entry>> {
        Ok(Some(Entry::Dir(Arc::new(self.root.clone()))))
    }

    fn extension(&self, id: &str) -> Option<Extension> {
        match id {
            ids::REFERENCE => capability::REFERENCE.provide(self.stored.item.location.clone()),
            _ => None,
        }
    }
}

#[async_trait]
impl File for PlaylistEntry {
    fn size(&self) -> String {
        format::duration(self.stored.item.duration)
    }

    /// Content of the referenced file. For a track inside an archive that is
    /// the whole archive; the subpath picks the track.
    async fn content(&self) -> Result<Vec<u8>> {
        let resolver = self
            .root
            .resolver
            .upgrade()
            .ok_or_raise(|| ErrorKind::Backend("virtual file system is shutting down".into()))?;
        let location = self.stored.item.location.location();
        let entry = resolver
            .resolve(location)
            .await?
            .ok_or_raise(|| ErrorKind::not_found(location))?;
        match entry.as_file() {
            Some(file) => file.content().await,
            None => exn::bail!(ErrorKind::WrongKind(format!("{} is a {}", location, entry.kind()))),
        }
    }
}
