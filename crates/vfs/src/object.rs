//! The VFS object model.
//!
//! Every node in the tree is an [`Object`]. The two kinds that matter for
//! traversal are [`Dir`] (enumerable) and [`File`] (has content); everything
//! else a node can do is exposed through the string-keyed capability lookup
//! [`Object::extension`] (see [`crate::capability`]).
//!
//! Nodes are cheap immutable views. They do not own their parent: asking for
//! [`Object::parent`] re-resolves it from the URI on demand, so holding on to
//! a child never keeps a whole subtree alive.

use crate::capability::Extension;
use crate::error::Result;
use async_trait::async_trait;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use url::Url;

/// Base contract shared by every VFS node.
#[async_trait]
pub trait Object: Send + Sync {
    /// Globally unique key of the node.
    fn uri(&self) -> Url;

    fn name(&self) -> String;

    fn description(&self) -> String {
        String::new()
    }

    /// Resolve the enclosing directory. Roots (and objects that cannot tell)
    /// return `None`.
    async fn parent(&self) -> Result<Option<Entry>> {
        Ok(None)
    }

    /// Look up an optional capability by its string id. See
    /// [`crate::capability::Key`] for the typed accessors.
    fn extension(&self, _id: &str) -> Option<Extension> {
        None
    }
}

/// An enumerable node.
#[async_trait]
pub trait Dir: Object {
    /// Push every child to `visitor`.
    ///
    /// Implementations may fail part way through. Children already pushed
    /// remain valid; nothing pushed before the error is retracted.
    async fn enumerate(&self, visitor: &mut dyn Visitor) -> Result<()>;
}

/// A leaf node with (possibly remote) content.
#[async_trait]
pub trait File: Object {
    /// Human-readable size (`"12.3K"`, or a duration for archived tracks).
    fn size(&self) -> String;

    /// Read the whole content. Lazy: may hit the network and populate caches.
    async fn content(&self) -> Result<Vec<u8>>;
}

/// Receives the children of a [`Dir`] during enumeration.
pub trait Visitor: Send {
    /// Hint of how many children will follow. May be approximate or never sent.
    fn on_items_count(&mut self, _count: usize) {}
    fn on_dir(&mut self, dir: Arc<dyn Dir>);
    fn on_file(&mut self, file: Arc<dyn File>);
}

/// A resolved VFS node, tagged by kind.
#[derive(Clone)]
pub enum Entry {
    Dir(Arc<dyn Dir>),
    File(Arc<dyn File>),
    /// Neither enumerable nor readable (e.g. a feed or search placeholder).
    Object(Arc<dyn Object>),
}

impl Entry {
    pub fn as_object(&self) -> &dyn Object {
        match self {
            Self::Dir(dir) => dir.as_ref(),
            Self::File(file) => file.as_ref(),
            Self::Object(object) => object.as_ref(),
        }
    }

    pub fn uri(&self) -> Url {
        self.as_object().uri()
    }

    pub fn name(&self) -> String {
        self.as_object().name()
    }

    pub fn description(&self) -> String {
        self.as_object().description()
    }

    pub fn as_dir(&self) -> Option<&Arc<dyn Dir>> {
        match self {
            Self::Dir(dir) => Some(dir),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&Arc<dyn File>> {
        match self {
            Self::File(file) => Some(file),
            _ => None,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Dir(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Dir(_) => "dir",
            Self::File(_) => "file",
            Self::Object(_) => "object",
        }
    }
}

impl Debug for Entry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.kind(), self.uri())
    }
}

/// Collects children in the order they were reported.
#[derive(Default)]
pub struct Listing {
    pub items_count: Option<usize>,
    pub entries: Vec<Entry>,
}

impl Listing {
    /// Enumerate `dir` into a fresh listing.
    pub async fn of(dir: &dyn Dir) -> Result<Self> {
        let mut listing = Self::default();
        dir.enumerate(&mut listing).await?;
        Ok(listing)
    }

    pub fn dirs(&self) -> impl Iterator<Item = &Arc<dyn Dir>> {
        self.entries.iter().filter_map(Entry::as_dir)
    }

    pub fn files(&self) -> impl Iterator<Item = &Arc<dyn File>> {
        self.entries.iter().filter_map(Entry::as_file)
    }
}

impl Visitor for Listing {
    fn on_items_count(&mut self, count: usize) {
        self.items_count = Some(count);
        self.entries.reserve(count);
    }

    fn on_dir(&mut self, dir: Arc<dyn Dir>) {
        self.entries.push(Entry::Dir(dir));
    }

    fn on_file(&mut self, file: Arc<dyn File>) {
        self.entries.push(Entry::File(file));
    }
}

/// Resolved lazily from a URI by the composite root or a backend root.
#[async_trait]
pub trait Root: Dir {
    /// Resolve a URI this root owns. `Ok(None)` means "not mine / not there".
    async fn resolve(&self, uri: &Url) -> Result<Option<Entry>>;
}

/// Shared handle to any root.
pub type RootHandle = Arc<dyn Root>;
