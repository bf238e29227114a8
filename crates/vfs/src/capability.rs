//! Optional behaviours a node may expose beyond the base contract.
//!
//! Dispatch is by string id so new capabilities never touch the [`Object`]
//! trait; the typed [`Key`] constants below keep the downcasting in one place.
//! An absent capability means "unsupported", never an error.
//!
//! ```
//! use trove_vfs::capability::{self, Extension};
//! use trove_vfs::Object;
//!
//! struct Track;
//! impl Object for Track {
//!     fn uri(&self) -> trove_vfs::Url { trove_vfs::Url::parse("demo:/track").unwrap() }
//!     fn name(&self) -> String { "track".into() }
//!     fn extension(&self, id: &str) -> Option<Extension> {
//!         match id {
//!             capability::ids::CACHE_PATH => capability::CACHE_PATH.provide("demo/track".to_string()),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! assert_eq!(capability::CACHE_PATH.get(&Track).as_deref(), Some("demo/track"));
//! assert!(capability::SHARE_URL.get(&Track).is_none());
//! ```

use crate::error::Result;
use crate::identifier::Identifier;
use crate::object::{Entry, File, Object, Visitor};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::any::Any;
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::Arc;
use url::Url;

/// Type-erased capability value as returned by [`Object::extension`].
pub type Extension = Box<dyn Any + Send + Sync>;

/// Typed handle for a string-keyed capability.
pub struct Key<T> {
    id: &'static str,
    _type: PhantomData<fn() -> T>,
}

impl<T: Clone + Send + Sync + 'static> Key<T> {
    pub const fn new(id: &'static str) -> Self {
        Self { id, _type: PhantomData }
    }

    pub const fn id(&self) -> &'static str {
        self.id
    }

    /// Wrap a value for returning from [`Object::extension`].
    pub fn provide(&self, value: T) -> Option<Extension> {
        Some(Box::new(value))
    }

    /// Fetch the capability from an object. A value of the wrong type is
    /// treated the same as an absent one.
    pub fn get<O: Object + ?Sized>(&self, object: &O) -> Option<T> {
        object.extension(self.id)?.downcast::<T>().ok().map(|boxed| *boxed)
    }

    pub fn get_from(&self, entry: &Entry) -> Option<T> {
        self.get(entry.as_object())
    }
}

/// Full-text search within a directory.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    async fn find(&self, query: &str, visitor: &mut dyn Visitor) -> Result<()>;
}

/// Endless source of files, e.g. "random track".
pub trait Feed: Send + Sync {
    fn files(&self) -> BoxStream<'static, Result<Arc<dyn File>>>;
}

/// Ordering override for the children of a directory.
pub type Comparator = Arc<dyn Fn(&Entry, &Entry) -> Ordering + Send + Sync>;

/// String ids, usable as patterns inside [`Object::extension`].
pub mod ids {
    pub const SEARCH_ENGINE: &str = "search_engine";
    pub const COMPARATOR: &str = "comparator";
    pub const FEED: &str = "feed";
    pub const CACHE_PATH: &str = "cache_path";
    pub const DOWNLOAD_URIS: &str = "download_uris";
    pub const SHARE_URL: &str = "share_url";
    pub const ICON: &str = "icon";
    pub const REFERENCE: &str = "reference";
}

/// [`SearchEngine`] over the directory's subtree.
pub const SEARCH_ENGINE: Key<Arc<dyn SearchEngine>> = Key::new(ids::SEARCH_ENGINE);
/// Custom ordering of a directory's children.
pub const COMPARATOR: Key<Comparator> = Key::new(ids::COMPARATOR);
/// Lazy endless sequence of files.
pub const FEED: Key<Arc<dyn Feed>> = Key::new(ids::FEED);
/// Backend-qualified cache key of a file.
pub const CACHE_PATH: Key<String> = Key::new(ids::CACHE_PATH);
/// Ordered mirror URIs for multi-source fetch.
pub const DOWNLOAD_URIS: Key<Vec<Url>> = Key::new(ids::DOWNLOAD_URIS);
/// Human-facing web page for a track.
pub const SHARE_URL: Key<Url> = Key::new(ids::SHARE_URL);
/// Presentation hint (icon resource name).
pub const ICON: Key<String> = Key::new(ids::ICON);
/// The file stands in for another identifier (e.g. a stored playlist row).
pub const REFERENCE: Key<Identifier> = Key::new(ids::REFERENCE);
