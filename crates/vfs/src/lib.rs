//! Virtual file system core.
//!
//! A uniform tree over local storage, remote catalogs, archives and playlists:
//!
//! - [`Identifier`]: outer location plus optional archive subpath, with a
//!   reversible text form.
//! - [`Object`], [`Dir`], [`File`] and the tagged [`Entry`]: the node model.
//! - [`capability`]: optional behaviours (search, ordering, feeds, mirrors)
//!   looked up by string id.
//! - [`Root`] and [`CompositeRoot`]: URI resolution across backends.
//! - [`RecursiveIterator`]: interruptible depth-first traversal.
//!
//! Backends live in other crates; this one only defines the contracts and the
//! pieces that work over any backend.

pub mod capability;
mod composite;
pub mod error;
pub mod format;
mod identifier;
mod iterator;
pub mod natural;
mod object;

pub use crate::composite::{CompositeRoot, ROOT_URI};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::identifier::{Identifier, is_windows_absolute};
pub use crate::iterator::{ErrorHandler, RecursiveIterator};
pub use crate::object::{Dir, Entry, File, Listing, Object, Root, RootHandle, Visitor};
pub use url::Url;
