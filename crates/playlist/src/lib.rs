//! Playlists: files that list other files, and the store scans append to.
//!
//! - [`PlaylistFormat`] parses `.xspf` and `.ayl` files into [`Reference`]s.
//! - [`PlaylistStore`] is the ordered `{location, title, author, duration}`
//!   list; [`SqliteStore`] persists it through a [`Database`].

mod db;
pub mod error;
mod format;
mod models;
mod store;

pub use crate::db::Database;
pub use crate::format::{PlaylistFormat, Reference};
pub use crate::models::{PlaylistItem, StoredItem};
pub use crate::store::{MemoryStore, PlaylistStore, SqliteStore, StoreHandle};
