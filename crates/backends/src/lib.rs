//! Backend roots for the VFS.
//!
//! Each backend owns one URI scheme and is a [`trove_vfs::Root`]:
//!
//! | Scheme        | Root                  | Source                                  |
//! |---------------|-----------------------|-----------------------------------------|
//! | `file:`       | [`LocalRoot`]         | configured local mount points           |
//! | configurable  | [`HttpDirRoot`]       | directory catalog mirrored across hosts |
//! | `playlist:`   | [`PlaylistRoot`]      | rows of the playlist store              |
//! | any           | `MockRoot` (`mock`)   | in-memory tree for tests                |

mod error;
pub mod fetcher;
pub mod httpdir;
mod local;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod playlist;

pub use crate::fetcher::CachingFetcher;
pub use crate::httpdir::{BaseSpec, CatalogSpec, HttpDirRoot};
pub use crate::local::LocalRoot;
#[cfg(any(test, feature = "mock"))]
pub use crate::mock::{MockRoot, MockRootBuilder};
pub use crate::playlist::{PLAYLIST_SCHEME, PlaylistRoot};
