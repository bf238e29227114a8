//! Packed single-file containers.
//!
//! Chiptune collections routinely ship modules wrapped in gzip or bzip2. This
//! crate recognises those wrappers ([`Compression::from_magic_bytes`]) and
//! unpacks them in memory with a hard size cap
//! ([`Compression::decompress_limited`]) so a hostile archive can't balloon.
//!
//! Each format also has a stable subpath tag ([`Compression::subpath_tag`])
//! used to address "the unpacked content of this file" inside an identifier.

mod detect;
pub mod error;
mod ops;

/// A supported packing format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, derive_more::Display)]
pub enum Compression {
    /// Not packed
    #[default]
    #[display("none")]
    None,
    /// Bzip2 compression (.bz2)
    #[display("bzip2")]
    Bzip2,
    /// Gzip compression (.gz)
    #[display("gzip")]
    Gzip,
}

impl Compression {
    /// Subpath component naming the unpacked payload, `None` for [`Compression::None`].
    pub fn subpath_tag(&self) -> Option<&'static str> {
        match self {
            Compression::None => None,
            Compression::Bzip2 => Some("+unBZIP2"),
            Compression::Gzip => Some("+unGZIP"),
        }
    }

    /// Inverse of [`subpath_tag`](Self::subpath_tag).
    pub fn from_subpath_tag(tag: &str) -> Option<Self> {
        match tag {
            "+unBZIP2" => Some(Compression::Bzip2),
            "+unGZIP" => Some(Compression::Gzip),
            _ => None,
        }
    }
}
