//! Archives and the codec contract.
//!
//! A file may hold several playable modules: a multi-song format, a zip of
//! modules, a gzipped module. [`ArchiveService`] asks the codec what is inside
//! and exposes files with two or more tracks as directories, so the rest of
//! the tree can browse into them through ordinary [`trove_vfs::Identifier`]s.
//!
//! - [`Codec`] / [`Module`]: what this crate needs from the codec.
//! - [`PackedCodec`]: unpacks gzip/bzip2 wrappers in front of another codec.
//! - [`ArchiveService`]: analysis, browsing, nested resolution and the
//!   additional-file protocol for multi-file formats.

mod codec;
pub mod error;
mod index;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod packed;
mod resolver;
mod service;

pub use crate::codec::{Codec, CodecHandle, Module, ModuleInfo, RawCodec};
pub use crate::index::{ArchiveIndex, Node, NodeKind};
#[cfg(any(test, feature = "mock"))]
pub use crate::mock::MockCodec;
pub use crate::packed::PackedCodec;
pub use crate::service::{ArchiveService, DetectedModule};
