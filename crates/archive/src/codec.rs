//! Contract with the module codec.
//!
//! The codec itself is an external collaborator: it knows which bytes are
//! playable, how many tunes a container holds and which sibling files a
//! multi-file format still needs. This crate only drives it.

use crate::error::{ErrorKind, Result};
use std::sync::Arc;
use std::time::Duration;

/// Metadata of one playable module.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModuleInfo {
    pub title: String,
    pub author: String,
    pub duration: Duration,
}

impl ModuleInfo {
    pub fn new(title: impl Into<String>, author: impl Into<String>, duration: Duration) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            duration,
        }
    }

    /// `"title - author"`, or whichever half is present.
    pub fn description(&self) -> String {
        match (self.title.is_empty(), self.author.is_empty()) {
            (false, false) => format!("{} - {}", self.title, self.author),
            (false, true) => self.title.clone(),
            (true, false) => self.author.clone(),
            (true, true) => String::new(),
        }
    }
}

/// An opened module. Native resources are released on drop.
pub trait Module: Send {
    fn info(&self) -> ModuleInfo;

    /// Names (relative to the module's own directory) of files the module
    /// still needs before it can play. Empty once complete.
    fn additional_files(&self) -> Vec<String>;

    /// Supply the content of one of [`additional_files`](Self::additional_files).
    fn resolve_additional_file(&mut self, name: &str, content: &[u8]) -> Result<()>;
}

/// Entry points of the codec.
pub trait Codec: Send + Sync {
    /// Open the module at `subpath` (`/`-separated, empty for the whole content).
    fn open(&self, content: &[u8], subpath: &str) -> Result<Box<dyn Module>>;

    /// Report every module found in `content`, with its subpath.
    fn detect_all(&self, content: &[u8], on_module: &mut dyn FnMut(&str, Box<dyn Module>)) -> Result<()>;
}

/// Shared handle to any codec.
pub type CodecHandle = Arc<dyn Codec>;

/// Codec that takes any non-empty content as exactly one untitled module.
///
/// Stands in for a real codec when only discovery matters: combined with
/// [`crate::PackedCodec`] it still unpacks gzip and bzip2 wrappers.
#[derive(Debug, Default)]
pub struct RawCodec;

struct RawModule;

impl Module for RawModule {
    fn info(&self) -> ModuleInfo {
        ModuleInfo::default()
    }

    fn additional_files(&self) -> Vec<String> {
        Vec::new()
    }

    fn resolve_additional_file(&mut self, name: &str, _content: &[u8]) -> Result<()> {
        exn::bail!(ErrorKind::AdditionalFileUnresolved(vec![name.to_string()]))
    }
}

impl Codec for RawCodec {
    fn open(&self, content: &[u8], subpath: &str) -> Result<Box<dyn Module>> {
        if content.is_empty() || !subpath.is_empty() {
            exn::bail!(ErrorKind::CodecOpenFailed(format!("#{subpath}")));
        }
        Ok(Box::new(RawModule))
    }

    fn detect_all(&self, content: &[u8], on_module: &mut dyn FnMut(&str, Box<dyn Module>)) -> Result<()> {
        if !content.is_empty() {
            on_module("", Box::new(RawModule));
        }
        Ok(())
    }
}
