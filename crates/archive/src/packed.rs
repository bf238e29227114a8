//! Transparent unpacking of gzip and bzip2 wrapped modules.

use crate::codec::{Codec, CodecHandle, Module};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use trove_compress::Compression;
use tracing::debug;

/// Codec decorator that unpacks single-file containers before handing the
/// payload to the wrapped codec.
///
/// Modules found inside a packed payload are reported under the format's
/// subpath tag: the module at `sub` inside `song.pt3.gz` becomes
/// `+unGZIP/sub` (or just `+unGZIP` for the payload itself). Wrappers may nest.
pub struct PackedCodec {
    inner: CodecHandle,
    limit: usize,
}

impl PackedCodec {
    /// `limit` caps the unpacked size of every payload.
    pub fn new(inner: CodecHandle, limit: usize) -> Self {
        Self { inner, limit }
    }

    fn unpack(&self, format: Compression, content: &[u8]) -> Result<Vec<u8>> {
        format
            .decompress_limited(content, self.limit)
            .or_raise(|| ErrorKind::CodecOpenFailed(format!("{format} payload")))
    }
}

impl Codec for PackedCodec {
    fn open(&self, content: &[u8], subpath: &str) -> Result<Box<dyn Module>> {
        let (first, rest) = subpath.split_once('/').unwrap_or((subpath, ""));
        match Compression::from_subpath_tag(first) {
            Some(format) if Compression::from_magic_bytes(content) == format => {
                let unpacked = self.unpack(format, content)?;
                self.open(&unpacked, rest)
            },
            _ => self.inner.open(content, subpath),
        }
    }

    fn detect_all(&self, content: &[u8], on_module: &mut dyn FnMut(&str, Box<dyn Module>)) -> Result<()> {
        let format = Compression::from_magic_bytes(content);
        let Some(tag) = format.subpath_tag() else {
            return self.inner.detect_all(content, on_module);
        };
        let unpacked = self.unpack(format, content)?;
        debug!(%format, packed = content.len(), unpacked = unpacked.len(), "Unpacked payload");
        self.detect_all(&unpacked, &mut |subpath, module| {
            if subpath.is_empty() {
                on_module(tag, module);
            } else {
                on_module(&format!("{tag}/{subpath}"), module);
            }
        })
    }
}
