use crate::Compression;

const BZIP2_MAGIC: &[u8] = b"BZh";
const GZIP_MAGIC: &[u8] = &[0x1F, 0x8B];

impl Compression {
    /// Detect packing from the leading bytes of the content.
    #[must_use]
    pub fn from_magic_bytes(bytes: &[u8]) -> Self {
        if bytes.starts_with(GZIP_MAGIC) {
            return Compression::Gzip;
        }
        // "BZh" followed by the block size digit.
        if bytes.starts_with(BZIP2_MAGIC) && bytes.get(3).is_some_and(|b| (b'1'..=b'9').contains(b)) {
            return Compression::Bzip2;
        }
        Compression::None
    }
}
