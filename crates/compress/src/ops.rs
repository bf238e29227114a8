//! Decompression Operations

use crate::Compression;
use crate::error::{ErrorKind, Result};
use bzip2::read::BzDecoder;
use exn::ResultExt;
use flate2::read::GzDecoder;
use std::io::Read;
use tracing::instrument;

impl Compression {
    /// Unpack `input` in memory, failing with [`ErrorKind::TooLarge`] as soon
    /// as the output would exceed `limit` bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use trove_compress::Compression;
    ///
    /// let packed = b"plain text is returned as-is";
    /// let unpacked = Compression::None.decompress_limited(packed, 1024).unwrap();
    /// assert_eq!(unpacked, packed);
    /// assert!(Compression::None.decompress_limited(packed, 4).is_err());
    /// ```
    #[instrument(skip(input), fields(format = %self, input_size = input.len()))]
    pub fn decompress_limited(&self, input: &[u8], limit: usize) -> Result<Vec<u8>> {
        match self {
            Compression::None => {
                if input.len() > limit {
                    exn::bail!(ErrorKind::TooLarge { limit });
                }
                Ok(input.to_vec())
            },
            Compression::Gzip => read_limited(GzDecoder::new(input), limit),
            Compression::Bzip2 => read_limited(BzDecoder::new(input), limit),
        }
    }
}

fn read_limited(reader: impl Read, limit: usize) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    // One extra byte tells "exactly at the limit" apart from "over it".
    let read = reader
        .take(limit as u64 + 1)
        .read_to_end(&mut output)
        .or_raise(|| ErrorKind::InvalidData)?;
    if read > limit {
        exn::bail!(ErrorKind::TooLarge { limit });
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bzip2::write::BzEncoder;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn bzip2(data: &[u8]) -> Vec<u8> {
        let mut encoder = BzEncoder::new(Vec::new(), bzip2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_gzip_detected_and_unpacked() {
        let packed = gzip(b"Vortex Tracker II 1.0 module");
        let format = Compression::from_magic_bytes(&packed);
        assert_eq!(format, Compression::Gzip);
        assert_eq!(format.decompress_limited(&packed, 1024).unwrap(), b"Vortex Tracker II 1.0 module");
    }

    #[test]
    fn test_bzip2_detected_and_unpacked() {
        let packed = bzip2(b"ProTracker");
        let format = Compression::from_magic_bytes(&packed);
        assert_eq!(format, Compression::Bzip2);
        assert_eq!(format.decompress_limited(&packed, 1024).unwrap(), b"ProTracker");
    }

    #[test]
    fn test_limit_is_enforced() {
        let data = vec![0u8; 4096];
        let packed = gzip(&data);
        let err = Compression::Gzip.decompress_limited(&packed, 4095).unwrap_err();
        assert_eq!(*err, ErrorKind::TooLarge { limit: 4095 });
        assert_eq!(Compression::Gzip.decompress_limited(&packed, 4096).unwrap().len(), 4096);
    }

    #[test]
    fn test_corrupt_input() {
        // Gzip magic with a bogus compression method byte.
        let packed = [0x1F, 0x8B, 0xFF, 0x00, 0, 0, 0, 0, 0, 0, 1, 2, 3];
        let err = Compression::Gzip.decompress_limited(&packed, 1024).unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidData);
    }
}
