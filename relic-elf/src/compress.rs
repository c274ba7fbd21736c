//! Transparent decompression of whole files and section contents.
//!
//! Debug files are frequently shipped gzip-, bzip2-, or xz-compressed; the
//! [`decompress`] envelope sniffs the magic bytes and inflates the stream
//! into an owned buffer. Section contents flagged `SHF_COMPRESSED` use the
//! zlib format described by the compression header and go through
//! [`inflate_zlib`].

use std::io::Read;
use std::path::Path;

use flate2::read::MultiGzDecoder;
use flate2::{Decompress, FlushDecompress};
use relic_common::ByteView;

use crate::{ElfError, ElfErrorKind};

const READ_SIZE: usize = 1 << 20;

/// A compression container recognized by its magic bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Envelope {
    /// gzip (`1F 8B`).
    Gzip,
    /// bzip2 (`"BZh"`).
    Bzip2,
    /// xz (`FD "7zXZ" 00`).
    Xz,
    /// Raw LZMA (`5D 00`).
    Lzma,
}

/// Sniffs the compression envelope of a byte prefix, if any.
pub fn sniff(data: &[u8]) -> Option<Envelope> {
    if data.starts_with(&[0x1f, 0x8b]) {
        Some(Envelope::Gzip)
    } else if data.starts_with(b"BZh") {
        Some(Envelope::Bzip2)
    } else if data.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
        Some(Envelope::Xz)
    } else if data.starts_with(&[0x5d, 0x00]) {
        Some(Envelope::Lzma)
    } else {
        None
    }
}

/// Decompresses a whole file image.
///
/// Returns `Ok(None)` when the bytes are not recognizably compressed, so the
/// caller can treat them as a raw ELF image. Errors report corrupt streams
/// (`Decompress`) or exhausted memory (`OutOfMemory`).
pub fn decompress(data: &[u8]) -> Result<Option<Vec<u8>>, ElfError> {
    let envelope = match sniff(data) {
        Some(envelope) => envelope,
        None => return Ok(None),
    };

    let inflated = match envelope {
        Envelope::Gzip => read_stream(MultiGzDecoder::new(data)),
        Envelope::Bzip2 => read_stream(bzip2::read::BzDecoder::new(data)),
        Envelope::Xz | Envelope::Lzma => {
            let stream = xz2::stream::Stream::new_auto_decoder(u64::MAX, 0)
                .map_err(|e| ElfError::new(ElfErrorKind::Decompress, e))?;
            read_stream(xz2::read::XzDecoder::new_stream(data, stream))
        }
    }?;
    Ok(Some(inflated))
}

/// Opens a file that may carry a compression envelope.
///
/// The returned view holds either the mapped raw file or the inflated
/// contents, so `Elf::parse` can be pointed at it either way.
pub fn open_enveloped<P: AsRef<Path>>(path: P) -> Result<ByteView, ElfError> {
    let view = ByteView::open(path)?;
    match decompress(&view)? {
        Some(inflated) => Ok(ByteView::from_vec(inflated)),
        None => Ok(view),
    }
}

/// Inflates a zlib stream from a compressed section's payload.
///
/// `size` is the uncompressed size recorded in the compression header.
pub fn inflate_zlib(compressed: &[u8], size: usize) -> Result<Vec<u8>, ElfError> {
    let mut inflated = Vec::new();
    inflated
        .try_reserve_exact(size)
        .map_err(|e| ElfError::new(ElfErrorKind::OutOfMemory, e))?;
    Decompress::new(true)
        .decompress_vec(compressed, &mut inflated, FlushDecompress::Finish)
        .map_err(|e| ElfError::new(ElfErrorKind::Decompress, e))?;
    if inflated.len() != size {
        return Err(ElfErrorKind::Decompress.into());
    }
    Ok(inflated)
}

/// Drains `reader` into a geometrically grown buffer.
///
/// Growth retries with smaller steps before giving up, so a large stream on
/// a tight system degrades to smaller allocations instead of failing at the
/// first doubling.
fn read_stream<R: Read>(mut reader: R) -> Result<Vec<u8>, ElfError> {
    let mut buffer: Vec<u8> = Vec::new();
    let mut filled = 0usize;
    loop {
        if filled == buffer.len() {
            grow(&mut buffer, READ_SIZE)?;
        }
        let count = reader
            .read(&mut buffer[filled..])
            .map_err(|e| ElfError::new(ElfErrorKind::Decompress, e))?;
        if count == 0 {
            break;
        }
        filled += count;
    }
    buffer.truncate(filled);
    Ok(buffer)
}

fn grow(buffer: &mut Vec<u8>, start: usize) -> Result<(), ElfError> {
    let mut more = if buffer.is_empty() { start } else { buffer.len() };
    loop {
        match buffer.try_reserve_exact(more) {
            Ok(()) => {
                let len = buffer.len();
                buffer.resize(len + more, 0);
                return Ok(());
            }
            Err(_) if more >= 2048 => more -= 1024,
            Err(e) => return Err(ElfError::new(ElfErrorKind::OutOfMemory, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use similar_asserts::assert_eq;

    #[test]
    fn test_sniff() {
        assert_eq!(sniff(&[0x1f, 0x8b, 0x08]), Some(Envelope::Gzip));
        assert_eq!(sniff(b"BZh91AY"), Some(Envelope::Bzip2));
        assert_eq!(
            sniff(&[0xfd, b'7', b'z', b'X', b'Z', 0x00, 0x00]),
            Some(Envelope::Xz)
        );
        assert_eq!(sniff(&[0x5d, 0x00, 0x00]), Some(Envelope::Lzma));
        assert_eq!(sniff(b"\x7fELF"), None);
        assert_eq!(sniff(b""), None);
    }

    #[test]
    fn test_not_compressed_passthrough() {
        assert!(decompress(b"\x7fELF rest of file").unwrap().is_none());
    }

    #[test]
    fn test_gzip_roundtrip() {
        let original = b"the quick brown fox jumps over the lazy dog".repeat(100);
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&original).unwrap();
        let compressed = encoder.finish().unwrap();

        let inflated = decompress(&compressed).unwrap().expect("should sniff gzip");
        assert_eq!(inflated, original);
    }

    #[test]
    fn test_truncated_gzip_is_an_error() {
        let original = b"some compressible data some compressible data".to_vec();
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&original).unwrap();
        let compressed = encoder.finish().unwrap();

        let truncated = &compressed[..compressed.len() / 2];
        assert!(decompress(truncated).is_err());
    }

    #[test]
    fn test_zlib_section_roundtrip() {
        let original = b"debug info bytes".repeat(32);
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&original).unwrap();
        let compressed = encoder.finish().unwrap();

        let inflated = inflate_zlib(&compressed, original.len()).unwrap();
        assert_eq!(inflated, original);
    }
}
