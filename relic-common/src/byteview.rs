//! Shared ownership of file bytes.

use std::fs::File;
use std::io;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;

#[derive(Debug)]
enum Backing {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

impl Backing {
    fn bytes(&self) -> &[u8] {
        match self {
            Backing::Mmap(mmap) => mmap,
            Backing::Owned(bytes) => bytes,
        }
    }
}

/// Shared, immutable file bytes.
///
/// Every decoded structure in this workspace borrows plain `&[u8]` slices;
/// a `ByteView` is the owner those slices ultimately point into. It either
/// memory-maps a file or holds an owned buffer (decompressed input, bytes
/// drained from a reader). Clones share the backing, so one mapping serves
/// any number of readers and stays valid as long as any of them is alive.
///
/// # Example
///
/// ```
/// use std::io::Write;
/// use relic_common::ByteView;
///
/// fn main() -> Result<(), std::io::Error> {
///     let mut file = tempfile::NamedTempFile::new()?;
///     file.write_all(b"\x7fELF")?;
///
///     let view = ByteView::open(file.path())?;
///     assert_eq!(view.as_slice(), b"\x7fELF");
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct ByteView {
    backing: Arc<Backing>,
}

impl ByteView {
    fn with_backing(backing: Backing) -> Self {
        ByteView {
            backing: Arc::new(backing),
        }
    }

    /// Memory-maps the file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, io::Error> {
        Self::map_file(&File::open(path)?)
    }

    /// Memory-maps an open file.
    ///
    /// The kernel refuses to map zero-length files; those degrade to an
    /// empty owned buffer so callers need no special case.
    pub fn map_file(file: &File) -> Result<Self, io::Error> {
        let backing = match unsafe { Mmap::map(file) } {
            Ok(mmap) => Backing::Mmap(mmap),
            Err(err) if err.kind() == io::ErrorKind::InvalidInput => Backing::Owned(Vec::new()),
            Err(err) => return Err(err),
        };
        Ok(ByteView::with_backing(backing))
    }

    /// Takes ownership of an in-memory buffer.
    ///
    /// This is how decompressed images enter the system: the envelope
    /// reader inflates into a `Vec` and wraps it so downstream code sees
    /// no difference from a mapped file.
    pub fn from_vec(buffer: Vec<u8>) -> Self {
        ByteView::with_backing(Backing::Owned(buffer))
    }

    /// Drains a reader into an owned buffer.
    ///
    /// Prefer [`ByteView::open`] for files on disk; mapping beats copying
    /// for anything sizable.
    pub fn read<R: io::Read>(mut reader: R) -> Result<Self, io::Error> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        Ok(ByteView::from_vec(buffer))
    }

    /// The bytes behind the view.
    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        self.backing.bytes()
    }
}

impl AsRef<[u8]> for ByteView {
    #[inline(always)]
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl Deref for ByteView {
    type Target = [u8];

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}
