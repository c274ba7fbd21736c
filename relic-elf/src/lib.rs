//! Support for the Executable and Linkable Format.
//!
//! This crate contains the object model shared by the rest of the relic
//! toolchain: typed, bounds-checked views over the ELF file header, section
//! and program header tables, symbol and relocation tables, dynamic entries,
//! notes, versioning sections, hash tables, and section groups, for both
//! classes and both byte orders. On top of that it handles transparently
//! compressed sections and whole-file compression envelopes, `ar` archives,
//! and the resolution of separate debug files via `.gnu_debuglink`.
//!
//! All views borrow from the underlying bytes; nothing is copied until a
//! compressed section is actually accessed.

#![warn(missing_docs)]

use std::error::Error;
use std::fmt;

use thiserror::Error;

pub mod archive;
pub mod compress;
pub mod debuglink;
mod elf;
pub mod raw;
pub mod write;

pub use elf::{
    Class, CompressionHeader, DynEntry, DynamicTable, Elf, FileHeader, GnuHashTable, GroupView,
    Note, NoteIter, ProgramHeader, Relocation, RelocationTable, Section, SectionHeader,
    SectionIter, Strtab, Symbol, SymbolIter, SymbolTable, SysvHashTable, Verdef, VerdefIter,
    Verneed, VerneedIter, VersymTable,
};

/// The error kind for [`ElfError`].
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElfErrorKind {
    /// A read ran past the end of the file or a section.
    Truncated,
    /// The file does not start with `\x7fELF`.
    BadMagic,
    /// The class byte is neither `ELFCLASS32` nor `ELFCLASS64`.
    UnsupportedClass(u8),
    /// A field holds a value outside its defined enumeration.
    BadEnum {
        /// Name of the offending field.
        field: &'static str,
        /// The value that was read.
        value: u64,
    },
    /// A table's `sh_entsize` does not match the fixed per-class entry size.
    BadEntsize {
        /// Index of the offending section.
        section: usize,
    },
    /// A section's `sh_link` does not reference a valid section for its type.
    BadLink {
        /// Index of the referencing section.
        from: usize,
        /// The invalid link value.
        to: usize,
    },
    /// An entry index into a section is out of range.
    BadRef {
        /// Index of the referenced section.
        section: usize,
        /// The out-of-range entry index.
        index: u64,
    },
    /// An alignment value is not a power of two.
    BadAlignment,
    /// An offset or size computation overflowed.
    Overflow,
    /// An underlying I/O operation failed.
    Io,
    /// Compressed data could not be inflated.
    Decompress,
    /// Decompression exhausted the allowed output memory.
    OutOfMemory,
    /// A separate debug file's CRC32 did not match its `.gnu_debuglink`.
    CrcMismatch {
        /// CRC recorded in the link section.
        expected: u32,
        /// CRC computed over the candidate file.
        got: u32,
    },
}

impl fmt::Display for ElfErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Truncated => write!(f, "unexpected end of data"),
            Self::BadMagic => write!(f, "not an ELF file"),
            Self::UnsupportedClass(class) => write!(f, "unsupported ELF class {class}"),
            Self::BadEnum { field, value } => {
                write!(f, "invalid value {value:#x} for {field}")
            }
            Self::BadEntsize { section } => {
                write!(f, "section {section} has an unexpected entry size")
            }
            Self::BadLink { from, to } => {
                write!(f, "section {from} links to invalid section {to}")
            }
            Self::BadRef { section, index } => {
                write!(f, "entry {index} is out of range for section {section}")
            }
            Self::BadAlignment => write!(f, "alignment is not a power of two"),
            Self::Overflow => write!(f, "offset arithmetic overflowed"),
            Self::Io => write!(f, "i/o error"),
            Self::Decompress => write!(f, "compressed data is corrupt"),
            Self::OutOfMemory => write!(f, "decompressed data too large"),
            Self::CrcMismatch { expected, got } => {
                write!(f, "CRC mismatch: expected {expected:#010x}, got {got:#010x}")
            }
        }
    }
}

/// An error when dealing with an ELF file.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct ElfError {
    kind: ElfErrorKind,
    #[source]
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl ElfError {
    /// Creates a new ELF error from a known kind of error as well as an
    /// arbitrary error payload.
    pub(crate) fn new<E>(kind: ElfErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        let source = Some(source.into());
        Self { kind, source }
    }

    /// Returns the corresponding [`ElfErrorKind`] for this error.
    pub fn kind(&self) -> ElfErrorKind {
        self.kind
    }
}

impl From<ElfErrorKind> for ElfError {
    fn from(kind: ElfErrorKind) -> Self {
        Self { kind, source: None }
    }
}

impl From<relic_common::ReadError> for ElfError {
    fn from(e: relic_common::ReadError) -> Self {
        Self::new(ElfErrorKind::Truncated, e)
    }
}

impl From<std::io::Error> for ElfError {
    fn from(e: std::io::Error) -> Self {
        Self::new(ElfErrorKind::Io, e)
    }
}
