//! Support for DWARF debugging information, versions 2 through 5.
//!
//! The entry point is [`Sections`], the bundle of `.debug_*` section
//! contents extracted from an ELF file. On top of it sit the readers:
//!
//! - [`abbrev`]: abbreviation tables with a per-offset cache
//! - [`unit`]: compilation/type unit scanning and DIE traversal
//! - [`attr`]: attribute form decoding
//! - [`op`]: location/DWARF expression interpretation
//! - [`lists`]: location and range lists, legacy and DWARF 5
//! - [`line`]: the line-number program state machine
//! - [`frame`]: call-frame information from `.debug_frame` and `.eh_frame`
//!
//! All readers treat a malformed record as a local failure: the iterator
//! that encountered it yields the error and becomes exhausted, without
//! poisoning sibling iterators.

#![warn(missing_docs)]
#![allow(non_upper_case_globals)]

use std::error::Error;
use std::fmt;

use thiserror::Error;

use relic_common::Endian;
use relic_elf::Elf;

pub mod abbrev;
pub mod attr;
pub mod constants;
pub mod frame;
pub mod line;
pub mod lists;
pub mod op;
pub mod unit;

/// The error kind for [`DwarfError`].
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DwarfErrorKind {
    /// A read ran past the end of a section or record.
    Truncated,
    /// A unit or table announces a version this reader does not support.
    UnsupportedVersion {
        /// Name of the section the version was read from.
        section: &'static str,
        /// The announced version.
        version: u16,
    },
    /// An attribute uses a form this reader does not know.
    UnknownForm(u64),
    /// A program contains an opcode this reader does not know.
    UnknownOpcode {
        /// Name of the section the opcode was read from.
        section: &'static str,
        /// The opcode value.
        opcode: u8,
    },
    /// A DIE references an abbreviation code missing from its table.
    BadAbbrevCode(u64),
    /// A length field describes a region outside its section.
    BadLength,
    /// An indexed lookup (string, address, list) is out of range.
    BadIndex(u64),
    /// An indexed form was used without the base attribute it needs.
    MissingBase(&'static str),
    /// A required section is absent.
    MissingSection(&'static str),
    /// A header field holds a value that must not be zero.
    BadZeroField(&'static str),
    /// A unit announces an address size other than 4 or 8.
    BadAddressSize(u8),
    /// A field holds a value outside its defined enumeration.
    BadEnumValue(&'static str),
    /// Offset arithmetic overflowed.
    Overflow,
}

impl fmt::Display for DwarfErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Truncated => write!(f, "unexpected end of data"),
            Self::UnsupportedVersion { section, version } => {
                write!(f, "unsupported version {version} in {section}")
            }
            Self::UnknownForm(form) => write!(f, "unknown attribute form {form:#x}"),
            Self::UnknownOpcode { section, opcode } => {
                write!(f, "unknown opcode {opcode:#x} in {section}")
            }
            Self::BadAbbrevCode(code) => write!(f, "unknown abbreviation code {code}"),
            Self::BadLength => write!(f, "length exceeds section bounds"),
            Self::BadIndex(index) => write!(f, "index {index} out of range"),
            Self::MissingBase(attr) => write!(f, "indexed form used without {attr}"),
            Self::MissingSection(name) => write!(f, "missing section {name}"),
            Self::BadZeroField(field) => write!(f, "{field} must not be zero"),
            Self::BadAddressSize(size) => write!(f, "unsupported address size {size}"),
            Self::BadEnumValue(field) => write!(f, "invalid value for {field}"),
            Self::Overflow => write!(f, "offset arithmetic overflowed"),
        }
    }
}

/// An error decoding DWARF data.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct DwarfError {
    kind: DwarfErrorKind,
    #[source]
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl DwarfError {
    pub(crate) fn new<E>(kind: DwarfErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        let source = Some(source.into());
        Self { kind, source }
    }

    /// Returns the corresponding [`DwarfErrorKind`] for this error.
    pub fn kind(&self) -> DwarfErrorKind {
        self.kind
    }
}

impl From<DwarfErrorKind> for DwarfError {
    fn from(kind: DwarfErrorKind) -> Self {
        Self { kind, source: None }
    }
}

impl From<relic_common::ReadError> for DwarfError {
    fn from(e: relic_common::ReadError) -> Self {
        Self::new(DwarfErrorKind::Truncated, e)
    }
}

/// The `.debug_*` section contents a DWARF reader works from.
///
/// Sections that are absent stay empty; readers that need one report
/// [`DwarfErrorKind::MissingSection`] when they first touch it.
#[derive(Clone, Copy, Debug)]
pub struct Sections<'data> {
    /// `.debug_info`.
    pub debug_info: &'data [u8],
    /// `.debug_types` (DWARF 4 type units).
    pub debug_types: &'data [u8],
    /// `.debug_abbrev`.
    pub debug_abbrev: &'data [u8],
    /// `.debug_str`.
    pub debug_str: &'data [u8],
    /// `.debug_line_str` (DWARF 5).
    pub debug_line_str: &'data [u8],
    /// `.debug_str_offsets` (DWARF 5 / DebugFission).
    pub debug_str_offsets: &'data [u8],
    /// `.debug_addr` (DWARF 5 / DebugFission).
    pub debug_addr: &'data [u8],
    /// `.debug_loc` (DWARF 2-4 and `.debug_loc.dwo`).
    pub debug_loc: &'data [u8],
    /// `.debug_loclists` (DWARF 5).
    pub debug_loclists: &'data [u8],
    /// `.debug_ranges` (DWARF 2-4).
    pub debug_ranges: &'data [u8],
    /// `.debug_rnglists` (DWARF 5).
    pub debug_rnglists: &'data [u8],
    /// `.debug_line`.
    pub debug_line: &'data [u8],
    /// `.debug_frame`.
    pub debug_frame: &'data [u8],
    /// `.eh_frame`.
    pub eh_frame: &'data [u8],
    /// `.debug_macro` / `.debug_macinfo`, carried as raw bytes.
    pub debug_macro: &'data [u8],
    /// The alternate file's `.debug_str` for `strp_sup`/`GNU_strp_alt`.
    pub alt_debug_str: &'data [u8],
    /// The alternate file's `.debug_info` for `ref_sup`/`GNU_ref_alt`.
    pub alt_debug_info: &'data [u8],
    /// Byte order of the sections.
    pub endian: Endian,
}

impl<'data> Sections<'data> {
    /// An empty bundle with the given byte order, useful for tests.
    pub fn empty(endian: Endian) -> Self {
        Sections {
            debug_info: &[],
            debug_types: &[],
            debug_abbrev: &[],
            debug_str: &[],
            debug_line_str: &[],
            debug_str_offsets: &[],
            debug_addr: &[],
            debug_loc: &[],
            debug_loclists: &[],
            debug_ranges: &[],
            debug_rnglists: &[],
            debug_line: &[],
            debug_frame: &[],
            eh_frame: &[],
            debug_macro: &[],
            alt_debug_str: &[],
            alt_debug_info: &[],
            endian,
        }
    }

    /// Collects the debug sections out of an ELF file.
    ///
    /// Compressed sections are inflated through the ELF model's cache, so
    /// the bundle borrows from the `Elf` rather than the raw file bytes.
    pub fn from_elf<'file: 'data>(elf: &'data Elf<'file>) -> Result<Self, DwarfError> {
        let mut sections = Sections::empty(elf.endian());

        let mut load = |name: &[u8]| -> Result<&'data [u8], DwarfError> {
            match elf.section_by_name(name) {
                Some(index) => elf
                    .section_data(index)
                    .map_err(|e| DwarfError::new(DwarfErrorKind::Truncated, e)),
                None => Ok(&[]),
            }
        };

        sections.debug_info = load(b".debug_info")?;
        sections.debug_types = load(b".debug_types")?;
        sections.debug_abbrev = load(b".debug_abbrev")?;
        sections.debug_str = load(b".debug_str")?;
        sections.debug_line_str = load(b".debug_line_str")?;
        sections.debug_str_offsets = load(b".debug_str_offsets")?;
        sections.debug_addr = load(b".debug_addr")?;
        sections.debug_loc = load(b".debug_loc")?;
        sections.debug_loclists = load(b".debug_loclists")?;
        sections.debug_ranges = load(b".debug_ranges")?;
        sections.debug_rnglists = load(b".debug_rnglists")?;
        sections.debug_line = load(b".debug_line")?;
        sections.debug_frame = load(b".debug_frame")?;
        sections.eh_frame = load(b".eh_frame")?;
        sections.debug_macro = load(b".debug_macro")?;
        if sections.debug_macro.is_empty() {
            sections.debug_macro = load(b".debug_macinfo")?;
        }

        Ok(sections)
    }
}
