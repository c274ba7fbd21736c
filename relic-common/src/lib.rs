//! Common foundations for the relic toolchain.
//!
//! This crate provides the two building blocks everything else is made
//! of: [`ByteView`], the shared owner of file bytes (memory mapped, or an
//! owned buffer for decompressed input); and [`Cursor`], a bounds-checked
//! reader that decodes the multi-byte primitives used by ELF and DWARF
//! without ever assuming alignment.

#![warn(missing_docs)]

mod byteview;
mod cursor;

pub use byteview::ByteView;
pub use cursor::{cstr_at, Cursor, Encoding, Endian, Format, ReadError};
