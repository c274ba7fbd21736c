//! Bounds-checked decoding of the primitives ELF and DWARF are made of.

use std::fmt;

use scroll::Pread;
use thiserror::Error;

/// Byte order of the file being decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endian {
    /// Least significant byte first (`ELFDATA2LSB`).
    Little,
    /// Most significant byte first (`ELFDATA2MSB`).
    Big,
}

impl Endian {
    /// The host's native byte order.
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endian::Big
        } else {
            Endian::Little
        }
    }
}

impl From<Endian> for scroll::Endian {
    fn from(endian: Endian) -> Self {
        match endian {
            Endian::Little => scroll::Endian::Little,
            Endian::Big => scroll::Endian::Big,
        }
    }
}

/// The offset width of a DWARF contribution, decided by its initial length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    /// 32-bit DWARF: section offsets are 4 bytes.
    Dwarf32,
    /// 64-bit DWARF: section offsets are 8 bytes.
    Dwarf64,
}

impl Format {
    /// Size in bytes of a section offset in this format.
    pub fn offset_size(self) -> u8 {
        match self {
            Format::Dwarf32 => 4,
            Format::Dwarf64 => 8,
        }
    }
}

/// Everything needed to decode multi-byte values out of one contribution:
/// byte order, the machine address size, and the DWARF offset width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Encoding {
    /// Byte order of the data.
    pub endian: Endian,
    /// Size of a machine address in bytes (4 or 8).
    pub address_size: u8,
    /// DWARF offset width.
    pub format: Format,
}

impl Encoding {
    /// Creates an encoding for raw ELF data, where the DWARF format is irrelevant.
    pub fn elf(endian: Endian, address_size: u8) -> Self {
        Encoding {
            endian,
            address_size,
            format: Format::Dwarf32,
        }
    }
}

/// An error reading primitives from a byte slice.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReadError {
    /// The input ended before the value was complete.
    #[error("unexpected end of input at offset {0:#x}")]
    Truncated(usize),
    /// A string read ran to the end of the input without a NUL terminator.
    #[error("unterminated string at offset {0:#x}")]
    UnterminatedString(usize),
    /// An initial length used one of the reserved values below `0xffff_ffff`.
    #[error("reserved initial length {value:#x} at offset {offset:#x}")]
    ReservedLength {
        /// Offset of the initial length field.
        offset: usize,
        /// The reserved value that was read.
        value: u64,
    },
    /// An address size other than 4 or 8 was requested.
    #[error("unsupported address size {0}")]
    BadAddressSize(u8),
}

/// A cursor over a borrowed byte slice.
///
/// All reads are bounds checked and advance the cursor only on success; a
/// failed read leaves the position untouched so the caller can report the
/// offset of the malformed datum. None of the reads assume alignment.
#[derive(Clone)]
pub struct Cursor<'data> {
    data: &'data [u8],
    pos: usize,
    endian: Endian,
}

impl fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("len", &self.data.len())
            .field("pos", &self.pos)
            .field("endian", &self.endian)
            .finish()
    }
}

impl<'data> Cursor<'data> {
    /// Creates a cursor at the start of `data`.
    pub fn new(data: &'data [u8], endian: Endian) -> Self {
        Cursor {
            data,
            pos: 0,
            endian,
        }
    }

    /// Creates a cursor positioned at `pos`.
    pub fn new_at(data: &'data [u8], pos: usize, endian: Endian) -> Self {
        Cursor { data, pos, endian }
    }

    /// The byte order this cursor decodes with.
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Current position within the underlying slice.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Moves the cursor to an absolute position.
    ///
    /// Positions past the end are allowed; the next read will fail.
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// The full underlying slice, unaffected by the cursor position.
    pub fn data(&self) -> &'data [u8] {
        self.data
    }

    /// Number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Whether the cursor has reached the end of the data.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Advances over `count` bytes without decoding them.
    pub fn skip(&mut self, count: usize) -> Result<(), ReadError> {
        if self.remaining() < count {
            return Err(ReadError::Truncated(self.pos));
        }
        self.pos += count;
        Ok(())
    }

    /// Reads `count` raw bytes.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'data [u8], ReadError> {
        let bytes = self
            .data
            .get(self.pos..self.pos.checked_add(count).ok_or(ReadError::Truncated(self.pos))?)
            .ok_or(ReadError::Truncated(self.pos))?;
        self.pos += count;
        Ok(bytes)
    }

    /// Reads an unsigned byte.
    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        let byte = *self.data.get(self.pos).ok_or(ReadError::Truncated(self.pos))?;
        self.pos += 1;
        Ok(byte)
    }

    /// Reads a signed byte.
    pub fn read_i8(&mut self) -> Result<i8, ReadError> {
        self.read_u8().map(|b| b as i8)
    }

    /// Reads an unsigned 16-bit value.
    pub fn read_u16(&mut self) -> Result<u16, ReadError> {
        let value = self
            .data
            .pread_with::<u16>(self.pos, self.endian.into())
            .map_err(|_| ReadError::Truncated(self.pos))?;
        self.pos += 2;
        Ok(value)
    }

    /// Reads a signed 16-bit value.
    pub fn read_i16(&mut self) -> Result<i16, ReadError> {
        self.read_u16().map(|v| v as i16)
    }

    /// Reads an unsigned 32-bit value.
    pub fn read_u32(&mut self) -> Result<u32, ReadError> {
        let value = self
            .data
            .pread_with::<u32>(self.pos, self.endian.into())
            .map_err(|_| ReadError::Truncated(self.pos))?;
        self.pos += 4;
        Ok(value)
    }

    /// Reads a signed 32-bit value.
    pub fn read_i32(&mut self) -> Result<i32, ReadError> {
        self.read_u32().map(|v| v as i32)
    }

    /// Reads an unsigned 64-bit value.
    pub fn read_u64(&mut self) -> Result<u64, ReadError> {
        let value = self
            .data
            .pread_with::<u64>(self.pos, self.endian.into())
            .map_err(|_| ReadError::Truncated(self.pos))?;
        self.pos += 8;
        Ok(value)
    }

    /// Reads a signed 64-bit value.
    pub fn read_i64(&mut self) -> Result<i64, ReadError> {
        self.read_u64().map(|v| v as i64)
    }

    /// Reads an unsigned value of 1, 2, 4, or 8 bytes.
    pub fn read_uint(&mut self, size: u8) -> Result<u64, ReadError> {
        match size {
            1 => self.read_u8().map(u64::from),
            2 => self.read_u16().map(u64::from),
            4 => self.read_u32().map(u64::from),
            8 => self.read_u64(),
            other => Err(ReadError::BadAddressSize(other)),
        }
    }

    /// Reads a machine address of `address_size` bytes (4 or 8).
    pub fn read_address(&mut self, address_size: u8) -> Result<u64, ReadError> {
        match address_size {
            4 => self.read_u32().map(u64::from),
            8 => self.read_u64(),
            other => Err(ReadError::BadAddressSize(other)),
        }
    }

    /// Reads a DWARF section offset of the width given by `format`.
    pub fn read_offset(&mut self, format: Format) -> Result<u64, ReadError> {
        match format {
            Format::Dwarf32 => self.read_u32().map(u64::from),
            Format::Dwarf64 => self.read_u64(),
        }
    }

    /// Reads a DWARF initial length and determines the contribution's format.
    ///
    /// A 32-bit length of `0xffff_ffff` escapes into a 64-bit length;
    /// `0xffff_fff0..=0xffff_fffe` are reserved and rejected.
    pub fn read_initial_length(&mut self) -> Result<(u64, Format), ReadError> {
        let start = self.pos;
        let word = self.read_u32()?;
        if word == 0xffff_ffff {
            match self.read_u64() {
                Ok(length) => Ok((length, Format::Dwarf64)),
                Err(err) => {
                    self.pos = start;
                    Err(err)
                }
            }
        } else if word >= 0xffff_fff0 {
            self.pos = start;
            Err(ReadError::ReservedLength {
                offset: start,
                value: word.into(),
            })
        } else {
            Ok((word.into(), Format::Dwarf32))
        }
    }

    /// Reads an unsigned LEB128 value.
    ///
    /// Runs longer than ten bytes saturate to `u64::MAX` with the whole run
    /// consumed; truncated input is an error.
    pub fn read_uleb128(&mut self) -> Result<u64, ReadError> {
        let start = self.pos;
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = match self.read_u8() {
                Ok(byte) => byte,
                Err(err) => {
                    self.pos = start;
                    return Err(err);
                }
            };
            if shift < 64 {
                value |= u64::from(byte & 0x7f) << shift;
            }
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
            if shift >= 70 {
                // Other implementations return the all-ones sentinel for
                // over-long runs rather than failing the whole record.
                self.consume_leb128_tail();
                return Ok(u64::MAX);
            }
        }
        Ok(value)
    }

    /// Reads a signed LEB128 value.
    ///
    /// Over-long runs saturate to `i64::MAX`, matching the unsigned reader.
    pub fn read_sleb128(&mut self) -> Result<i64, ReadError> {
        let start = self.pos;
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = match self.read_u8() {
                Ok(byte) => byte,
                Err(err) => {
                    self.pos = start;
                    return Err(err);
                }
            };
            if shift < 64 {
                value |= u64::from(byte & 0x7f) << shift;
            }
            shift += 7;
            if byte & 0x80 == 0 {
                if shift < 64 && byte & 0x40 != 0 {
                    value |= u64::MAX << shift;
                }
                break;
            }
            if shift >= 70 {
                self.consume_leb128_tail();
                return Ok(i64::MAX);
            }
        }
        Ok(value as i64)
    }

    fn consume_leb128_tail(&mut self) {
        while let Ok(byte) = self.read_u8() {
            if byte & 0x80 == 0 {
                break;
            }
        }
    }

    /// Reads a NUL-terminated byte string, not including the terminator.
    pub fn read_cstr(&mut self) -> Result<&'data [u8], ReadError> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        match rest.iter().position(|&b| b == 0) {
            Some(len) => {
                let bytes = &rest[..len];
                self.pos += len + 1;
                Ok(bytes)
            }
            None => Err(ReadError::UnterminatedString(self.pos)),
        }
    }
}

/// Reads a NUL-terminated string starting at `offset` in `data`.
///
/// This is the random-access companion to [`Cursor::read_cstr`], used by
/// string table lookups.
pub fn cstr_at(data: &[u8], offset: usize) -> Option<&[u8]> {
    let rest = data.get(offset..)?;
    let len = rest.iter().position(|&b| b == 0)?;
    Some(&rest[..len])
}
