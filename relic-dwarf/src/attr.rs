//! Attribute form decoding.
//!
//! The [`AttrIter`] walks a DIE's attribute values in source order,
//! consuming exactly the bytes each form prescribes. Indexed values
//! (`strx`, `addrx`, `loclistx`, `rnglistx`) are yielded unresolved; the
//! owning unit resolves them against its base attributes.

use fallible_iterator::FallibleIterator;
use relic_common::{Cursor, Endian, Format};

use crate::abbrev::{Abbrev, AttrSpec};
use crate::constants as c;
use crate::{DwarfError, DwarfErrorKind};

/// The per-unit parameters needed to decode forms.
#[derive(Clone, Copy, Debug)]
pub struct UnitEncoding {
    /// Byte order.
    pub endian: Endian,
    /// DWARF offset width of the unit.
    pub format: Format,
    /// Address size of the unit.
    pub address_size: u8,
    /// Unit version.
    pub version: u16,
    /// Offset of the unit header within its section.
    pub unit_offset: u64,
}

/// A decoded attribute value.
///
/// Values that are indices into auxiliary tables are represented as such;
/// see [`crate::unit::Unit`] for resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttrValue<'data> {
    /// A machine address.
    Address(u64),
    /// An index into `.debug_addr`, relative to the unit's address base.
    AddressIndex(u64),
    /// A block of bytes.
    Block(&'data [u8]),
    /// A DWARF expression block.
    Exprloc(&'data [u8]),
    /// An unsigned constant.
    Udata(u64),
    /// A signed constant.
    Sdata(i64),
    /// A 16-byte constant (`DW_FORM_data16`).
    Data16(&'data [u8]),
    /// An inline NUL-terminated string.
    String(&'data [u8]),
    /// An offset into `.debug_str`.
    StrRef(u64),
    /// An offset into `.debug_line_str`.
    LineStrRef(u64),
    /// An index into the string offsets table.
    StrOffsetsIndex(u64),
    /// An offset into the alternate file's string table.
    AltStrRef(u64),
    /// A boolean flag.
    Flag(bool),
    /// A reference to a DIE, as an absolute offset into the unit's section.
    UnitRef(u64),
    /// A reference to a DIE anywhere in `.debug_info` (`DW_FORM_ref_addr`).
    DebugInfoRef(u64),
    /// A reference into the alternate file's `.debug_info`.
    AltDebugInfoRef(u64),
    /// A 64-bit type signature (`DW_FORM_ref_sig8`).
    TypeSignature(u64),
    /// An offset into some other section (`DW_FORM_sec_offset`).
    SecOffset(u64),
    /// An index into `.debug_loclists`, relative to the unit's base.
    LocListIndex(u64),
    /// An index into `.debug_rnglists`, relative to the unit's base.
    RngListIndex(u64),
}

/// One decoded attribute.
#[derive(Clone, Copy, Debug)]
pub struct Attr<'data> {
    /// Attribute name (`DW_AT_*`).
    pub name: u64,
    /// The form the value was encoded with.
    pub form: u64,
    /// The decoded value.
    pub value: AttrValue<'data>,
}

/// Decodes a single value of the given form at the cursor.
pub fn decode_value<'data>(
    cursor: &mut Cursor<'data>,
    spec: &AttrSpec,
    encoding: &UnitEncoding,
) -> Result<AttrValue<'data>, DwarfError> {
    let mut form = spec.form;
    // An indirect form names the real form in the data bytes.
    while form == c::DW_FORM_indirect {
        form = cursor.read_uleb128()?;
    }

    let value = match form {
        c::DW_FORM_addr => AttrValue::Address(cursor.read_address(encoding.address_size)?),
        c::DW_FORM_addrx | c::DW_FORM_GNU_addr_index => {
            AttrValue::AddressIndex(cursor.read_uleb128()?)
        }
        c::DW_FORM_addrx1 => AttrValue::AddressIndex(cursor.read_u8()?.into()),
        c::DW_FORM_addrx2 => AttrValue::AddressIndex(cursor.read_u16()?.into()),
        c::DW_FORM_addrx3 => AttrValue::AddressIndex(read_u24(cursor)?),
        c::DW_FORM_addrx4 => AttrValue::AddressIndex(cursor.read_u32()?.into()),

        c::DW_FORM_block1 => {
            let len = cursor.read_u8()? as usize;
            AttrValue::Block(cursor.read_bytes(len)?)
        }
        c::DW_FORM_block2 => {
            let len = cursor.read_u16()? as usize;
            AttrValue::Block(cursor.read_bytes(len)?)
        }
        c::DW_FORM_block4 => {
            let len = cursor.read_u32()? as usize;
            AttrValue::Block(cursor.read_bytes(len)?)
        }
        c::DW_FORM_block => {
            let len = cursor.read_uleb128()?;
            let len = usize::try_from(len).map_err(|_| DwarfErrorKind::Overflow)?;
            AttrValue::Block(cursor.read_bytes(len)?)
        }
        c::DW_FORM_exprloc => {
            let len = cursor.read_uleb128()?;
            let len = usize::try_from(len).map_err(|_| DwarfErrorKind::Overflow)?;
            AttrValue::Exprloc(cursor.read_bytes(len)?)
        }

        c::DW_FORM_data1 => AttrValue::Udata(cursor.read_u8()?.into()),
        c::DW_FORM_data2 => AttrValue::Udata(cursor.read_u16()?.into()),
        c::DW_FORM_data4 => AttrValue::Udata(cursor.read_u32()?.into()),
        c::DW_FORM_data8 => AttrValue::Udata(cursor.read_u64()?),
        c::DW_FORM_data16 => AttrValue::Data16(cursor.read_bytes(16)?),
        c::DW_FORM_udata => AttrValue::Udata(cursor.read_uleb128()?),
        c::DW_FORM_sdata => AttrValue::Sdata(cursor.read_sleb128()?),
        c::DW_FORM_implicit_const => {
            AttrValue::Sdata(spec.implicit_const.ok_or(DwarfErrorKind::UnknownForm(form))?)
        }

        c::DW_FORM_string => AttrValue::String(cursor.read_cstr()?),
        c::DW_FORM_strp => AttrValue::StrRef(cursor.read_offset(encoding.format)?),
        c::DW_FORM_line_strp => AttrValue::LineStrRef(cursor.read_offset(encoding.format)?),
        c::DW_FORM_strp_sup | c::DW_FORM_GNU_strp_alt => {
            AttrValue::AltStrRef(cursor.read_offset(encoding.format)?)
        }
        c::DW_FORM_strx | c::DW_FORM_GNU_str_index => {
            AttrValue::StrOffsetsIndex(cursor.read_uleb128()?)
        }
        c::DW_FORM_strx1 => AttrValue::StrOffsetsIndex(cursor.read_u8()?.into()),
        c::DW_FORM_strx2 => AttrValue::StrOffsetsIndex(cursor.read_u16()?.into()),
        c::DW_FORM_strx3 => AttrValue::StrOffsetsIndex(read_u24(cursor)?),
        c::DW_FORM_strx4 => AttrValue::StrOffsetsIndex(cursor.read_u32()?.into()),

        c::DW_FORM_flag => AttrValue::Flag(cursor.read_u8()? != 0),
        c::DW_FORM_flag_present => AttrValue::Flag(true),

        c::DW_FORM_ref1 => unit_ref(encoding, cursor.read_u8()?.into())?,
        c::DW_FORM_ref2 => unit_ref(encoding, cursor.read_u16()?.into())?,
        c::DW_FORM_ref4 => unit_ref(encoding, cursor.read_u32()?.into())?,
        c::DW_FORM_ref8 => unit_ref(encoding, cursor.read_u64()?)?,
        c::DW_FORM_ref_udata => unit_ref(encoding, cursor.read_uleb128()?)?,
        c::DW_FORM_ref_addr => {
            // DWARF 2 encoded ref_addr with the address size.
            let offset = if encoding.version == 2 {
                cursor.read_address(encoding.address_size)?
            } else {
                cursor.read_offset(encoding.format)?
            };
            AttrValue::DebugInfoRef(offset)
        }
        c::DW_FORM_ref_sup4 => AttrValue::AltDebugInfoRef(cursor.read_u32()?.into()),
        c::DW_FORM_ref_sup8 => AttrValue::AltDebugInfoRef(cursor.read_u64()?),
        c::DW_FORM_GNU_ref_alt => {
            AttrValue::AltDebugInfoRef(cursor.read_offset(encoding.format)?)
        }
        c::DW_FORM_ref_sig8 => AttrValue::TypeSignature(cursor.read_u64()?),

        c::DW_FORM_sec_offset => AttrValue::SecOffset(cursor.read_offset(encoding.format)?),
        c::DW_FORM_loclistx => AttrValue::LocListIndex(cursor.read_uleb128()?),
        c::DW_FORM_rnglistx => AttrValue::RngListIndex(cursor.read_uleb128()?),

        other => return Err(DwarfErrorKind::UnknownForm(other).into()),
    };
    Ok(value)
}

fn unit_ref(encoding: &UnitEncoding, offset: u64) -> Result<AttrValue<'static>, DwarfError> {
    let absolute = encoding
        .unit_offset
        .checked_add(offset)
        .ok_or(DwarfErrorKind::Overflow)?;
    Ok(AttrValue::UnitRef(absolute))
}

fn read_u24(cursor: &mut Cursor<'_>) -> Result<u64, relic_common::ReadError> {
    let bytes = cursor.read_bytes(3)?;
    let value = match cursor.endian() {
        Endian::Little => {
            u64::from(bytes[0]) | u64::from(bytes[1]) << 8 | u64::from(bytes[2]) << 16
        }
        Endian::Big => u64::from(bytes[0]) << 16 | u64::from(bytes[1]) << 8 | u64::from(bytes[2]),
    };
    Ok(value)
}

/// Walks the attribute values of one DIE in source order.
pub struct AttrIter<'data, 'abbrev> {
    cursor: Cursor<'data>,
    encoding: UnitEncoding,
    specs: std::slice::Iter<'abbrev, AttrSpec>,
}

impl<'data, 'abbrev> AttrIter<'data, 'abbrev> {
    /// Creates a walker over `section` starting at the DIE's first attribute
    /// byte (`attrs_start`).
    pub fn new(
        section: &'data [u8],
        attrs_start: u64,
        abbrev: &'abbrev Abbrev,
        encoding: UnitEncoding,
    ) -> Self {
        let start = usize::try_from(attrs_start).unwrap_or(usize::MAX);
        AttrIter {
            cursor: Cursor::new_at(section, start, encoding.endian),
            encoding,
            specs: abbrev.attrs.iter(),
        }
    }

    /// The section offset of the next undecoded byte.
    pub fn position(&self) -> u64 {
        self.cursor.position() as u64
    }
}

impl<'data> FallibleIterator for AttrIter<'data, '_> {
    type Item = Attr<'data>;
    type Error = DwarfError;

    fn next(&mut self) -> Result<Option<Attr<'data>>, DwarfError> {
        let spec = match self.specs.next() {
            Some(spec) => spec,
            None => return Ok(None),
        };
        let value = decode_value(&mut self.cursor, spec, &self.encoding)?;
        Ok(Some(Attr {
            name: spec.name,
            form: spec.form,
            value,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    fn encoding() -> UnitEncoding {
        UnitEncoding {
            endian: Endian::Little,
            format: Format::Dwarf32,
            address_size: 8,
            version: 4,
            unit_offset: 0x100,
        }
    }

    fn decode(form: u64, data: &[u8]) -> AttrValue<'_> {
        let spec = AttrSpec {
            name: c::DW_AT_name,
            form,
            implicit_const: None,
        };
        let mut cursor = Cursor::new(data, Endian::Little);
        let value = decode_value(&mut cursor, &spec, &encoding()).unwrap();
        assert!(cursor.is_empty(), "form {form:#x} left trailing bytes");
        value
    }

    #[test]
    fn test_scalar_forms() {
        assert_eq!(decode(c::DW_FORM_data1, &[0x2a]), AttrValue::Udata(42));
        assert_eq!(
            decode(c::DW_FORM_data4, &[0x78, 0x56, 0x34, 0x12]),
            AttrValue::Udata(0x1234_5678)
        );
        assert_eq!(decode(c::DW_FORM_sdata, &[0x7f]), AttrValue::Sdata(-1));
        assert_eq!(decode(c::DW_FORM_udata, &[0x80, 0x01]), AttrValue::Udata(128));
        assert_eq!(decode(c::DW_FORM_flag, &[0x01]), AttrValue::Flag(true));
        assert_eq!(decode(c::DW_FORM_flag_present, &[]), AttrValue::Flag(true));
    }

    #[test]
    fn test_address_and_string_forms() {
        assert_eq!(
            decode(
                c::DW_FORM_addr,
                &[0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
            ),
            AttrValue::Address(0x1000)
        );
        assert_eq!(
            decode(c::DW_FORM_string, b"hi\0"),
            AttrValue::String(b"hi")
        );
        assert_eq!(
            decode(c::DW_FORM_strp, &[0x10, 0x00, 0x00, 0x00]),
            AttrValue::StrRef(0x10)
        );
        assert_eq!(decode(c::DW_FORM_strx1, &[0x05]), AttrValue::StrOffsetsIndex(5));
        assert_eq!(
            decode(c::DW_FORM_strx3, &[0x01, 0x02, 0x03]),
            AttrValue::StrOffsetsIndex(0x030201)
        );
        assert_eq!(decode(c::DW_FORM_addrx1, &[0x07]), AttrValue::AddressIndex(7));
    }

    #[test]
    fn test_reference_forms() {
        // Unit refs are rebased onto the unit's section offset.
        assert_eq!(decode(c::DW_FORM_ref1, &[0x20]), AttrValue::UnitRef(0x120));
        assert_eq!(
            decode(c::DW_FORM_ref4, &[0x40, 0x00, 0x00, 0x00]),
            AttrValue::UnitRef(0x140)
        );
        assert_eq!(
            decode(c::DW_FORM_ref_addr, &[0x30, 0x00, 0x00, 0x00]),
            AttrValue::DebugInfoRef(0x30)
        );
        assert_eq!(
            decode(
                c::DW_FORM_ref_sig8,
                &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]
            ),
            AttrValue::TypeSignature(0x0807_0605_0403_0201)
        );
    }

    #[test]
    fn test_block_forms() {
        assert_eq!(
            decode(c::DW_FORM_block1, &[0x03, 0xaa, 0xbb, 0xcc]),
            AttrValue::Block(&[0xaa, 0xbb, 0xcc])
        );
        assert_eq!(
            decode(c::DW_FORM_exprloc, &[0x02, 0x30, 0x9f]),
            AttrValue::Exprloc(&[0x30, 0x9f])
        );
    }

    #[test]
    fn test_implicit_const() {
        let spec = AttrSpec {
            name: c::DW_AT_language,
            form: c::DW_FORM_implicit_const,
            implicit_const: Some(-7),
        };
        let mut cursor = Cursor::new(&[], Endian::Little);
        let value = decode_value(&mut cursor, &spec, &encoding()).unwrap();
        assert_eq!(value, AttrValue::Sdata(-7));
    }

    #[test]
    fn test_indirect_form() {
        let spec = AttrSpec {
            name: c::DW_AT_name,
            form: c::DW_FORM_indirect,
            implicit_const: None,
        };
        // indirect -> data2
        let mut cursor = Cursor::new(&[0x05, 0x34, 0x12], Endian::Little);
        let value = decode_value(&mut cursor, &spec, &encoding()).unwrap();
        assert_eq!(value, AttrValue::Udata(0x1234));
    }

    #[test]
    fn test_unknown_form() {
        let spec = AttrSpec {
            name: c::DW_AT_name,
            form: 0x7fff,
            implicit_const: None,
        };
        let mut cursor = Cursor::new(&[0x00], Endian::Little);
        let err = decode_value(&mut cursor, &spec, &encoding()).unwrap_err();
        assert_eq!(err.kind(), DwarfErrorKind::UnknownForm(0x7fff));
    }

    #[test]
    fn test_ref_addr_dwarf2_uses_address_size() {
        let spec = AttrSpec {
            name: c::DW_AT_sibling,
            form: c::DW_FORM_ref_addr,
            implicit_const: None,
        };
        let mut enc = encoding();
        enc.version = 2;
        let mut cursor = Cursor::new(
            &[0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
            Endian::Little,
        );
        let value = decode_value(&mut cursor, &spec, &enc).unwrap();
        assert_eq!(value, AttrValue::DebugInfoRef(0x10));
        assert!(cursor.is_empty());
    }
}
