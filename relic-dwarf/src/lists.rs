//! Location and range lists.
//!
//! Three generations are supported: the legacy DWARF 2-4 lists in
//! `.debug_ranges`/`.debug_loc` terminated by a (0, 0) pair with
//! `(-1, base)` base-selection entries, the DWARF 5 `.debug_rnglists`/
//! `.debug_loclists` with headers and typed entries, and the GNU
//! DebugFission encoding used in `.debug_loc.dwo`.

use fallible_iterator::FallibleIterator;
use relic_common::{Cursor, Endian, Format};

use crate::constants as c;
use crate::unit::Unit;
use crate::{DwarfError, DwarfErrorKind, Sections};

/// A half-open address range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Range {
    /// First address covered.
    pub begin: u64,
    /// One past the last address covered.
    pub end: u64,
}

/// One location list entry: a range (absent for default locations) and the
/// expression bytes that apply within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocationEntry<'data> {
    /// The covered range; `None` for `DW_LLE_default_location`.
    pub range: Option<Range>,
    /// The location description.
    pub expr: &'data [u8],
}

/// The header of a DWARF 5 `.debug_rnglists` or `.debug_loclists` unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListsHeader {
    /// The contribution length, excluding the initial length field.
    pub unit_length: u64,
    /// 32- or 64-bit DWARF.
    pub format: Format,
    /// Version; always 5.
    pub version: u16,
    /// Address size of the contribution.
    pub address_size: u8,
    /// Segment selector size; this reader requires 0.
    pub segment_size: u8,
    /// Number of entries in the offsets array.
    pub offset_entry_count: u32,
    /// Offset of the offsets array (equally: of the first list when the
    /// array is empty), within the section.
    pub entries_offset: u64,
    /// Offset one past the contribution, within the section.
    pub end_offset: u64,
}

impl ListsHeader {
    /// Parses a lists header at `offset` of either section.
    pub fn parse(
        data: &[u8],
        offset: u64,
        endian: Endian,
        section: &'static str,
    ) -> Result<ListsHeader, DwarfError> {
        let start = usize::try_from(offset).map_err(|_| DwarfErrorKind::Overflow)?;
        let mut cursor = Cursor::new_at(data, start, endian);
        let (unit_length, format) = cursor.read_initial_length()?;
        let end_offset = (cursor.position() as u64)
            .checked_add(unit_length)
            .ok_or(DwarfErrorKind::Overflow)?;
        if end_offset > data.len() as u64 {
            return Err(DwarfErrorKind::BadLength.into());
        }
        let version = cursor.read_u16()?;
        if version != 5 {
            return Err(DwarfErrorKind::UnsupportedVersion { section, version }.into());
        }
        let address_size = cursor.read_u8()?;
        if address_size != 4 && address_size != 8 {
            return Err(DwarfErrorKind::BadAddressSize(address_size).into());
        }
        let segment_size = cursor.read_u8()?;
        let offset_entry_count = cursor.read_u32()?;
        Ok(ListsHeader {
            unit_length,
            format,
            version,
            address_size,
            segment_size,
            offset_entry_count,
            entries_offset: cursor.position() as u64,
            end_offset,
        })
    }
}

enum ListKind {
    Legacy,
    Dwarf5,
    GnuDwo,
}

/// Fallible iterator over the ranges of one range list.
pub struct RangeIter<'data, 'unit> {
    sections: Sections<'data>,
    unit: &'unit Unit,
    cursor: Cursor<'data>,
    base: Option<u64>,
    v5: bool,
    done: bool,
}

impl<'data, 'unit> RangeIter<'data, 'unit> {
    /// Walks the legacy `.debug_ranges` list at `offset`.
    pub fn legacy(
        sections: &Sections<'data>,
        unit: &'unit Unit,
        offset: u64,
    ) -> Result<Self, DwarfError> {
        let start = usize::try_from(offset).map_err(|_| DwarfErrorKind::Overflow)?;
        if start > sections.debug_ranges.len() {
            return Err(DwarfErrorKind::BadLength.into());
        }
        Ok(RangeIter {
            sections: *sections,
            unit,
            cursor: Cursor::new_at(sections.debug_ranges, start, sections.endian),
            base: unit.low_pc,
            v5: false,
            done: false,
        })
    }

    /// Walks the DWARF 5 `.debug_rnglists` list at `offset`.
    pub fn rnglists(
        sections: &Sections<'data>,
        unit: &'unit Unit,
        offset: u64,
    ) -> Result<Self, DwarfError> {
        let start = usize::try_from(offset).map_err(|_| DwarfErrorKind::Overflow)?;
        if start > sections.debug_rnglists.len() {
            return Err(DwarfErrorKind::BadLength.into());
        }
        Ok(RangeIter {
            sections: *sections,
            unit,
            cursor: Cursor::new_at(sections.debug_rnglists, start, sections.endian),
            base: unit.low_pc,
            v5: true,
            done: false,
        })
    }

    fn address_size(&self) -> u8 {
        self.unit.header.address_size
    }

    fn base_or_zero(&self) -> u64 {
        self.base.unwrap_or(0)
    }
}

impl FallibleIterator for RangeIter<'_, '_> {
    type Item = Range;
    type Error = DwarfError;

    fn next(&mut self) -> Result<Option<Range>, DwarfError> {
        if self.done {
            return Ok(None);
        }
        let result = if self.v5 {
            self.next_v5()
        } else {
            self.next_legacy()
        };
        if result.is_err() {
            self.done = true;
        }
        result
    }
}

impl RangeIter<'_, '_> {
    fn next_legacy(&mut self) -> Result<Option<Range>, DwarfError> {
        let max = match self.address_size() {
            4 => u64::from(u32::MAX),
            _ => u64::MAX,
        };
        loop {
            let begin = self.cursor.read_address(self.address_size())?;
            let end = self.cursor.read_address(self.address_size())?;
            if begin == 0 && end == 0 {
                self.done = true;
                return Ok(None);
            }
            if begin == max {
                // A base address selection entry.
                self.base = Some(end);
                continue;
            }
            let base = self.base_or_zero();
            return Ok(Some(Range {
                begin: base.wrapping_add(begin),
                end: base.wrapping_add(end),
            }));
        }
    }

    fn next_v5(&mut self) -> Result<Option<Range>, DwarfError> {
        loop {
            let kind = self.cursor.read_u8()?;
            match kind {
                c::DW_RLE_end_of_list => {
                    self.done = true;
                    return Ok(None);
                }
                c::DW_RLE_base_addressx => {
                    let index = self.cursor.read_uleb128()?;
                    self.base = Some(self.unit.address(&self.sections, index)?);
                }
                c::DW_RLE_base_address => {
                    self.base = Some(self.cursor.read_address(self.address_size())?);
                }
                c::DW_RLE_startx_endx => {
                    let begin = self.unit.address(&self.sections, self.cursor.read_uleb128()?)?;
                    let end = self.unit.address(&self.sections, self.cursor.read_uleb128()?)?;
                    return Ok(Some(Range { begin, end }));
                }
                c::DW_RLE_startx_length => {
                    let begin = self.unit.address(&self.sections, self.cursor.read_uleb128()?)?;
                    let length = self.cursor.read_uleb128()?;
                    return Ok(Some(Range {
                        begin,
                        end: begin.wrapping_add(length),
                    }));
                }
                c::DW_RLE_offset_pair => {
                    let begin = self.cursor.read_uleb128()?;
                    let end = self.cursor.read_uleb128()?;
                    let base = self.base_or_zero();
                    return Ok(Some(Range {
                        begin: base.wrapping_add(begin),
                        end: base.wrapping_add(end),
                    }));
                }
                c::DW_RLE_start_end => {
                    let begin = self.cursor.read_address(self.address_size())?;
                    let end = self.cursor.read_address(self.address_size())?;
                    return Ok(Some(Range { begin, end }));
                }
                c::DW_RLE_start_length => {
                    let begin = self.cursor.read_address(self.address_size())?;
                    let length = self.cursor.read_uleb128()?;
                    return Ok(Some(Range {
                        begin,
                        end: begin.wrapping_add(length),
                    }));
                }
                other => {
                    return Err(DwarfErrorKind::UnknownOpcode {
                        section: ".debug_rnglists",
                        opcode: other,
                    }
                    .into())
                }
            }
        }
    }
}

/// Fallible iterator over the entries of one location list.
pub struct LocIter<'data, 'unit> {
    sections: Sections<'data>,
    unit: &'unit Unit,
    cursor: Cursor<'data>,
    base: Option<u64>,
    kind: ListKind,
    done: bool,
}

impl<'data, 'unit> LocIter<'data, 'unit> {
    /// Walks the legacy `.debug_loc` list at `offset`.
    pub fn legacy(
        sections: &Sections<'data>,
        unit: &'unit Unit,
        offset: u64,
    ) -> Result<Self, DwarfError> {
        Self::with_kind(sections, unit, sections.debug_loc, offset, ListKind::Legacy)
    }

    /// Walks the DWARF 5 `.debug_loclists` list at `offset`.
    pub fn loclists(
        sections: &Sections<'data>,
        unit: &'unit Unit,
        offset: u64,
    ) -> Result<Self, DwarfError> {
        Self::with_kind(
            sections,
            unit,
            sections.debug_loclists,
            offset,
            ListKind::Dwarf5,
        )
    }

    /// Walks a GNU DebugFission `.debug_loc.dwo` list at `offset`.
    ///
    /// The split `.debug_loc` contents are carried in the bundle's
    /// `debug_loc` slot.
    pub fn gnu_dwo(
        sections: &Sections<'data>,
        unit: &'unit Unit,
        offset: u64,
    ) -> Result<Self, DwarfError> {
        Self::with_kind(sections, unit, sections.debug_loc, offset, ListKind::GnuDwo)
    }

    fn with_kind(
        sections: &Sections<'data>,
        unit: &'unit Unit,
        data: &'data [u8],
        offset: u64,
        kind: ListKind,
    ) -> Result<Self, DwarfError> {
        let start = usize::try_from(offset).map_err(|_| DwarfErrorKind::Overflow)?;
        if start > data.len() {
            return Err(DwarfErrorKind::BadLength.into());
        }
        Ok(LocIter {
            sections: *sections,
            unit,
            cursor: Cursor::new_at(data, start, sections.endian),
            base: unit.low_pc,
            kind,
            done: false,
        })
    }

    fn address_size(&self) -> u8 {
        self.unit.header.address_size
    }
}

impl<'data> FallibleIterator for LocIter<'data, '_> {
    type Item = LocationEntry<'data>;
    type Error = DwarfError;

    fn next(&mut self) -> Result<Option<LocationEntry<'data>>, DwarfError> {
        if self.done {
            return Ok(None);
        }
        let result = match self.kind {
            ListKind::Legacy => self.next_legacy(),
            ListKind::Dwarf5 => self.next_v5(),
            ListKind::GnuDwo => self.next_gnu_dwo(),
        };
        if result.is_err() {
            self.done = true;
        }
        result
    }
}

impl<'data> LocIter<'data, '_> {
    fn read_counted_expr(&mut self) -> Result<&'data [u8], DwarfError> {
        let len = self.cursor.read_uleb128()?;
        let len = usize::try_from(len).map_err(|_| DwarfErrorKind::Overflow)?;
        Ok(self.cursor.read_bytes(len)?)
    }

    fn read_u16_expr(&mut self) -> Result<&'data [u8], DwarfError> {
        let len = self.cursor.read_u16()? as usize;
        Ok(self.cursor.read_bytes(len)?)
    }

    fn next_legacy(&mut self) -> Result<Option<LocationEntry<'data>>, DwarfError> {
        let max = match self.address_size() {
            4 => u64::from(u32::MAX),
            _ => u64::MAX,
        };
        loop {
            let begin = self.cursor.read_address(self.address_size())?;
            let end = self.cursor.read_address(self.address_size())?;
            if begin == 0 && end == 0 {
                self.done = true;
                return Ok(None);
            }
            if begin == max {
                self.base = Some(end);
                continue;
            }
            let expr = self.read_u16_expr()?;
            let base = self.base.unwrap_or(0);
            return Ok(Some(LocationEntry {
                range: Some(Range {
                    begin: base.wrapping_add(begin),
                    end: base.wrapping_add(end),
                }),
                expr,
            }));
        }
    }

    fn next_v5(&mut self) -> Result<Option<LocationEntry<'data>>, DwarfError> {
        loop {
            let kind = self.cursor.read_u8()?;
            match kind {
                c::DW_LLE_end_of_list => {
                    self.done = true;
                    return Ok(None);
                }
                c::DW_LLE_base_addressx => {
                    let index = self.cursor.read_uleb128()?;
                    self.base = Some(self.unit.address(&self.sections, index)?);
                }
                c::DW_LLE_base_address => {
                    self.base = Some(self.cursor.read_address(self.address_size())?);
                }
                c::DW_LLE_default_location => {
                    let expr = self.read_counted_expr()?;
                    return Ok(Some(LocationEntry { range: None, expr }));
                }
                c::DW_LLE_startx_endx => {
                    let begin = self.unit.address(&self.sections, self.cursor.read_uleb128()?)?;
                    let end = self.unit.address(&self.sections, self.cursor.read_uleb128()?)?;
                    let expr = self.read_counted_expr()?;
                    return Ok(Some(LocationEntry {
                        range: Some(Range { begin, end }),
                        expr,
                    }));
                }
                c::DW_LLE_startx_length => {
                    let begin = self.unit.address(&self.sections, self.cursor.read_uleb128()?)?;
                    let length = self.cursor.read_uleb128()?;
                    let expr = self.read_counted_expr()?;
                    return Ok(Some(LocationEntry {
                        range: Some(Range {
                            begin,
                            end: begin.wrapping_add(length),
                        }),
                        expr,
                    }));
                }
                c::DW_LLE_offset_pair => {
                    let begin = self.cursor.read_uleb128()?;
                    let end = self.cursor.read_uleb128()?;
                    let expr = self.read_counted_expr()?;
                    let base = self.base.unwrap_or(0);
                    return Ok(Some(LocationEntry {
                        range: Some(Range {
                            begin: base.wrapping_add(begin),
                            end: base.wrapping_add(end),
                        }),
                        expr,
                    }));
                }
                c::DW_LLE_start_end => {
                    let begin = self.cursor.read_address(self.address_size())?;
                    let end = self.cursor.read_address(self.address_size())?;
                    let expr = self.read_counted_expr()?;
                    return Ok(Some(LocationEntry {
                        range: Some(Range { begin, end }),
                        expr,
                    }));
                }
                c::DW_LLE_start_length => {
                    let begin = self.cursor.read_address(self.address_size())?;
                    let length = self.cursor.read_uleb128()?;
                    let expr = self.read_counted_expr()?;
                    return Ok(Some(LocationEntry {
                        range: Some(Range {
                            begin,
                            end: begin.wrapping_add(length),
                        }),
                        expr,
                    }));
                }
                other => {
                    return Err(DwarfErrorKind::UnknownOpcode {
                        section: ".debug_loclists",
                        opcode: other,
                    }
                    .into())
                }
            }
        }
    }

    fn next_gnu_dwo(&mut self) -> Result<Option<LocationEntry<'data>>, DwarfError> {
        loop {
            let kind = self.cursor.read_u8()?;
            match kind {
                c::DW_LLE_GNU_end_of_list_entry => {
                    self.done = true;
                    return Ok(None);
                }
                c::DW_LLE_GNU_base_address_selection_entry => {
                    let index = self.cursor.read_uleb128()?;
                    self.base = Some(self.unit.address(&self.sections, index)?);
                }
                c::DW_LLE_GNU_start_end_entry => {
                    let begin = self.unit.address(&self.sections, self.cursor.read_uleb128()?)?;
                    let end = self.unit.address(&self.sections, self.cursor.read_uleb128()?)?;
                    let expr = self.read_u16_expr()?;
                    return Ok(Some(LocationEntry {
                        range: Some(Range { begin, end }),
                        expr,
                    }));
                }
                c::DW_LLE_GNU_start_length_entry => {
                    let begin = self.unit.address(&self.sections, self.cursor.read_uleb128()?)?;
                    let length = u64::from(self.cursor.read_u32()?);
                    let expr = self.read_u16_expr()?;
                    return Ok(Some(LocationEntry {
                        range: Some(Range {
                            begin,
                            end: begin.wrapping_add(length),
                        }),
                        expr,
                    }));
                }
                other => {
                    return Err(DwarfErrorKind::UnknownOpcode {
                        section: ".debug_loc.dwo",
                        opcode: other,
                    }
                    .into())
                }
            }
        }
    }
}
