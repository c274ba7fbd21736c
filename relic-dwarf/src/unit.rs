//! Compilation and type unit scanning, and DIE traversal.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use fallible_iterator::FallibleIterator;
use relic_common::{Cursor, Format};

use crate::abbrev::{Abbrev, AbbrevCache, AbbrevTable};
use crate::attr::{decode_value, Attr, AttrIter, AttrValue, UnitEncoding};
use crate::constants as c;
use crate::{DwarfError, DwarfErrorKind, Sections};

/// The kind of a unit; explicit in DWARF 5, inferred before that.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitType {
    /// A full compilation unit.
    Compile,
    /// A type unit (`.debug_types` in v4, `DW_UT_type` in v5).
    Type,
    /// A partial unit.
    Partial,
    /// A skeleton unit pointing at a split `.dwo` file.
    Skeleton,
    /// A split compilation unit inside a `.dwo` file.
    SplitCompile,
    /// A split type unit inside a `.dwo` file.
    SplitType,
    /// A DWARF 5 unit type this reader does not know.
    Unknown(u8),
}

/// The decoded header of one unit.
#[derive(Clone, Copy, Debug)]
pub struct UnitHeader {
    /// Offset of the unit within its section.
    pub offset: u64,
    /// The contribution length, excluding the initial length field.
    pub unit_length: u64,
    /// 32- or 64-bit DWARF.
    pub format: Format,
    /// Unit version (2 through 5).
    pub version: u16,
    /// The unit kind.
    pub unit_type: UnitType,
    /// Offset of the unit's abbreviation table in `.debug_abbrev`.
    pub abbrev_offset: u64,
    /// Size of an address in this unit.
    pub address_size: u8,
    /// The 64-bit unit id of skeleton and split units.
    pub dwo_id: Option<u64>,
    /// The type signature of type units.
    pub type_signature: Option<u64>,
    /// The offset of the type DIE, relative to the unit, for type units.
    pub type_offset: Option<u64>,
    /// Offset of the first DIE, relative to the unit.
    pub header_size: u64,
    /// Offset one past the unit's last byte, within the section.
    pub end_offset: u64,
}

impl UnitHeader {
    /// Parses a unit header at `offset`.
    ///
    /// `in_types_section` selects the DWARF 4 `.debug_types` layout, which
    /// carries a type signature and offset after the standard fields.
    pub fn parse(
        sections: &Sections<'_>,
        data: &[u8],
        offset: u64,
        in_types_section: bool,
    ) -> Result<UnitHeader, DwarfError> {
        let start = usize::try_from(offset).map_err(|_| DwarfErrorKind::Overflow)?;
        let mut cursor = Cursor::new_at(data, start, sections.endian);

        let (unit_length, format) = cursor.read_initial_length()?;
        let body_start = cursor.position() as u64;
        let end_offset = body_start
            .checked_add(unit_length)
            .ok_or(DwarfErrorKind::Overflow)?;
        if end_offset > data.len() as u64 {
            return Err(DwarfErrorKind::BadLength.into());
        }

        let version = cursor.read_u16()?;
        let section = if in_types_section {
            ".debug_types"
        } else {
            ".debug_info"
        };
        if !(2..=5).contains(&version) {
            return Err(DwarfErrorKind::UnsupportedVersion { section, version }.into());
        }

        let mut unit_type = if in_types_section {
            UnitType::Type
        } else {
            UnitType::Compile
        };
        let mut dwo_id = None;
        let mut type_signature = None;
        let mut type_offset = None;

        let (abbrev_offset, address_size);
        if version >= 5 {
            let raw_type = cursor.read_u8()?;
            address_size = cursor.read_u8()?;
            abbrev_offset = cursor.read_offset(format)?;
            unit_type = match raw_type {
                c::DW_UT_compile => UnitType::Compile,
                c::DW_UT_type => UnitType::Type,
                c::DW_UT_partial => UnitType::Partial,
                c::DW_UT_skeleton => UnitType::Skeleton,
                c::DW_UT_split_compile => UnitType::SplitCompile,
                c::DW_UT_split_type => UnitType::SplitType,
                other => UnitType::Unknown(other),
            };
            match unit_type {
                UnitType::Skeleton | UnitType::SplitCompile => {
                    dwo_id = Some(cursor.read_u64()?);
                }
                UnitType::Type | UnitType::SplitType => {
                    type_signature = Some(cursor.read_u64()?);
                    type_offset = Some(cursor.read_offset(format)?);
                }
                _ => {}
            }
        } else {
            abbrev_offset = cursor.read_offset(format)?;
            address_size = cursor.read_u8()?;
            if in_types_section {
                type_signature = Some(cursor.read_u64()?);
                type_offset = Some(cursor.read_offset(format)?);
            }
        }

        if address_size != 4 && address_size != 8 {
            return Err(DwarfErrorKind::BadAddressSize(address_size).into());
        }

        Ok(UnitHeader {
            offset,
            unit_length,
            format,
            version,
            unit_type,
            abbrev_offset,
            address_size,
            dwo_id,
            type_signature,
            type_offset,
            header_size: cursor.position() as u64 - offset,
            end_offset,
        })
    }

    /// The form-decoding parameters of this unit.
    pub fn encoding(&self, sections: &Sections<'_>) -> UnitEncoding {
        UnitEncoding {
            endian: sections.endian,
            format: self.format,
            address_size: self.address_size,
            version: self.version,
            unit_offset: self.offset,
        }
    }
}

/// Fallible iterator over the unit headers of `.debug_info` or `.debug_types`.
///
/// A malformed header exhausts the iterator after yielding its error.
pub struct UnitIter<'data> {
    sections: Sections<'data>,
    in_types_section: bool,
    offset: u64,
    failed: bool,
}

impl<'data> UnitIter<'data> {
    fn data(&self) -> &'data [u8] {
        if self.in_types_section {
            self.sections.debug_types
        } else {
            self.sections.debug_info
        }
    }
}

impl FallibleIterator for UnitIter<'_> {
    type Item = UnitHeader;
    type Error = DwarfError;

    fn next(&mut self) -> Result<Option<UnitHeader>, DwarfError> {
        let data = self.data();
        if self.failed || self.offset >= data.len() as u64 {
            return Ok(None);
        }
        match UnitHeader::parse(&self.sections, data, self.offset, self.in_types_section) {
            Ok(header) => {
                self.offset = header.end_offset;
                Ok(Some(header))
            }
            Err(err) => {
                self.failed = true;
                Err(err)
            }
        }
    }
}

/// Iterates the compilation units of `.debug_info`.
pub fn units<'data>(sections: &Sections<'data>) -> UnitIter<'data> {
    UnitIter {
        sections: *sections,
        in_types_section: false,
        offset: 0,
        failed: false,
    }
}

/// Iterates the type units of `.debug_types`.
pub fn type_units<'data>(sections: &Sections<'data>) -> UnitIter<'data> {
    UnitIter {
        sections: *sections,
        in_types_section: true,
        offset: 0,
        failed: false,
    }
}

/// One DIE as yielded by [`EntriesCursor`].
#[derive(Clone, Copy, Debug)]
pub struct DieEntry<'abbrev> {
    /// Offset of the DIE within its section.
    pub offset: u64,
    /// Offset of the first attribute byte within the section.
    pub attrs_start: u64,
    /// The abbreviation describing this DIE.
    pub abbrev: &'abbrev Abbrev,
    /// Depth below the unit's root DIE (the root is at depth 0).
    pub depth: isize,
    /// The resolved `DW_AT_sibling` target, when the DIE carries one.
    pub sibling: Option<u64>,
}

impl DieEntry<'_> {
    /// The DIE tag.
    pub fn tag(&self) -> u64 {
        self.abbrev.tag
    }
}

/// A depth-first, source-order cursor over a unit's DIE tree.
///
/// Cloning the cursor is cheap and allows reparsing a subtree on demand.
#[derive(Clone)]
pub struct EntriesCursor<'data, 'abbrev> {
    data: &'data [u8],
    cursor_pos: u64,
    end: u64,
    encoding: UnitEncoding,
    abbrevs: &'abbrev AbbrevTable,
    depth: isize,
    done: bool,
}

impl<'data, 'abbrev> EntriesCursor<'data, 'abbrev> {
    /// Creates a cursor over the DIEs of `header`'s unit.
    pub fn new(
        sections: &Sections<'data>,
        header: &UnitHeader,
        abbrevs: &'abbrev AbbrevTable,
        in_types_section: bool,
    ) -> Self {
        let data = if in_types_section {
            sections.debug_types
        } else {
            sections.debug_info
        };
        EntriesCursor {
            data,
            cursor_pos: header.offset + header.header_size,
            end: header.end_offset,
            encoding: header.encoding(sections),
            abbrevs,
            depth: 0,
            done: false,
        }
    }

    /// The current depth below the root DIE.
    pub fn depth(&self) -> isize {
        self.depth
    }

    /// Skips the children of `entry`, leaving the cursor at its next
    /// sibling. Uses the sibling attribute when the producer emitted one.
    pub fn skip_children(&mut self, entry: &DieEntry<'abbrev>) -> Result<(), DwarfError> {
        if !entry.abbrev.has_children {
            return Ok(());
        }
        if let Some(sibling) = entry.sibling {
            if sibling > entry.offset && sibling <= self.end {
                self.cursor_pos = sibling;
                self.depth = entry.depth;
                return Ok(());
            }
        }
        while let Some(next) = self.next()? {
            if next.depth <= entry.depth {
                // Reposition so the caller sees this entry again.
                self.cursor_pos = next.offset;
                self.depth = next.depth;
                break;
            }
        }
        Ok(())
    }
}

impl<'abbrev> FallibleIterator for EntriesCursor<'_, 'abbrev> {
    type Item = DieEntry<'abbrev>;
    type Error = DwarfError;

    fn next(&mut self) -> Result<Option<DieEntry<'abbrev>>, DwarfError> {
        if self.done {
            return Ok(None);
        }
        let result = self.next_inner();
        if result.is_err() {
            self.done = true;
        }
        result
    }
}

impl<'abbrev> EntriesCursor<'_, 'abbrev> {
    fn next_inner(&mut self) -> Result<Option<DieEntry<'abbrev>>, DwarfError> {
        let mut cursor = Cursor::new_at(
            self.data,
            usize::try_from(self.cursor_pos).map_err(|_| DwarfErrorKind::Overflow)?,
            self.encoding.endian,
        );

        loop {
            if cursor.position() as u64 >= self.end {
                self.done = true;
                return Ok(None);
            }

            let offset = cursor.position() as u64;
            let code = cursor.read_uleb128()?;
            if code == 0 {
                // A null entry ends the current sibling chain.
                self.depth -= 1;
                self.cursor_pos = cursor.position() as u64;
                if self.depth < 0 {
                    self.done = true;
                    return Ok(None);
                }
                continue;
            }

            let abbrev = self.abbrevs.get(code)?;
            let attrs_start = cursor.position() as u64;

            // Advance over the attribute bytes, remembering a sibling
            // pointer if the producer recorded one.
            let mut sibling = None;
            for spec in &abbrev.attrs {
                let value = decode_value(&mut cursor, spec, &self.encoding)?;
                if spec.name == c::DW_AT_sibling {
                    if let AttrValue::UnitRef(target) = value {
                        sibling = Some(target);
                    }
                }
            }

            let depth = self.depth;
            if abbrev.has_children {
                self.depth += 1;
            }
            self.cursor_pos = cursor.position() as u64;

            return Ok(Some(DieEntry {
                offset,
                attrs_start,
                abbrev,
                depth,
                sibling,
            }));
        }
    }
}

/// A parsed unit: its header plus the base attributes of the root DIE.
#[derive(Clone, Debug)]
pub struct Unit {
    /// The unit header.
    pub header: UnitHeader,
    /// `DW_AT_addr_base` / `DW_AT_GNU_addr_base`.
    pub addr_base: Option<u64>,
    /// `DW_AT_str_offsets_base`.
    pub str_offsets_base: Option<u64>,
    /// `DW_AT_loclists_base`.
    pub loclists_base: Option<u64>,
    /// `DW_AT_rnglists_base`.
    pub rnglists_base: Option<u64>,
    /// `DW_AT_GNU_ranges_base`.
    pub ranges_base: Option<u64>,
    /// `DW_AT_low_pc` of the root DIE, the unit's base address.
    pub low_pc: Option<u64>,
    /// `DW_AT_stmt_list`, the unit's line program offset.
    pub stmt_list: Option<u64>,
    /// The split file name from `DW_AT_dwo_name`/`DW_AT_GNU_dwo_name`,
    /// as an offset-free decoded value is not always possible, the raw
    /// string bytes when the form was directly decodable.
    pub dwo_name: Option<Vec<u8>>,
    /// The unit id, from the v5 header or `DW_AT_GNU_dwo_id`.
    pub dwo_id: Option<u64>,
}

impl Unit {
    /// Parses the unit's root DIE to extract its base attributes.
    pub fn parse(
        sections: &Sections<'_>,
        cache: &AbbrevCache,
        header: UnitHeader,
        in_types_section: bool,
    ) -> Result<Unit, DwarfError> {
        let abbrevs = cache.get(sections.debug_abbrev, header.abbrev_offset, sections.endian)?;
        let mut cursor = EntriesCursor::new(sections, &header, abbrevs, in_types_section);

        let mut unit = Unit {
            header,
            addr_base: None,
            str_offsets_base: None,
            loclists_base: None,
            rnglists_base: None,
            ranges_base: None,
            low_pc: None,
            stmt_list: None,
            dwo_name: None,
            dwo_id: header.dwo_id,
        };

        let root = match cursor.next()? {
            Some(root) => root,
            None => return Ok(unit),
        };

        let data = if in_types_section {
            sections.debug_types
        } else {
            sections.debug_info
        };
        let mut attrs = AttrIter::new(data, root.attrs_start, root.abbrev, header.encoding(sections));
        while let Some(Attr { name, value, .. }) = attrs.next()? {
            match name {
                c::DW_AT_addr_base | c::DW_AT_GNU_addr_base => {
                    unit.addr_base = value.as_sec_offset()
                }
                c::DW_AT_str_offsets_base => unit.str_offsets_base = value.as_sec_offset(),
                c::DW_AT_loclists_base => unit.loclists_base = value.as_sec_offset(),
                c::DW_AT_rnglists_base => unit.rnglists_base = value.as_sec_offset(),
                c::DW_AT_GNU_ranges_base => unit.ranges_base = value.as_sec_offset(),
                c::DW_AT_low_pc => {
                    if let AttrValue::Address(addr) = value {
                        unit.low_pc = Some(addr);
                    }
                }
                c::DW_AT_stmt_list => unit.stmt_list = value.as_sec_offset(),
                c::DW_AT_GNU_dwo_id => {
                    if let AttrValue::Udata(id) = value {
                        unit.dwo_id = Some(id);
                    }
                }
                c::DW_AT_dwo_name | c::DW_AT_GNU_dwo_name => {
                    if let AttrValue::String(name) = value {
                        unit.dwo_name = Some(name.to_vec());
                    } else if let AttrValue::StrRef(offset) = value {
                        if let Some(name) = relic_common::cstr_at(
                            sections.debug_str,
                            usize::try_from(offset).unwrap_or(usize::MAX),
                        ) {
                            unit.dwo_name = Some(name.to_vec());
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(unit)
    }

    /// Resolves an address index through `.debug_addr`.
    pub fn address(&self, sections: &Sections<'_>, index: u64) -> Result<u64, DwarfError> {
        if sections.debug_addr.is_empty() {
            return Err(DwarfErrorKind::MissingSection(".debug_addr").into());
        }
        let base = match self.addr_base {
            Some(base) => base,
            // DWARF 5 emitters place the base right after the table header;
            // GNU DebugFission tables have no header at all.
            None if self.header.version >= 5 => match self.header.format {
                Format::Dwarf32 => 8,
                Format::Dwarf64 => 16,
            },
            None => 0,
        };
        let offset = base
            .checked_add(index.checked_mul(self.header.address_size.into()).ok_or(DwarfErrorKind::Overflow)?)
            .ok_or(DwarfErrorKind::Overflow)?;
        let offset = usize::try_from(offset).map_err(|_| DwarfErrorKind::Overflow)?;
        let mut cursor = Cursor::new_at(sections.debug_addr, offset, sections.endian);
        cursor
            .read_address(self.header.address_size)
            .map_err(|e| DwarfError::new(DwarfErrorKind::BadIndex(index), e))
    }

    /// Resolves a string offsets index into an offset into `.debug_str`.
    pub fn str_offset(&self, sections: &Sections<'_>, index: u64) -> Result<u64, DwarfError> {
        if sections.debug_str_offsets.is_empty() {
            return Err(DwarfErrorKind::MissingSection(".debug_str_offsets").into());
        }
        let base = match self.str_offsets_base {
            Some(base) => base,
            None if self.header.version >= 5 => match self.header.format {
                Format::Dwarf32 => 8,
                Format::Dwarf64 => 16,
            },
            None => 0,
        };
        let entry_size = u64::from(self.header.format.offset_size());
        let offset = base
            .checked_add(index.checked_mul(entry_size).ok_or(DwarfErrorKind::Overflow)?)
            .ok_or(DwarfErrorKind::Overflow)?;
        let offset = usize::try_from(offset).map_err(|_| DwarfErrorKind::Overflow)?;
        let mut cursor = Cursor::new_at(sections.debug_str_offsets, offset, sections.endian);
        cursor
            .read_offset(self.header.format)
            .map_err(|e| DwarfError::new(DwarfErrorKind::BadIndex(index), e))
    }

    /// Resolves any string-valued attribute to its bytes.
    pub fn string<'data>(
        &self,
        sections: &Sections<'data>,
        value: &AttrValue<'data>,
    ) -> Result<&'data [u8], DwarfError> {
        let str_at = |data: &'data [u8], offset: u64, section: &'static str| {
            if data.is_empty() {
                return Err(DwarfError::from(DwarfErrorKind::MissingSection(section)));
            }
            relic_common::cstr_at(data, usize::try_from(offset).unwrap_or(usize::MAX))
                .ok_or_else(|| DwarfErrorKind::BadIndex(offset).into())
        };
        match *value {
            AttrValue::String(bytes) => Ok(bytes),
            AttrValue::StrRef(offset) => str_at(sections.debug_str, offset, ".debug_str"),
            AttrValue::LineStrRef(offset) => {
                str_at(sections.debug_line_str, offset, ".debug_line_str")
            }
            AttrValue::AltStrRef(offset) => {
                str_at(sections.alt_debug_str, offset, "alternate .debug_str")
            }
            AttrValue::StrOffsetsIndex(index) => {
                let offset = self.str_offset(sections, index)?;
                str_at(sections.debug_str, offset, ".debug_str")
            }
            _ => Err(DwarfErrorKind::UnknownForm(0).into()),
        }
    }

    /// Resolves a `rnglistx` index into an offset into `.debug_rnglists`.
    pub fn rnglist_offset(&self, sections: &Sections<'_>, index: u64) -> Result<u64, DwarfError> {
        self.list_offset(
            sections,
            sections.debug_rnglists,
            ".debug_rnglists",
            self.rnglists_base,
            index,
        )
    }

    /// Resolves a `loclistx` index into an offset into `.debug_loclists`.
    pub fn loclist_offset(&self, sections: &Sections<'_>, index: u64) -> Result<u64, DwarfError> {
        self.list_offset(
            sections,
            sections.debug_loclists,
            ".debug_loclists",
            self.loclists_base,
            index,
        )
    }

    fn list_offset(
        &self,
        sections: &Sections<'_>,
        data: &[u8],
        section: &'static str,
        base: Option<u64>,
        index: u64,
    ) -> Result<u64, DwarfError> {
        if data.is_empty() {
            return Err(DwarfErrorKind::MissingSection(section).into());
        }
        let base = match base {
            Some(base) => base,
            None => match self.header.format {
                // One past the list header: length, version, address size,
                // segment size, offset entry count.
                Format::Dwarf32 => 12,
                Format::Dwarf64 => 20,
            },
        };
        let entry_size = u64::from(self.header.format.offset_size());
        let offset = base
            .checked_add(index.checked_mul(entry_size).ok_or(DwarfErrorKind::Overflow)?)
            .ok_or(DwarfErrorKind::Overflow)?;
        let mut cursor = Cursor::new_at(
            data,
            usize::try_from(offset).map_err(|_| DwarfErrorKind::Overflow)?,
            sections.endian,
        );
        let relative = cursor
            .read_offset(self.header.format)
            .map_err(|e| DwarfError::new(DwarfErrorKind::BadIndex(index), e))?;
        base.checked_add(relative)
            .ok_or_else(|| DwarfErrorKind::Overflow.into())
    }
}

impl AttrValue<'_> {
    fn as_sec_offset(&self) -> Option<u64> {
        match *self {
            AttrValue::SecOffset(offset) | AttrValue::Udata(offset) => Some(offset),
            _ => None,
        }
    }
}

/// An id into a [`DieArena`].
pub type DieId = u32;

/// One decoded DIE header stored in the arena.
#[derive(Clone, Copy, Debug)]
pub struct DieNode {
    /// Offset of the DIE within its section.
    pub offset: u64,
    /// Offset of the first attribute byte.
    pub attrs_start: u64,
    /// The abbreviation code.
    pub code: u64,
    /// The DIE tag.
    pub tag: u64,
    /// Whether the DIE has children.
    pub has_children: bool,
    /// Depth below the root DIE.
    pub depth: u32,
}

/// An arena of the decoded DIE headers of one unit, indexed by [`DieId`].
///
/// Parent and sibling relationships are computed from depths, not stored.
#[derive(Debug, Default)]
pub struct DieArena {
    nodes: Vec<DieNode>,
}

impl DieArena {
    /// Builds the arena by walking the whole unit.
    pub fn build(
        sections: &Sections<'_>,
        header: &UnitHeader,
        abbrevs: &AbbrevTable,
        in_types_section: bool,
    ) -> Result<DieArena, DwarfError> {
        let mut cursor = EntriesCursor::new(sections, header, abbrevs, in_types_section);
        let mut nodes = Vec::new();
        while let Some(entry) = cursor.next()? {
            nodes.push(DieNode {
                offset: entry.offset,
                attrs_start: entry.attrs_start,
                code: entry.abbrev.code,
                tag: entry.abbrev.tag,
                has_children: entry.abbrev.has_children,
                depth: u32::try_from(entry.depth.max(0)).map_err(|_| DwarfErrorKind::Overflow)?,
            });
        }
        Ok(DieArena { nodes })
    }

    /// Number of DIEs in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena holds no DIEs.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node for `id`.
    pub fn get(&self, id: DieId) -> Option<&DieNode> {
        self.nodes.get(id as usize)
    }

    /// Finds the id of the DIE at the given section offset.
    pub fn by_offset(&self, offset: u64) -> Option<DieId> {
        self.nodes
            .binary_search_by_key(&offset, |node| node.offset)
            .ok()
            .map(|index| index as DieId)
    }

    /// The parent of `id`, computed by scanning back for a shallower node.
    pub fn parent(&self, id: DieId) -> Option<DieId> {
        let depth = self.nodes.get(id as usize)?.depth;
        let target = depth.checked_sub(1)?;
        (0..id as usize)
            .rev()
            .find(|&i| self.nodes[i].depth == target)
            .map(|i| i as DieId)
    }

    /// The next sibling of `id`, if any.
    pub fn next_sibling(&self, id: DieId) -> Option<DieId> {
        let depth = self.nodes.get(id as usize)?.depth;
        for (index, node) in self.nodes.iter().enumerate().skip(id as usize + 1) {
            if node.depth < depth {
                return None;
            }
            if node.depth == depth {
                return Some(index as DieId);
            }
        }
        None
    }

    /// The children of `id`, in source order.
    pub fn children(&self, id: DieId) -> impl Iterator<Item = DieId> + '_ {
        let depth = self.nodes.get(id as usize).map(|node| node.depth);
        self.nodes
            .iter()
            .enumerate()
            .skip(id as usize + 1)
            .take_while(move |(_, node)| Some(node.depth) > depth)
            .filter(move |(_, node)| Some(node.depth) == depth.map(|d| d + 1))
            .map(|(index, _)| index as DieId)
    }
}

/// The association between a skeleton unit and its split partner.
///
/// Stored in a table keyed by unit id; neither unit points at the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplitLink {
    /// Offset of the skeleton unit in the main file's `.debug_info`.
    pub skeleton: u64,
    /// Offset of the split unit in the `.dwo` file's `.debug_info`.
    pub split: u64,
    /// The shared 64-bit unit id.
    pub dwo_id: u64,
}

/// The skeleton/split associations between a main file and one split file.
#[derive(Debug, Default)]
pub struct SplitTable {
    links: Vec<SplitLink>,
    by_id: HashMap<u64, usize>,
}

impl SplitTable {
    /// Pairs the skeleton units of `main` with the split units of `split`.
    ///
    /// Units whose ids have no partner are left unpaired; a duplicate id in
    /// the split file keeps the first occurrence, matching on-disk order.
    pub fn pair(main: &Sections<'_>, split: &Sections<'_>) -> Result<SplitTable, DwarfError> {
        let cache = AbbrevCache::new();
        let split_cache = AbbrevCache::new();

        let mut split_by_id = HashMap::new();
        let mut iter = units(split);
        while let Some(header) = iter.next()? {
            let unit = Unit::parse(split, &split_cache, header, false)?;
            if let Some(id) = unit.dwo_id {
                split_by_id.entry(id).or_insert(header.offset);
            }
        }

        let mut table = SplitTable::default();
        let mut iter = units(main);
        while let Some(header) = iter.next()? {
            let unit = Unit::parse(main, &cache, header, false)?;
            if let Some(id) = unit.dwo_id {
                if let Some(&split_offset) = split_by_id.get(&id) {
                    table.by_id.insert(id, table.links.len());
                    table.links.push(SplitLink {
                        skeleton: header.offset,
                        split: split_offset,
                        dwo_id: id,
                    });
                }
            }
        }
        Ok(table)
    }

    /// Looks up the link for a unit id.
    pub fn by_id(&self, dwo_id: u64) -> Option<&SplitLink> {
        self.by_id.get(&dwo_id).map(|&index| &self.links[index])
    }

    /// All links, in main-file unit order.
    pub fn links(&self) -> &[SplitLink] {
        &self.links
    }
}

/// Computes the candidate path of a split-DWARF file.
///
/// A caller-provided path wins; otherwise a `.dwo` suffix on the module
/// path is replaced with `.o`, the layout produced by `-gsplit-dwarf`
/// object files.
pub fn split_candidate_path(module: &Path, user: Option<&Path>) -> PathBuf {
    if let Some(user) = user {
        return user.to_owned();
    }
    match module.extension() {
        Some(ext) if ext == "dwo" => module.with_extension("o"),
        _ => module.to_owned(),
    }
}
