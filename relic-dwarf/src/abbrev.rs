//! Abbreviation tables from `.debug_abbrev`.

use std::collections::HashMap;

use elsa::FrozenMap;
use relic_common::{Cursor, Endian};

use crate::constants;
use crate::{DwarfError, DwarfErrorKind};

/// One attribute specification of an abbreviation: name, form, and the
/// inline value for `DW_FORM_implicit_const`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttrSpec {
    /// Attribute name (`DW_AT_*`).
    pub name: u64,
    /// Attribute form (`DW_FORM_*`).
    pub form: u64,
    /// The constant carried by the abbreviation itself.
    pub implicit_const: Option<i64>,
}

/// One decoded abbreviation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Abbrev {
    /// The code DIEs reference this abbreviation by.
    pub code: u64,
    /// The DIE tag (`DW_TAG_*`).
    pub tag: u64,
    /// Whether DIEs with this abbreviation have children.
    pub has_children: bool,
    /// The attribute specifications, in source order.
    pub attrs: Vec<AttrSpec>,
}

/// The abbreviation table for one compilation unit.
#[derive(Debug, Default)]
pub struct AbbrevTable {
    abbrevs: HashMap<u64, Abbrev>,
}

impl AbbrevTable {
    /// Parses a table starting at `offset` in `.debug_abbrev`, stopping at
    /// the terminating zero code.
    pub fn parse(
        debug_abbrev: &[u8],
        offset: u64,
        endian: Endian,
    ) -> Result<AbbrevTable, DwarfError> {
        let offset = usize::try_from(offset).map_err(|_| DwarfErrorKind::Overflow)?;
        if offset > debug_abbrev.len() {
            return Err(DwarfErrorKind::BadLength.into());
        }
        let mut cursor = Cursor::new_at(debug_abbrev, offset, endian);
        let mut abbrevs = HashMap::new();

        loop {
            let code = cursor.read_uleb128()?;
            if code == 0 {
                break;
            }
            let tag = cursor.read_uleb128()?;
            let children = cursor.read_u8()?;
            let has_children = match children {
                constants::DW_CHILDREN_no => false,
                constants::DW_CHILDREN_yes => true,
                other => {
                    return Err(DwarfErrorKind::UnknownOpcode {
                        section: ".debug_abbrev",
                        opcode: other,
                    }
                    .into())
                }
            };

            let mut attrs = Vec::new();
            loop {
                let name = cursor.read_uleb128()?;
                let form = cursor.read_uleb128()?;
                if name == 0 && form == 0 {
                    break;
                }
                let implicit_const = if form == constants::DW_FORM_implicit_const {
                    Some(cursor.read_sleb128()?)
                } else {
                    None
                };
                attrs.push(AttrSpec {
                    name,
                    form,
                    implicit_const,
                });
            }

            abbrevs.insert(
                code,
                Abbrev {
                    code,
                    tag,
                    has_children,
                    attrs,
                },
            );
        }

        Ok(AbbrevTable { abbrevs })
    }

    /// Looks up the abbreviation with the given code.
    pub fn get(&self, code: u64) -> Result<&Abbrev, DwarfError> {
        self.abbrevs
            .get(&code)
            .ok_or_else(|| DwarfErrorKind::BadAbbrevCode(code).into())
    }

    /// Number of abbreviations in the table.
    pub fn len(&self) -> usize {
        self.abbrevs.len()
    }

    /// Whether the table has no abbreviations.
    pub fn is_empty(&self) -> bool {
        self.abbrevs.is_empty()
    }
}

/// A cache of abbreviation tables keyed by their section offset.
///
/// Units routinely share one table; reading the same offset twice reuses
/// the parsed result. The cache is append-only and usable through a shared
/// reference.
#[derive(Default)]
pub struct AbbrevCache {
    tables: FrozenMap<u64, Box<AbbrevTable>>,
}

impl AbbrevCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        AbbrevCache {
            tables: FrozenMap::new(),
        }
    }

    /// Returns the table at `offset`, parsing it on first use.
    pub fn get(
        &self,
        debug_abbrev: &[u8],
        offset: u64,
        endian: Endian,
    ) -> Result<&AbbrevTable, DwarfError> {
        if let Some(table) = self.tables.get(&offset) {
            return Ok(table);
        }
        let table = AbbrevTable::parse(debug_abbrev, offset, endian)?;
        Ok(self.tables.insert(offset, Box::new(table)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    fn uleb(value: u64, out: &mut Vec<u8>) {
        let mut value = value;
        loop {
            let mut byte = (value & 0x7f) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            out.push(byte);
            if value == 0 {
                break;
            }
        }
    }

    fn sample_table() -> Vec<u8> {
        let mut out = Vec::new();
        // Abbrev 1: compile_unit, has children, name=strp, stmt_list=sec_offset.
        uleb(1, &mut out);
        uleb(constants::DW_TAG_compile_unit, &mut out);
        out.push(constants::DW_CHILDREN_yes);
        uleb(constants::DW_AT_name, &mut out);
        uleb(constants::DW_FORM_strp, &mut out);
        uleb(constants::DW_AT_stmt_list, &mut out);
        uleb(constants::DW_FORM_sec_offset, &mut out);
        uleb(0, &mut out);
        uleb(0, &mut out);
        // Abbrev 2: base_type with an implicit_const attribute.
        uleb(2, &mut out);
        uleb(constants::DW_TAG_base_type, &mut out);
        out.push(constants::DW_CHILDREN_no);
        uleb(constants::DW_AT_language, &mut out);
        uleb(constants::DW_FORM_implicit_const, &mut out);
        out.push(0x1c); // sleb(28)
        uleb(0, &mut out);
        uleb(0, &mut out);
        // Terminator.
        uleb(0, &mut out);
        out
    }

    #[test]
    fn test_parse_table() {
        let data = sample_table();
        let table = AbbrevTable::parse(&data, 0, Endian::Little).unwrap();
        assert_eq!(table.len(), 2);

        let cu = table.get(1).unwrap();
        assert_eq!(cu.tag, constants::DW_TAG_compile_unit);
        assert!(cu.has_children);
        assert_eq!(cu.attrs.len(), 2);
        assert_eq!(cu.attrs[0].name, constants::DW_AT_name);
        assert_eq!(cu.attrs[0].form, constants::DW_FORM_strp);

        let base = table.get(2).unwrap();
        assert!(!base.has_children);
        assert_eq!(base.attrs[0].implicit_const, Some(28));

        assert!(table.get(3).is_err());
    }

    #[test]
    fn test_cache_reuses_tables() {
        let data = sample_table();
        let cache = AbbrevCache::new();
        let first = cache.get(&data, 0, Endian::Little).unwrap() as *const AbbrevTable;
        let second = cache.get(&data, 0, Endian::Little).unwrap() as *const AbbrevTable;
        assert_eq!(first, second);
    }

    #[test]
    fn test_offset_out_of_bounds() {
        let data = sample_table();
        assert!(AbbrevTable::parse(&data, data.len() as u64 + 1, Endian::Little).is_err());
    }
}
