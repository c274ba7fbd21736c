//! Symbol table reconciliation: merging, section-index rewriting, and the
//! relocation/hash/versym adjustments that follow from a permutation of
//! symbol indices.

use std::cmp::Ordering;

use relic_common::{Cursor, Endian};
use relic_elf::write::{put_sym, Emitter};
use relic_elf::{raw, Class, Elf, Symbol};

use crate::strtab::StringTableBuilder;
use crate::{Contents, OutSection, UnstripError, UnstripErrorKind};

fn read_sym(
    data: &[u8],
    index: usize,
    class: Class,
    endian: Endian,
) -> Result<Symbol, UnstripError> {
    let mut cursor = Cursor::new_at(data, index * class.sym_size(), endian);
    let sym = match class {
        Class::Elf32 => {
            let st_name = cursor.read_u32();
            let st_value = cursor.read_u32();
            let st_size = cursor.read_u32();
            let st_info = cursor.read_u8();
            let st_other = cursor.read_u8();
            let st_shndx = cursor.read_u16();
            Symbol {
                st_name: st_name.map_err(bad)?,
                st_value: st_value.map_err(bad)?.into(),
                st_size: st_size.map_err(bad)?.into(),
                st_info: st_info.map_err(bad)?,
                st_other: st_other.map_err(bad)?,
                st_shndx: st_shndx.map_err(bad)?,
            }
        }
        Class::Elf64 => Symbol {
            st_name: cursor.read_u32().map_err(bad)?,
            st_info: cursor.read_u8().map_err(bad)?,
            st_other: cursor.read_u8().map_err(bad)?,
            st_shndx: cursor.read_u16().map_err(bad)?,
            st_value: cursor.read_u64().map_err(bad)?,
            st_size: cursor.read_u64().map_err(bad)?,
        },
    };
    Ok(sym)
}

fn bad(e: relic_common::ReadError) -> UnstripError {
    UnstripError::new(UnstripErrorKind::Malformed, e)
}

/// Rewrites the `st_shndx` fields of a symbol table copied from the
/// stripped file so they reference output section indices.
pub(crate) fn remap_symtab_shndx(
    class: Class,
    endian: Endian,
    data: &[u8],
    stripped_shnum: usize,
    ndx_section: &[usize],
) -> Result<Vec<u8>, UnstripError> {
    let entsize = class.sym_size();
    let count = data.len() / entsize;
    let mut emitter = Emitter::new(endian);

    for index in 0..count {
        let mut sym = read_sym(data, index, class, endian)?;
        if index > 0 && sym.st_shndx != raw::SHN_UNDEF && sym.st_shndx < raw::SHN_LORESERVE {
            let old = usize::from(sym.st_shndx);
            if old >= stripped_shnum {
                return Err(UnstripError::new(
                    UnstripErrorKind::Malformed,
                    format!("symbol {index} has invalid section index"),
                ));
            }
            let new = ndx_section[old - 1];
            if new >= usize::from(raw::SHN_LORESERVE) {
                return Err(UnstripError::new(
                    UnstripErrorKind::LayoutOverflow,
                    "section index needs SHN_XINDEX",
                ));
            }
            sym.st_shndx = new as u16;
        }
        put_sym(&mut emitter, class, &sym)?;
    }
    Ok(emitter.into_bytes())
}

struct MergeSym {
    name: Vec<u8>,
    value: u64,
    size: u64,
    shndx: u32,
    info: u8,
    other: u8,
    /// 0 for the stripped table, 1 for the debug table.
    table: u8,
    orig: usize,
    slot: usize,
}

impl MergeSym {
    fn bind(&self) -> u8 {
        raw::st_bind(self.info)
    }

    fn is_section(&self) -> bool {
        raw::st_type(self.info) == raw::STT_SECTION
    }
}

/// Compares symbols with a consistent ordering, but one only meaningful
/// for equality.
fn compare_merge(a: &MergeSym, b: &MergeSym) -> Ordering {
    a.value
        .cmp(&b.value)
        .then_with(|| a.size.cmp(&b.size))
        .then_with(|| a.shndx.cmp(&b.shndx))
        .then_with(|| (a.info, a.other).cmp(&(b.info, b.other)))
        .then_with(|| a.name.cmp(&b.name))
}

/// Merges the stripped file's symbol table into the debug file's,
/// deduplicating and renumbering so locals precede non-locals and section
/// symbols come first in section-index order. Every relocation, group,
/// hash table, and version table that referenced either table is rewritten
/// through the resulting permutation.
#[allow(clippy::too_many_arguments)]
pub(crate) fn merge_symbol_tables(
    stripped: &Elf<'_>,
    stripped_symtab_idx: usize,
    _debug: &Elf<'_>,
    debug_symtab: usize,
    ndx_section: &[usize],
    out: &mut Vec<OutSection<'_>>,
    class: Class,
    endian: Endian,
) -> Result<(), UnstripError> {
    let s_table = stripped.symbols(stripped_symtab_idx)?;
    let s_count = s_table.len();

    let entsize = class.sym_size();
    let d_data = out[debug_symtab].contents.bytes().to_vec();
    let d_count = d_data.len() / entsize;
    let d_strtab_idx = out[debug_symtab].shdr.sh_link as usize;
    if d_strtab_idx == 0 || d_strtab_idx >= out.len() {
        return Err(UnstripErrorKind::Malformed.into());
    }
    let d_strtab = out[d_strtab_idx].contents.bytes().to_vec();

    let total = s_count.saturating_sub(1) + d_count.saturating_sub(1);
    let mut symbols: Vec<MergeSym> = Vec::with_capacity(total);

    // Collect the stripped file's symbols, mapping section indices into
    // the output numbering.
    for index in 1..s_count {
        let sym = s_table
            .get(index)
            .map_err(|e| UnstripError::new(UnstripErrorKind::Malformed, e))?;
        let mut shndx = s_table
            .resolved_shndx(index, &sym)
            .map_err(|e| UnstripError::new(UnstripErrorKind::Malformed, e))?;
        if shndx != 0 && shndx < u32::from(raw::SHN_LORESERVE) {
            let old = shndx as usize;
            if old > ndx_section.len() {
                return Err(UnstripError::new(
                    UnstripErrorKind::Malformed,
                    format!("symbol {index} has invalid section index"),
                ));
            }
            shndx = ndx_section[old - 1] as u32;
        }
        let name = s_table
            .name(&sym)
            .map_err(|e| UnstripError::new(UnstripErrorKind::Malformed, e))?
            .to_vec();
        symbols.push(MergeSym {
            name,
            value: sym.st_value,
            size: sym.st_size,
            shndx,
            info: sym.st_info,
            other: sym.st_other,
            table: 0,
            orig: index,
            slot: 0,
        });
    }

    // Collect the debug file's symbols; its section indices are already
    // output indices.
    for index in 1..d_count {
        let sym = read_sym(&d_data, index, class, endian)?;
        let name = relic_common::cstr_at(&d_strtab, sym.st_name as usize)
            .ok_or_else(|| {
                UnstripError::new(
                    UnstripErrorKind::Malformed,
                    format!("invalid string offset in symbol {index}"),
                )
            })?
            .to_vec();
        symbols.push(MergeSym {
            name,
            value: sym.st_value,
            size: sym.st_size,
            shndx: sym.st_shndx.into(),
            info: sym.st_info,
            other: sym.st_other,
            table: 1,
            orig: index,
            slot: 0,
        });
    }

    // Sort, then weed out duplicates: equal symbols share one slot.
    dmsort::sort_by(&mut symbols, compare_merge);
    let mut unique: Vec<usize> = Vec::new();
    for index in 0..symbols.len() {
        if index > 0 && compare_merge(&symbols[index - 1], &symbols[index]) == Ordering::Equal {
            symbols[index].slot = symbols[index - 1].slot;
        } else {
            symbols[index].slot = unique.len();
            unique.push(index);
        }
    }

    // Output order: locals before non-locals, section symbols first and in
    // section-index order, everything else stable.
    unique.sort_by(|&a, &b| {
        let a = &symbols[a];
        let b = &symbols[b];
        let local = (b.bind() == raw::STB_LOCAL).cmp(&(a.bind() == raw::STB_LOCAL));
        local
            .then_with(|| b.is_section().cmp(&a.is_section()))
            .then_with(|| {
                if a.is_section() && b.is_section() {
                    a.shndx.cmp(&b.shndx)
                } else {
                    Ordering::Equal
                }
            })
            .then_with(|| (a.table, a.orig).cmp(&(b.table, b.orig)))
    });

    let mut final_of_slot = vec![0u32; unique.len()];
    for (position, &index) in unique.iter().enumerate() {
        final_of_slot[symbols[index].slot] = position as u32 + 1;
    }

    let mut s_map = vec![0u32; s_count];
    let mut d_map = vec![0u32; d_count];
    for sym in &symbols {
        let new = final_of_slot[sym.slot];
        match sym.table {
            0 => s_map[sym.orig] = new,
            _ => d_map[sym.orig] = new,
        }
    }

    // Write the merged table and its string table.
    let mut strtab = StringTableBuilder::new();
    let mut emitter = Emitter::new(endian);
    put_sym(&mut emitter, class, &Symbol::default())?;
    let mut first_nonlocal = unique.len() + 1;
    for (position, &index) in unique.iter().enumerate() {
        let sym = &symbols[index];
        if sym.bind() != raw::STB_LOCAL && position + 1 < first_nonlocal {
            first_nonlocal = position + 1;
        }
        let st_shndx = if sym.shndx < u32::from(raw::SHN_LORESERVE) {
            sym.shndx as u16
        } else if sym.shndx <= u32::from(u16::MAX) {
            sym.shndx as u16
        } else {
            return Err(UnstripError::new(
                UnstripErrorKind::LayoutOverflow,
                "section index needs SHN_XINDEX",
            ));
        };
        put_sym(
            &mut emitter,
            class,
            &Symbol {
                st_name: strtab.add(&sym.name),
                st_info: sym.info,
                st_other: sym.other,
                st_shndx,
                st_value: sym.value,
                st_size: sym.size,
            },
        )?;
    }

    let total_syms = unique.len() + 1;
    let table_bytes = emitter.into_bytes();
    out[debug_symtab].shdr.sh_size = table_bytes.len() as u64;
    out[debug_symtab].shdr.sh_info = first_nonlocal as u32;
    out[debug_symtab].contents = Contents::Owned(table_bytes);

    let strtab_bytes = strtab.finish();
    out[d_strtab_idx].shdr.sh_size = strtab_bytes.len() as u64;
    out[d_strtab_idx].contents = Contents::Owned(strtab_bytes);

    adjust_linked_sections(out, debug_symtab, &s_map, &d_map, total_syms, class, endian)
}

/// Counts the leading section symbols of the stripped symbol table and, if
/// the producer emitted one per section, inserts symbols for the sections
/// the output gained, rewriting dependents through the shifted indices.
pub(crate) fn top_up_section_symbols(
    stripped: &Elf<'_>,
    src_idx: usize,
    out: &mut Vec<OutSection<'_>>,
    out_idx: usize,
    out_shstrndx: usize,
    class: Class,
    endian: Endian,
) -> Result<(), UnstripError> {
    let src_table = stripped.symbols(src_idx)?;
    let src_shnum = stripped.shnum();

    // See if this symbol table has a leading section symbol for every
    // single section, in order.
    let mut leading = src_shnum;
    for index in 1..src_shnum.min(src_table.len()) {
        let sym = match src_table.get(index) {
            Ok(sym) => sym,
            Err(_) => return Ok(()),
        };
        let shndx = src_table.resolved_shndx(index, &sym).unwrap_or(0);
        if shndx as usize != index || sym.sym_type() != raw::STT_SECTION {
            leading = index;
            break;
        }
    }

    let target = if leading == src_shnum {
        out.len()
    } else if leading == stripped.shstrndx() {
        out_shstrndx
    } else {
        return Ok(());
    };
    if target <= leading {
        return Ok(());
    }
    let added = target - leading;

    let old_data = out[out_idx].contents.bytes().to_vec();
    let entsize = class.sym_size();
    let old_count = old_data.len() / entsize;
    if old_count < leading {
        return Ok(());
    }

    let mut emitter = Emitter::new(endian);
    emitter.put_bytes(&old_data[..leading * entsize]);
    for section in leading..target {
        if section >= usize::from(raw::SHN_LORESERVE) {
            return Err(UnstripError::new(
                UnstripErrorKind::LayoutOverflow,
                "section index needs SHN_XINDEX",
            ));
        }
        put_sym(
            &mut emitter,
            class,
            &Symbol {
                st_name: 0,
                st_info: raw::st_info(raw::STB_LOCAL, raw::STT_SECTION),
                st_other: 0,
                st_shndx: section as u16,
                st_value: 0,
                st_size: 0,
            },
        )?;
    }
    emitter.put_bytes(&old_data[leading * entsize..]);

    let total_syms = old_count + added;
    let table_bytes = emitter.into_bytes();
    out[out_idx].shdr.sh_size = table_bytes.len() as u64;
    out[out_idx].shdr.sh_info += added as u32;
    out[out_idx].contents = Contents::Owned(table_bytes);

    // Indices at or past the insertion point shift up by `added`.
    let mut map = vec![0u32; old_count];
    for (index, entry) in map.iter_mut().enumerate().skip(1) {
        *entry = if index < leading {
            index as u32
        } else {
            (index + added) as u32
        };
    }

    adjust_linked_sections(out, out_idx, &map, &map, total_syms, class, endian)
}

/// Rewrites every section that references `symtab_idx` through the index
/// permutations: relocations, group info symbols, hash tables, and version
/// symbol tables.
fn adjust_linked_sections(
    out: &mut Vec<OutSection<'_>>,
    symtab_idx: usize,
    stripped_map: &[u32],
    debug_map: &[u32],
    total_syms: usize,
    class: Class,
    endian: Endian,
) -> Result<(), UnstripError> {
    for index in 1..out.len() {
        if index == symtab_idx
            || out[index].shdr.sh_link as usize != symtab_idx
            || out[index].shdr.is_nobits()
        {
            continue;
        }
        let map: &[u32] = if out[index].from_stripped.is_some() {
            stripped_map
        } else {
            debug_map
        };

        match out[index].shdr.sh_type {
            raw::SHT_REL | raw::SHT_RELA => {
                let explicit_addend = out[index].shdr.sh_type == raw::SHT_RELA;
                let rewritten = rewrite_relocs(
                    out[index].contents.bytes(),
                    class,
                    endian,
                    explicit_addend,
                    map,
                )?;
                out[index].contents = Contents::Owned(rewritten);
            }
            raw::SHT_GROUP => {
                let old = out[index].shdr.sh_info as usize;
                if old != 0 {
                    let new = *map.get(old).ok_or(UnstripErrorKind::Malformed)?;
                    out[index].shdr.sh_info = new;
                }
            }
            raw::SHT_HASH => {
                let rebuilt =
                    rebuild_hash(out[index].contents.bytes(), endian, map, total_syms)?;
                out[index].shdr.sh_size = rebuilt.len() as u64;
                out[index].contents = Contents::Owned(rebuilt);
            }
            raw::SHT_GNU_VERSYM => {
                let grown = grow_versym(out[index].contents.bytes(), endian, map, total_syms)?;
                out[index].shdr.sh_size = grown.len() as u64;
                out[index].contents = Contents::Owned(grown);
            }
            _ => {}
        }
    }
    Ok(())
}

fn rewrite_relocs(
    data: &[u8],
    class: Class,
    endian: Endian,
    explicit_addend: bool,
    map: &[u32],
) -> Result<Vec<u8>, UnstripError> {
    let entsize = if explicit_addend {
        class.rela_size()
    } else {
        class.rel_size()
    };
    let count = data.len() / entsize;
    let mut emitter = Emitter::new(endian);

    for index in 0..count {
        let mut cursor = Cursor::new_at(data, index * entsize, endian);
        let (r_offset, r_info, r_addend) = match class {
            Class::Elf32 => {
                let offset: u64 = cursor.read_u32().map_err(bad)?.into();
                let info: u64 = cursor.read_u32().map_err(bad)?.into();
                let addend = if explicit_addend {
                    Some(i64::from(cursor.read_i32().map_err(bad)?))
                } else {
                    None
                };
                (offset, info, addend)
            }
            Class::Elf64 => {
                let offset = cursor.read_u64().map_err(bad)?;
                let info = cursor.read_u64().map_err(bad)?;
                let addend = if explicit_addend {
                    Some(cursor.read_i64().map_err(bad)?)
                } else {
                    None
                };
                (offset, info, addend)
            }
        };

        let (sym, rel_type) = match class {
            Class::Elf32 => (raw::r32_sym(r_info), raw::r32_type(r_info)),
            Class::Elf64 => (raw::r64_sym(r_info), raw::r64_type(r_info)),
        };
        let new_info = if sym == raw::STN_UNDEF {
            r_info
        } else {
            let new = *map
                .get(sym as usize)
                .ok_or(UnstripErrorKind::Malformed)?;
            match class {
                Class::Elf32 => raw::r32_info(new, rel_type),
                Class::Elf64 => raw::r64_info(new, rel_type),
            }
        };

        relic_elf::write::put_reloc(
            &mut emitter,
            class,
            &relic_elf::Relocation {
                r_offset,
                r_info: new_info,
                r_addend,
            },
        )?;
    }
    Ok(emitter.into_bytes())
}

/// Expands a System V hash table to cover the merged symbol table and
/// rewires its buckets and chains through the permutation.
fn rebuild_hash(
    data: &[u8],
    endian: Endian,
    map: &[u32],
    total_syms: usize,
) -> Result<Vec<u8>, UnstripError> {
    let mut cursor = Cursor::new(data, endian);
    let nbucket = cursor.read_u32().map_err(bad)? as usize;
    let nchain = cursor.read_u32().map_err(bad)? as usize;
    if data.len() < (2 + nbucket + nchain) * 4 {
        return Err(UnstripErrorKind::Malformed.into());
    }

    let word_at = |index: usize| -> Result<u32, UnstripError> {
        let mut cursor = Cursor::new_at(data, index * 4, endian);
        cursor.read_u32().map_err(bad)
    };
    let remap = |old: u32| -> Result<u32, UnstripError> {
        if old == raw::STN_UNDEF {
            return Ok(0);
        }
        map.get(old as usize)
            .copied()
            .ok_or_else(|| UnstripErrorKind::Malformed.into())
    };

    let mut new_bucket = vec![0u32; nbucket];
    let mut new_chain = vec![0u32; total_syms];

    for (index, slot) in new_bucket.iter_mut().enumerate() {
        *slot = remap(word_at(2 + index)?)?;
    }
    for old in 1..nchain {
        let new_index = remap(old as u32)?;
        if new_index != 0 {
            new_chain[new_index as usize] = remap(word_at(2 + nbucket + old)?)?;
        }
    }

    let mut emitter = Emitter::new(endian);
    emitter.put_u32(nbucket as u32);
    emitter.put_u32(total_syms as u32);
    for value in new_bucket {
        emitter.put_u32(value);
    }
    for value in new_chain {
        emitter.put_u32(value);
    }
    Ok(emitter.into_bytes())
}

/// Expands a version symbol table to the merged symbol count, moving each
/// entry to its symbol's new index.
fn grow_versym(
    data: &[u8],
    endian: Endian,
    map: &[u32],
    total_syms: usize,
) -> Result<Vec<u8>, UnstripError> {
    let old_count = data.len() / 2;
    let mut new_entries = vec![0u16; total_syms];

    for old in 1..old_count {
        let mut cursor = Cursor::new_at(data, old * 2, endian);
        let value = cursor.read_u16().map_err(bad)?;
        let new = map
            .get(old)
            .copied()
            .ok_or(UnstripErrorKind::Malformed)?;
        if new != 0 {
            *new_entries
                .get_mut(new as usize)
                .ok_or(UnstripErrorKind::Malformed)? = value;
        }
    }

    let mut emitter = Emitter::new(endian);
    for value in new_entries {
        emitter.put_u16(value);
    }
    Ok(emitter.into_bytes())
}
