//! Recombine a stripped ELF with its separate debug file.
//!
//! `strip` and `objcopy --only-keep-debug` split one object into a
//! stripped binary (allocated sections with contents, debug sections gone)
//! and a debug companion (every section present, but the ones kept in the
//! binary reduced to `SHT_NOBITS`). [`recombine`] reverses the split: it
//! fills the debug file's NOBITS sections back in from the stripped file,
//! carries over sections only the stripped file has, merges the two symbol
//! tables, rewrites relocations, hash tables, and version tables through
//! the resulting index permutations, and lays the output out so every
//! loadable segment keeps its exact file offsets.
//!
//! Any failure is fatal for the merge; no partial output is produced.

#![warn(missing_docs)]

use std::error::Error;
use std::fmt;

use thiserror::Error;

use relic_elf::write::{put_ehdr, put_phdr, put_shdr, Emitter};
use relic_elf::{raw, Elf, ElfError, SectionHeader};

mod merge;
mod strtab;

pub use strtab::StringTableBuilder;

/// The error kind for [`UnstripError`].
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnstripErrorKind {
    /// The two files disagree in class, encoding, type, machine, or
    /// program header count.
    Mismatch,
    /// The files match but cannot be merged, e.g. a prelink bias would
    /// require rewriting the DWARF data.
    Unstrippable,
    /// A debug section has no counterpart in the stripped file.
    NoSuchSection,
    /// The output layout could not be computed without overlap or
    /// overflow.
    LayoutOverflow,
    /// One of the inputs is malformed.
    Malformed,
}

impl fmt::Display for UnstripErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Mismatch => write!(f, "stripped and debug files do not match"),
            Self::Unstrippable => write!(f, "files cannot be recombined"),
            Self::NoSuchSection => write!(f, "cannot find matching section"),
            Self::LayoutOverflow => write!(f, "cannot lay out output file"),
            Self::Malformed => write!(f, "malformed input file"),
        }
    }
}

/// An error recombining a stripped and a debug file.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct UnstripError {
    kind: UnstripErrorKind,
    #[source]
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl UnstripError {
    pub(crate) fn new<E>(kind: UnstripErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        let source = Some(source.into());
        Self { kind, source }
    }

    /// Returns the corresponding [`UnstripErrorKind`] for this error.
    pub fn kind(&self) -> UnstripErrorKind {
        self.kind
    }
}

impl From<UnstripErrorKind> for UnstripError {
    fn from(kind: UnstripErrorKind) -> Self {
        Self { kind, source: None }
    }
}

impl From<ElfError> for UnstripError {
    fn from(e: ElfError) -> Self {
        Self::new(UnstripErrorKind::Malformed, e)
    }
}

/// Section contents in the output image.
#[derive(Debug)]
pub(crate) enum Contents<'data> {
    Borrowed(&'data [u8]),
    Owned(Vec<u8>),
    None,
}

impl Contents<'_> {
    pub(crate) fn bytes(&self) -> &[u8] {
        match self {
            Contents::Borrowed(bytes) => bytes,
            Contents::Owned(bytes) => bytes,
            Contents::None => &[],
        }
    }
}

/// One section of the output image under construction.
pub(crate) struct OutSection<'data> {
    pub(crate) shdr: SectionHeader,
    pub(crate) contents: Contents<'data>,
    pub(crate) name: Vec<u8>,
    /// The stripped-file section this output section's data came from.
    pub(crate) from_stripped: Option<usize>,
    /// Whether the file offset is pinned by the loadable layout.
    pub(crate) placed: bool,
}

/// A cached stripped-file section in its deterministic merge order.
struct StrippedSec {
    index: usize,
    shdr: SectionHeader,
    name: Vec<u8>,
    out: Option<usize>,
}

/// The binutils linker leaves gratuitous section symbols in .symtab that
/// strip has to remove, and older strips do not shrink the NOBITS copy in
/// the debug file accordingly. These section types may therefore be
/// smaller in the stripped file than their header in the debug file says.
fn section_can_shrink(shdr: &SectionHeader) -> bool {
    matches!(
        shdr.sh_type,
        raw::SHT_SYMTAB | raw::SHT_DYNSYM | raw::SHT_HASH | raw::SHT_GNU_VERSYM
    )
}

/// Merges the stripped file `stripped` and its debug companion `debug`
/// into one fully populated ELF image.
pub fn recombine(stripped: &Elf<'_>, debug: &Elf<'_>) -> Result<Vec<u8>, UnstripError> {
    let sh = stripped.header();
    let dh = debug.header();
    if sh.class != dh.class
        || sh.endian != dh.endian
        || sh.e_type != dh.e_type
        || sh.e_machine != dh.e_machine
        || sh.e_phnum != dh.e_phnum
    {
        return Err(UnstripErrorKind::Mismatch.into());
    }

    // The address bias between the files would have been introduced by
    // prelinking; recombining then would require rewriting the DWARF.
    for (sp, dp) in stripped
        .program_headers()
        .iter()
        .zip(debug.program_headers())
    {
        if sp.p_type == raw::PT_LOAD {
            if sp.p_vaddr != dp.p_vaddr {
                return Err(UnstripError::new(
                    UnstripErrorKind::Unstrippable,
                    "prelink bias between stripped and debug file",
                ));
            }
            break;
        }
    }

    let class = stripped.class();
    let endian = stripped.endian();
    let e_type = sh.e_type;
    let s_shnum = stripped.shnum();
    let d_shnum = debug.shnum();
    if s_shnum == 0 || d_shnum == 0 {
        return Err(UnstripErrorKind::Malformed.into());
    }

    // Start the output as a copy of the debug file's sections.
    let mut out: Vec<OutSection<'_>> = Vec::with_capacity(d_shnum);
    for index in 0..d_shnum {
        let shdr = *debug.section_header(index)?;
        let contents = if shdr.is_nobits() || shdr.sh_type == raw::SHT_NULL {
            Contents::None
        } else {
            Contents::Borrowed(debug.raw_section_data(index)?)
        };
        let name = if index == 0 {
            Vec::new()
        } else {
            debug.section_name(index)?.to_vec()
        };
        out.push(OutSection {
            shdr,
            contents,
            name,
            from_stripped: None,
            placed: false,
        });
    }

    // Cache and sort the stripped file's sections: allocated by address
    // first, the rest by flags and name. New sections are placed in this
    // deterministic order.
    let mut ssecs: Vec<StrippedSec> = Vec::with_capacity(s_shnum - 1);
    for index in 1..s_shnum {
        ssecs.push(StrippedSec {
            index,
            shdr: *stripped.section_header(index)?,
            name: stripped.section_name(index)?.to_vec(),
            out: None,
        });
    }
    dmsort::sort_by(&mut ssecs, |a, b| {
        let a_alloc = a.shdr.is_alloc();
        let b_alloc = b.shdr.is_alloc();
        b_alloc
            .cmp(&a_alloc)
            .then_with(|| {
                if a_alloc {
                    (a.shdr.sh_addr, a.shdr.sh_size, a.shdr.sh_flags)
                        .cmp(&(b.shdr.sh_addr, b.shdr.sh_size, b.shdr.sh_flags))
                } else {
                    a.shdr.sh_flags.cmp(&b.shdr.sh_flags)
                }
            })
            .then_with(|| a.name.cmp(&b.name))
    });
    let nalloc = ssecs.iter().take_while(|sec| sec.shdr.is_alloc()).count();

    // Fill in the debug file's NOBITS sections from their counterparts.
    for out_idx in 1..d_shnum {
        let d_shdr = out[out_idx].shdr;
        if !d_shdr.is_nobits() {
            continue;
        }
        let name = out[out_idx].name.clone();

        let found = if d_shdr.is_alloc() {
            ssecs[..nalloc].iter().position(|sec| {
                sec.out.is_none()
                    && sec.shdr.sh_addr == d_shdr.sh_addr
                    && sec.shdr.sh_flags == d_shdr.sh_flags
                    && (sec.shdr.sh_size == d_shdr.sh_size
                        || (sec.shdr.sh_size < d_shdr.sh_size && section_can_shrink(&sec.shdr)))
                    && sec.name == name
            })
        } else {
            ssecs[nalloc..]
                .iter()
                .position(|sec| {
                    sec.out.is_none()
                        && sec.shdr.sh_flags == d_shdr.sh_flags
                        && sec.name == name
                })
                .map(|pos| pos + nalloc)
        };

        match found {
            Some(pos) => ssecs[pos].out = Some(out_idx),
            None => {
                return Err(UnstripError::new(
                    UnstripErrorKind::NoSuchSection,
                    format!(
                        "cannot find matching section for '{}'",
                        String::from_utf8_lossy(&name)
                    ),
                ))
            }
        }
    }

    // Make sure each stripped-file section has a place to go.
    let stripped_shstrndx = stripped.shstrndx();
    let debug_shstrndx = debug.shstrndx();
    let debug_symtab = (1..d_shnum).find(|&i| out[i].shdr.sh_type == raw::SHT_SYMTAB);
    let stripped_symtab = (1..s_shnum).find(|&i| {
        stripped
            .section_header(i)
            .map_or(false, |s| s.sh_type == raw::SHT_SYMTAB)
    });
    let stripped_symtab_link = stripped_symtab
        .and_then(|i| stripped.section_header(i).ok())
        .map(|shdr| shdr.sh_link as usize);

    let mut ndx_section = vec![0usize; s_shnum - 1];
    let mut added_any = false;

    for pos in 0..ssecs.len() {
        if ssecs[pos].out.is_none() {
            let index = ssecs[pos].index;

            if index == stripped_shstrndx {
                // We only need one .shstrtab.
                ndx_section[index - 1] = debug_shstrndx;
                continue;
            }
            if debug_symtab.is_some() && Some(index) == stripped_symtab {
                // We don't need a second symbol table.
                ndx_section[index - 1] = debug_symtab.unwrap_or(0);
                continue;
            }
            if let (Some(debug_symtab), Some(link)) = (debug_symtab, stripped_symtab_link) {
                if index == link {
                    // ... nor its string table.
                    ndx_section[index - 1] = out[debug_symtab].shdr.sh_link as usize;
                    continue;
                }
            }
            if !ssecs[pos].shdr.is_alloc() && ssecs[pos].name == b".gnu_debuglink" {
                // This was created by stripping. We don't want it.
                continue;
            }

            // A section present with contents in both files needs no copy.
            let alias = (1..d_shnum).find(|&i| {
                out[i].from_stripped.is_none()
                    && !out[i].shdr.is_nobits()
                    && out[i].shdr.sh_type == ssecs[pos].shdr.sh_type
                    && out[i].shdr.sh_flags == ssecs[pos].shdr.sh_flags
                    && out[i].shdr.sh_size == ssecs[pos].shdr.sh_size
                    && out[i].name == ssecs[pos].name
            });
            if let Some(alias) = alias {
                ndx_section[index - 1] = alias;
                continue;
            }

            let out_idx = out.len();
            let contents = if ssecs[pos].shdr.is_nobits() {
                Contents::None
            } else {
                Contents::Borrowed(stripped.raw_section_data(index)?)
            };
            out.push(OutSection {
                shdr: ssecs[pos].shdr,
                contents,
                name: ssecs[pos].name.clone(),
                from_stripped: Some(index),
                placed: false,
            });
            added_any = true;
            ssecs[pos].out = Some(out_idx);
        }

        let index = ssecs[pos].index;
        if let Some(out_idx) = ssecs[pos].out {
            ndx_section[index - 1] = out_idx;
        }
    }

    // Update matched sections from their stripped counterparts and pin the
    // loadable layout.
    for sec in &ssecs {
        let out_idx = match sec.out {
            Some(out_idx) => out_idx,
            None => continue,
        };
        let target = &mut out[out_idx];

        if target.from_stripped.is_none() {
            // A filled-in NOBITS section: contents and most header fields
            // come from the stripped file.
            target.shdr.sh_type = sec.shdr.sh_type;
            target.shdr.sh_addr = sec.shdr.sh_addr;
            target.shdr.sh_size = sec.shdr.sh_size;
            target.shdr.sh_link = sec.shdr.sh_link;
            target.shdr.sh_info = sec.shdr.sh_info;
            target.shdr.sh_addralign = sec.shdr.sh_addralign;
            target.shdr.sh_entsize = sec.shdr.sh_entsize;
            target.contents = if sec.shdr.is_nobits() {
                Contents::None
            } else {
                Contents::Borrowed(stripped.raw_section_data(sec.index)?)
            };
            target.from_stripped = Some(sec.index);
        }

        // Section references now mean output indices.
        if target.shdr.sh_link != 0 {
            let old = target.shdr.sh_link as usize;
            if old == 0 || old > ndx_section.len() {
                return Err(UnstripErrorKind::Malformed.into());
            }
            target.shdr.sh_link = ndx_section[old - 1] as u32;
        }
        if target.shdr.sh_flags & raw::SHF_INFO_LINK != 0 && target.shdr.sh_info != 0 {
            let old = target.shdr.sh_info as usize;
            if old == 0 || old > ndx_section.len() {
                return Err(UnstripErrorKind::Malformed.into());
            }
            target.shdr.sh_info = ndx_section[old - 1] as u32;
        }

        // Preserve the file layout of the allocated sections.
        if e_type != raw::ET_REL && sec.shdr.is_alloc() {
            target.shdr.sh_offset = sec.shdr.sh_offset;
            target.placed = true;
        }
    }

    // Symbol tables copied from the stripped file carry stripped section
    // indices; rewrite them to output indices.
    for out_idx in 1..out.len() {
        if out[out_idx].from_stripped.is_none() {
            continue;
        }
        if !matches!(out[out_idx].shdr.sh_type, raw::SHT_SYMTAB | raw::SHT_DYNSYM) {
            continue;
        }
        let rewritten = merge::remap_symtab_shndx(
            class,
            endian,
            out[out_idx].contents.bytes(),
            s_shnum,
            &ndx_section,
        )?;
        out[out_idx].contents = Contents::Owned(rewritten);
    }

    // Reconcile the symbol tables.
    if let (Some(debug_symtab), Some(stripped_symtab_idx)) = (debug_symtab, stripped_symtab) {
        merge::merge_symbol_tables(
            stripped,
            stripped_symtab_idx,
            debug,
            debug_symtab,
            &ndx_section,
            &mut out,
            class,
            endian,
        )?;
    } else if let Some(stripped_symtab_idx) = stripped_symtab {
        // The stripped symtab was copied wholesale; if the original had a
        // leading section symbol for every section, top the copy up with
        // symbols for the sections the output gained.
        let out_idx = ndx_section[stripped_symtab_idx - 1];
        merge::top_up_section_symbols(
            stripped,
            stripped_symtab_idx,
            &mut out,
            out_idx,
            debug_shstrndx,
            class,
            endian,
        )?;
    }

    // The dynamic symbol table gets the same treatment when its source had
    // complete leading section symbols.
    if let Some(stripped_dynsym) = (1..s_shnum).find(|&i| {
        stripped
            .section_header(i)
            .map_or(false, |s| s.sh_type == raw::SHT_DYNSYM)
    }) {
        let out_idx = ndx_section[stripped_dynsym - 1];
        if out_idx != 0 {
            merge::top_up_section_symbols(
                stripped,
                stripped_dynsym,
                &mut out,
                out_idx,
                debug_shstrndx,
                class,
                endian,
            )?;
        }
    }

    // Rebuild the section name table when sections were added.
    if added_any {
        let mut builder = StringTableBuilder::new();
        let mut names = Vec::with_capacity(out.len());
        for section in out.iter() {
            names.push(builder.add(&section.name));
        }
        let table = builder.finish();
        for (section, name) in out.iter_mut().zip(names) {
            section.shdr.sh_name = name;
        }
        let shstrtab = &mut out[debug_shstrndx];
        shstrtab.shdr.sh_size = table.len() as u64;
        shstrtab.contents = Contents::Owned(table);
    }

    // Lay out everything that is not pinned: first the non-relocation
    // sections, then the relocations, matching the order link editors
    // produce. The section header table follows .shstrtab.
    let mut offset: u64 = out
        .iter()
        .filter(|section| section.placed)
        .map(|section| {
            section.shdr.sh_offset
                + if section.shdr.is_nobits() {
                    0
                } else {
                    section.shdr.sh_size
                }
        })
        .max()
        .unwrap_or(0);
    if offset == 0 {
        // For ET_REL we are starting the layout from scratch.
        offset = class.ehdr_size() as u64
            + (stripped.program_headers().len() * class.phdr_size()) as u64;
    }

    let mut e_shoff = 0u64;
    let shnum = out.len();
    if shnum >= usize::from(raw::SHN_LORESERVE) {
        return Err(UnstripError::new(
            UnstripErrorKind::LayoutOverflow,
            "too many output sections",
        ));
    }

    for skip_reloc in [true, false] {
        for index in 1..shnum {
            if out[index].placed {
                continue;
            }
            if skip_reloc
                && matches!(out[index].shdr.sh_type, raw::SHT_REL | raw::SHT_RELA)
            {
                continue;
            }

            let align = out[index].shdr.sh_addralign.max(1);
            if !align.is_power_of_two() {
                return Err(UnstripErrorKind::LayoutOverflow.into());
            }
            offset = offset
                .checked_add(align - 1)
                .ok_or(UnstripErrorKind::LayoutOverflow)?
                & !(align - 1);
            out[index].shdr.sh_offset = offset;
            if !out[index].shdr.is_nobits() {
                let size = out[index].contents.bytes().len() as u64;
                out[index].shdr.sh_size = size;
                offset = offset
                    .checked_add(size)
                    .ok_or(UnstripErrorKind::LayoutOverflow)?;
            }
            out[index].placed = true;

            if index == debug_shstrndx {
                // Place the section headers immediately after .shstrtab.
                let sh_align = u64::from(class.address_size());
                offset = offset
                    .checked_add(sh_align - 1)
                    .ok_or(UnstripErrorKind::LayoutOverflow)?
                    & !(sh_align - 1);
                e_shoff = offset;
                offset = offset
                    .checked_add((shnum * class.shdr_size()) as u64)
                    .ok_or(UnstripErrorKind::LayoutOverflow)?;
            }
        }
    }

    if e_shoff == 0 {
        return Err(UnstripErrorKind::LayoutOverflow.into());
    }

    // Emit the image: header, program headers from the stripped file,
    // section contents, section header table.
    let mut ehdr = *dh;
    ehdr.e_shoff = e_shoff;
    ehdr.e_shnum = shnum as u16;
    ehdr.e_shstrndx = debug_shstrndx as u16;
    ehdr.e_shentsize = class.shdr_size() as u16;
    ehdr.e_phnum = sh.e_phnum;
    ehdr.e_phentsize = if sh.e_phnum == 0 {
        0
    } else {
        class.phdr_size() as u16
    };
    if ehdr.e_phnum != 0 && ehdr.e_phoff == 0 {
        ehdr.e_phoff = class.ehdr_size() as u64;
    }
    ehdr.e_entry = sh.e_entry;

    let mut emitter = Emitter::new(endian);
    put_ehdr(&mut emitter, &ehdr)?;

    if ehdr.e_phnum != 0 {
        let phoff = usize::try_from(ehdr.e_phoff)
            .map_err(|_| UnstripErrorKind::LayoutOverflow)?;
        if phoff < emitter.len() {
            return Err(UnstripErrorKind::LayoutOverflow.into());
        }
        emitter.pad_to(phoff);
        for phdr in stripped.program_headers() {
            put_phdr(&mut emitter, class, phdr)?;
        }
    }

    // The section header table is an ordinary chunk: relocation sections
    // laid out in the second pass can legitimately follow it in the file.
    let mut shdr_table = Emitter::new(endian);
    for section in &out {
        put_shdr(&mut shdr_table, class, &section.shdr)?;
    }
    let shdr_bytes = shdr_table.into_bytes();

    let mut chunks: Vec<(u64, &[u8])> = (1..shnum)
        .filter(|&i| !out[i].shdr.is_nobits() && out[i].shdr.sh_type != raw::SHT_NULL)
        .map(|i| (out[i].shdr.sh_offset, out[i].contents.bytes()))
        .collect();
    chunks.push((e_shoff, &shdr_bytes));
    chunks.sort_by_key(|&(offset, _)| offset);

    for (offset, bytes) in chunks {
        let at = usize::try_from(offset).map_err(|_| UnstripErrorKind::LayoutOverflow)?;
        if at < emitter.len() {
            return Err(UnstripError::new(
                UnstripErrorKind::LayoutOverflow,
                "output chunks overlap",
            ));
        }
        emitter.pad_to(at);
        emitter.put_bytes(bytes);
    }

    Ok(emitter.into_bytes())
}
