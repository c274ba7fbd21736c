use fallible_iterator::FallibleIterator;
use relic_common::Endian;
use relic_elf::write::serialize;
use relic_elf::{raw, Class, Elf, ProgramHeader, Relocation, Symbol};
use relic_testutils::{reloc_bytes, strtab_bytes, sym_bytes, ElfBuilder, SectionSpec};
use similar_asserts::assert_eq;

/// A small `ET_DYN` with one LOAD, `.text`, `.dynstr`, `.dynsym`, and
/// `.rela.dyn` holding a single relative relocation.
fn hello_elf64() -> Vec<u8> {
    let class = Class::Elf64;
    let endian = Endian::Little;

    let (dynstr, offsets) = strtab_bytes(&["exit"]);
    let dynsym = sym_bytes(
        class,
        endian,
        &[
            Symbol::default(),
            Symbol {
                st_name: offsets[0],
                st_info: raw::st_info(raw::STB_GLOBAL, raw::STT_FUNC),
                st_other: 0,
                st_shndx: raw::SHN_UNDEF,
                st_value: 0,
                st_size: 0,
            },
        ],
    );
    let rela = reloc_bytes(
        class,
        endian,
        &[Relocation {
            r_offset: 0x1000,
            r_info: raw::r64_info(0, raw::R_X86_64_RELATIVE),
            r_addend: Some(0x1000),
        }],
    );

    ElfBuilder::new64_le()
        .phdr(ProgramHeader {
            p_type: raw::PT_LOAD,
            p_flags: raw::PF_R | raw::PF_X,
            p_offset: 0,
            p_vaddr: 0,
            p_paddr: 0,
            p_filesz: 0x2000,
            p_memsz: 0x2000,
            p_align: 0x1000,
        })
        .section(
            SectionSpec::progbits(".text")
                .flags(raw::SHF_ALLOC | raw::SHF_EXECINSTR)
                .addr(0x1000)
                .data(&[0xc3, 0x00, 0x00, 0x00]),
        )
        .section(
            SectionSpec::new(".dynstr", raw::SHT_STRTAB)
                .flags(raw::SHF_ALLOC)
                .data(&dynstr),
        )
        .section(
            SectionSpec::new(".dynsym", raw::SHT_DYNSYM)
                .flags(raw::SHF_ALLOC)
                .link(2)
                .info(1)
                .entsize(class.sym_size() as u64)
                .align(8)
                .data(&dynsym),
        )
        .section(
            SectionSpec::new(".rela.dyn", raw::SHT_RELA)
                .flags(raw::SHF_ALLOC)
                .link(3)
                .entsize(class.rela_size() as u64)
                .align(8)
                .data(&rela),
        )
        .build()
}

#[test]
fn test_parse_hello() {
    let image = hello_elf64();
    let elf = Elf::parse(&image).unwrap();

    let header = elf.header();
    assert_eq!(header.e_type, raw::ET_DYN);
    assert_eq!(header.e_machine, raw::EM_X86_64);
    assert_eq!(elf.class(), Class::Elf64);
    assert_eq!(elf.endian(), Endian::Little);

    // null, .text, .dynstr, .dynsym, .rela.dyn, .shstrtab
    assert_eq!(elf.shnum(), 6);
    assert_eq!(elf.section_name(1).unwrap(), b".text");
    assert_eq!(elf.raw_section_data(1).unwrap(), &[0xc3, 0x00, 0x00, 0x00]);
    assert_eq!(elf.program_headers().len(), 1);
    assert_eq!(elf.program_headers()[0].p_type, raw::PT_LOAD);
}

#[test]
fn test_symbols() {
    let image = hello_elf64();
    let elf = Elf::parse(&image).unwrap();

    let index = elf.section_by_name(b".dynsym").unwrap();
    let symtab = elf.symbols(index).unwrap();
    assert_eq!(symtab.len(), 2);
    assert_eq!(symtab.first_nonlocal(), 1);

    let null = symtab.get(0).unwrap();
    assert_eq!(null, Symbol::default());

    let exit = symtab.get(1).unwrap();
    assert_eq!(symtab.name(&exit).unwrap(), b"exit");
    assert_eq!(exit.bind(), raw::STB_GLOBAL);
    assert_eq!(exit.sym_type(), raw::STT_FUNC);

    let all: Vec<_> = symtab.iter().collect().unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn test_relocations() {
    let image = hello_elf64();
    let elf = Elf::parse(&image).unwrap();

    let index = elf.section_by_name(b".rela.dyn").unwrap();
    let mut relocs = elf.relocations(index).unwrap();
    assert!(relocs.has_addend());

    let reloc = relocs.next().unwrap().unwrap();
    assert_eq!(reloc.r_offset, 0x1000);
    assert_eq!(reloc.r_addend, Some(0x1000));

    let table = elf.relocations(index).unwrap();
    assert_eq!(table.rel_type(&reloc), raw::R_X86_64_RELATIVE);
    assert_eq!(table.symbol(&reloc), 0);
}

#[test]
fn test_roundtrip_identity() {
    let image = hello_elf64();
    let elf = Elf::parse(&image).unwrap();
    let rewritten = serialize(&elf).unwrap();
    assert_eq!(rewritten, image);
}

#[test]
fn test_bad_magic() {
    let err = Elf::parse(b"not an elf").unwrap_err();
    assert_eq!(err.kind(), relic_elf::ElfErrorKind::BadMagic);
}

#[test]
fn test_truncated_section_table() {
    let mut image = hello_elf64();
    image.truncate(image.len() - 8);
    assert!(Elf::parse(&image).is_err());
}

#[test]
fn test_shnum_escape() {
    let mut image = hello_elf64();
    let elf = Elf::parse(&image).unwrap();
    let shnum = elf.shnum() as u64;
    let shoff = elf.header().e_shoff as usize;
    drop(elf);

    // Move the section count into section 0's sh_size, as the gABI escape
    // prescribes for tables with 0xff00 or more entries.
    image[60..62].copy_from_slice(&0u16.to_le_bytes());
    image[shoff + 32..shoff + 40].copy_from_slice(&shnum.to_le_bytes());

    let elf = Elf::parse(&image).unwrap();
    assert_eq!(elf.shnum() as u64, shnum);
    assert_eq!(elf.section_name(1).unwrap(), b".text");
}

#[test]
fn test_shstrndx_escape() {
    let mut image = hello_elf64();
    let elf = Elf::parse(&image).unwrap();
    let shstrndx = elf.shstrndx() as u32;
    let shoff = elf.header().e_shoff as usize;
    drop(elf);

    image[62..64].copy_from_slice(&raw::SHN_XINDEX.to_le_bytes());
    image[shoff + 40..shoff + 44].copy_from_slice(&shstrndx.to_le_bytes());

    let elf = Elf::parse(&image).unwrap();
    assert_eq!(elf.shstrndx() as u32, shstrndx);
    assert_eq!(elf.section_name(1).unwrap(), b".text");
}

#[test]
fn test_section_bounds_checked() {
    let mut image = ElfBuilder::new64_le()
        .section(SectionSpec::progbits(".data").data(b"abcd"))
        .build();
    let shoff = Elf::parse(&image).unwrap().header().e_shoff as usize;

    // Point section 1 past the end of the file.
    let field = shoff + 64 + 24;
    image[field..field + 8].copy_from_slice(&0x10_0000u64.to_le_bytes());

    let elf = Elf::parse(&image).unwrap();
    assert!(elf.raw_section_data(1).is_err());
}

#[test]
fn test_compressed_section() {
    use std::io::Write;

    let original = b"compressed debug contents".repeat(8);
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&original).unwrap();
    let compressed = encoder.finish().unwrap();

    // ELF64 Chdr: ch_type, ch_reserved, ch_size, ch_addralign.
    let mut contents = Vec::new();
    contents.extend_from_slice(&raw::ELFCOMPRESS_ZLIB.to_le_bytes());
    contents.extend_from_slice(&0u32.to_le_bytes());
    contents.extend_from_slice(&(original.len() as u64).to_le_bytes());
    contents.extend_from_slice(&1u64.to_le_bytes());
    contents.extend_from_slice(&compressed);

    let image = ElfBuilder::new64_le()
        .section(
            SectionSpec::progbits(".debug_info")
                .flags(raw::SHF_COMPRESSED)
                .data(&contents),
        )
        .build();

    let elf = Elf::parse(&image).unwrap();
    let index = elf.section_by_name(b".debug_info").unwrap();
    assert_eq!(elf.section_data(index).unwrap(), &original[..]);
    // Second access comes from the cache and must agree.
    assert_eq!(elf.section_data(index).unwrap(), &original[..]);
}

#[test]
fn test_notes() {
    // One SHT_NOTE section with two notes in the 32-bit layout.
    let mut notes = Vec::new();
    for (name, desc, n_type) in [(&b"GNU\0"[..], &[1u8, 2, 3, 4][..], 3u32), (b"XY\0", b"", 1)] {
        notes.extend_from_slice(&(name.len() as u32).to_le_bytes());
        notes.extend_from_slice(&(desc.len() as u32).to_le_bytes());
        notes.extend_from_slice(&n_type.to_le_bytes());
        notes.extend_from_slice(name);
        notes.resize(notes.len().next_multiple_of(4), 0);
        notes.extend_from_slice(desc);
        notes.resize(notes.len().next_multiple_of(4), 0);
    }

    let image = ElfBuilder::new64_le()
        .section(SectionSpec::new(".note", raw::SHT_NOTE).data(&notes).align(4))
        .build();
    let elf = Elf::parse(&image).unwrap();

    let data = elf.raw_section_data(1).unwrap();
    let collected: Vec<_> = elf.notes_in(data, 4).collect().unwrap();
    assert_eq!(collected.len(), 2);
    assert_eq!(collected[0].name, b"GNU");
    assert_eq!(collected[0].n_type, 3);
    assert_eq!(collected[0].desc, &[1, 2, 3, 4]);
    assert_eq!(collected[1].name, b"XY");
}

#[test]
fn test_symtab_shndx_resolution() {
    let class = Class::Elf64;
    let endian = Endian::Little;

    let (strtab, offsets) = strtab_bytes(&["big"]);
    let symtab = sym_bytes(
        class,
        endian,
        &[
            Symbol::default(),
            Symbol {
                st_name: offsets[0],
                st_info: raw::st_info(raw::STB_LOCAL, raw::STT_OBJECT),
                st_other: 0,
                st_shndx: raw::SHN_XINDEX,
                st_value: 0,
                st_size: 0,
            },
        ],
    );
    let mut shndx = Vec::new();
    shndx.extend_from_slice(&0u32.to_le_bytes());
    shndx.extend_from_slice(&1u32.to_le_bytes());

    let image = ElfBuilder::new64_le()
        .section(
            SectionSpec::new(".symtab", raw::SHT_SYMTAB)
                .link(3)
                .info(2)
                .entsize(class.sym_size() as u64)
                .data(&symtab),
        )
        .section(
            SectionSpec::new(".symtab_shndx", raw::SHT_SYMTAB_SHNDX)
                .link(1)
                .entsize(4)
                .data(&shndx),
        )
        .section(SectionSpec::new(".strtab", raw::SHT_STRTAB).data(&strtab))
        .build();

    let elf = Elf::parse(&image).unwrap();
    let table = elf.symbols(1).unwrap();
    let sym = table.get(1).unwrap();
    assert_eq!(sym.st_shndx, raw::SHN_XINDEX);
    assert_eq!(table.resolved_shndx(1, &sym).unwrap(), 1);
}

#[test]
fn test_bad_entsize_refuses_iteration() {
    let image = ElfBuilder::new64_le()
        .section(
            SectionSpec::new(".symtab", raw::SHT_SYMTAB)
                .entsize(17)
                .data(&[0; 34]),
        )
        .build();
    let elf = Elf::parse(&image).unwrap();
    let err = elf.symbols(1).unwrap_err();
    assert_eq!(
        err.kind(),
        relic_elf::ElfErrorKind::BadEntsize { section: 1 }
    );
}

#[test]
fn test_elf32_big_endian() {
    let class = Class::Elf32;
    let endian = Endian::Big;

    let (strtab, offsets) = strtab_bytes(&["start"]);
    let symtab = sym_bytes(
        class,
        endian,
        &[
            Symbol::default(),
            Symbol {
                st_name: offsets[0],
                st_info: raw::st_info(raw::STB_GLOBAL, raw::STT_FUNC),
                st_other: 0,
                st_shndx: 1,
                st_value: 0x40,
                st_size: 0x10,
            },
        ],
    );
    let rel = reloc_bytes(
        class,
        endian,
        &[Relocation {
            r_offset: 0x4,
            r_info: raw::r32_info(1, 10),
            r_addend: None,
        }],
    );

    let image = ElfBuilder::new32_be()
        .section(
            SectionSpec::progbits(".text")
                .flags(raw::SHF_ALLOC | raw::SHF_EXECINSTR)
                .data(&[0u8; 0x60]),
        )
        .section(
            SectionSpec::new(".rel.text", raw::SHT_REL)
                .flags(raw::SHF_INFO_LINK)
                .link(3)
                .info(1)
                .entsize(class.rel_size() as u64)
                .align(4)
                .data(&rel),
        )
        .section(
            SectionSpec::new(".symtab", raw::SHT_SYMTAB)
                .link(4)
                .info(1)
                .entsize(class.sym_size() as u64)
                .align(4)
                .data(&symtab),
        )
        .section(SectionSpec::new(".strtab", raw::SHT_STRTAB).data(&strtab))
        .build();

    let elf = Elf::parse(&image).unwrap();
    assert_eq!(elf.class(), Class::Elf32);
    assert_eq!(elf.endian(), Endian::Big);
    assert_eq!(elf.header().e_machine, raw::EM_PPC);

    let table = elf.symbols(3).unwrap();
    let sym = table.get(1).unwrap();
    assert_eq!(table.name(&sym).unwrap(), b"start");
    assert_eq!(sym.st_value, 0x40);
    assert_eq!(sym.st_size, 0x10);

    let relocs = elf.relocations(2).unwrap();
    assert!(!relocs.has_addend());
    let reloc = relocs.get(0).unwrap();
    assert_eq!(reloc.r_offset, 0x4);
    assert_eq!(reloc.r_addend, None);
    assert_eq!(relocs.symbol(&reloc), 1);
    assert_eq!(relocs.rel_type(&reloc), 10);

    // And it round-trips byte for byte like the 64-bit flavor.
    let rewritten = relic_elf::write::serialize(&elf).unwrap();
    assert_eq!(rewritten, image);
}

#[test]
fn test_versym_and_verdef() {
    // One version definition with one aux name, and a versym entry per
    // dynsym entry.
    let (dynstr, offsets) = strtab_bytes(&["f", "LIB_1.0"]);
    let dynsym = sym_bytes(
        Class::Elf64,
        Endian::Little,
        &[
            Symbol::default(),
            Symbol {
                st_name: offsets[0],
                st_info: raw::st_info(raw::STB_GLOBAL, raw::STT_FUNC),
                st_other: 0,
                st_shndx: raw::SHN_UNDEF,
                st_value: 0,
                st_size: 0,
            },
        ],
    );

    let mut verdef = Vec::new();
    verdef.extend_from_slice(&1u16.to_le_bytes()); // vd_version
    verdef.extend_from_slice(&raw::VER_FLG_BASE.to_le_bytes());
    verdef.extend_from_slice(&1u16.to_le_bytes()); // vd_ndx
    verdef.extend_from_slice(&1u16.to_le_bytes()); // vd_cnt
    verdef.extend_from_slice(&0u32.to_le_bytes()); // vd_hash
    verdef.extend_from_slice(&20u32.to_le_bytes()); // vd_aux
    verdef.extend_from_slice(&0u32.to_le_bytes()); // vd_next
    verdef.extend_from_slice(&offsets[1].to_le_bytes()); // vda_name
    verdef.extend_from_slice(&0u32.to_le_bytes()); // vda_next

    let mut versym = Vec::new();
    versym.extend_from_slice(&0u16.to_le_bytes());
    versym.extend_from_slice(&1u16.to_le_bytes());

    let image = ElfBuilder::new64_le()
        .e_type(raw::ET_REL)
        .section(SectionSpec::new(".dynstr", raw::SHT_STRTAB).data(&dynstr))
        .section(
            SectionSpec::new(".dynsym", raw::SHT_DYNSYM)
                .link(1)
                .info(1)
                .entsize(Class::Elf64.sym_size() as u64)
                .data(&dynsym),
        )
        .section(
            SectionSpec::new(".gnu.version", raw::SHT_GNU_VERSYM)
                .link(2)
                .entsize(2)
                .data(&versym),
        )
        .section(
            SectionSpec::new(".gnu.version_d", raw::SHT_GNU_VERDEF)
                .link(1)
                .info(1)
                .data(&verdef),
        )
        .build();

    let elf = Elf::parse(&image).unwrap();

    let versym = elf.versym(3).unwrap();
    assert_eq!(versym.len(), 2);
    assert_eq!(versym.get(0).unwrap(), raw::VER_NDX_LOCAL);
    assert_eq!(versym.get(1).unwrap(), 1);

    let defs: Vec<_> = elf.verdef(4).unwrap().collect().unwrap();
    assert_eq!(defs.len(), 1);
    assert_eq!(defs[0].vd_ndx, 1);
    assert_eq!(defs[0].vd_cnt, 1);
    assert_eq!(defs[0].vd_flags, raw::VER_FLG_BASE);
}

#[test]
fn test_gnu_hash_symbol_count() {
    // nbucket=1, symoffset=1, one bloom word, bucket -> symbol 1, and a
    // single chain entry with the stop bit set.
    let mut hash = Vec::new();
    hash.extend_from_slice(&1u32.to_le_bytes());
    hash.extend_from_slice(&1u32.to_le_bytes());
    hash.extend_from_slice(&1u32.to_le_bytes());
    hash.extend_from_slice(&0u32.to_le_bytes());
    hash.extend_from_slice(&0u64.to_le_bytes()); // bloom word
    hash.extend_from_slice(&1u32.to_le_bytes()); // bucket 0
    hash.extend_from_slice(&0x1234_5601u32.to_le_bytes()); // chain, LSB set

    let image = ElfBuilder::new64_le()
        .e_type(raw::ET_REL)
        .section(
            SectionSpec::new(".gnu.hash", raw::SHT_GNU_HASH)
                .align(8)
                .data(&hash),
        )
        .build();

    let elf = Elf::parse(&image).unwrap();
    let table = elf.gnu_hash(1).unwrap();
    assert_eq!(table.nbucket(), 1);
    assert_eq!(table.symoffset(), 1);
    assert_eq!(table.bucket(0).unwrap(), 1);
    // One hashed symbol plus the null entry.
    assert_eq!(table.symbol_count().unwrap(), 2);
}

#[test]
fn test_group_view() {
    // A big-endian file, so the group words are big-endian too.
    let mut group = Vec::new();
    group.extend_from_slice(&raw::GRP_COMDAT.to_be_bytes());
    group.extend_from_slice(&2u32.to_be_bytes());
    group.extend_from_slice(&3u32.to_be_bytes());

    let image = ElfBuilder::new32_be()
        .section(SectionSpec::new(".group", raw::SHT_GROUP).entsize(4).data(&group))
        .section(SectionSpec::progbits(".text.f").flags(raw::SHF_ALLOC | raw::SHF_GROUP))
        .section(SectionSpec::progbits(".data.f").flags(raw::SHF_ALLOC | raw::SHF_GROUP))
        .build();

    let elf = Elf::parse(&image).unwrap();
    let view = elf.group(1).unwrap();
    assert_eq!(view.flags().unwrap(), raw::GRP_COMDAT);
    assert_eq!(view.member_count(), 2);
    assert_eq!(view.member(0).unwrap(), 2);
    assert_eq!(view.member(1).unwrap(), 3);
}
