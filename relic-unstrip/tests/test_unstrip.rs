use fallible_iterator::FallibleIterator;
use relic_common::Endian;
use relic_elf::{raw, Class, Elf, ProgramHeader, Relocation, Symbol};
use relic_testutils::{reloc_bytes, strtab_bytes, sym_bytes, ElfBuilder, SectionSpec};
use relic_unstrip::{recombine, UnstripErrorKind};
use similar_asserts::assert_eq;

const TEXT: &[u8] = &[0xc3, 0x00, 0x00, 0x00];
const DEBUG_INFO: &[u8] = b"fake dwarf contents";

/// The stripped half: .text with contents, no debug sections.
fn stripped_dyn() -> Vec<u8> {
    ElfBuilder::new64_le()
        .phdr(ProgramHeader {
            p_type: raw::PT_LOAD,
            p_flags: raw::PF_R | raw::PF_X,
            p_offset: 0,
            p_vaddr: 0,
            p_paddr: 0,
            p_filesz: 0x1000,
            p_memsz: 0x1000,
            p_align: 0x1000,
        })
        .section(
            SectionSpec::progbits(".text")
                .flags(raw::SHF_ALLOC | raw::SHF_EXECINSTR)
                .addr(0x100)
                .data(TEXT),
        )
        .build()
}

/// The debug half: .text elided to NOBITS, .debug_info with contents.
fn debug_dyn() -> Vec<u8> {
    let mut spec = SectionSpec::nobits(".text", TEXT.len() as u64);
    spec.sh_flags = raw::SHF_ALLOC | raw::SHF_EXECINSTR;
    spec.sh_addr = 0x100;
    ElfBuilder::new64_le()
        .phdr(ProgramHeader {
            p_type: raw::PT_LOAD,
            p_flags: raw::PF_R | raw::PF_X,
            p_offset: 0,
            p_vaddr: 0,
            p_paddr: 0,
            p_filesz: 0x1000,
            p_memsz: 0x1000,
            p_align: 0x1000,
        })
        .section(spec)
        .section(SectionSpec::progbits(".debug_info").data(DEBUG_INFO))
        .build()
}

#[test]
fn test_recombine_fills_nobits() {
    let stripped_img = stripped_dyn();
    let debug_img = debug_dyn();
    let stripped = Elf::parse(&stripped_img).unwrap();
    let debug = Elf::parse(&debug_img).unwrap();

    let merged_img = recombine(&stripped, &debug).unwrap();
    let merged = Elf::parse(&merged_img).unwrap();

    // null, .text, .debug_info, .shstrtab
    assert_eq!(merged.shnum(), 4);

    let text = merged.section_by_name(b".text").unwrap();
    let text_shdr = merged.section_header(text).unwrap();
    assert_eq!(text_shdr.sh_type, raw::SHT_PROGBITS);
    assert_eq!(merged.raw_section_data(text).unwrap(), TEXT);

    let info = merged.section_by_name(b".debug_info").unwrap();
    assert_eq!(merged.raw_section_data(info).unwrap(), DEBUG_INFO);

    // The loadable layout is preserved exactly.
    let orig_text = stripped.section_by_name(b".text").unwrap();
    assert_eq!(
        text_shdr.sh_offset,
        stripped.section_header(orig_text).unwrap().sh_offset
    );

    // Program headers come from the stripped file.
    assert_eq!(merged.program_headers(), stripped.program_headers());
}

#[test]
fn test_recombine_is_idempotent() {
    let stripped_img = stripped_dyn();
    let debug_img = debug_dyn();
    let stripped = Elf::parse(&stripped_img).unwrap();
    let debug = Elf::parse(&debug_img).unwrap();

    let once = recombine(&stripped, &debug).unwrap();

    let merged = Elf::parse(&once).unwrap();
    let twice = recombine(&merged, &debug).unwrap();
    assert_eq!(twice, once);
}

#[test]
fn test_mismatched_files_refused() {
    let stripped_img = stripped_dyn();
    let mut debug = ElfBuilder::new64_le().machine(raw::EM_AARCH64);
    debug = debug.section(SectionSpec::progbits(".debug_info").data(DEBUG_INFO));
    let debug_img = debug.build();

    let stripped = Elf::parse(&stripped_img).unwrap();
    let debug = Elf::parse(&debug_img).unwrap();
    let err = recombine(&stripped, &debug).unwrap_err();
    assert_eq!(err.kind(), UnstripErrorKind::Mismatch);
}

#[test]
fn test_prelink_bias_refused() {
    let stripped_img = stripped_dyn();
    let mut spec = SectionSpec::nobits(".text", TEXT.len() as u64);
    spec.sh_flags = raw::SHF_ALLOC | raw::SHF_EXECINSTR;
    spec.sh_addr = 0x100;
    let debug_img = ElfBuilder::new64_le()
        .phdr(ProgramHeader {
            p_type: raw::PT_LOAD,
            p_flags: raw::PF_R | raw::PF_X,
            p_offset: 0,
            p_vaddr: 0x10000, // shifted by prelink
            p_paddr: 0x10000,
            p_filesz: 0x1000,
            p_memsz: 0x1000,
            p_align: 0x1000,
        })
        .section(spec)
        .section(SectionSpec::progbits(".debug_info").data(DEBUG_INFO))
        .build();

    let stripped = Elf::parse(&stripped_img).unwrap();
    let debug = Elf::parse(&debug_img).unwrap();
    let err = recombine(&stripped, &debug).unwrap_err();
    assert_eq!(err.kind(), UnstripErrorKind::Unstrippable);
}

#[test]
fn test_missing_counterpart_refused() {
    // The debug file elides a section the stripped file does not have.
    let stripped_img = ElfBuilder::new64_le()
        .e_type(raw::ET_REL)
        .section(
            SectionSpec::progbits(".text")
                .flags(raw::SHF_ALLOC | raw::SHF_EXECINSTR)
                .data(TEXT),
        )
        .build();
    let mut missing = SectionSpec::nobits(".rodata", 8);
    missing.sh_flags = raw::SHF_ALLOC;
    let debug_img = ElfBuilder::new64_le()
        .e_type(raw::ET_REL)
        .section(missing)
        .build();

    let stripped = Elf::parse(&stripped_img).unwrap();
    let debug = Elf::parse(&debug_img).unwrap();
    let err = recombine(&stripped, &debug).unwrap_err();
    assert_eq!(err.kind(), UnstripErrorKind::NoSuchSection);
}

fn rel_pair() -> (Vec<u8>, Vec<u8>) {
    let class = Class::Elf64;
    let endian = Endian::Little;

    // Stripped object: .text, .rela.text, .symtab (f, g), .strtab.
    let (s_strtab, s_off) = strtab_bytes(&["f", "g"]);
    let s_symtab = sym_bytes(
        class,
        endian,
        &[
            Symbol::default(),
            Symbol {
                st_name: s_off[0],
                st_info: raw::st_info(raw::STB_GLOBAL, raw::STT_FUNC),
                st_other: 0,
                st_shndx: 1,
                st_value: 0,
                st_size: 4,
            },
            Symbol {
                st_name: s_off[1],
                st_info: raw::st_info(raw::STB_GLOBAL, raw::STT_FUNC),
                st_other: 0,
                st_shndx: 1,
                st_value: 2,
                st_size: 2,
            },
        ],
    );
    let rela = reloc_bytes(
        class,
        endian,
        &[Relocation {
            r_offset: 0,
            r_info: raw::r64_info(1, raw::R_X86_64_64),
            r_addend: Some(0),
        }],
    );

    let stripped = ElfBuilder::new64_le()
        .e_type(raw::ET_REL)
        .section(
            SectionSpec::progbits(".text")
                .flags(raw::SHF_ALLOC | raw::SHF_EXECINSTR)
                .data(TEXT),
        )
        .section(
            SectionSpec::new(".rela.text", raw::SHT_RELA)
                .flags(raw::SHF_INFO_LINK)
                .link(3)
                .info(1)
                .entsize(class.rela_size() as u64)
                .align(8)
                .data(&rela),
        )
        .section(
            SectionSpec::new(".symtab", raw::SHT_SYMTAB)
                .link(4)
                .info(1)
                .entsize(class.sym_size() as u64)
                .align(8)
                .data(&s_symtab),
        )
        .section(SectionSpec::new(".strtab", raw::SHT_STRTAB).data(&s_strtab))
        .build();

    // Debug object: .text as NOBITS, .debug_info, its own .symtab with a
    // local and a duplicate of "f".
    let (d_strtab, d_off) = strtab_bytes(&["x", "f"]);
    let d_symtab = sym_bytes(
        class,
        endian,
        &[
            Symbol::default(),
            Symbol {
                st_name: d_off[0],
                st_info: raw::st_info(raw::STB_LOCAL, raw::STT_OBJECT),
                st_other: 0,
                st_shndx: 1,
                st_value: 0,
                st_size: 0,
            },
            Symbol {
                st_name: d_off[1],
                st_info: raw::st_info(raw::STB_GLOBAL, raw::STT_FUNC),
                st_other: 0,
                st_shndx: 1,
                st_value: 0,
                st_size: 4,
            },
        ],
    );

    let mut text = SectionSpec::nobits(".text", TEXT.len() as u64);
    text.sh_flags = raw::SHF_ALLOC | raw::SHF_EXECINSTR;
    let debug = ElfBuilder::new64_le()
        .e_type(raw::ET_REL)
        .section(text)
        .section(SectionSpec::progbits(".debug_info").data(DEBUG_INFO))
        .section(
            SectionSpec::new(".symtab", raw::SHT_SYMTAB)
                .link(4)
                .info(2)
                .entsize(class.sym_size() as u64)
                .align(8)
                .data(&d_symtab),
        )
        .section(SectionSpec::new(".strtab", raw::SHT_STRTAB).data(&d_strtab))
        .build();

    (stripped, debug)
}

#[test]
fn test_symbol_tables_merge() {
    let (stripped_img, debug_img) = rel_pair();
    let stripped = Elf::parse(&stripped_img).unwrap();
    let debug = Elf::parse(&debug_img).unwrap();

    let merged_img = recombine(&stripped, &debug).unwrap();
    let merged = Elf::parse(&merged_img).unwrap();

    let symtab_idx = merged.section_by_name(b".symtab").unwrap();
    let symtab = merged.symbols(symtab_idx).unwrap();

    // null, x, f (deduplicated), g.
    assert_eq!(symtab.len(), 4);

    let mut names = Vec::new();
    let mut iter = symtab.iter();
    while let Some(sym) = iter.next().unwrap() {
        names.push(symtab.name(&sym).unwrap().to_vec());
    }
    assert_eq!(names[0], b"");
    // The one local comes first.
    assert_eq!(names[1], b"x");
    assert_eq!(symtab.first_nonlocal(), 2);
    assert!(names.contains(&b"f".to_vec()));
    assert!(names.contains(&b"g".to_vec()));

    // Both globals resolve into .text of the merged file.
    let text_idx = merged.section_by_name(b".text").unwrap() as u16;
    for index in 1..symtab.len() {
        let sym = symtab.get(index).unwrap();
        assert_eq!(sym.st_shndx, text_idx);
    }
}

#[test]
fn test_relocations_follow_merged_symbols() {
    let (stripped_img, debug_img) = rel_pair();
    let stripped = Elf::parse(&stripped_img).unwrap();
    let debug = Elf::parse(&debug_img).unwrap();

    let merged_img = recombine(&stripped, &debug).unwrap();
    let merged = Elf::parse(&merged_img).unwrap();

    let symtab_idx = merged.section_by_name(b".symtab").unwrap();
    let symtab = merged.symbols(symtab_idx).unwrap();
    let f_index = (0..symtab.len())
        .find(|&i| {
            symtab
                .get(i)
                .ok()
                .and_then(|sym| symtab.name(&sym).ok().map(|n| n == b"f"))
                .unwrap_or(false)
        })
        .expect("merged table should contain f");

    let rela_idx = merged.section_by_name(b".rela.text").unwrap();
    let rela_shdr = *merged.section_header(rela_idx).unwrap();
    // The relocation section links to the merged symbol table and targets
    // the merged .text.
    assert_eq!(rela_shdr.sh_link as usize, symtab_idx);
    assert_eq!(
        rela_shdr.sh_info as usize,
        merged.section_by_name(b".text").unwrap()
    );

    let relocs = merged.relocations(rela_idx).unwrap();
    let reloc = relocs.get(0).unwrap();
    assert_eq!(relocs.symbol(&reloc) as usize, f_index);
    assert_eq!(relocs.rel_type(&reloc), raw::R_X86_64_64);
    assert_eq!(reloc.r_addend, Some(0));
}

#[test]
fn test_debuglink_section_is_dropped() {
    // A .gnu_debuglink in the stripped file is an artifact of stripping
    // and must not survive the merge.
    let mut link = Vec::new();
    link.extend_from_slice(b"main.debug\0\0");
    link.extend_from_slice(&0xdead_beefu32.to_le_bytes());

    let stripped_img = ElfBuilder::new64_le()
        .e_type(raw::ET_REL)
        .section(
            SectionSpec::progbits(".text")
                .flags(raw::SHF_ALLOC | raw::SHF_EXECINSTR)
                .data(TEXT),
        )
        .section(SectionSpec::progbits(".gnu_debuglink").align(4).data(&link))
        .build();

    let mut text = SectionSpec::nobits(".text", TEXT.len() as u64);
    text.sh_flags = raw::SHF_ALLOC | raw::SHF_EXECINSTR;
    let debug_img = ElfBuilder::new64_le()
        .e_type(raw::ET_REL)
        .section(text)
        .section(SectionSpec::progbits(".debug_info").data(DEBUG_INFO))
        .build();

    let stripped = Elf::parse(&stripped_img).unwrap();
    let debug = Elf::parse(&debug_img).unwrap();
    let merged_img = recombine(&stripped, &debug).unwrap();
    let merged = Elf::parse(&merged_img).unwrap();

    assert!(merged.section_by_name(b".gnu_debuglink").is_none());
    assert!(merged.section_by_name(b".debug_info").is_some());
    assert!(merged.section_by_name(b".text").is_some());
}
