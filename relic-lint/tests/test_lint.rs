use relic_common::Endian;
use relic_elf::{raw, Class, Elf, ProgramHeader, Relocation, Symbol};
use relic_lint::{validate, Context};
use relic_testutils::{dyn_bytes, reloc_bytes, strtab_bytes, sym_bytes, ElfBuilder, SectionSpec};
use similar_asserts::assert_eq;

fn clean_dyn() -> Vec<u8> {
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
fn test_clean_file_reports_no_errors() {
    let image = clean_dyn();
    let elf = Elf::parse(&image).unwrap();
    let report = validate(&elf, &Context::default());
    assert!(
        report.is_clean(),
        "expected a clean report, got:\n{report}"
    );
    assert_eq!(report.error_count(), 0);
}

#[test]
fn test_special_section_flag_mismatch() {
    // .text without SHF_EXECINSTR violates the gABI special-section table.
    let image = ElfBuilder::new64_le()
        .e_type(raw::ET_REL)
        .section(SectionSpec::progbits(".text").flags(raw::SHF_ALLOC).data(b"\xc3"))
        .build();
    let elf = Elf::parse(&image).unwrap();
    let report = validate(&elf, &Context::default());
    assert!(report
        .issues()
        .iter()
        .any(|issue| issue.message.contains("wrong flags")));
}

#[test]
fn test_unknown_machine() {
    let image = ElfBuilder::new64_le().e_type(raw::ET_REL).machine(0xf00d).build();
    let elf = Elf::parse(&image).unwrap();
    let report = validate(&elf, &Context::default());
    assert!(report
        .issues()
        .iter()
        .any(|issue| issue.message.contains("unknown machine type")));
}

#[test]
fn test_symbol_out_of_destination() {
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
                st_shndx: 1,
                st_value: 0x100, // .text is only 4 bytes
                st_size: 8,
            },
        ],
    );

    let image = ElfBuilder::new64_le()
        .e_type(raw::ET_REL)
        .section(
            SectionSpec::progbits(".text")
                .flags(raw::SHF_ALLOC | raw::SHF_EXECINSTR)
                .data(&[0xc3, 0, 0, 0]),
        )
        .section(
            SectionSpec::new(".symtab", raw::SHT_SYMTAB)
                .link(3)
                .info(2)
                .entsize(class.sym_size() as u64)
                .data(&symtab),
        )
        .section(SectionSpec::new(".strtab", raw::SHT_STRTAB).data(&strtab))
        .build();

    let elf = Elf::parse(&image).unwrap();
    let report = validate(&elf, &Context::default());
    assert!(report
        .issues()
        .iter()
        .any(|issue| issue.message.contains("st_value out of bounds")));
}

#[test]
fn test_nonlocal_symbol_in_local_range() {
    let class = Class::Elf64;
    let endian = Endian::Little;

    let (strtab, offsets) = strtab_bytes(&["f"]);
    let symtab = sym_bytes(
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

    // sh_info of 2 claims both entries are local; entry 1 is global.
    let image = ElfBuilder::new64_le()
        .e_type(raw::ET_REL)
        .section(
            SectionSpec::new(".symtab", raw::SHT_SYMTAB)
                .link(2)
                .info(2)
                .entsize(class.sym_size() as u64)
                .data(&symtab),
        )
        .section(SectionSpec::new(".strtab", raw::SHT_STRTAB).data(&strtab))
        .build();

    let elf = Elf::parse(&image).unwrap();
    let report = validate(&elf, &Context::default());
    assert!(report
        .issues()
        .iter()
        .any(|issue| issue.message.contains("non-local symbol outside range")));
}

#[test]
fn test_dynamic_missing_mandatory_tags() {
    let class = Class::Elf64;
    let endian = Endian::Little;

    let entries = dyn_bytes(
        class,
        endian,
        &[
            relic_elf::DynEntry {
                d_tag: raw::DT_STRTAB,
                d_val: 0x1000,
            },
            relic_elf::DynEntry {
                d_tag: raw::DT_NULL,
                d_val: 0,
            },
        ],
    );

    let image = ElfBuilder::new64_le()
        .e_type(raw::ET_REL)
        .section(
            SectionSpec::new(".dynamic", raw::SHT_DYNAMIC)
                .flags(raw::SHF_ALLOC)
                .link(2)
                .entsize(class.dyn_size() as u64)
                .data(&entries),
        )
        .section(SectionSpec::new(".dynstr", raw::SHT_STRTAB).flags(raw::SHF_ALLOC).data(b"\0"))
        .build();

    let elf = Elf::parse(&image).unwrap();
    let report = validate(&elf, &Context::default());
    // DT_STRTAB without DT_STRSZ, and the mandatory set is incomplete.
    assert!(report
        .issues()
        .iter()
        .any(|issue| issue.message.contains("but not")));
    assert!(report
        .issues()
        .iter()
        .any(|issue| issue.message.contains("mandatory tag")));
}

#[test]
fn test_phdr_filesz_exceeds_memsz() {
    let image = ElfBuilder::new64_le()
        .phdr(ProgramHeader {
            p_type: raw::PT_LOAD,
            p_flags: raw::PF_R,
            p_offset: 0,
            p_vaddr: 0,
            p_paddr: 0,
            p_filesz: 0x2000,
            p_memsz: 0x1000,
            p_align: 1,
        })
        .build();
    let elf = Elf::parse(&image).unwrap();
    let report = validate(&elf, &Context::default());
    assert!(report
        .issues()
        .iter()
        .any(|issue| issue.message.contains("file size greater than memory size")));
}

#[test]
fn test_relro_outside_load() {
    let image = ElfBuilder::new64_le()
        .phdr(ProgramHeader {
            p_type: raw::PT_LOAD,
            p_flags: raw::PF_R,
            p_offset: 0,
            p_vaddr: 0,
            p_paddr: 0,
            p_filesz: 0x1000,
            p_memsz: 0x1000,
            p_align: 1,
        })
        .phdr(ProgramHeader {
            p_type: raw::PT_GNU_RELRO,
            p_flags: raw::PF_R,
            p_offset: 0x4000,
            p_vaddr: 0x4000,
            p_paddr: 0x4000,
            p_filesz: 0x100,
            p_memsz: 0x100,
            p_align: 1,
        })
        .build();
    let elf = Elf::parse(&image).unwrap();
    let report = validate(&elf, &Context::default());
    assert!(report
        .issues()
        .iter()
        .any(|issue| issue.message.contains("GNU_RELRO segment not contained")));
}

#[test]
fn test_interp_phdr_without_section() {
    let image = ElfBuilder::new64_le()
        .phdr(ProgramHeader {
            p_type: raw::PT_LOAD,
            p_flags: raw::PF_R,
            p_offset: 0,
            p_vaddr: 0,
            p_paddr: 0,
            p_filesz: 0x1000,
            p_memsz: 0x1000,
            p_align: 1,
        })
        .phdr(ProgramHeader {
            p_type: raw::PT_INTERP,
            p_flags: raw::PF_R,
            p_offset: 0x200,
            p_vaddr: 0x200,
            p_paddr: 0x200,
            p_filesz: 0x10,
            p_memsz: 0x10,
            p_align: 1,
        })
        .build();
    let elf = Elf::parse(&image).unwrap();
    let report = validate(&elf, &Context::default());
    assert!(report
        .issues()
        .iter()
        .any(|issue| issue
            .message
            .contains("INTERP program header entry but no .interp section")));
}

#[test]
fn test_group_in_executable_rejected() {
    let mut group = Vec::new();
    group.extend_from_slice(&raw::GRP_COMDAT.to_le_bytes());
    group.extend_from_slice(&2u32.to_le_bytes());

    let image = ElfBuilder::new64_le()
        .phdr(ProgramHeader {
            p_type: raw::PT_LOAD,
            p_flags: raw::PF_R,
            p_offset: 0,
            p_vaddr: 0,
            p_paddr: 0,
            p_filesz: 0x2000,
            p_memsz: 0x2000,
            p_align: 1,
        })
        .section(
            SectionSpec::new(".group", raw::SHT_GROUP)
                .entsize(4)
                .data(&group),
        )
        .section(
            SectionSpec::progbits(".text")
                .flags(raw::SHF_ALLOC | raw::SHF_EXECINSTR | raw::SHF_GROUP)
                .data(b"\xc3\0\0\0"),
        )
        .build();
    let elf = Elf::parse(&image).unwrap();
    let report = validate(&elf, &Context::default());
    assert!(report
        .issues()
        .iter()
        .any(|issue| issue
            .message
            .contains("section groups only allowed in relocatable object files")));
}

#[test]
fn test_errors_accumulate() {
    // Several independent defects must all be reported.
    let image = ElfBuilder::new64_le()
        .e_type(raw::ET_REL)
        .machine(0xf00d)
        .section(SectionSpec::progbits(".text").flags(raw::SHF_ALLOC).data(b"\xc3"))
        .section(SectionSpec::new(".bss", raw::SHT_PROGBITS).flags(raw::SHF_ALLOC).data(b"x"))
        .build();
    let elf = Elf::parse(&image).unwrap();
    let report = validate(&elf, &Context::default());
    assert!(report.error_count() >= 3, "report was:\n{report}");
}
