//! The rule implementations behind [`validate`](crate::validate).

use fallible_iterator::FallibleIterator;
use relic_elf::raw;
use relic_elf::{Elf, ProgramHeader, SectionHeader};

use crate::{Context, Report};

const VALID_MACHINES: &[u16] = &[
    raw::EM_M32,
    raw::EM_SPARC,
    raw::EM_386,
    raw::EM_68K,
    raw::EM_88K,
    raw::EM_860,
    raw::EM_MIPS,
    raw::EM_S370,
    raw::EM_MIPS_RS3_LE,
    raw::EM_PARISC,
    raw::EM_VPP500,
    raw::EM_SPARC32PLUS,
    raw::EM_960,
    raw::EM_PPC,
    raw::EM_PPC64,
    raw::EM_S390,
    raw::EM_V800,
    raw::EM_FR20,
    raw::EM_RH32,
    raw::EM_RCE,
    raw::EM_ARM,
    raw::EM_FAKE_ALPHA,
    raw::EM_SH,
    raw::EM_SPARCV9,
    raw::EM_TRICORE,
    raw::EM_ARC,
    raw::EM_H8_300,
    raw::EM_H8_300H,
    raw::EM_H8S,
    raw::EM_H8_500,
    raw::EM_IA_64,
    raw::EM_MIPS_X,
    raw::EM_COLDFIRE,
    raw::EM_68HC12,
    raw::EM_MMA,
    raw::EM_PCP,
    raw::EM_NCPU,
    raw::EM_NDR1,
    raw::EM_STARCORE,
    raw::EM_ME16,
    raw::EM_ST100,
    raw::EM_TINYJ,
    raw::EM_X86_64,
    raw::EM_PDSP,
    raw::EM_FX66,
    raw::EM_ST9PLUS,
    raw::EM_ST7,
    raw::EM_68HC16,
    raw::EM_68HC11,
    raw::EM_68HC08,
    raw::EM_68HC05,
    raw::EM_SVX,
    raw::EM_ST19,
    raw::EM_VAX,
    raw::EM_CRIS,
    raw::EM_JAVELIN,
    raw::EM_FIREPATH,
    raw::EM_ZSP,
    raw::EM_MMIX,
    raw::EM_HUANY,
    raw::EM_PRISM,
    raw::EM_AVR,
    raw::EM_FR30,
    raw::EM_D10V,
    raw::EM_D30V,
    raw::EM_V850,
    raw::EM_M32R,
    raw::EM_MN10300,
    raw::EM_MN10200,
    raw::EM_PJ,
    raw::EM_OPENRISC,
    raw::EM_ARC_A5,
    raw::EM_XTENSA,
    raw::EM_AARCH64,
    raw::EM_RISCV,
    raw::EM_BPF,
];

enum AttrMatch {
    Unused,
    Exact,
    AtLeast,
}

/// Figure 4-14 of the gABI: names, mandated types, and flag policies.
const SPECIAL_SECTIONS: &[(&[u8], u32, AttrMatch, u64, u64)] = &[
    (b".bss", raw::SHT_NOBITS, AttrMatch::Exact, raw::SHF_ALLOC | raw::SHF_WRITE, 0),
    (b".comment", raw::SHT_PROGBITS, AttrMatch::Exact, 0, 0),
    (b".data1", raw::SHT_PROGBITS, AttrMatch::Exact, raw::SHF_ALLOC | raw::SHF_WRITE, 0),
    (b".data", raw::SHT_PROGBITS, AttrMatch::Exact, raw::SHF_ALLOC | raw::SHF_WRITE, 0),
    (b".debug", raw::SHT_PROGBITS, AttrMatch::Exact, 0, 0),
    (b".dynamic", raw::SHT_DYNAMIC, AttrMatch::AtLeast, raw::SHF_ALLOC, raw::SHF_WRITE),
    (b".dynstr", raw::SHT_STRTAB, AttrMatch::Exact, raw::SHF_ALLOC, 0),
    (b".dynsym", raw::SHT_DYNSYM, AttrMatch::Exact, raw::SHF_ALLOC, 0),
    (b".fini_array", raw::SHT_FINI_ARRAY, AttrMatch::Exact, raw::SHF_ALLOC | raw::SHF_WRITE, 0),
    (b".fini", raw::SHT_PROGBITS, AttrMatch::Exact, raw::SHF_ALLOC | raw::SHF_EXECINSTR, 0),
    (b".got", raw::SHT_PROGBITS, AttrMatch::Unused, 0, 0),
    (b".hash", raw::SHT_HASH, AttrMatch::Exact, raw::SHF_ALLOC, 0),
    (b".init_array", raw::SHT_INIT_ARRAY, AttrMatch::Exact, raw::SHF_ALLOC | raw::SHF_WRITE, 0),
    (b".init", raw::SHT_PROGBITS, AttrMatch::Exact, raw::SHF_ALLOC | raw::SHF_EXECINSTR, 0),
    (b".interp", raw::SHT_PROGBITS, AttrMatch::AtLeast, 0, raw::SHF_ALLOC),
    (b".line", raw::SHT_PROGBITS, AttrMatch::Exact, 0, 0),
    (b".note", raw::SHT_NOTE, AttrMatch::Exact, 0, 0),
    (b".plt", raw::SHT_PROGBITS, AttrMatch::Unused, 0, 0),
    (b".preinit_array", raw::SHT_PREINIT_ARRAY, AttrMatch::Exact, raw::SHF_ALLOC | raw::SHF_WRITE, 0),
    (b".rela", raw::SHT_RELA, AttrMatch::AtLeast, 0, raw::SHF_ALLOC),
    (b".rel", raw::SHT_REL, AttrMatch::AtLeast, 0, raw::SHF_ALLOC),
    (b".rodata1", raw::SHT_PROGBITS, AttrMatch::Exact, raw::SHF_ALLOC, 0),
    (b".rodata", raw::SHT_PROGBITS, AttrMatch::Exact, raw::SHF_ALLOC, 0),
    (b".shstrtab", raw::SHT_STRTAB, AttrMatch::Exact, 0, 0),
    (b".strtab", raw::SHT_STRTAB, AttrMatch::AtLeast, 0, raw::SHF_ALLOC),
    (b".symtab_shndx", raw::SHT_SYMTAB_SHNDX, AttrMatch::AtLeast, 0, raw::SHF_ALLOC),
    (b".symtab", raw::SHT_SYMTAB, AttrMatch::AtLeast, 0, raw::SHF_ALLOC),
    (b".tbss", raw::SHT_NOBITS, AttrMatch::Exact, raw::SHF_ALLOC | raw::SHF_WRITE | raw::SHF_TLS, 0),
    (b".tdata1", raw::SHT_PROGBITS, AttrMatch::Exact, raw::SHF_ALLOC | raw::SHF_WRITE | raw::SHF_TLS, 0),
    (b".tdata", raw::SHT_PROGBITS, AttrMatch::Exact, raw::SHF_ALLOC | raw::SHF_WRITE | raw::SHF_TLS, 0),
    (b".text", raw::SHT_PROGBITS, AttrMatch::Exact, raw::SHF_ALLOC | raw::SHF_EXECINSTR, 0),
];

const ALL_SH_FLAGS: u64 = raw::SHF_WRITE
    | raw::SHF_ALLOC
    | raw::SHF_EXECINSTR
    | raw::SHF_MERGE
    | raw::SHF_STRINGS
    | raw::SHF_INFO_LINK
    | raw::SHF_LINK_ORDER
    | raw::SHF_OS_NONCONFORMING
    | raw::SHF_GROUP
    | raw::SHF_TLS
    | raw::SHF_COMPRESSED;

pub(crate) struct Checker<'elf, 'data> {
    elf: &'elf Elf<'data>,
    context: Context,
    report: Report,
    has_loadable_segment: bool,
    has_interp_segment: bool,
    dot_interp_section: bool,
    ndynamic: usize,
    scnref: Vec<u32>,
}

impl<'elf, 'data> Checker<'elf, 'data> {
    pub(crate) fn new(elf: &'elf Elf<'data>, context: &Context) -> Self {
        Checker {
            elf,
            context: *context,
            report: Report::default(),
            has_loadable_segment: false,
            has_interp_segment: false,
            dot_interp_section: false,
            ndynamic: 0,
            scnref: vec![0; elf.shnum()],
        }
    }

    pub(crate) fn into_report(self) -> Report {
        self.report
    }

    pub(crate) fn run(&mut self) {
        self.check_header();
        self.check_program_headers();
        self.check_sections();
    }

    fn add(&mut self, section: Option<usize>, entry: Option<u64>, message: String) {
        self.report.add(section, entry, message);
    }

    fn name(&self, index: usize) -> String {
        match self.elf.section_name(index) {
            Ok(name) => String::from_utf8_lossy(name).into_owned(),
            Err(_) => String::from("<invalid>"),
        }
    }

    // ELF header rules.

    fn check_header(&mut self) {
        let header = *self.elf.header();
        let data = self.elf.data();

        if header.ident_version != raw::EV_CURRENT as u8 {
            self.add(
                None,
                None,
                format!("unknown ELF header version number {}", header.ident_version),
            );
        }
        if header.os_abi != raw::ELFOSABI_NONE {
            self.add(None, None, format!("unsupported OS ABI {}", header.os_abi));
        }
        if header.abi_version != 0 {
            self.add(
                None,
                None,
                format!("unsupported ABI version {}", header.abi_version),
            );
        }
        for (index, &byte) in data[raw::EI_PAD..raw::EI_NIDENT].iter().enumerate() {
            if byte != 0 {
                self.add(
                    None,
                    None,
                    format!("e_ident[{}] is not zero", raw::EI_PAD + index),
                );
            }
        }

        if !matches!(
            header.e_type,
            raw::ET_REL | raw::ET_EXEC | raw::ET_DYN | raw::ET_CORE
        ) {
            self.add(None, None, format!("unknown object file type {}", header.e_type));
        }
        if !VALID_MACHINES.contains(&header.e_machine) {
            self.add(None, None, format!("unknown machine type {}", header.e_machine));
        }
        if header.e_version != raw::EV_CURRENT {
            self.add(None, None, String::from("unknown object file version"));
        }

        if header.e_phoff == 0 {
            if header.e_phnum != 0 {
                self.add(None, None, String::from("invalid program header offset"));
            } else if header.e_type == raw::ET_EXEC || header.e_type == raw::ET_DYN {
                self.add(
                    None,
                    None,
                    String::from("executables and DSOs cannot have zero program header offset"),
                );
            }
        } else if header.e_phnum == 0 {
            self.add(
                None,
                None,
                String::from("invalid number of program header entries"),
            );
        }

        if header.e_shoff == 0 {
            if header.e_shnum != 0 {
                self.add(None, None, String::from("invalid section header table offset"));
            } else if !matches!(
                header.e_type,
                raw::ET_EXEC | raw::ET_DYN | raw::ET_CORE
            ) {
                self.add(None, None, String::from("section header table must be present"));
            }
        } else if header.e_shstrndx != raw::SHN_XINDEX
            && usize::from(header.e_shstrndx) >= self.elf.shnum()
        {
            self.add(None, None, String::from("invalid section header index"));
        }

        let class = self.elf.class();
        if header.e_ehsize != 0 && usize::from(header.e_ehsize) != class.ehdr_size() {
            self.add(None, None, format!("invalid ELF header size: {}", header.e_ehsize));
        }

        if header.e_phentsize != 0 && usize::from(header.e_phentsize) != class.phdr_size() {
            self.add(
                None,
                None,
                format!("invalid program header size: {}", header.e_phentsize),
            );
        } else if header.e_phoff + u64::from(header.e_phnum) * u64::from(header.e_phentsize)
            > data.len() as u64
        {
            self.add(
                None,
                None,
                String::from("invalid program header position or size"),
            );
        }

        if header.e_shentsize != 0 && usize::from(header.e_shentsize) != class.shdr_size() {
            self.add(
                None,
                None,
                format!("invalid section header size: {}", header.e_shentsize),
            );
        } else if header.e_shoff + self.elf.shnum() as u64 * u64::from(header.e_shentsize)
            > data.len() as u64
        {
            self.add(
                None,
                None,
                String::from("invalid section header position or size"),
            );
        }
    }

    // Program header rules.

    fn check_program_headers(&mut self) {
        let header = *self.elf.header();
        if header.e_phoff == 0 {
            return;
        }

        if !matches!(header.e_type, raw::ET_EXEC | raw::ET_DYN | raw::ET_CORE) {
            self.add(
                None,
                None,
                String::from(
                    "only executables, shared objects, and core files can have program headers",
                ),
            );
        }

        let mut num_interp = 0;
        let mut num_tls = 0;
        let mut num_relro = 0;
        let phdrs: Vec<ProgramHeader> = self.elf.program_headers().to_vec();

        for (index, phdr) in phdrs.iter().enumerate() {
            if phdr.p_type >= raw::PT_NUM
                && !matches!(
                    phdr.p_type,
                    raw::PT_GNU_EH_FRAME | raw::PT_GNU_STACK | raw::PT_GNU_RELRO
                )
            {
                self.add(
                    None,
                    Some(index as u64),
                    format!("unknown program header entry type {:#x}", phdr.p_type),
                );
            }

            match phdr.p_type {
                raw::PT_LOAD => self.has_loadable_segment = true,
                raw::PT_INTERP => {
                    num_interp += 1;
                    if num_interp == 2 {
                        self.add(
                            None,
                            Some(index as u64),
                            String::from("more than one INTERP entry in program header"),
                        );
                    }
                    self.has_interp_segment = true;
                }
                raw::PT_TLS => {
                    num_tls += 1;
                    if num_tls == 2 {
                        self.add(
                            None,
                            Some(index as u64),
                            String::from("more than one TLS entry in program header"),
                        );
                    }
                }
                raw::PT_NOTE => self.check_note(phdr, index),
                raw::PT_DYNAMIC => {
                    if header.e_type == raw::ET_EXEC && !self.has_interp_segment {
                        self.add(
                            None,
                            Some(index as u64),
                            String::from("static executable cannot have dynamic sections"),
                        );
                    }
                }
                raw::PT_GNU_RELRO => {
                    num_relro += 1;
                    if num_relro == 2 {
                        self.add(
                            None,
                            Some(index as u64),
                            String::from("more than one GNU_RELRO entry in program header"),
                        );
                    } else {
                        self.check_relro(phdr, &phdrs, index);
                    }
                }
                _ => {}
            }

            if phdr.p_filesz > phdr.p_memsz {
                self.add(
                    None,
                    Some(index as u64),
                    String::from("file size greater than memory size"),
                );
            }

            if phdr.p_align > 1 {
                if !phdr.p_align.is_power_of_two() {
                    self.add(
                        None,
                        Some(index as u64),
                        String::from("alignment not a power of 2"),
                    );
                } else if phdr.p_vaddr.wrapping_sub(phdr.p_offset) % phdr.p_align != 0 {
                    self.add(
                        None,
                        Some(index as u64),
                        String::from("file offset and virtual address not congruent modulo alignment"),
                    );
                }
            }
        }
    }

    fn check_relro(&mut self, relro: &ProgramHeader, phdrs: &[ProgramHeader], index: usize) {
        // The region must lie within a writable, non-executable LOAD.
        for phdr in phdrs {
            if phdr.p_type == raw::PT_LOAD
                && relro.p_vaddr >= phdr.p_vaddr
                && relro.p_vaddr + relro.p_memsz <= phdr.p_vaddr + phdr.p_memsz
            {
                if phdr.p_flags & raw::PF_W == 0 {
                    self.add(
                        None,
                        Some(index as u64),
                        String::from("loadable segment GNU_RELRO applies to is not writable"),
                    );
                }
                if phdr.p_flags & raw::PF_X != 0 {
                    self.add(
                        None,
                        Some(index as u64),
                        String::from("loadable segment GNU_RELRO applies to is executable"),
                    );
                }
                return;
            }
        }
        self.add(
            None,
            Some(index as u64),
            String::from("GNU_RELRO segment not contained in a loaded segment"),
        );
    }

    fn check_note(&mut self, phdr: &ProgramHeader, index: usize) {
        let e_type = self.elf.header().e_type;
        if !matches!(
            e_type,
            raw::ET_CORE | raw::ET_REL | raw::ET_EXEC | raw::ET_DYN
        ) {
            self.add(
                None,
                Some(index as u64),
                String::from("no note entries defined for the type of file"),
            );
        }

        // The p_offset values in a separate debug file are bogus.
        if self.context.is_debuginfo {
            return;
        }

        let mut notes = match self.elf.segment_notes(phdr) {
            Ok(notes) => notes,
            Err(_) => {
                self.add(
                    None,
                    Some(index as u64),
                    String::from("note segment not contained in the file"),
                );
                return;
            }
        };

        loop {
            match notes.next() {
                Ok(Some(note)) => {
                    let known = if e_type == raw::ET_CORE {
                        matches!(
                            note.n_type as u32,
                            raw::NT_PRSTATUS
                                | raw::NT_FPREGSET
                                | raw::NT_PRPSINFO
                                | raw::NT_TASKSTRUCT
                                | raw::NT_PLATFORM
                                | raw::NT_AUXV
                                | raw::NT_GWINDOWS
                                | raw::NT_ASRS
                                | raw::NT_PSTATUS
                                | raw::NT_PSINFO
                                | raw::NT_PRCRED
                                | raw::NT_UTSNAME
                                | raw::NT_LWPSTATUS
                                | raw::NT_LWPSINFO
                                | raw::NT_PRFPXREG
                        )
                    } else {
                        // Object files define NT_VERSION and the GNU notes.
                        matches!(
                            note.n_type as u32,
                            raw::NT_VERSION | raw::NT_GNU_BUILD_ID
                        ) || note.name == b"GNU"
                    };
                    if !known {
                        self.add(
                            None,
                            Some(index as u64),
                            format!("unknown note type {}", note.n_type),
                        );
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    self.add(
                        None,
                        Some(index as u64),
                        String::from("extra bytes after last note"),
                    );
                    break;
                }
            }
        }
    }

    // Section rules.

    fn check_sections(&mut self) {
        if self.elf.header().e_shoff == 0 {
            return;
        }

        self.check_zeroth_section();

        for index in 1..self.elf.shnum() {
            let shdr = match self.elf.section_header(index) {
                Ok(shdr) => *shdr,
                Err(_) => continue,
            };
            self.check_one_section(index, &shdr);
        }

        if self.has_interp_segment && !self.dot_interp_section {
            self.add(
                None,
                None,
                String::from("INTERP program header entry but no .interp section"),
            );
        }
    }

    fn check_zeroth_section(&mut self) {
        let header = *self.elf.header();
        let shdr = match self.elf.section_header(0) {
            Ok(shdr) => *shdr,
            Err(_) => {
                self.add(None, None, String::from("cannot get section header of zeroth section"));
                return;
            }
        };

        if shdr.sh_name != 0 {
            self.add(Some(0), None, String::from("zeroth section has nonzero name"));
        }
        if shdr.sh_type != 0 {
            self.add(Some(0), None, String::from("zeroth section has nonzero type"));
        }
        if shdr.sh_flags != 0 {
            self.add(Some(0), None, String::from("zeroth section has nonzero flags"));
        }
        if shdr.sh_addr != 0 {
            self.add(Some(0), None, String::from("zeroth section has nonzero address"));
        }
        if shdr.sh_offset != 0 {
            self.add(Some(0), None, String::from("zeroth section has nonzero offset"));
        }
        if shdr.sh_info != 0 {
            self.add(Some(0), None, String::from("zeroth section has nonzero info field"));
        }
        if shdr.sh_addralign != 0 {
            self.add(Some(0), None, String::from("zeroth section has nonzero align value"));
        }
        if shdr.sh_entsize != 0 {
            self.add(Some(0), None, String::from("zeroth section has nonzero entry size value"));
        }
        if shdr.sh_size != 0 && header.e_shnum != 0 {
            self.add(
                Some(0),
                None,
                String::from(
                    "zeroth section has nonzero size value while ELF header has nonzero shnum value",
                ),
            );
        }
        if shdr.sh_link != 0 && header.e_shstrndx != raw::SHN_XINDEX {
            self.add(
                Some(0),
                None,
                String::from(
                    "zeroth section has nonzero link value while ELF header does not signal overflow in shstrndx",
                ),
            );
        }
    }

    fn check_one_section(&mut self, index: usize, shdr: &SectionHeader) {
        let e_type = self.elf.header().e_type;
        let shnum = self.elf.shnum();

        match self.elf.section_name(index) {
            Ok(name) => self.check_special_section(index, shdr, name),
            Err(_) => self.add(Some(index), None, String::from("invalid name")),
        }

        if shdr.sh_entsize != 0 && shdr.sh_size % shdr.sh_entsize != 0 {
            self.add(
                Some(index),
                None,
                String::from("size not multiple of entry size"),
            );
        }

        if shdr.sh_type >= raw::SHT_NUM
            && !matches!(
                shdr.sh_type,
                raw::SHT_GNU_LIBLIST
                    | raw::SHT_CHECKSUM
                    | raw::SHT_GNU_ATTRIBUTES
                    | raw::SHT_GNU_HASH
                    | raw::SHT_GNU_VERDEF
                    | raw::SHT_GNU_VERNEED
                    | raw::SHT_GNU_VERSYM
            )
        {
            self.add(
                Some(index),
                None,
                format!("unsupported section type {:#x}", shdr.sh_type),
            );
        }

        if shdr.sh_flags & !ALL_SH_FLAGS != 0 {
            self.add(
                Some(index),
                None,
                format!("contains unknown flag(s) {:#x}", shdr.sh_flags & !ALL_SH_FLAGS),
            );
        } else if shdr.sh_flags & raw::SHF_TLS != 0
            && shdr.sh_addr != 0
            && !self.context.gnu_ld
        {
            self.add(
                Some(index),
                None,
                String::from("thread-local data section address not zero"),
            );
        }

        if usize::try_from(shdr.sh_link).map_or(true, |link| link >= shnum) {
            self.add(
                Some(index),
                None,
                String::from("invalid section reference in link value"),
            );
        }
        if shdr.sh_flags & raw::SHF_INFO_LINK != 0
            && usize::try_from(shdr.sh_info).map_or(true, |info| info >= shnum)
        {
            self.add(
                Some(index),
                None,
                String::from("invalid section reference in info value"),
            );
        }

        if shdr.sh_flags & raw::SHF_MERGE == 0
            && shdr.sh_flags & raw::SHF_STRINGS != 0
            && self.context.strict
        {
            self.add(
                Some(index),
                None,
                String::from("strings flag set without merge flag"),
            );
        }
        if shdr.sh_flags & raw::SHF_MERGE != 0 && shdr.sh_entsize == 0 {
            self.add(
                Some(index),
                None,
                String::from("merge flag set but entry size is zero"),
            );
        }

        if shdr.sh_addralign > 1 && !shdr.sh_addralign.is_power_of_two() {
            self.add(
                Some(index),
                None,
                String::from("alignment not a power of 2"),
            );
        }

        if shdr.sh_flags & raw::SHF_GROUP != 0 {
            self.check_scn_group(index);
        }

        if e_type != raw::ET_REL && shdr.sh_flags & raw::SHF_ALLOC != 0 {
            self.check_section_in_segment(index, shdr);
        }

        if index == self.elf.shstrndx() && shdr.sh_type != raw::SHT_STRTAB {
            self.add(
                Some(index),
                None,
                String::from(
                    "ELF header says this is the section header string table but type is not SHT_STRTAB",
                ),
            );
        }

        match shdr.sh_type {
            raw::SHT_SYMTAB | raw::SHT_DYNSYM => self.check_symtab(index, shdr),
            raw::SHT_RELA | raw::SHT_REL => self.check_reloc(index, shdr),
            raw::SHT_DYNAMIC => self.check_dynamic(index, shdr),
            raw::SHT_SYMTAB_SHNDX => self.check_symtab_shndx(index, shdr),
            raw::SHT_HASH => self.check_hash(index, shdr),
            raw::SHT_GNU_HASH => self.check_gnu_hash(index, shdr),
            raw::SHT_GROUP => self.check_group(index, shdr),
            raw::SHT_GNU_VERSYM => self.check_versym(index, shdr),
            _ => {}
        }
    }

    fn check_special_section(&mut self, index: usize, shdr: &SectionHeader, name: &[u8]) {
        let e_type = self.elf.header().e_type;
        let entry = SPECIAL_SECTIONS
            .iter()
            .find(|(prefix, ..)| name.starts_with(prefix));
        let (_, expected_type, attr_match, attr, attr2) = match entry {
            Some(entry) => entry,
            None => return,
        };

        if shdr.sh_type != *expected_type
            && !(self.context.is_debuginfo && shdr.sh_type == raw::SHT_NOBITS)
        {
            self.add(
                Some(index),
                None,
                format!(
                    "'{}' has wrong type: expected {}, is {}",
                    String::from_utf8_lossy(name),
                    expected_type,
                    shdr.sh_type
                ),
            );
        }

        match attr_match {
            AttrMatch::Exact => {
                // Except for the link order and group bits all the other
                // bits should match exactly.
                if shdr.sh_flags & !(raw::SHF_LINK_ORDER | raw::SHF_GROUP | raw::SHF_COMPRESSED)
                    != *attr
                {
                    self.add(
                        Some(index),
                        None,
                        format!(
                            "'{}' has wrong flags: expected {:#x}, is {:#x}",
                            String::from_utf8_lossy(name),
                            attr,
                            shdr.sh_flags
                        ),
                    );
                }
            }
            AttrMatch::AtLeast => {
                if shdr.sh_flags & attr != *attr
                    || shdr.sh_flags
                        & !(raw::SHF_LINK_ORDER
                            | raw::SHF_GROUP
                            | raw::SHF_COMPRESSED
                            | attr
                            | attr2)
                        != 0
                {
                    self.add(
                        Some(index),
                        None,
                        format!(
                            "'{}' has wrong flags: expected {:#x} and possibly {:#x}, is {:#x}",
                            String::from_utf8_lossy(name),
                            attr,
                            attr2,
                            shdr.sh_flags
                        ),
                    );
                }
            }
            AttrMatch::Unused => {}
        }

        if name == b".interp" {
            self.dot_interp_section = true;
            if e_type == raw::ET_REL {
                self.add(
                    Some(index),
                    None,
                    String::from("'.interp' present in object file"),
                );
            }
            if shdr.sh_flags & raw::SHF_ALLOC != 0 && !self.has_loadable_segment {
                self.add(
                    Some(index),
                    None,
                    String::from(
                        "'.interp' has SHF_ALLOC flag set but there is no loadable segment",
                    ),
                );
            } else if shdr.sh_flags & raw::SHF_ALLOC == 0 && self.has_loadable_segment {
                self.add(
                    Some(index),
                    None,
                    String::from(
                        "'.interp' has SHF_ALLOC flag not set but there are loadable segments",
                    ),
                );
            }
        } else if name == b".symtab_shndx" && e_type != raw::ET_REL {
            self.add(
                Some(index),
                None,
                String::from("extension section index table in non-object file"),
            );
        }
    }

    fn check_scn_group(&mut self, index: usize) {
        // The group that contains this section must precede it.
        for candidate in 1..self.elf.shnum() {
            let shdr = match self.elf.section_header(candidate) {
                Ok(shdr) => *shdr,
                Err(_) => continue,
            };
            if shdr.sh_type != raw::SHT_GROUP {
                continue;
            }
            let group = match self.elf.group(candidate) {
                Ok(group) => group,
                Err(_) => continue,
            };
            for member in 0..group.member_count() {
                if group.member(member).ok() == Some(index as u32) {
                    if candidate > index {
                        self.add(
                            Some(index),
                            None,
                            format!(
                                "section group [{candidate}] '{}' does not precede group member",
                                self.name(candidate)
                            ),
                        );
                    }
                    return;
                }
            }
        }
        self.add(
            Some(index),
            None,
            String::from("section with SHF_GROUP flag set not part of a section group"),
        );
    }

    fn check_section_in_segment(&mut self, index: usize, shdr: &SectionHeader) {
        // An allocated section must live in a loaded (or TLS) segment, and
        // its file image must agree with NOBITS-ness.
        let is_tls = shdr.sh_flags & raw::SHF_TLS != 0;
        for (pcnt, phdr) in self.elf.program_headers().iter().enumerate() {
            let matches_type = (phdr.p_type == raw::PT_LOAD && !is_tls)
                || (phdr.p_type == raw::PT_TLS && is_tls);
            if !matches_type
                || phdr.p_offset > shdr.sh_offset
                || phdr.p_offset + phdr.p_memsz <= shdr.sh_offset
            {
                continue;
            }

            if phdr.p_offset + phdr.p_memsz < shdr.sh_offset + shdr.sh_size {
                self.add(
                    Some(index),
                    None,
                    format!("not fully contained in segment of program header entry {pcnt}"),
                );
            }
            if shdr.sh_type == raw::SHT_NOBITS {
                if shdr.sh_offset < phdr.p_offset + phdr.p_filesz && !self.context.is_debuginfo {
                    self.add(
                        Some(index),
                        None,
                        format!(
                            "has type NOBITS but is read from the file in segment of program header entry {pcnt}"
                        ),
                    );
                }
            } else if shdr.sh_offset >= phdr.p_offset + phdr.p_filesz {
                self.add(
                    Some(index),
                    None,
                    format!(
                        "has not type NOBITS but is not read from the file in segment of program header entry {pcnt}"
                    ),
                );
            }
            return;
        }
        self.add(
            Some(index),
            None,
            String::from("alloc flag set but section not in any loaded segment"),
        );
    }

    // Symbol table rules.

    fn check_symtab(&mut self, index: usize, shdr: &SectionHeader) {
        let elf = self.elf;
        let e_type = elf.header().e_type;
        let shnum = elf.shnum();

        if let Ok(link) = elf.section_header(shdr.sh_link as usize) {
            if link.sh_type != raw::SHT_STRTAB {
                self.add(
                    Some(index),
                    None,
                    format!(
                        "referenced string table [{}] is not of type SHT_STRTAB",
                        shdr.sh_link
                    ),
                );
            }
        }

        let symtab = match elf.symbols(index) {
            Ok(symtab) => symtab,
            Err(err) => {
                self.add(Some(index), None, format!("cannot get symbol table: {err}"));
                return;
            }
        };

        let strtab_size = symtab.strtab().map(|s| s.data().len()).unwrap_or(0);
        let has_xndx = elf.symtab_shndx_for(index).is_some();
        let mut no_pt_tls_reported = false;

        // The zeroth entry must be all zeros.
        if let Ok(sym) = symtab.get(0) {
            for (field, nonzero) in [
                ("st_name", sym.st_name != 0),
                ("st_value", sym.st_value != 0),
                ("st_size", sym.st_size != 0),
                ("st_info", sym.st_info != 0),
                ("st_other", sym.st_other != 0),
                ("st_shndx", sym.st_shndx != 0),
            ] {
                if nonzero {
                    self.add(
                        Some(index),
                        Some(0),
                        format!("'{field}' in zeroth entry not zero"),
                    );
                }
            }
        }

        for cnt in 1..symtab.len() {
            let sym = match symtab.get(cnt) {
                Ok(sym) => sym,
                Err(_) => {
                    self.add(Some(index), Some(cnt as u64), String::from("cannot get symbol"));
                    continue;
                }
            };

            let name = if (sym.st_name as usize) >= strtab_size && strtab_size > 0 {
                self.add(
                    Some(index),
                    Some(cnt as u64),
                    String::from("invalid name value"),
                );
                None
            } else {
                symtab.name(&sym).ok()
            };

            let xndx = if sym.st_shndx == raw::SHN_XINDEX {
                if !has_xndx {
                    self.add(
                        Some(index),
                        Some(cnt as u64),
                        String::from(
                            "too large section index but no extended section index section",
                        ),
                    );
                    None
                } else {
                    match symtab.resolved_shndx(cnt, &sym) {
                        Ok(xndx) if xndx < u32::from(raw::SHN_LORESERVE) => {
                            self.add(
                                Some(index),
                                Some(cnt as u64),
                                format!("XINDEX used for index which would fit in st_shndx ({xndx})"),
                            );
                            Some(xndx)
                        }
                        Ok(xndx) => Some(xndx),
                        Err(_) => None,
                    }
                }
            } else if (sym.st_shndx >= raw::SHN_LORESERVE
                && sym.st_shndx != raw::SHN_ABS
                && sym.st_shndx != raw::SHN_COMMON)
                || (usize::from(sym.st_shndx) >= shnum && sym.st_shndx < raw::SHN_LORESERVE)
            {
                self.add(
                    Some(index),
                    Some(cnt as u64),
                    String::from("invalid section index"),
                );
                None
            } else {
                Some(u32::from(sym.st_shndx))
            };

            if sym.sym_type() >= raw::STT_NUM && sym.sym_type() != raw::STT_GNU_IFUNC {
                self.add(Some(index), Some(cnt as u64), String::from("unknown type"));
            }
            if sym.bind() >= raw::STB_NUM && sym.bind() != raw::STB_GNU_UNIQUE {
                self.add(
                    Some(index),
                    Some(cnt as u64),
                    String::from("unknown symbol binding"),
                );
            }

            match xndx {
                Some(xndx) if u64::from(xndx) == u64::from(raw::SHN_COMMON) => {
                    // Common symbols can only appear in relocatable files.
                    if e_type != raw::ET_REL {
                        self.add(
                            Some(index),
                            Some(cnt as u64),
                            String::from("COMMON only allowed in relocatable files"),
                        );
                    }
                    if cnt < symtab.first_nonlocal() {
                        self.add(
                            Some(index),
                            Some(cnt as u64),
                            String::from("local COMMON symbols are nonsense"),
                        );
                    }
                    if sym.sym_type() == raw::STT_FUNC {
                        self.add(
                            Some(index),
                            Some(cnt as u64),
                            String::from("function in COMMON section is nonsense"),
                        );
                    }
                }
                Some(xndx) if xndx > 0 && (xndx as usize) < shnum => {
                    self.check_symbol_destination(index, cnt, &sym, xndx as usize, &mut no_pt_tls_reported);
                }
                _ => {}
            }

            if sym.bind() == raw::STB_LOCAL {
                if cnt >= symtab.first_nonlocal() {
                    self.add(
                        Some(index),
                        Some(cnt as u64),
                        String::from("local symbol outside range described in sh_info"),
                    );
                }
            } else if cnt < symtab.first_nonlocal() {
                self.add(
                    Some(index),
                    Some(cnt as u64),
                    String::from("non-local symbol outside range described in sh_info"),
                );
            }

            if sym.sym_type() == raw::STT_SECTION && sym.bind() != raw::STB_LOCAL {
                self.add(
                    Some(index),
                    Some(cnt as u64),
                    String::from("non-local section symbol"),
                );
            }

            if let Some(name) = name {
                if name == b"_GLOBAL_OFFSET_TABLE_" {
                    self.check_got_symbol(index, cnt, &sym);
                } else if name == b"_DYNAMIC" {
                    self.check_dynamic_symbol(index, cnt, &sym);
                }
            }
        }
    }

    fn check_symbol_destination(
        &mut self,
        index: usize,
        cnt: usize,
        sym: &relic_elf::Symbol,
        xndx: usize,
        no_pt_tls_reported: &mut bool,
    ) {
        let elf = self.elf;
        let e_type = elf.header().e_type;
        let dest = match elf.section_header(xndx) {
            Ok(dest) => *dest,
            Err(_) => return,
        };

        if sym.sym_type() != raw::STT_TLS {
            if sym.st_value.wrapping_sub(dest.sh_addr) > dest.sh_size {
                self.add(
                    Some(index),
                    Some(cnt as u64),
                    String::from("st_value out of bounds"),
                );
            } else if sym.st_value.wrapping_sub(dest.sh_addr) + sym.st_size > dest.sh_size {
                self.add(
                    Some(index),
                    Some(cnt as u64),
                    format!("does not fit completely in referenced section [{xndx}]"),
                );
            }
            return;
        }

        if dest.sh_flags & raw::SHF_TLS == 0 {
            self.add(
                Some(index),
                Some(cnt as u64),
                format!("referenced section [{xndx}] does not have SHF_TLS flag set"),
            );
        }

        if e_type == raw::ET_REL {
            if sym.st_value > dest.sh_size {
                self.add(
                    Some(index),
                    Some(cnt as u64),
                    format!("st_value out of bounds of referenced section [{xndx}]"),
                );
            } else if sym.st_value + sym.st_size > dest.sh_size {
                self.add(
                    Some(index),
                    Some(cnt as u64),
                    format!("does not fit completely in referenced section [{xndx}]"),
                );
            }
            return;
        }

        let tls_phdr = elf
            .program_headers()
            .iter()
            .find(|phdr| phdr.p_type == raw::PT_TLS)
            .copied();
        match tls_phdr {
            None => {
                if !*no_pt_tls_reported {
                    *no_pt_tls_reported = true;
                    self.add(
                        Some(index),
                        Some(cnt as u64),
                        String::from("TLS symbol but no TLS program header entry"),
                    );
                }
            }
            Some(phdr) => {
                let base = dest.sh_offset.wrapping_sub(phdr.p_offset);
                if sym.st_value < base {
                    self.add(
                        Some(index),
                        Some(cnt as u64),
                        format!("st_value short of referenced section [{xndx}]"),
                    );
                } else if sym.st_value > base + dest.sh_size {
                    self.add(
                        Some(index),
                        Some(cnt as u64),
                        format!("st_value out of bounds of referenced section [{xndx}]"),
                    );
                } else if sym.st_value + sym.st_size > base + dest.sh_size {
                    self.add(
                        Some(index),
                        Some(cnt as u64),
                        format!("does not fit completely in referenced section [{xndx}]"),
                    );
                }
            }
        }
    }

    fn check_got_symbol(&mut self, index: usize, cnt: usize, sym: &relic_elf::Symbol) {
        // Locate the GOT by name; prefer .got.plt when both exist.
        let mut got = None;
        for candidate in 1..self.elf.shnum() {
            match self.elf.section_name(candidate) {
                Ok(b".got.plt") => {
                    got = Some(candidate);
                    break;
                }
                Ok(b".got") => got = Some(candidate),
                _ => {}
            }
        }

        let got = match got {
            Some(got) => got,
            None => {
                self.add(
                    Some(index),
                    Some(cnt as u64),
                    String::from("_GLOBAL_OFFSET_TABLE_ symbol present, but no .got section"),
                );
                return;
            }
        };
        let shdr = match self.elf.section_header(got) {
            Ok(shdr) => *shdr,
            Err(_) => return,
        };

        if sym.st_value != shdr.sh_addr {
            self.add(
                Some(index),
                Some(cnt as u64),
                format!(
                    "_GLOBAL_OFFSET_TABLE_ symbol value {:#x} does not match .got section address {:#x}",
                    sym.st_value, shdr.sh_addr
                ),
            );
        }
        if !self.context.gnu_ld && sym.st_size != 0 && sym.st_size != shdr.sh_size {
            self.add(
                Some(index),
                Some(cnt as u64),
                format!(
                    "_GLOBAL_OFFSET_TABLE_ symbol size {} does not match .got section size {}",
                    sym.st_size, shdr.sh_size
                ),
            );
        }
    }

    fn check_dynamic_symbol(&mut self, index: usize, cnt: usize, sym: &relic_elf::Symbol) {
        for phdr in self.elf.program_headers() {
            if phdr.p_type != raw::PT_DYNAMIC {
                continue;
            }
            if sym.st_value != phdr.p_vaddr {
                self.add(
                    Some(index),
                    Some(cnt as u64),
                    format!(
                        "_DYNAMIC symbol value {:#x} does not match dynamic segment address {:#x}",
                        sym.st_value, phdr.p_vaddr
                    ),
                );
            }
            if !self.context.gnu_ld && sym.st_size != 0 && sym.st_size != phdr.p_memsz {
                self.add(
                    Some(index),
                    Some(cnt as u64),
                    format!(
                        "_DYNAMIC symbol size {} does not match dynamic segment size {}",
                        sym.st_size, phdr.p_memsz
                    ),
                );
            }
            return;
        }
    }

    // Relocation rules.

    fn check_reloc(&mut self, index: usize, shdr: &SectionHeader) {
        let elf = self.elf;
        let e_type = elf.header().e_type;
        let shnum = elf.shnum();

        // Check whether the destination section is reasonable.
        let mut dest = None;
        let mut reldyn = false;
        if usize::try_from(shdr.sh_info).map_or(true, |info| info >= shnum) {
            self.add(
                Some(index),
                None,
                String::from("invalid destination section index"),
            );
        } else if shdr.sh_info != 0 {
            if let Ok(destshdr) = elf.section_header(shdr.sh_info as usize) {
                let destshdr = *destshdr;
                if destshdr.sh_type != raw::SHT_PROGBITS
                    && destshdr.sh_type != raw::SHT_NOBITS
                {
                    reldyn = self.is_rel_dyn(index, shdr);
                    if !reldyn {
                        self.add(
                            Some(index),
                            None,
                            String::from("invalid destination section type"),
                        );
                    } else {
                        // There is no standard, but .rel{,a}.dyn sections
                        // are expected to have a zero sh_info.
                        self.add(Some(index), None, String::from("sh_info should be zero"));
                    }
                }
                if destshdr.sh_flags & (raw::SHF_MERGE | raw::SHF_STRINGS) != 0 {
                    self.add(
                        Some(index),
                        None,
                        String::from("no relocations for merge-able sections possible"),
                    );
                }
                dest = Some(destshdr);
            }
        } else if matches!(e_type, raw::ET_EXEC | raw::ET_DYN) {
            reldyn = self.is_rel_dyn(index, shdr);
        }

        let relocs = match elf.relocations(index) {
            Ok(relocs) => relocs,
            Err(err) => {
                self.add(Some(index), None, format!("{err}"));
                return;
            }
        };

        let symshdr = elf.section_header(shdr.sh_link as usize).ok().copied();
        let known_broken = self.context.gnu_ld;

        for cnt in 0..relocs.len() {
            let reloc = match relocs.get(cnt) {
                Ok(reloc) => reloc,
                Err(_) => {
                    self.add(
                        Some(index),
                        Some(cnt as u64),
                        String::from("cannot get relocation"),
                    );
                    continue;
                }
            };

            if let Some(symshdr) = symshdr {
                let symcount = symshdr.sh_size / symshdr.sh_entsize.max(1);
                if u64::from(relocs.symbol(&reloc)) + 1 > symcount {
                    self.add(
                        Some(index),
                        Some(cnt as u64),
                        String::from("invalid symbol index"),
                    );
                }
            }

            if !reldyn && !known_broken {
                if let Some(dest) = dest {
                    if relocs.rel_type(&reloc) != 0
                        && reloc.r_offset.wrapping_sub(dest.sh_addr) >= dest.sh_size
                    {
                        self.add(
                            Some(index),
                            Some(cnt as u64),
                            String::from("offset out of bounds"),
                        );
                    }
                }
            }
        }
    }

    fn is_rel_dyn(&mut self, index: usize, shdr: &SectionHeader) -> bool {
        let e_type = self.elf.header().e_type;
        if e_type != raw::ET_EXEC && e_type != raw::ET_DYN {
            return false;
        }
        let expected: &[u8] = if shdr.sh_type == raw::SHT_RELA {
            b".rela.dyn"
        } else {
            b".rel.dyn"
        };
        if self.elf.section_name(index).ok() != Some(expected) {
            return false;
        }

        // A DT_RELCOUNT in the dynamic section must not exceed the number
        // of relocations in this section.
        for candidate in 1..self.elf.shnum() {
            let cand_shdr = match self.elf.section_header(candidate) {
                Ok(shdr) => *shdr,
                Err(_) => continue,
            };
            if cand_shdr.sh_type != raw::SHT_DYNAMIC {
                continue;
            }
            if let Ok(dynamic) = self.elf.dynamic(candidate) {
                let total = shdr.sh_size / shdr.sh_entsize.max(1);
                for cnt in 0..dynamic.len() {
                    if let Ok(entry) = dynamic.get(cnt) {
                        if (entry.d_tag == raw::DT_RELCOUNT
                            || entry.d_tag == raw::DT_RELACOUNT)
                            && entry.d_val > total
                        {
                            self.add(
                                Some(index),
                                None,
                                format!("DT_RELCOUNT value {} too high for this section", entry.d_val),
                            );
                        }
                    }
                }
            }
            break;
        }
        true
    }

    // Dynamic section rules.

    fn check_dynamic(&mut self, index: usize, shdr: &SectionHeader) {
        self.ndynamic += 1;
        if self.ndynamic == 2 {
            self.add(None, None, String::from("more than one dynamic section present"));
        }

        if let Ok(link) = self.elf.section_header(shdr.sh_link as usize) {
            if link.sh_type != raw::SHT_STRTAB {
                self.add(
                    Some(index),
                    None,
                    format!(
                        "referenced string table [{}] is not of type SHT_STRTAB",
                        shdr.sh_link
                    ),
                );
            }
        }
        if shdr.sh_info != 0 {
            self.add(Some(index), None, String::from("sh_info not zero"));
        }

        let dynamic = match self.elf.dynamic(index) {
            Ok(dynamic) => dynamic,
            Err(err) => {
                self.add(Some(index), None, format!("{err}"));
                return;
            }
        };

        // DT_X implies DT_Y relationships, indexed by tag.
        const DEPENDENCIES: &[(i64, i64)] = &[
            (raw::DT_NEEDED, raw::DT_STRTAB),
            (raw::DT_PLTRELSZ, raw::DT_JMPREL),
            (raw::DT_HASH, raw::DT_SYMTAB),
            (raw::DT_STRTAB, raw::DT_STRSZ),
            (raw::DT_SYMTAB, raw::DT_STRTAB),
            (raw::DT_SYMTAB, raw::DT_SYMENT),
            (raw::DT_RELA, raw::DT_RELASZ),
            (raw::DT_RELA, raw::DT_RELAENT),
            (raw::DT_RELASZ, raw::DT_RELA),
            (raw::DT_RELAENT, raw::DT_RELA),
            (raw::DT_STRSZ, raw::DT_STRTAB),
            (raw::DT_SYMENT, raw::DT_SYMTAB),
            (raw::DT_SONAME, raw::DT_STRTAB),
            (raw::DT_RPATH, raw::DT_STRTAB),
            (raw::DT_REL, raw::DT_RELSZ),
            (raw::DT_REL, raw::DT_RELENT),
            (raw::DT_RELSZ, raw::DT_REL),
            (raw::DT_RELENT, raw::DT_REL),
            (raw::DT_JMPREL, raw::DT_PLTRELSZ),
            (raw::DT_JMPREL, raw::DT_PLTREL),
            (raw::DT_RUNPATH, raw::DT_STRTAB),
            (raw::DT_PLTREL, raw::DT_JMPREL),
        ];
        const LEVEL2: &[i64] = &[
            raw::DT_RPATH,
            raw::DT_SYMBOLIC,
            raw::DT_TEXTREL,
            raw::DT_BIND_NOW,
        ];
        const MANDATORY: &[i64] = &[
            raw::DT_NULL,
            raw::DT_HASH,
            raw::DT_STRTAB,
            raw::DT_SYMTAB,
            raw::DT_STRSZ,
            raw::DT_SYMENT,
        ];
        const KNOWN_GNU_TAGS: &[i64] = &[
            raw::DT_GNU_HASH,
            raw::DT_RELACOUNT,
            raw::DT_RELCOUNT,
            raw::DT_FLAGS_1,
            raw::DT_VERDEF,
            raw::DT_VERDEFNUM,
            raw::DT_VERNEED,
            raw::DT_VERNEEDNUM,
            raw::DT_VERSYM,
            raw::DT_POSFLAG_1,
        ];

        let mut has_dt = [false; raw::DT_NUM as usize];
        let mut has_gnu_hash = false;
        let mut non_null_warned = false;

        for cnt in 0..dynamic.len() {
            let entry = match dynamic.get(cnt) {
                Ok(entry) => entry,
                Err(_) => {
                    self.add(
                        Some(index),
                        Some(cnt as u64),
                        String::from("cannot get dynamic section entry"),
                    );
                    continue;
                }
            };

            if has_dt[raw::DT_NULL as usize] && entry.d_tag != raw::DT_NULL && !non_null_warned {
                self.add(
                    Some(index),
                    Some(cnt as u64),
                    String::from("non-DT_NULL entries follow DT_NULL entry"),
                );
                non_null_warned = true;
            }

            if !(0..raw::DT_NUM).contains(&entry.d_tag)
                && !KNOWN_GNU_TAGS.contains(&entry.d_tag)
            {
                self.add(
                    Some(index),
                    Some(cnt as u64),
                    format!("unknown tag {:#x}", entry.d_tag),
                );
            }

            if (0..raw::DT_NUM).contains(&entry.d_tag) {
                let tag = entry.d_tag as usize;
                if has_dt[tag]
                    && entry.d_tag != raw::DT_NEEDED
                    && entry.d_tag != raw::DT_NULL
                {
                    self.add(
                        Some(index),
                        Some(cnt as u64),
                        format!("more than one entry with tag {}", entry.d_tag),
                    );
                }
                if self.context.strict && LEVEL2.contains(&entry.d_tag) {
                    self.add(
                        Some(index),
                        Some(cnt as u64),
                        format!("level 2 tag {} used", entry.d_tag),
                    );
                }
                has_dt[tag] = true;
            }

            if entry.d_tag == raw::DT_GNU_HASH {
                has_gnu_hash = true;
            }

            if entry.d_tag == raw::DT_PLTREL
                && entry.d_val != raw::DT_REL as u64
                && entry.d_val != raw::DT_RELA as u64
            {
                self.add(
                    Some(index),
                    Some(cnt as u64),
                    String::from("DT_PLTREL value must be DT_REL or DT_RELA"),
                );
            }
        }

        for &(tag, wants) in DEPENDENCIES {
            if has_dt[tag as usize] && !has_dt[wants as usize] {
                self.add(
                    Some(index),
                    None,
                    format!("contains tag {tag} entry but not {wants}"),
                );
            }
        }
        for &tag in MANDATORY {
            if has_dt[tag as usize] {
                continue;
            }
            // DT_GNU_HASH stands in for DT_HASH in modern links.
            if tag == raw::DT_HASH && has_gnu_hash {
                continue;
            }
            self.add(Some(index), None, format!("mandatory tag {tag} not present"));
        }

        let rela = [raw::DT_RELA, raw::DT_RELASZ, raw::DT_RELAENT];
        if rela.iter().any(|&t| has_dt[t as usize]) && !rela.iter().all(|&t| has_dt[t as usize]) {
            self.add(
                Some(index),
                None,
                String::from("not all of DT_RELA, DT_RELASZ, and DT_RELAENT are present"),
            );
        }
        let rel = [raw::DT_REL, raw::DT_RELSZ, raw::DT_RELENT];
        if rel.iter().any(|&t| has_dt[t as usize]) && !rel.iter().all(|&t| has_dt[t as usize]) {
            self.add(
                Some(index),
                None,
                String::from("not all of DT_REL, DT_RELSZ, and DT_RELENT are present"),
            );
        }
    }

    // Extended section index table rules.

    fn check_symtab_shndx(&mut self, index: usize, shdr: &SectionHeader) {
        let elf = self.elf;

        let symshdr = elf.section_header(shdr.sh_link as usize).ok().copied();
        if let Some(symshdr) = symshdr {
            if symshdr.sh_type != raw::SHT_SYMTAB {
                self.add(
                    Some(index),
                    None,
                    String::from("extended section index section not for symbol table"),
                );
            }
        }

        if shdr.sh_entsize != 4 {
            self.add(
                Some(index),
                None,
                String::from("entry size does not match Elf32_Word"),
            );
        }
        if shdr.sh_info != 0 {
            self.add(Some(index), None, String::from("sh_info not zero"));
        }

        if let Some(symshdr) = symshdr {
            if symshdr.sh_entsize != 0
                && shdr.sh_size / 4 < symshdr.sh_size / symshdr.sh_entsize
            {
                self.add(
                    Some(index),
                    None,
                    String::from("extended index table too small for symbol table"),
                );
            }
        }

        for other in index + 1..elf.shnum() {
            if let Ok(rshdr) = elf.section_header(other) {
                if rshdr.sh_type == raw::SHT_SYMTAB_SHNDX && rshdr.sh_link == shdr.sh_link {
                    self.add(
                        Some(index),
                        None,
                        format!(
                            "extended section index in section [{other}] refers to same symbol table"
                        ),
                    );
                    break;
                }
            }
        }

        let data = match elf.raw_section_data(index) {
            Ok(data) => data,
            Err(_) => return,
        };
        let symtab = elf.symbols(shdr.sh_link as usize).ok();
        let count = data.len() / 4;
        for cnt in 0..count {
            let mut cursor =
                relic_common::Cursor::new_at(data, cnt * 4, elf.endian());
            let xndx = match cursor.read_u32() {
                Ok(xndx) => xndx,
                Err(_) => break,
            };
            if cnt == 0 {
                if xndx != 0 {
                    self.add(
                        Some(index),
                        Some(0),
                        String::from("symbol 0 should have zero extended section index"),
                    );
                }
                continue;
            }
            if xndx != 0 {
                if let Some(symtab) = &symtab {
                    if let Ok(sym) = symtab.get(cnt) {
                        if sym.st_shndx != raw::SHN_XINDEX {
                            self.add(
                                Some(index),
                                Some(cnt as u64),
                                format!(
                                    "extended section index is {xndx} but symbol index is not XINDEX"
                                ),
                            );
                        }
                    }
                }
            }
        }
    }

    // Hash table rules.

    fn check_hash(&mut self, index: usize, shdr: &SectionHeader) {
        let elf = self.elf;

        if let Ok(link) = elf.section_header(shdr.sh_link as usize) {
            if link.sh_type != raw::SHT_DYNSYM {
                self.add(
                    Some(index),
                    None,
                    String::from("hash table not for dynamic symbol table"),
                );
            }
        }
        if shdr.sh_entsize != 4 {
            self.add(
                Some(index),
                None,
                String::from("entry size does not match Elf32_Word"),
            );
        }
        if shdr.sh_flags & raw::SHF_ALLOC == 0 {
            self.add(Some(index), None, String::from("not marked to be allocated"));
        }
        if shdr.sh_size < 2 * 4 {
            self.add(
                Some(index),
                None,
                String::from("hash table has not even room for nbucket and nchain"),
            );
            return;
        }

        let hash = match elf.sysv_hash(index) {
            Ok(hash) => hash,
            Err(_) => {
                self.add(
                    Some(index),
                    None,
                    String::from("hash table section is too small"),
                );
                return;
            }
        };

        let symshdr = elf.section_header(shdr.sh_link as usize).ok().copied();
        if let Some(symshdr) = symshdr {
            if symshdr.sh_entsize != 0 {
                let symcount = symshdr.sh_size / symshdr.sh_entsize;
                if u64::from(hash.nchain()) < symcount {
                    self.add(
                        Some(index),
                        None,
                        String::from("chain array not large enough"),
                    );
                }
                for bucket in 0..hash.nbucket() {
                    if let Ok(value) = hash.bucket(bucket) {
                        if u64::from(value) >= symcount {
                            self.add(
                                Some(index),
                                Some(bucket.into()),
                                String::from("hash bucket reference out of bounds"),
                            );
                        }
                    }
                }
                for chain in 0..hash.nchain() {
                    if let Ok(value) = hash.chain(chain) {
                        if u64::from(value) >= symcount {
                            self.add(
                                Some(index),
                                Some(chain.into()),
                                String::from("hash chain reference out of bounds"),
                            );
                        }
                    }
                }
            }
        }
    }

    fn check_gnu_hash(&mut self, index: usize, shdr: &SectionHeader) {
        let elf = self.elf;

        if let Ok(link) = elf.section_header(shdr.sh_link as usize) {
            if link.sh_type != raw::SHT_DYNSYM {
                self.add(
                    Some(index),
                    None,
                    String::from("hash table not for dynamic symbol table"),
                );
            }
        }
        if shdr.sh_flags & raw::SHF_ALLOC == 0 {
            self.add(Some(index), None, String::from("not marked to be allocated"));
        }

        let hash = match elf.gnu_hash(index) {
            Ok(hash) => hash,
            Err(_) => {
                self.add(
                    Some(index),
                    None,
                    String::from("hash table section is too small"),
                );
                return;
            }
        };

        if let Ok(symshdr) = elf.section_header(shdr.sh_link as usize) {
            if symshdr.sh_entsize != 0 {
                let symcount = symshdr.sh_size / symshdr.sh_entsize;
                for bucket in 0..hash.nbucket() {
                    if let Ok(value) = hash.bucket(bucket) {
                        if value != 0 && u64::from(value) >= symcount {
                            self.add(
                                Some(index),
                                Some(bucket.into()),
                                String::from("hash bucket reference out of bounds"),
                            );
                        }
                    }
                }
            }
        }
    }

    // Section group rules.

    fn check_group(&mut self, index: usize, shdr: &SectionHeader) {
        let elf = self.elf;

        if elf.header().e_type != raw::ET_REL {
            self.add(
                Some(index),
                None,
                String::from("section groups only allowed in relocatable object files"),
            );
            return;
        }

        match elf.section_header(shdr.sh_link as usize) {
            Ok(symshdr) => {
                let symshdr = *symshdr;
                if symshdr.sh_type != raw::SHT_SYMTAB {
                    self.add(
                        Some(index),
                        None,
                        String::from("section reference in sh_link is no symbol table"),
                    );
                }
                if symshdr.sh_entsize != 0
                    && u64::from(shdr.sh_info) >= symshdr.sh_size / symshdr.sh_entsize
                {
                    self.add(
                        Some(index),
                        None,
                        String::from("invalid symbol index in sh_info"),
                    );
                }
                if shdr.sh_flags != 0 {
                    self.add(Some(index), None, String::from("sh_flags not zero"));
                }
            }
            Err(_) => {
                self.add(Some(index), None, String::from("cannot get symbol table"));
            }
        }

        let data = match elf.raw_section_data(index) {
            Ok(data) => data,
            Err(_) => {
                self.add(Some(index), None, String::from("cannot get data"));
                return;
            }
        };

        if data.len() % 4 != 0 {
            self.add(
                Some(index),
                None,
                String::from("section size not multiple of sizeof(Elf32_Word)"),
            );
        }
        if data.len() < 4 {
            self.add(
                Some(index),
                None,
                String::from("section group without flags word"),
            );
            return;
        }
        if self.context.strict {
            if data.len() < 2 * 4 {
                self.add(
                    Some(index),
                    None,
                    String::from("section group without member"),
                );
            } else if data.len() < 3 * 4 {
                self.add(
                    Some(index),
                    None,
                    String::from("section group with only one member"),
                );
            }
        }

        let group = match elf.group(index) {
            Ok(group) => group,
            Err(_) => return,
        };

        if let Ok(flags) = group.flags() {
            if flags & !raw::GRP_COMDAT != 0 {
                self.add(Some(index), None, String::from("unknown section group flags"));
            }
        }

        for member in 0..group.member_count() {
            let value = match group.member(member) {
                Ok(value) => value,
                Err(_) => continue,
            };
            if value as usize >= elf.shnum() {
                self.add(
                    Some(index),
                    Some(member as u64),
                    format!("section index {value} out of range"),
                );
                continue;
            }
            if let Ok(refshdr) = elf.section_header(value as usize) {
                if refshdr.sh_type == raw::SHT_GROUP {
                    self.add(
                        Some(index),
                        Some(member as u64),
                        format!("section group contains another group [{value}]"),
                    );
                }
                if refshdr.sh_flags & raw::SHF_GROUP == 0 {
                    self.add(
                        Some(index),
                        Some(member as u64),
                        format!("element references section [{value}] without SHF_GROUP flag set"),
                    );
                }
            }
            self.scnref[value as usize] += 1;
            if self.scnref[value as usize] == 2 {
                self.add(
                    Some(value as usize),
                    None,
                    String::from("section is contained in more than one section group"),
                );
            }
        }
    }

    // Version symbol table rules.

    fn check_versym(&mut self, index: usize, shdr: &SectionHeader) {
        let elf = self.elf;
        let symshdr = match elf.section_header(shdr.sh_link as usize) {
            Ok(symshdr) => *symshdr,
            Err(_) => return,
        };

        if symshdr.sh_type != raw::SHT_DYNSYM {
            self.add(
                Some(index),
                None,
                format!(
                    "refers in sh_link to section [{}] which is no dynamic symbol table",
                    shdr.sh_link
                ),
            );
            return;
        }

        if shdr.sh_entsize != 0
            && symshdr.sh_entsize != 0
            && shdr.sh_size / shdr.sh_entsize != symshdr.sh_size / symshdr.sh_entsize
        {
            self.add(
                Some(index),
                None,
                format!(
                    "has different number of entries than symbol table [{}]",
                    shdr.sh_link
                ),
            );
        }
    }
}
