//! Builders for handcrafted ELF images used across the relic test suites.
//!
//! The builder lays files out the way link editors do: file header, program
//! header table, section contents in order, then `.shstrtab` and the section
//! header table at the end. Tests that need pathological inputs can override
//! individual header fields after the fact.

use relic_common::Endian;
use relic_elf::write::{put_ehdr, put_phdr, put_reloc, put_shdr, put_sym, Emitter};
use relic_elf::{
    raw, Class, DynEntry, FileHeader, ProgramHeader, Relocation, SectionHeader, Symbol,
};

/// A section registered with the [`ElfBuilder`].
#[derive(Clone, Debug)]
pub struct SectionSpec {
    /// Section name, written to the generated `.shstrtab`.
    pub name: String,
    /// Section type.
    pub sh_type: u32,
    /// Flag bits.
    pub sh_flags: u64,
    /// Virtual address.
    pub sh_addr: u64,
    /// Fixed file offset; `None` lets the builder place the section.
    pub sh_offset: Option<u64>,
    /// Link field.
    pub sh_link: u32,
    /// Info field.
    pub sh_info: u32,
    /// Alignment; the builder honors it when placing the section.
    pub sh_addralign: u64,
    /// Entry size.
    pub sh_entsize: u64,
    /// Contents; ignored for `SHT_NOBITS` except for sizing.
    pub data: Vec<u8>,
    /// Overrides `data.len()` as the section size when set.
    pub sh_size: Option<u64>,
}

impl SectionSpec {
    /// Starts a section of the given name and type.
    pub fn new(name: &str, sh_type: u32) -> Self {
        SectionSpec {
            name: name.to_owned(),
            sh_type,
            sh_flags: 0,
            sh_addr: 0,
            sh_offset: None,
            sh_link: 0,
            sh_info: 0,
            sh_addralign: 1,
            sh_entsize: 0,
            data: Vec::new(),
            sh_size: None,
        }
    }

    /// A `SHT_PROGBITS` section.
    pub fn progbits(name: &str) -> Self {
        Self::new(name, raw::SHT_PROGBITS)
    }

    /// A `SHT_NOBITS` section of the given size.
    pub fn nobits(name: &str, size: u64) -> Self {
        let mut spec = Self::new(name, raw::SHT_NOBITS);
        spec.sh_size = Some(size);
        spec
    }

    /// Sets the flag bits.
    pub fn flags(mut self, flags: u64) -> Self {
        self.sh_flags = flags;
        self
    }

    /// Sets the virtual address.
    pub fn addr(mut self, addr: u64) -> Self {
        self.sh_addr = addr;
        self
    }

    /// Sets the contents.
    pub fn data(mut self, data: &[u8]) -> Self {
        self.data = data.to_vec();
        self
    }

    /// Sets the link field.
    pub fn link(mut self, link: u32) -> Self {
        self.sh_link = link;
        self
    }

    /// Sets the info field.
    pub fn info(mut self, info: u32) -> Self {
        self.sh_info = info;
        self
    }

    /// Sets the entry size.
    pub fn entsize(mut self, entsize: u64) -> Self {
        self.sh_entsize = entsize;
        self
    }

    /// Sets the alignment.
    pub fn align(mut self, align: u64) -> Self {
        self.sh_addralign = align;
        self
    }

    /// Pins the section to a fixed file offset.
    pub fn offset(mut self, offset: u64) -> Self {
        self.sh_offset = Some(offset);
        self
    }
}

/// Builds ELF images in memory.
pub struct ElfBuilder {
    class: Class,
    endian: Endian,
    e_type: u16,
    e_machine: u16,
    e_entry: u64,
    phdrs: Vec<ProgramHeader>,
    sections: Vec<SectionSpec>,
}

impl ElfBuilder {
    /// A little-endian x86-64 shared object, the common case.
    pub fn new64_le() -> Self {
        ElfBuilder {
            class: Class::Elf64,
            endian: Endian::Little,
            e_type: raw::ET_DYN,
            e_machine: raw::EM_X86_64,
            e_entry: 0,
            phdrs: Vec::new(),
            sections: Vec::new(),
        }
    }

    /// A big-endian 32-bit PowerPC relocatable object.
    pub fn new32_be() -> Self {
        ElfBuilder {
            class: Class::Elf32,
            endian: Endian::Big,
            e_type: raw::ET_REL,
            e_machine: raw::EM_PPC,
            e_entry: 0,
            phdrs: Vec::new(),
            sections: Vec::new(),
        }
    }

    /// Sets the object file type.
    pub fn e_type(mut self, e_type: u16) -> Self {
        self.e_type = e_type;
        self
    }

    /// Sets the machine.
    pub fn machine(mut self, machine: u16) -> Self {
        self.e_machine = machine;
        self
    }

    /// Sets the entry point.
    pub fn entry(mut self, entry: u64) -> Self {
        self.e_entry = entry;
        self
    }

    /// Appends a program header. Offsets and sizes are taken as given.
    pub fn phdr(mut self, phdr: ProgramHeader) -> Self {
        self.phdrs.push(phdr);
        self
    }

    /// Appends a section; indices start at 1 (the null section is implicit).
    pub fn section(mut self, spec: SectionSpec) -> Self {
        self.sections.push(spec);
        self
    }

    /// The index the next appended section will get.
    pub fn next_index(&self) -> u32 {
        self.sections.len() as u32 + 1
    }

    /// Lays out and emits the image.
    pub fn build(self) -> Vec<u8> {
        let class = self.class;
        let mut shstrtab = vec![0u8];
        let mut name_offsets = Vec::new();
        for spec in &self.sections {
            name_offsets.push(shstrtab.len() as u32);
            shstrtab.extend_from_slice(spec.name.as_bytes());
            shstrtab.push(0);
        }
        let shstrtab_name = shstrtab.len() as u32;
        shstrtab.extend_from_slice(b".shstrtab\0");

        let phoff = if self.phdrs.is_empty() {
            0
        } else {
            class.ehdr_size() as u64
        };
        let mut offset =
            class.ehdr_size() as u64 + (self.phdrs.len() * class.phdr_size()) as u64;

        // Section contents, in order, honoring pinned offsets and alignment.
        let mut headers = vec![SectionHeader::default()];
        let mut chunks: Vec<(u64, Vec<u8>)> = Vec::new();
        for (spec, &sh_name) in self.sections.iter().zip(&name_offsets) {
            let size = spec.sh_size.unwrap_or(spec.data.len() as u64);
            let sh_offset = match spec.sh_offset {
                Some(pinned) => pinned,
                None => {
                    let align = spec.sh_addralign.max(1);
                    (offset + align - 1) & !(align - 1)
                }
            };
            if spec.sh_type != raw::SHT_NOBITS {
                chunks.push((sh_offset, spec.data.clone()));
                offset = offset.max(sh_offset + spec.data.len() as u64);
            }
            headers.push(SectionHeader {
                sh_name,
                sh_type: spec.sh_type,
                sh_flags: spec.sh_flags,
                sh_addr: spec.sh_addr,
                sh_offset,
                sh_size: size,
                sh_link: spec.sh_link,
                sh_info: spec.sh_info,
                sh_addralign: spec.sh_addralign,
                sh_entsize: spec.sh_entsize,
            });
        }

        // .shstrtab goes last, then the section header table.
        let shstrndx = headers.len();
        let shstrtab_offset = offset;
        chunks.push((shstrtab_offset, shstrtab.clone()));
        offset += shstrtab.len() as u64;
        headers.push(SectionHeader {
            sh_name: shstrtab_name,
            sh_type: raw::SHT_STRTAB,
            sh_offset: shstrtab_offset,
            sh_size: shstrtab.len() as u64,
            sh_addralign: 1,
            ..SectionHeader::default()
        });

        let align = u64::from(class.address_size());
        let shoff = (offset + align - 1) & !(align - 1);

        let header = FileHeader {
            class,
            endian: self.endian,
            ident_version: 1,
            os_abi: raw::ELFOSABI_NONE,
            abi_version: 0,
            e_type: self.e_type,
            e_machine: self.e_machine,
            e_version: raw::EV_CURRENT,
            e_entry: self.e_entry,
            e_phoff: phoff,
            e_shoff: shoff,
            e_flags: 0,
            e_ehsize: class.ehdr_size() as u16,
            e_phentsize: class.phdr_size() as u16,
            e_phnum: self.phdrs.len() as u16,
            e_shentsize: class.shdr_size() as u16,
            e_shnum: headers.len() as u16,
            e_shstrndx: shstrndx as u16,
        };

        let mut out = Emitter::new(self.endian);
        put_ehdr(&mut out, &header).expect("emit header");
        for phdr in &self.phdrs {
            put_phdr(&mut out, class, phdr).expect("emit phdr");
        }
        for (chunk_offset, data) in &chunks {
            out.pad_to(*chunk_offset as usize);
            out.put_bytes(data);
        }
        out.pad_to(shoff as usize);
        for shdr in &headers {
            put_shdr(&mut out, class, shdr).expect("emit shdr");
        }
        out.into_bytes()
    }
}

/// Serializes symbols into symbol table bytes.
pub fn sym_bytes(class: Class, endian: Endian, symbols: &[Symbol]) -> Vec<u8> {
    let mut out = Emitter::new(endian);
    for sym in symbols {
        put_sym(&mut out, class, sym).expect("emit symbol");
    }
    out.into_bytes()
}

/// Serializes relocations into `SHT_RELA` or `SHT_REL` bytes.
pub fn reloc_bytes(class: Class, endian: Endian, relocs: &[Relocation]) -> Vec<u8> {
    let mut out = Emitter::new(endian);
    for reloc in relocs {
        put_reloc(&mut out, class, reloc).expect("emit relocation");
    }
    out.into_bytes()
}

/// Serializes dynamic entries into `SHT_DYNAMIC` bytes.
pub fn dyn_bytes(class: Class, endian: Endian, entries: &[DynEntry]) -> Vec<u8> {
    let mut out = Emitter::new(endian);
    for entry in entries {
        relic_elf::write::put_dyn(&mut out, class, entry).expect("emit dyn");
    }
    out.into_bytes()
}

/// Builds string table bytes from a list of names, returning the table and
/// the offset of each name.
pub fn strtab_bytes(names: &[&str]) -> (Vec<u8>, Vec<u32>) {
    let mut table = vec![0u8];
    let mut offsets = Vec::new();
    for name in names {
        offsets.push(table.len() as u32);
        table.extend_from_slice(name.as_bytes());
        table.push(0);
    }
    (table, offsets)
}
