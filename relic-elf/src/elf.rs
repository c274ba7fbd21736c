//! The ELF object model: typed views over a borrowed byte slice.

use std::fmt;

use fallible_iterator::FallibleIterator;
use once_cell::sync::OnceCell;
use relic_common::{cstr_at, Cursor, Endian};

use crate::compress;
use crate::raw;
use crate::{ElfError, ElfErrorKind};

/// The file class: 32-bit or 64-bit layouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Class {
    /// `ELFCLASS32`.
    Elf32,
    /// `ELFCLASS64`.
    Elf64,
}

impl Class {
    /// Size of a machine address in bytes.
    pub fn address_size(self) -> u8 {
        match self {
            Class::Elf32 => 4,
            Class::Elf64 => 8,
        }
    }

    /// Size of the file header in bytes.
    pub fn ehdr_size(self) -> usize {
        match self {
            Class::Elf32 => 52,
            Class::Elf64 => 64,
        }
    }

    /// Size of one section header in bytes.
    pub fn shdr_size(self) -> usize {
        match self {
            Class::Elf32 => 40,
            Class::Elf64 => 64,
        }
    }

    /// Size of one program header in bytes.
    pub fn phdr_size(self) -> usize {
        match self {
            Class::Elf32 => 32,
            Class::Elf64 => 56,
        }
    }

    /// Size of one symbol table entry in bytes.
    pub fn sym_size(self) -> usize {
        match self {
            Class::Elf32 => 16,
            Class::Elf64 => 24,
        }
    }

    /// Size of one `Rel` entry in bytes.
    pub fn rel_size(self) -> usize {
        match self {
            Class::Elf32 => 8,
            Class::Elf64 => 16,
        }
    }

    /// Size of one `Rela` entry in bytes.
    pub fn rela_size(self) -> usize {
        match self {
            Class::Elf32 => 12,
            Class::Elf64 => 24,
        }
    }

    /// Size of one dynamic entry in bytes.
    pub fn dyn_size(self) -> usize {
        match self {
            Class::Elf32 => 8,
            Class::Elf64 => 16,
        }
    }

    /// Size of the compression header in bytes.
    pub fn chdr_size(self) -> usize {
        match self {
            Class::Elf32 => 12,
            Class::Elf64 => 24,
        }
    }
}

/// The decoded ELF file header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileHeader {
    /// File class.
    pub class: Class,
    /// Data encoding.
    pub endian: Endian,
    /// Identification version byte.
    pub ident_version: u8,
    /// OS/ABI byte.
    pub os_abi: u8,
    /// ABI version byte.
    pub abi_version: u8,
    /// Object file type (`ET_*`).
    pub e_type: u16,
    /// Target machine (`EM_*`).
    pub e_machine: u16,
    /// Object file version.
    pub e_version: u32,
    /// Entry point virtual address.
    pub e_entry: u64,
    /// File offset of the program header table.
    pub e_phoff: u64,
    /// File offset of the section header table.
    pub e_shoff: u64,
    /// Processor-specific flags.
    pub e_flags: u32,
    /// Size of this header.
    pub e_ehsize: u16,
    /// Size of one program header entry.
    pub e_phentsize: u16,
    /// Number of program header entries.
    pub e_phnum: u16,
    /// Size of one section header entry.
    pub e_shentsize: u16,
    /// Number of section header entries (0 when escaped into section 0).
    pub e_shnum: u16,
    /// Section name string table index (`SHN_XINDEX` when escaped).
    pub e_shstrndx: u16,
}

/// A decoded section header with all fields widened to 64 bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SectionHeader {
    /// Offset of the section name in the section name string table.
    pub sh_name: u32,
    /// Section type (`SHT_*`).
    pub sh_type: u32,
    /// Flag bits (`SHF_*`).
    pub sh_flags: u64,
    /// Virtual address of the section in memory.
    pub sh_addr: u64,
    /// File offset of the section contents.
    pub sh_offset: u64,
    /// Size of the section in bytes.
    pub sh_size: u64,
    /// Type-dependent section reference.
    pub sh_link: u32,
    /// Type-dependent extra information.
    pub sh_info: u32,
    /// Required alignment.
    pub sh_addralign: u64,
    /// Entry size for table sections.
    pub sh_entsize: u64,
}

impl SectionHeader {
    /// Whether the section occupies memory at run time.
    pub fn is_alloc(&self) -> bool {
        self.sh_flags & raw::SHF_ALLOC != 0
    }

    /// Whether the section occupies no file space.
    pub fn is_nobits(&self) -> bool {
        self.sh_type == raw::SHT_NOBITS
    }

    /// Whether the section contents are compressed.
    pub fn is_compressed(&self) -> bool {
        self.sh_flags & raw::SHF_COMPRESSED != 0
    }
}

/// A decoded program header with all fields widened to 64 bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProgramHeader {
    /// Segment type (`PT_*`).
    pub p_type: u32,
    /// Segment flags (`PF_*`).
    pub p_flags: u32,
    /// File offset of the segment.
    pub p_offset: u64,
    /// Virtual address of the segment.
    pub p_vaddr: u64,
    /// Physical address of the segment.
    pub p_paddr: u64,
    /// Size of the segment in the file.
    pub p_filesz: u64,
    /// Size of the segment in memory.
    pub p_memsz: u64,
    /// Required alignment.
    pub p_align: u64,
}

/// A decoded symbol table entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Symbol {
    /// Offset of the symbol name in the linked string table.
    pub st_name: u32,
    /// Binding and type.
    pub st_info: u8,
    /// Visibility.
    pub st_other: u8,
    /// Section index, possibly a reserved value or `SHN_XINDEX`.
    pub st_shndx: u16,
    /// Symbol value.
    pub st_value: u64,
    /// Symbol size.
    pub st_size: u64,
}

impl Symbol {
    /// The symbol binding (`STB_*`).
    pub fn bind(&self) -> u8 {
        raw::st_bind(self.st_info)
    }

    /// The symbol type (`STT_*`).
    pub fn sym_type(&self) -> u8 {
        raw::st_type(self.st_info)
    }

    /// The symbol visibility (`STV_*`).
    pub fn visibility(&self) -> u8 {
        raw::st_visibility(self.st_other)
    }
}

/// A decoded relocation, covering both `Rel` and `Rela` entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Relocation {
    /// Location to be relocated.
    pub r_offset: u64,
    /// Packed symbol index and relocation type.
    pub r_info: u64,
    /// Explicit addend; `None` for `Rel` entries.
    pub r_addend: Option<i64>,
}

/// A decoded dynamic table entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DynEntry {
    /// The tag (`DT_*`).
    pub d_tag: i64,
    /// The value or pointer.
    pub d_val: u64,
}

/// A string table view.
#[derive(Clone, Copy)]
pub struct Strtab<'data> {
    data: &'data [u8],
    section: usize,
}

impl<'data> Strtab<'data> {
    /// Wraps raw string table bytes; `section` is used in error reports.
    pub fn new(data: &'data [u8], section: usize) -> Self {
        Strtab { data, section }
    }

    /// Reads the NUL-terminated string at `offset`.
    pub fn get(&self, offset: u32) -> Result<&'data [u8], ElfError> {
        cstr_at(self.data, offset as usize).ok_or_else(|| {
            ElfErrorKind::BadRef {
                section: self.section,
                index: offset.into(),
            }
            .into()
        })
    }

    /// The raw bytes of the table.
    pub fn data(&self) -> &'data [u8] {
        self.data
    }
}

impl fmt::Debug for Strtab<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strtab")
            .field("section", &self.section)
            .field("len", &self.data.len())
            .finish()
    }
}

/// An ELF file parsed out of a borrowed byte slice.
pub struct Elf<'data> {
    data: &'data [u8],
    header: FileHeader,
    sections: Vec<SectionHeader>,
    program_headers: Vec<ProgramHeader>,
    shstrndx: usize,
    decompressed: Vec<OnceCell<Box<[u8]>>>,
}

impl fmt::Debug for Elf<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Elf")
            .field("header", &self.header)
            .field("sections", &self.sections.len())
            .field("program_headers", &self.program_headers.len())
            .finish()
    }
}

impl<'data> Elf<'data> {
    /// Tests whether the buffer could contain an ELF file.
    pub fn test(data: &[u8]) -> bool {
        data.get(..4) == Some(&raw::ELFMAG[..])
    }

    /// Parses the file header alone.
    pub fn parse_header(data: &'data [u8]) -> Result<FileHeader, ElfError> {
        if !Self::test(data) {
            return Err(ElfErrorKind::BadMagic.into());
        }
        let ident = data.get(..raw::EI_NIDENT).ok_or(ElfErrorKind::Truncated)?;

        let class = match ident[raw::EI_CLASS] {
            raw::ELFCLASS32 => Class::Elf32,
            raw::ELFCLASS64 => Class::Elf64,
            other => return Err(ElfErrorKind::UnsupportedClass(other).into()),
        };
        let endian = match ident[raw::EI_DATA] {
            raw::ELFDATA2LSB => Endian::Little,
            raw::ELFDATA2MSB => Endian::Big,
            other => {
                return Err(ElfErrorKind::BadEnum {
                    field: "e_ident[EI_DATA]",
                    value: other.into(),
                }
                .into())
            }
        };

        let mut cursor = Cursor::new_at(data, raw::EI_NIDENT, endian);
        let e_type = cursor.read_u16()?;
        let e_machine = cursor.read_u16()?;
        let e_version = cursor.read_u32()?;
        let (e_entry, e_phoff, e_shoff) = match class {
            Class::Elf32 => (
                cursor.read_u32()?.into(),
                cursor.read_u32()?.into(),
                cursor.read_u32()?.into(),
            ),
            Class::Elf64 => (cursor.read_u64()?, cursor.read_u64()?, cursor.read_u64()?),
        };
        let e_flags = cursor.read_u32()?;
        let e_ehsize = cursor.read_u16()?;
        let e_phentsize = cursor.read_u16()?;
        let e_phnum = cursor.read_u16()?;
        let e_shentsize = cursor.read_u16()?;
        let e_shnum = cursor.read_u16()?;
        let e_shstrndx = cursor.read_u16()?;

        Ok(FileHeader {
            class,
            endian,
            ident_version: ident[raw::EI_VERSION],
            os_abi: ident[raw::EI_OSABI],
            abi_version: ident[raw::EI_ABIVERSION],
            e_type,
            e_machine,
            e_version,
            e_entry,
            e_phoff,
            e_shoff,
            e_flags,
            e_ehsize,
            e_phentsize,
            e_phnum,
            e_shentsize,
            e_shnum,
            e_shstrndx,
        })
    }

    fn parse_shdr(cursor: &mut Cursor<'data>, class: Class) -> Result<SectionHeader, ElfError> {
        let sh_name = cursor.read_u32()?;
        let sh_type = cursor.read_u32()?;
        match class {
            Class::Elf32 => Ok(SectionHeader {
                sh_name,
                sh_type,
                sh_flags: cursor.read_u32()?.into(),
                sh_addr: cursor.read_u32()?.into(),
                sh_offset: cursor.read_u32()?.into(),
                sh_size: cursor.read_u32()?.into(),
                sh_link: cursor.read_u32()?,
                sh_info: cursor.read_u32()?,
                sh_addralign: cursor.read_u32()?.into(),
                sh_entsize: cursor.read_u32()?.into(),
            }),
            Class::Elf64 => Ok(SectionHeader {
                sh_name,
                sh_type,
                sh_flags: cursor.read_u64()?,
                sh_addr: cursor.read_u64()?,
                sh_offset: cursor.read_u64()?,
                sh_size: cursor.read_u64()?,
                sh_link: cursor.read_u32()?,
                sh_info: cursor.read_u32()?,
                sh_addralign: cursor.read_u64()?,
                sh_entsize: cursor.read_u64()?,
            }),
        }
    }

    fn parse_phdr(cursor: &mut Cursor<'data>, class: Class) -> Result<ProgramHeader, ElfError> {
        match class {
            Class::Elf32 => {
                let p_type = cursor.read_u32()?;
                let p_offset = cursor.read_u32()?.into();
                let p_vaddr = cursor.read_u32()?.into();
                let p_paddr = cursor.read_u32()?.into();
                let p_filesz = cursor.read_u32()?.into();
                let p_memsz = cursor.read_u32()?.into();
                let p_flags = cursor.read_u32()?;
                let p_align = cursor.read_u32()?.into();
                Ok(ProgramHeader {
                    p_type,
                    p_flags,
                    p_offset,
                    p_vaddr,
                    p_paddr,
                    p_filesz,
                    p_memsz,
                    p_align,
                })
            }
            Class::Elf64 => {
                let p_type = cursor.read_u32()?;
                let p_flags = cursor.read_u32()?;
                let p_offset = cursor.read_u64()?;
                let p_vaddr = cursor.read_u64()?;
                let p_paddr = cursor.read_u64()?;
                let p_filesz = cursor.read_u64()?;
                let p_memsz = cursor.read_u64()?;
                let p_align = cursor.read_u64()?;
                Ok(ProgramHeader {
                    p_type,
                    p_flags,
                    p_offset,
                    p_vaddr,
                    p_paddr,
                    p_filesz,
                    p_memsz,
                    p_align,
                })
            }
        }
    }

    /// Parses an ELF file from the given slice.
    pub fn parse(data: &'data [u8]) -> Result<Self, ElfError> {
        let header = Self::parse_header(data)?;
        let class = header.class;
        let endian = header.endian;

        // Section count and shstrndx may escape into section 0.
        let mut sections = Vec::new();
        if header.e_shoff != 0 {
            let shoff =
                usize::try_from(header.e_shoff).map_err(|_| ElfErrorKind::Overflow)?;
            let mut cursor = Cursor::new_at(data, shoff, endian);
            let zeroth = Self::parse_shdr(&mut cursor, class)?;

            let shnum = if header.e_shnum == 0 {
                usize::try_from(zeroth.sh_size).map_err(|_| ElfErrorKind::Overflow)?
            } else {
                header.e_shnum as usize
            };

            let table_size = shnum
                .checked_mul(class.shdr_size())
                .and_then(|size| shoff.checked_add(size))
                .ok_or(ElfErrorKind::Overflow)?;
            if table_size > data.len() {
                return Err(ElfErrorKind::Truncated.into());
            }

            sections.reserve(shnum);
            sections.push(zeroth);
            for _ in 1..shnum {
                sections.push(Self::parse_shdr(&mut cursor, class)?);
            }
        }

        let shstrndx = if header.e_shstrndx == raw::SHN_XINDEX {
            sections.first().map(|s| s.sh_link as usize).unwrap_or(0)
        } else {
            header.e_shstrndx as usize
        };

        let mut program_headers = Vec::with_capacity(header.e_phnum as usize);
        if header.e_phoff != 0 {
            let phoff =
                usize::try_from(header.e_phoff).map_err(|_| ElfErrorKind::Overflow)?;
            let table_size = (header.e_phnum as usize)
                .checked_mul(class.phdr_size())
                .and_then(|size| phoff.checked_add(size))
                .ok_or(ElfErrorKind::Overflow)?;
            if table_size > data.len() {
                return Err(ElfErrorKind::Truncated.into());
            }
            let mut cursor = Cursor::new_at(data, phoff, endian);
            for _ in 0..header.e_phnum {
                program_headers.push(Self::parse_phdr(&mut cursor, class)?);
            }
        }

        let decompressed = sections.iter().map(|_| OnceCell::new()).collect();

        Ok(Elf {
            data,
            header,
            sections,
            program_headers,
            shstrndx,
            decompressed,
        })
    }

    /// The raw file bytes this model was parsed from.
    pub fn data(&self) -> &'data [u8] {
        self.data
    }

    /// The decoded file header.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// The file class.
    pub fn class(&self) -> Class {
        self.header.class
    }

    /// The data encoding.
    pub fn endian(&self) -> Endian {
        self.header.endian
    }

    /// The resolved number of sections, including the escape via section 0.
    pub fn shnum(&self) -> usize {
        self.sections.len()
    }

    /// The resolved section name string table index.
    pub fn shstrndx(&self) -> usize {
        self.shstrndx
    }

    /// All decoded section headers.
    pub fn section_headers(&self) -> &[SectionHeader] {
        &self.sections
    }

    /// The section header at `index`.
    pub fn section_header(&self, index: usize) -> Result<&SectionHeader, ElfError> {
        self.sections.get(index).ok_or_else(|| {
            ElfErrorKind::BadRef {
                section: 0,
                index: index as u64,
            }
            .into()
        })
    }

    /// All decoded program headers.
    pub fn program_headers(&self) -> &[ProgramHeader] {
        &self.program_headers
    }

    /// Iterates over all sections with their index, header, and data.
    pub fn sections(&self) -> SectionIter<'data, '_> {
        SectionIter {
            elf: self,
            index: 0,
        }
    }

    /// The raw (possibly compressed) bytes of the section at `index`.
    ///
    /// `SHT_NOBITS` sections yield an empty slice.
    pub fn raw_section_data(&self, index: usize) -> Result<&'data [u8], ElfError> {
        let shdr = self.section_header(index)?;
        if shdr.is_nobits() || shdr.sh_type == raw::SHT_NULL {
            return Ok(&[]);
        }
        let offset = usize::try_from(shdr.sh_offset).map_err(|_| ElfErrorKind::Overflow)?;
        let size = usize::try_from(shdr.sh_size).map_err(|_| ElfErrorKind::Overflow)?;
        let end = offset.checked_add(size).ok_or(ElfErrorKind::Overflow)?;
        self.data
            .get(offset..end)
            .ok_or_else(|| ElfErrorKind::Truncated.into())
    }

    /// The logical bytes of the section at `index`.
    ///
    /// If the section carries `SHF_COMPRESSED`, the contents are inflated on
    /// first access and cached; subsequent calls return the cached bytes.
    pub fn section_data(&self, index: usize) -> Result<&[u8], ElfError> {
        let shdr = *self.section_header(index)?;
        let data = self.raw_section_data(index)?;
        if !shdr.is_compressed() {
            return Ok(data);
        }

        let cell = &self.decompressed[index];
        let bytes = cell.get_or_try_init(|| {
            let (chdr, payload) = self.parse_chdr(data)?;
            if chdr.ch_type != raw::ELFCOMPRESS_ZLIB {
                return Err(ElfError::from(ElfErrorKind::BadEnum {
                    field: "ch_type",
                    value: chdr.ch_type.into(),
                }));
            }
            let size = usize::try_from(chdr.ch_size).map_err(|_| ElfErrorKind::Overflow)?;
            let inflated = compress::inflate_zlib(payload, size)?;
            Ok::<_, ElfError>(inflated.into_boxed_slice())
        })?;
        Ok(bytes)
    }

    fn parse_chdr(&self, data: &'data [u8]) -> Result<(CompressionHeader, &'data [u8]), ElfError> {
        let class = self.class();
        let mut cursor = Cursor::new(data, self.endian());
        let chdr = match class {
            Class::Elf32 => CompressionHeader {
                ch_type: cursor.read_u32()?,
                ch_size: cursor.read_u32()?.into(),
                ch_addralign: cursor.read_u32()?.into(),
            },
            Class::Elf64 => {
                let ch_type = cursor.read_u32()?;
                cursor.skip(4)?;
                CompressionHeader {
                    ch_type,
                    ch_size: cursor.read_u64()?,
                    ch_addralign: cursor.read_u64()?,
                }
            }
        };
        Ok((chdr, &data[class.chdr_size()..]))
    }

    /// The name of the section at `index`, resolved via the shstrtab.
    pub fn section_name(&self, index: usize) -> Result<&'data [u8], ElfError> {
        let shdr = self.section_header(index)?;
        let strtab = self.raw_section_data(self.shstrndx)?;
        cstr_at(strtab, shdr.sh_name as usize).ok_or_else(|| {
            ElfErrorKind::BadRef {
                section: self.shstrndx,
                index: shdr.sh_name.into(),
            }
            .into()
        })
    }

    /// Finds the first section with the given name.
    pub fn section_by_name(&self, name: &[u8]) -> Option<usize> {
        (1..self.shnum()).find(|&index| self.section_name(index).is_ok_and(|n| n == name))
    }

    /// A string table view over the section at `index`.
    pub fn strtab(&self, index: usize) -> Result<Strtab<'data>, ElfError> {
        let shdr = self.section_header(index)?;
        if shdr.sh_type != raw::SHT_STRTAB {
            return Err(ElfErrorKind::BadEnum {
                field: "sh_type",
                value: shdr.sh_type.into(),
            }
            .into());
        }
        Ok(Strtab::new(self.raw_section_data(index)?, index))
    }

    /// A typed view over the symbol table section at `index`.
    ///
    /// The view resolves names through the table's linked string table and
    /// extended indices through an `SHT_SYMTAB_SHNDX` section if one exists.
    pub fn symbols(&self, index: usize) -> Result<SymbolTable<'data>, ElfError> {
        let shdr = self.section_header(index)?;
        if shdr.sh_type != raw::SHT_SYMTAB && shdr.sh_type != raw::SHT_DYNSYM {
            return Err(ElfErrorKind::BadEnum {
                field: "sh_type",
                value: shdr.sh_type.into(),
            }
            .into());
        }
        let entsize = self.class().sym_size() as u64;
        if shdr.sh_entsize != entsize {
            return Err(ElfErrorKind::BadEntsize { section: index }.into());
        }
        let data = self.raw_section_data(index)?;
        let count = (shdr.sh_size / entsize) as usize;

        let strtab = match self.sections.get(shdr.sh_link as usize) {
            Some(link) if link.sh_type == raw::SHT_STRTAB => {
                Some(Strtab::new(self.raw_section_data(shdr.sh_link as usize)?, shdr.sh_link as usize))
            }
            _ => None,
        };

        let shndx = self.symtab_shndx_for(index).and_then(|xndx| self.raw_section_data(xndx).ok());

        Ok(SymbolTable {
            data,
            endian: self.endian(),
            class: self.class(),
            section: index,
            count,
            first_nonlocal: shdr.sh_info as usize,
            strtab,
            shndx,
        })
    }

    /// Finds the `SHT_SYMTAB_SHNDX` section linked to the given symbol table.
    pub fn symtab_shndx_for(&self, symtab: usize) -> Option<usize> {
        (1..self.shnum()).find(|&i| {
            let shdr = &self.sections[i];
            shdr.sh_type == raw::SHT_SYMTAB_SHNDX && shdr.sh_link as usize == symtab
        })
    }

    /// A typed view over the relocation section at `index` (`REL` or `RELA`).
    pub fn relocations(&self, index: usize) -> Result<RelocationTable<'data>, ElfError> {
        let shdr = self.section_header(index)?;
        let explicit_addend = match shdr.sh_type {
            raw::SHT_RELA => true,
            raw::SHT_REL => false,
            other => {
                return Err(ElfErrorKind::BadEnum {
                    field: "sh_type",
                    value: other.into(),
                }
                .into())
            }
        };
        let entsize = if explicit_addend {
            self.class().rela_size() as u64
        } else {
            self.class().rel_size() as u64
        };
        if shdr.sh_entsize != entsize {
            return Err(ElfErrorKind::BadEntsize { section: index }.into());
        }
        Ok(RelocationTable {
            data: self.raw_section_data(index)?,
            endian: self.endian(),
            class: self.class(),
            explicit_addend,
            count: (shdr.sh_size / entsize) as usize,
            next: 0,
        })
    }

    /// A typed view over the dynamic section at `index`.
    pub fn dynamic(&self, index: usize) -> Result<DynamicTable<'data>, ElfError> {
        let shdr = self.section_header(index)?;
        if shdr.sh_type != raw::SHT_DYNAMIC {
            return Err(ElfErrorKind::BadEnum {
                field: "sh_type",
                value: shdr.sh_type.into(),
            }
            .into());
        }
        let entsize = self.class().dyn_size() as u64;
        if shdr.sh_entsize != entsize {
            return Err(ElfErrorKind::BadEntsize { section: index }.into());
        }
        Ok(DynamicTable {
            data: self.raw_section_data(index)?,
            endian: self.endian(),
            class: self.class(),
            count: (shdr.sh_size / entsize) as usize,
            next: 0,
        })
    }

    /// Iterates the notes in the given bytes.
    ///
    /// `align` decides between the common 32-bit layout (align 0 or 4) and
    /// the 64-bit layout (align 8), mirroring how `p_align` is interpreted.
    pub fn notes_in(&self, data: &'data [u8], align: u64) -> NoteIter<'data> {
        NoteIter {
            cursor: Cursor::new(data, self.endian()),
            wide: align == 8,
        }
    }

    /// Iterates the notes of a `PT_NOTE` segment.
    pub fn segment_notes(&self, phdr: &ProgramHeader) -> Result<NoteIter<'data>, ElfError> {
        let offset = usize::try_from(phdr.p_offset).map_err(|_| ElfErrorKind::Overflow)?;
        let size = usize::try_from(phdr.p_filesz).map_err(|_| ElfErrorKind::Overflow)?;
        let end = offset.checked_add(size).ok_or(ElfErrorKind::Overflow)?;
        let data = self
            .data
            .get(offset..end)
            .ok_or(ElfErrorKind::Truncated)?;
        Ok(self.notes_in(data, phdr.p_align))
    }

    /// A view over the System V hash table at `index`.
    pub fn sysv_hash(&self, index: usize) -> Result<SysvHashTable<'data>, ElfError> {
        let shdr = self.section_header(index)?;
        if shdr.sh_type != raw::SHT_HASH {
            return Err(ElfErrorKind::BadEnum {
                field: "sh_type",
                value: shdr.sh_type.into(),
            }
            .into());
        }
        let data = self.raw_section_data(index)?;
        let mut cursor = Cursor::new(data, self.endian());
        let nbucket = cursor.read_u32()?;
        let nchain = cursor.read_u32()?;
        let words = data.len() / 4;
        if (2usize)
            .checked_add(nbucket as usize)
            .and_then(|n| n.checked_add(nchain as usize))
            .map_or(true, |needed| needed > words)
        {
            return Err(ElfErrorKind::Truncated.into());
        }
        Ok(SysvHashTable {
            data,
            endian: self.endian(),
            nbucket,
            nchain,
        })
    }

    /// A view over the GNU hash table at `index`.
    pub fn gnu_hash(&self, index: usize) -> Result<GnuHashTable<'data>, ElfError> {
        let shdr = self.section_header(index)?;
        if shdr.sh_type != raw::SHT_GNU_HASH {
            return Err(ElfErrorKind::BadEnum {
                field: "sh_type",
                value: shdr.sh_type.into(),
            }
            .into());
        }
        let data = self.raw_section_data(index)?;
        let mut cursor = Cursor::new(data, self.endian());
        let nbucket = cursor.read_u32()?;
        let symoffset = cursor.read_u32()?;
        let bloom_size = cursor.read_u32()?;
        let bloom_shift = cursor.read_u32()?;
        let bloom_word = usize::from(self.class().address_size());
        let buckets_offset = (16usize)
            .checked_add((bloom_size as usize).checked_mul(bloom_word).ok_or(ElfErrorKind::Overflow)?)
            .ok_or(ElfErrorKind::Overflow)?;
        if buckets_offset
            .checked_add((nbucket as usize) * 4)
            .map_or(true, |needed| needed > data.len())
        {
            return Err(ElfErrorKind::Truncated.into());
        }
        Ok(GnuHashTable {
            data,
            endian: self.endian(),
            class: self.class(),
            nbucket,
            symoffset,
            bloom_size,
            bloom_shift,
            buckets_offset,
        })
    }

    /// A view over the section group at `index`.
    pub fn group(&self, index: usize) -> Result<GroupView<'data>, ElfError> {
        let shdr = self.section_header(index)?;
        if shdr.sh_type != raw::SHT_GROUP {
            return Err(ElfErrorKind::BadEnum {
                field: "sh_type",
                value: shdr.sh_type.into(),
            }
            .into());
        }
        let data = self.raw_section_data(index)?;
        if data.len() < 4 || data.len() % 4 != 0 {
            return Err(ElfErrorKind::BadEntsize { section: index }.into());
        }
        Ok(GroupView {
            data,
            endian: self.endian(),
        })
    }

    /// A view over the `SHT_GNU_versym` table at `index`.
    pub fn versym(&self, index: usize) -> Result<VersymTable<'data>, ElfError> {
        let shdr = self.section_header(index)?;
        if shdr.sh_type != raw::SHT_GNU_VERSYM {
            return Err(ElfErrorKind::BadEnum {
                field: "sh_type",
                value: shdr.sh_type.into(),
            }
            .into());
        }
        if shdr.sh_entsize != 2 {
            return Err(ElfErrorKind::BadEntsize { section: index }.into());
        }
        Ok(VersymTable {
            data: self.raw_section_data(index)?,
            endian: self.endian(),
        })
    }

    /// Iterates the version definitions in the `SHT_GNU_verdef` section at `index`.
    pub fn verdef(&self, index: usize) -> Result<VerdefIter<'data>, ElfError> {
        let shdr = self.section_header(index)?;
        if shdr.sh_type != raw::SHT_GNU_VERDEF {
            return Err(ElfErrorKind::BadEnum {
                field: "sh_type",
                value: shdr.sh_type.into(),
            }
            .into());
        }
        Ok(VerdefIter {
            data: self.raw_section_data(index)?,
            endian: self.endian(),
            offset: 0,
            remaining: shdr.sh_info as usize,
        })
    }

    /// Iterates the version requirements in the `SHT_GNU_verneed` section at `index`.
    pub fn verneed(&self, index: usize) -> Result<VerneedIter<'data>, ElfError> {
        let shdr = self.section_header(index)?;
        if shdr.sh_type != raw::SHT_GNU_VERNEED {
            return Err(ElfErrorKind::BadEnum {
                field: "sh_type",
                value: shdr.sh_type.into(),
            }
            .into());
        }
        Ok(VerneedIter {
            data: self.raw_section_data(index)?,
            endian: self.endian(),
            offset: 0,
            remaining: shdr.sh_info as usize,
        })
    }
}

/// The decoded compression header of a `SHF_COMPRESSED` section.
#[derive(Clone, Copy, Debug)]
pub struct CompressionHeader {
    /// Compression algorithm (`ELFCOMPRESS_*`).
    pub ch_type: u32,
    /// Size of the uncompressed contents.
    pub ch_size: u64,
    /// Alignment of the uncompressed contents.
    pub ch_addralign: u64,
}

/// One section yielded by [`Elf::sections`].
pub struct Section<'data, 'elf> {
    elf: &'elf Elf<'data>,
    /// Index of this section.
    pub index: usize,
    /// The decoded header.
    pub header: SectionHeader,
}

impl<'data> Section<'data, '_> {
    /// The section's name.
    pub fn name(&self) -> Result<&'data [u8], ElfError> {
        self.elf.section_name(self.index)
    }

    /// The section's raw contents.
    pub fn data(&self) -> Result<&'data [u8], ElfError> {
        self.elf.raw_section_data(self.index)
    }
}

/// Iterator over the sections of an [`Elf`].
pub struct SectionIter<'data, 'elf> {
    elf: &'elf Elf<'data>,
    index: usize,
}

impl<'data, 'elf> Iterator for SectionIter<'data, 'elf> {
    type Item = Section<'data, 'elf>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.index;
        let header = *self.elf.sections.get(index)?;
        self.index += 1;
        Some(Section {
            elf: self.elf,
            index,
            header,
        })
    }
}

/// A typed view over a symbol table section.
#[derive(Debug)]
pub struct SymbolTable<'data> {
    data: &'data [u8],
    endian: Endian,
    class: Class,
    section: usize,
    count: usize,
    first_nonlocal: usize,
    strtab: Option<Strtab<'data>>,
    shndx: Option<&'data [u8]>,
}

impl<'data> SymbolTable<'data> {
    /// Number of entries including the null symbol.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the table holds only the null symbol.
    pub fn is_empty(&self) -> bool {
        self.count <= 1
    }

    /// Index of the first non-local symbol as recorded in `sh_info`.
    pub fn first_nonlocal(&self) -> usize {
        self.first_nonlocal
    }

    /// The linked string table, if it was valid.
    pub fn strtab(&self) -> Option<&Strtab<'data>> {
        self.strtab.as_ref()
    }

    /// Reads the symbol at `index`.
    pub fn get(&self, index: usize) -> Result<Symbol, ElfError> {
        if index >= self.count {
            return Err(ElfErrorKind::BadRef {
                section: self.section,
                index: index as u64,
            }
            .into());
        }
        let mut cursor = Cursor::new_at(self.data, index * self.class.sym_size(), self.endian);
        match self.class {
            Class::Elf32 => {
                let st_name = cursor.read_u32()?;
                let st_value = cursor.read_u32()?.into();
                let st_size = cursor.read_u32()?.into();
                let st_info = cursor.read_u8()?;
                let st_other = cursor.read_u8()?;
                let st_shndx = cursor.read_u16()?;
                Ok(Symbol {
                    st_name,
                    st_info,
                    st_other,
                    st_shndx,
                    st_value,
                    st_size,
                })
            }
            Class::Elf64 => {
                let st_name = cursor.read_u32()?;
                let st_info = cursor.read_u8()?;
                let st_other = cursor.read_u8()?;
                let st_shndx = cursor.read_u16()?;
                let st_value = cursor.read_u64()?;
                let st_size = cursor.read_u64()?;
                Ok(Symbol {
                    st_name,
                    st_info,
                    st_other,
                    st_shndx,
                    st_value,
                    st_size,
                })
            }
        }
    }

    /// The name of the given symbol, resolved via the linked string table.
    pub fn name(&self, symbol: &Symbol) -> Result<&'data [u8], ElfError> {
        let strtab = self.strtab.as_ref().ok_or(ElfErrorKind::BadLink {
            from: self.section,
            to: 0,
        })?;
        strtab.get(symbol.st_name)
    }

    /// Resolves the section index of a symbol, following `SHN_XINDEX` into
    /// the extended-index table.
    ///
    /// Returns the raw reserved value for `SHN_ABS`/`SHN_COMMON` symbols.
    pub fn resolved_shndx(&self, index: usize, symbol: &Symbol) -> Result<u32, ElfError> {
        if symbol.st_shndx != raw::SHN_XINDEX {
            return Ok(symbol.st_shndx.into());
        }
        let table = self.shndx.ok_or(ElfErrorKind::BadRef {
            section: self.section,
            index: index as u64,
        })?;
        let mut cursor = Cursor::new_at(table, index * 4, self.endian);
        Ok(cursor.read_u32()?)
    }

    /// Iterates all symbols in table order.
    pub fn iter(&self) -> SymbolIter<'data, '_> {
        SymbolIter {
            table: self,
            next: 0,
        }
    }
}

/// Fallible iterator over the entries of a [`SymbolTable`].
pub struct SymbolIter<'data, 'table> {
    table: &'table SymbolTable<'data>,
    next: usize,
}

impl FallibleIterator for SymbolIter<'_, '_> {
    type Item = Symbol;
    type Error = ElfError;

    fn next(&mut self) -> Result<Option<Symbol>, ElfError> {
        if self.next >= self.table.len() {
            return Ok(None);
        }
        let symbol = self.table.get(self.next)?;
        self.next += 1;
        Ok(Some(symbol))
    }
}

/// A typed view over a relocation section.
pub struct RelocationTable<'data> {
    data: &'data [u8],
    endian: Endian,
    class: Class,
    explicit_addend: bool,
    count: usize,
    next: usize,
}

impl RelocationTable<'_> {
    /// Number of relocation entries.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether entries carry an explicit addend (`SHT_RELA`).
    pub fn has_addend(&self) -> bool {
        self.explicit_addend
    }

    /// The symbol index of a relocation, per the file's class.
    pub fn symbol(&self, reloc: &Relocation) -> u32 {
        match self.class {
            Class::Elf32 => raw::r32_sym(reloc.r_info),
            Class::Elf64 => raw::r64_sym(reloc.r_info),
        }
    }

    /// The relocation type, per the file's class.
    pub fn rel_type(&self, reloc: &Relocation) -> u32 {
        match self.class {
            Class::Elf32 => raw::r32_type(reloc.r_info),
            Class::Elf64 => raw::r64_type(reloc.r_info),
        }
    }

    /// Reads the relocation at `index`.
    pub fn get(&self, index: usize) -> Result<Relocation, ElfError> {
        let entsize = if self.explicit_addend {
            self.class.rela_size()
        } else {
            self.class.rel_size()
        };
        let mut cursor = Cursor::new_at(self.data, index * entsize, self.endian);
        let (r_offset, r_info) = match self.class {
            Class::Elf32 => (cursor.read_u32()?.into(), cursor.read_u32()?.into()),
            Class::Elf64 => (cursor.read_u64()?, cursor.read_u64()?),
        };
        let r_addend = if self.explicit_addend {
            Some(match self.class {
                Class::Elf32 => cursor.read_i32()?.into(),
                Class::Elf64 => cursor.read_i64()?,
            })
        } else {
            None
        };
        Ok(Relocation {
            r_offset,
            r_info,
            r_addend,
        })
    }
}

impl FallibleIterator for RelocationTable<'_> {
    type Item = Relocation;
    type Error = ElfError;

    fn next(&mut self) -> Result<Option<Relocation>, ElfError> {
        if self.next >= self.count {
            return Ok(None);
        }
        let reloc = self.get(self.next)?;
        self.next += 1;
        Ok(Some(reloc))
    }
}

/// A typed view over a dynamic section.
pub struct DynamicTable<'data> {
    data: &'data [u8],
    endian: Endian,
    class: Class,
    count: usize,
    next: usize,
}

impl DynamicTable<'_> {
    /// Number of dynamic entries.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Reads the entry at `index`.
    pub fn get(&self, index: usize) -> Result<DynEntry, ElfError> {
        let mut cursor = Cursor::new_at(self.data, index * self.class.dyn_size(), self.endian);
        match self.class {
            Class::Elf32 => Ok(DynEntry {
                d_tag: cursor.read_i32()?.into(),
                d_val: cursor.read_u32()?.into(),
            }),
            Class::Elf64 => Ok(DynEntry {
                d_tag: cursor.read_i64()?,
                d_val: cursor.read_u64()?,
            }),
        }
    }
}

impl FallibleIterator for DynamicTable<'_> {
    type Item = DynEntry;
    type Error = ElfError;

    fn next(&mut self) -> Result<Option<DynEntry>, ElfError> {
        if self.next >= self.count {
            return Ok(None);
        }
        let entry = self.get(self.next)?;
        self.next += 1;
        Ok(Some(entry))
    }
}

/// A decoded note entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Note<'data> {
    /// Note type.
    pub n_type: u64,
    /// The originator name, without padding or terminator.
    pub name: &'data [u8],
    /// The descriptor bytes.
    pub desc: &'data [u8],
}

/// Fallible iterator over the notes in a note segment or section.
pub struct NoteIter<'data> {
    cursor: Cursor<'data>,
    wide: bool,
}

impl<'data> FallibleIterator for NoteIter<'data> {
    type Item = Note<'data>;
    type Error = ElfError;

    fn next(&mut self) -> Result<Option<Note<'data>>, ElfError> {
        if self.cursor.is_empty() {
            return Ok(None);
        }

        let align = if self.wide { 8usize } else { 4usize };
        let (namesz, descsz, n_type) = if self.wide {
            (
                self.cursor.read_u64()?,
                self.cursor.read_u64()?,
                self.cursor.read_u64()?,
            )
        } else {
            (
                self.cursor.read_u32()?.into(),
                self.cursor.read_u32()?.into(),
                self.cursor.read_u32()?.into(),
            )
        };

        let namesz = usize::try_from(namesz).map_err(|_| ElfErrorKind::Overflow)?;
        let descsz = usize::try_from(descsz).map_err(|_| ElfErrorKind::Overflow)?;

        let name = self.cursor.read_bytes(namesz)?;
        let name = name.strip_suffix(&[0]).unwrap_or(name);
        self.cursor.skip(namesz.wrapping_neg() & (align - 1))?;
        let desc = self.cursor.read_bytes(descsz)?;
        let padding = descsz.wrapping_neg() & (align - 1);
        // Trailing descriptor padding may legitimately be cut short.
        let _ = self.cursor.skip(padding.min(self.cursor.remaining()));

        Ok(Some(Note { n_type, name, desc }))
    }
}

/// A view over a System V hash table.
pub struct SysvHashTable<'data> {
    data: &'data [u8],
    endian: Endian,
    nbucket: u32,
    nchain: u32,
}

impl SysvHashTable<'_> {
    /// Number of buckets.
    pub fn nbucket(&self) -> u32 {
        self.nbucket
    }

    /// Number of chain entries; covers the linked symbol table when valid.
    pub fn nchain(&self) -> u32 {
        self.nchain
    }

    /// Reads the bucket at `index`.
    pub fn bucket(&self, index: u32) -> Result<u32, ElfError> {
        let mut cursor = Cursor::new_at(self.data, (2 + index as usize) * 4, self.endian);
        Ok(cursor.read_u32()?)
    }

    /// Reads the chain entry at `index`.
    pub fn chain(&self, index: u32) -> Result<u32, ElfError> {
        let offset = (2 + self.nbucket as usize + index as usize) * 4;
        let mut cursor = Cursor::new_at(self.data, offset, self.endian);
        Ok(cursor.read_u32()?)
    }
}

/// A view over a GNU hash table.
pub struct GnuHashTable<'data> {
    data: &'data [u8],
    endian: Endian,
    class: Class,
    nbucket: u32,
    symoffset: u32,
    bloom_size: u32,
    bloom_shift: u32,
    buckets_offset: usize,
}

impl GnuHashTable<'_> {
    /// Number of buckets.
    pub fn nbucket(&self) -> u32 {
        self.nbucket
    }

    /// Index of the first symbol covered by the table.
    pub fn symoffset(&self) -> u32 {
        self.symoffset
    }

    /// Number of bloom filter words.
    pub fn bloom_size(&self) -> u32 {
        self.bloom_size
    }

    /// The bloom filter shift count.
    pub fn bloom_shift(&self) -> u32 {
        self.bloom_shift
    }

    /// Reads the bucket at `index`.
    pub fn bucket(&self, index: u32) -> Result<u32, ElfError> {
        let offset = self.buckets_offset + index as usize * 4;
        let mut cursor = Cursor::new_at(self.data, offset, self.endian);
        Ok(cursor.read_u32()?)
    }

    /// Reads the chain value for absolute symbol index `symindex`.
    pub fn chain(&self, symindex: u32) -> Result<u32, ElfError> {
        let relative = symindex
            .checked_sub(self.symoffset)
            .ok_or(ElfErrorKind::Overflow)?;
        let offset = self.buckets_offset + (self.nbucket as usize + relative as usize) * 4;
        let mut cursor = Cursor::new_at(self.data, offset, self.endian);
        Ok(cursor.read_u32()?)
    }

    /// Computes the number of symbols the table covers by walking to the end
    /// of the last chain.
    pub fn symbol_count(&self) -> Result<u32, ElfError> {
        let mut max_chain = 0u32;
        for bucket in 0..self.nbucket {
            let chain = self.bucket(bucket)?;
            if chain > max_chain {
                max_chain = chain;
            }
        }
        if max_chain < self.symoffset {
            return Ok(0);
        }
        loop {
            let hash = self.chain(max_chain)?;
            max_chain += 1;
            if hash & 1 != 0 {
                return Ok(max_chain);
            }
        }
    }

    /// The class the bloom filter words are sized for.
    pub fn class(&self) -> Class {
        self.class
    }
}

/// A view over a section group's contents.
pub struct GroupView<'data> {
    data: &'data [u8],
    endian: Endian,
}

impl GroupView<'_> {
    /// The group flags word (`GRP_*`).
    pub fn flags(&self) -> Result<u32, ElfError> {
        let mut cursor = Cursor::new(self.data, self.endian);
        Ok(cursor.read_u32()?)
    }

    /// Number of member section indices.
    pub fn member_count(&self) -> usize {
        self.data.len() / 4 - 1
    }

    /// Reads the member section index at `index`.
    pub fn member(&self, index: usize) -> Result<u32, ElfError> {
        let mut cursor = Cursor::new_at(self.data, (index + 1) * 4, self.endian);
        Ok(cursor.read_u32()?)
    }
}

/// A view over a `SHT_GNU_versym` table.
pub struct VersymTable<'data> {
    data: &'data [u8],
    endian: Endian,
}

impl VersymTable<'_> {
    /// Number of version symbol entries.
    pub fn len(&self) -> usize {
        self.data.len() / 2
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reads the version index for symbol `index`.
    pub fn get(&self, index: usize) -> Result<u16, ElfError> {
        let mut cursor = Cursor::new_at(self.data, index * 2, self.endian);
        Ok(cursor.read_u16()?)
    }
}

/// One `Verdef` record with the offsets of its aux entries.
#[derive(Clone, Copy, Debug)]
pub struct Verdef {
    /// Version revision.
    pub vd_version: u16,
    /// Flags (`VER_FLG_*`).
    pub vd_flags: u16,
    /// Version index.
    pub vd_ndx: u16,
    /// Number of aux entries.
    pub vd_cnt: u16,
    /// Hash of the version name.
    pub vd_hash: u32,
    /// Offset of the first `Verdaux` entry, relative to this record.
    pub vd_aux: u32,
}

/// Fallible iterator over `SHT_GNU_verdef` records.
pub struct VerdefIter<'data> {
    data: &'data [u8],
    endian: Endian,
    offset: usize,
    remaining: usize,
}

impl FallibleIterator for VerdefIter<'_> {
    type Item = Verdef;
    type Error = ElfError;

    fn next(&mut self) -> Result<Option<Verdef>, ElfError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let mut cursor = Cursor::new_at(self.data, self.offset, self.endian);
        let verdef = Verdef {
            vd_version: cursor.read_u16()?,
            vd_flags: cursor.read_u16()?,
            vd_ndx: cursor.read_u16()?,
            vd_cnt: cursor.read_u16()?,
            vd_hash: cursor.read_u32()?,
            vd_aux: cursor.read_u32()?,
        };
        let vd_next = cursor.read_u32()?;
        self.remaining -= 1;
        if vd_next == 0 {
            self.remaining = 0;
        } else {
            self.offset = self
                .offset
                .checked_add(vd_next as usize)
                .ok_or(ElfErrorKind::Overflow)?;
        }
        Ok(Some(verdef))
    }
}

/// One `Verneed` record.
#[derive(Clone, Copy, Debug)]
pub struct Verneed {
    /// Version revision.
    pub vn_version: u16,
    /// Number of aux entries.
    pub vn_cnt: u16,
    /// Offset of the file name in the linked string table.
    pub vn_file: u32,
    /// Offset of the first `Vernaux` entry, relative to this record.
    pub vn_aux: u32,
}

/// Fallible iterator over `SHT_GNU_verneed` records.
pub struct VerneedIter<'data> {
    data: &'data [u8],
    endian: Endian,
    offset: usize,
    remaining: usize,
}

impl FallibleIterator for VerneedIter<'_> {
    type Item = Verneed;
    type Error = ElfError;

    fn next(&mut self) -> Result<Option<Verneed>, ElfError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let mut cursor = Cursor::new_at(self.data, self.offset, self.endian);
        let verneed = Verneed {
            vn_version: cursor.read_u16()?,
            vn_cnt: cursor.read_u16()?,
            vn_file: cursor.read_u32()?,
            vn_aux: cursor.read_u32()?,
        };
        let vn_next = cursor.read_u32()?;
        self.remaining -= 1;
        if vn_next == 0 {
            self.remaining = 0;
        } else {
            self.offset = self
                .offset
                .checked_add(vn_next as usize)
                .ok_or(ElfErrorKind::Overflow)?;
        }
        Ok(Some(verneed))
    }
}
