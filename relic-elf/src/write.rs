//! Serialization of the ELF model back into file bytes.
//!
//! This is the write mirror of the readers in [`crate::Elf`]: each fixed
//! layout struct can be emitted in either class and byte order. The
//! recombiner uses these to produce its merged output; [`serialize`] can
//! re-emit a parsed file for round-trip checks.

use relic_common::Endian;

use crate::{Class, DynEntry, Elf, ElfError, ElfErrorKind, FileHeader, ProgramHeader, Relocation, SectionHeader, Symbol};
use crate::raw;

/// An append-only byte buffer with endian-aware primitives.
pub struct Emitter {
    buf: Vec<u8>,
    endian: Endian,
}

impl Emitter {
    /// Creates an empty emitter for the given byte order.
    pub fn new(endian: Endian) -> Self {
        Emitter {
            buf: Vec::new(),
            endian,
        }
    }

    /// The bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consumes the emitter, returning its buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Appends raw bytes.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Appends zero bytes until the buffer length reaches `offset`.
    pub fn pad_to(&mut self, offset: usize) {
        if offset > self.buf.len() {
            self.buf.resize(offset, 0);
        }
    }

    /// Appends a byte.
    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Appends a 16-bit value.
    pub fn put_u16(&mut self, value: u16) {
        match self.endian {
            Endian::Little => self.buf.extend_from_slice(&value.to_le_bytes()),
            Endian::Big => self.buf.extend_from_slice(&value.to_be_bytes()),
        }
    }

    /// Appends a 32-bit value.
    pub fn put_u32(&mut self, value: u32) {
        match self.endian {
            Endian::Little => self.buf.extend_from_slice(&value.to_le_bytes()),
            Endian::Big => self.buf.extend_from_slice(&value.to_be_bytes()),
        }
    }

    /// Appends a 64-bit value.
    pub fn put_u64(&mut self, value: u64) {
        match self.endian {
            Endian::Little => self.buf.extend_from_slice(&value.to_le_bytes()),
            Endian::Big => self.buf.extend_from_slice(&value.to_be_bytes()),
        }
    }

    /// Appends a word of the class's natural width.
    ///
    /// Values that do not fit the 32-bit class are an overflow error.
    pub fn put_word(&mut self, class: Class, value: u64) -> Result<(), ElfError> {
        match class {
            Class::Elf32 => {
                let narrow = u32::try_from(value).map_err(|_| ElfErrorKind::Overflow)?;
                self.put_u32(narrow);
            }
            Class::Elf64 => self.put_u64(value),
        }
        Ok(())
    }

}

/// Emits the ELF identification and file header.
pub fn put_ehdr(out: &mut Emitter, header: &FileHeader) -> Result<(), ElfError> {
    let class = header.class;
    out.put_bytes(raw::ELFMAG);
    out.put_u8(match class {
        Class::Elf32 => raw::ELFCLASS32,
        Class::Elf64 => raw::ELFCLASS64,
    });
    out.put_u8(match header.endian {
        Endian::Little => raw::ELFDATA2LSB,
        Endian::Big => raw::ELFDATA2MSB,
    });
    out.put_u8(header.ident_version);
    out.put_u8(header.os_abi);
    out.put_u8(header.abi_version);
    out.put_bytes(&[0u8; raw::EI_NIDENT - raw::EI_PAD]);

    out.put_u16(header.e_type);
    out.put_u16(header.e_machine);
    out.put_u32(header.e_version);
    out.put_word(class, header.e_entry)?;
    out.put_word(class, header.e_phoff)?;
    out.put_word(class, header.e_shoff)?;
    out.put_u32(header.e_flags);
    out.put_u16(header.e_ehsize);
    out.put_u16(header.e_phentsize);
    out.put_u16(header.e_phnum);
    out.put_u16(header.e_shentsize);
    out.put_u16(header.e_shnum);
    out.put_u16(header.e_shstrndx);
    Ok(())
}

/// Emits one section header.
pub fn put_shdr(out: &mut Emitter, class: Class, shdr: &SectionHeader) -> Result<(), ElfError> {
    out.put_u32(shdr.sh_name);
    out.put_u32(shdr.sh_type);
    out.put_word(class, shdr.sh_flags)?;
    out.put_word(class, shdr.sh_addr)?;
    out.put_word(class, shdr.sh_offset)?;
    out.put_word(class, shdr.sh_size)?;
    out.put_u32(shdr.sh_link);
    out.put_u32(shdr.sh_info);
    out.put_word(class, shdr.sh_addralign)?;
    out.put_word(class, shdr.sh_entsize)?;
    Ok(())
}

/// Emits one program header.
pub fn put_phdr(out: &mut Emitter, class: Class, phdr: &ProgramHeader) -> Result<(), ElfError> {
    match class {
        Class::Elf32 => {
            out.put_u32(phdr.p_type);
            out.put_word(class, phdr.p_offset)?;
            out.put_word(class, phdr.p_vaddr)?;
            out.put_word(class, phdr.p_paddr)?;
            out.put_word(class, phdr.p_filesz)?;
            out.put_word(class, phdr.p_memsz)?;
            out.put_u32(phdr.p_flags);
            out.put_word(class, phdr.p_align)?;
        }
        Class::Elf64 => {
            out.put_u32(phdr.p_type);
            out.put_u32(phdr.p_flags);
            out.put_u64(phdr.p_offset);
            out.put_u64(phdr.p_vaddr);
            out.put_u64(phdr.p_paddr);
            out.put_u64(phdr.p_filesz);
            out.put_u64(phdr.p_memsz);
            out.put_u64(phdr.p_align);
        }
    }
    Ok(())
}

/// Emits one symbol table entry.
pub fn put_sym(out: &mut Emitter, class: Class, sym: &Symbol) -> Result<(), ElfError> {
    match class {
        Class::Elf32 => {
            out.put_u32(sym.st_name);
            out.put_word(class, sym.st_value)?;
            out.put_word(class, sym.st_size)?;
            out.put_u8(sym.st_info);
            out.put_u8(sym.st_other);
            out.put_u16(sym.st_shndx);
        }
        Class::Elf64 => {
            out.put_u32(sym.st_name);
            out.put_u8(sym.st_info);
            out.put_u8(sym.st_other);
            out.put_u16(sym.st_shndx);
            out.put_u64(sym.st_value);
            out.put_u64(sym.st_size);
        }
    }
    Ok(())
}

/// Emits one relocation entry; the addend is written only when present.
pub fn put_reloc(out: &mut Emitter, class: Class, reloc: &Relocation) -> Result<(), ElfError> {
    out.put_word(class, reloc.r_offset)?;
    match class {
        Class::Elf32 => {
            let info = u32::try_from(reloc.r_info).map_err(|_| ElfErrorKind::Overflow)?;
            out.put_u32(info);
            if let Some(addend) = reloc.r_addend {
                let narrow = i32::try_from(addend).map_err(|_| ElfErrorKind::Overflow)?;
                out.put_u32(narrow as u32);
            }
        }
        Class::Elf64 => {
            out.put_u64(reloc.r_info);
            if let Some(addend) = reloc.r_addend {
                out.put_u64(addend as u64);
            }
        }
    }
    Ok(())
}

/// Emits one dynamic entry.
pub fn put_dyn(out: &mut Emitter, class: Class, entry: &DynEntry) -> Result<(), ElfError> {
    match class {
        Class::Elf32 => {
            let tag = i32::try_from(entry.d_tag).map_err(|_| ElfErrorKind::Overflow)?;
            out.put_u32(tag as u32);
        }
        Class::Elf64 => out.put_u64(entry.d_tag as u64),
    }
    out.put_word(class, entry.d_val)
}

/// Re-emits a parsed ELF file as bytes.
///
/// The image is reconstructed from the model: header, program header table,
/// raw section contents at their recorded offsets, and the section header
/// table. Gaps between pieces are zero filled. For files whose padding is
/// zero (which includes everything the recombiner emits), this reproduces
/// the input byte for byte.
pub fn serialize(elf: &Elf<'_>) -> Result<Vec<u8>, ElfError> {
    let header = elf.header();
    let class = elf.class();
    let mut out = Emitter::new(elf.endian());

    put_ehdr(&mut out, header)?;

    if header.e_phoff != 0 {
        out.pad_to(usize::try_from(header.e_phoff).map_err(|_| ElfErrorKind::Overflow)?);
        for phdr in elf.program_headers() {
            put_phdr(&mut out, class, phdr)?;
        }
    }

    for section in elf.sections() {
        if section.header.is_nobits() || section.header.sh_type == raw::SHT_NULL {
            continue;
        }
        let offset =
            usize::try_from(section.header.sh_offset).map_err(|_| ElfErrorKind::Overflow)?;
        out.pad_to(offset);
        out.put_bytes(section.data()?);
    }

    if header.e_shoff != 0 {
        out.pad_to(usize::try_from(header.e_shoff).map_err(|_| ElfErrorKind::Overflow)?);
        for shdr in elf.section_headers() {
            put_shdr(&mut out, class, shdr)?;
        }
    }

    Ok(out.into_bytes())
}
