//! Call-frame information from `.debug_frame` and `.eh_frame`.
//!
//! Both sections share the CIE/FDE record structure but differ in how CIEs
//! are referenced, how pointers are encoded, and in the `.eh_frame`
//! augmentation machinery. [`FrameSection`] abstracts over the two;
//! executing a CIE's initial instructions followed by an FDE's program
//! yields the register-rule table for any covered program counter.

use std::collections::BTreeMap;

use fallible_iterator::FallibleIterator;
use relic_common::{Cursor, Endian, Format};

use crate::constants as c;
use crate::{DwarfError, DwarfErrorKind};

/// A `.debug_frame` or `.eh_frame` section.
#[derive(Clone, Copy, Debug)]
pub struct FrameSection<'data> {
    data: &'data [u8],
    endian: Endian,
    is_eh: bool,
    address_size: u8,
    /// Virtual address the section is loaded at, for `pcrel` pointers.
    section_address: u64,
}

/// A common information entry.
#[derive(Clone, Copy, Debug)]
pub struct Cie<'data> {
    /// Offset of the entry within its section.
    pub offset: u64,
    /// CIE version (1, 3, or 4).
    pub version: u8,
    /// The augmentation string.
    pub augmentation: &'data [u8],
    /// Address size; from the v4 header or the section default.
    pub address_size: u8,
    /// Segment selector size; this reader requires 0.
    pub segment_size: u8,
    /// Code alignment factor; scales `advance_loc` deltas.
    pub code_alignment_factor: u64,
    /// Data alignment factor; scales offset rules.
    pub data_alignment_factor: i64,
    /// The register holding the return address.
    pub return_address_register: u64,
    /// How FDE addresses are encoded (`DW_EH_PE_*`).
    pub fde_encoding: u8,
    /// How LSDA pointers are encoded, from an `L` augmentation.
    pub lsda_encoding: Option<u8>,
    /// The personality routine, from a `P` augmentation.
    pub personality: Option<u64>,
    /// Whether an `S` augmentation marked this a signal frame.
    pub signal_frame: bool,
    /// Whether the augmentation started with `z`.
    pub has_augmentation_data: bool,
    /// The initial instruction bytes.
    pub initial_instructions: &'data [u8],
    /// Offset of the initial instructions within the section.
    pub initial_instructions_offset: u64,
}

/// A frame description entry.
#[derive(Clone, Copy, Debug)]
pub struct Fde<'data> {
    /// Offset of the entry within its section.
    pub offset: u64,
    /// Section offset of the CIE this FDE inherits from.
    pub cie_offset: u64,
    /// First program counter covered.
    pub initial_location: u64,
    /// Number of bytes covered.
    pub address_range: u64,
    /// The language-specific data area pointer, when present.
    pub lsda: Option<u64>,
    /// The instruction bytes.
    pub instructions: &'data [u8],
    /// Offset of the instructions within the section.
    pub instructions_offset: u64,
}

impl Fde<'_> {
    /// Whether `pc` lies within this FDE's range.
    pub fn contains(&self, pc: u64) -> bool {
        pc >= self.initial_location
            && pc - self.initial_location < self.address_range
    }
}

/// One entry of a frame section.
#[derive(Clone, Copy, Debug)]
pub enum Entry<'data> {
    /// A common information entry.
    Cie(Cie<'data>),
    /// A frame description entry.
    Fde(Fde<'data>),
}

impl<'data> FrameSection<'data> {
    /// Wraps `.debug_frame` contents.
    pub fn debug_frame(data: &'data [u8], endian: Endian, address_size: u8) -> Self {
        FrameSection {
            data,
            endian,
            is_eh: false,
            address_size,
            section_address: 0,
        }
    }

    /// Wraps `.eh_frame` contents loaded at `section_address`.
    pub fn eh_frame(
        data: &'data [u8],
        endian: Endian,
        address_size: u8,
        section_address: u64,
    ) -> Self {
        FrameSection {
            data,
            endian,
            is_eh: true,
            address_size,
            section_address,
        }
    }

    /// Iterates the entries in on-disk order.
    pub fn entries(&self) -> EntryIter<'data> {
        EntryIter {
            section: *self,
            offset: 0,
            done: false,
        }
    }

    /// Parses the CIE at the given section offset.
    pub fn cie_at(&self, offset: u64) -> Result<Cie<'data>, DwarfError> {
        match self.parse_entry(offset)? {
            Some(Entry::Cie(cie)) => Ok(cie),
            _ => Err(DwarfErrorKind::BadIndex(offset).into()),
        }
    }

    /// Finds the FDE covering `pc` along with its CIE.
    pub fn fde_for(&self, pc: u64) -> Result<Option<(Cie<'data>, Fde<'data>)>, DwarfError> {
        let mut entries = self.entries();
        while let Some(entry) = entries.next()? {
            if let Entry::Fde(fde) = entry {
                if fde.contains(pc) {
                    let cie = self.cie_at(fde.cie_offset)?;
                    return Ok(Some((cie, fde)));
                }
            }
        }
        Ok(None)
    }

    fn parse_entry(&self, offset: u64) -> Result<Option<Entry<'data>>, DwarfError> {
        let start = usize::try_from(offset).map_err(|_| DwarfErrorKind::Overflow)?;
        if start >= self.data.len() {
            return Ok(None);
        }
        let mut cursor = Cursor::new_at(self.data, start, self.endian);

        let (length, format) = cursor.read_initial_length()?;
        if length == 0 {
            // The .eh_frame terminator.
            return Ok(None);
        }
        let end = (cursor.position() as u64)
            .checked_add(length)
            .ok_or(DwarfErrorKind::Overflow)?;
        if end > self.data.len() as u64 {
            return Err(DwarfErrorKind::BadLength.into());
        }

        let id_position = cursor.position() as u64;
        let id = cursor.read_offset(format)?;

        let cie_id = if self.is_eh {
            0
        } else {
            match format {
                Format::Dwarf32 => u64::from(u32::MAX),
                Format::Dwarf64 => u64::MAX,
            }
        };

        if id == cie_id {
            self.parse_cie(&mut cursor, offset, end).map(|cie| Some(Entry::Cie(cie)))
        } else {
            let cie_offset = if self.is_eh {
                // In .eh_frame the pointer counts back from its own field.
                id_position
                    .checked_sub(id)
                    .ok_or(DwarfErrorKind::BadLength)?
            } else {
                id
            };
            let cie = self.cie_at(cie_offset)?;
            self.parse_fde(&mut cursor, offset, end, cie_offset, &cie)
                .map(|fde| Some(Entry::Fde(fde)))
        }
    }

    fn parse_cie(
        &self,
        cursor: &mut Cursor<'data>,
        offset: u64,
        end: u64,
    ) -> Result<Cie<'data>, DwarfError> {
        let version = cursor.read_u8()?;
        if version != 1 && version != 3 && version != 4 {
            return Err(DwarfErrorKind::UnsupportedVersion {
                section: if self.is_eh { ".eh_frame" } else { ".debug_frame" },
                version: version.into(),
            }
            .into());
        }

        let augmentation = cursor.read_cstr()?;

        let (mut address_size, mut segment_size) = (self.address_size, 0u8);
        if version == 4 {
            address_size = cursor.read_u8()?;
            segment_size = cursor.read_u8()?;
        }
        if address_size != 4 && address_size != 8 {
            return Err(DwarfErrorKind::BadAddressSize(address_size).into());
        }

        // The obsolete "eh" augmentation carries one extra word.
        if augmentation == b"eh" {
            cursor.skip(address_size.into())?;
        }

        let code_alignment_factor = cursor.read_uleb128()?;
        if code_alignment_factor == 0 {
            return Err(DwarfErrorKind::BadZeroField("code_alignment_factor").into());
        }
        let data_alignment_factor = cursor.read_sleb128()?;
        let return_address_register = if version == 1 {
            cursor.read_u8()?.into()
        } else {
            cursor.read_uleb128()?
        };

        let mut cie = Cie {
            offset,
            version,
            augmentation,
            address_size,
            segment_size,
            code_alignment_factor,
            data_alignment_factor,
            return_address_register,
            fde_encoding: c::DW_EH_PE_absptr,
            lsda_encoding: None,
            personality: None,
            signal_frame: false,
            has_augmentation_data: false,
            initial_instructions: &[],
            initial_instructions_offset: 0,
        };

        if augmentation.first() == Some(&b'z') {
            cie.has_augmentation_data = true;
            let aug_len = cursor.read_uleb128()?;
            let aug_len = usize::try_from(aug_len).map_err(|_| DwarfErrorKind::Overflow)?;
            let aug_end = cursor.position() + aug_len;

            for &letter in &augmentation[1..] {
                match letter {
                    b'L' => cie.lsda_encoding = Some(cursor.read_u8()?),
                    b'P' => {
                        let encoding = cursor.read_u8()?;
                        cie.personality = self.read_encoded(cursor, encoding, address_size)?;
                    }
                    b'R' => cie.fde_encoding = cursor.read_u8()?,
                    b'S' => cie.signal_frame = true,
                    // An unknown letter: the length prefix still lets us
                    // skip whatever it describes.
                    _ => break,
                }
            }
            cursor.set_position(aug_end);
        }

        let instr_offset = cursor.position() as u64;
        let instr_end = usize::try_from(end).map_err(|_| DwarfErrorKind::Overflow)?;
        cie.initial_instructions = self
            .data
            .get(cursor.position()..instr_end)
            .ok_or(DwarfErrorKind::Truncated)?;
        cie.initial_instructions_offset = instr_offset;
        Ok(cie)
    }

    fn parse_fde(
        &self,
        cursor: &mut Cursor<'data>,
        offset: u64,
        end: u64,
        cie_offset: u64,
        cie: &Cie<'data>,
    ) -> Result<Fde<'data>, DwarfError> {
        if cie.segment_size != 0 {
            cursor.skip(cie.segment_size.into())?;
        }

        let (initial_location, address_range) = if self.is_eh {
            let begin = self
                .read_encoded(cursor, cie.fde_encoding, cie.address_size)?
                .ok_or(DwarfErrorKind::BadEnumValue("fde address encoding"))?;
            // The range is always absolute, only the value format applies.
            let range = self
                .read_encoded(cursor, cie.fde_encoding & 0x0f, cie.address_size)?
                .ok_or(DwarfErrorKind::BadEnumValue("fde address encoding"))?;
            (begin, range)
        } else {
            (
                cursor.read_address(cie.address_size)?,
                cursor.read_address(cie.address_size)?,
            )
        };

        let mut lsda = None;
        if cie.has_augmentation_data {
            let aug_len = cursor.read_uleb128()?;
            let aug_len = usize::try_from(aug_len).map_err(|_| DwarfErrorKind::Overflow)?;
            let aug_end = cursor.position() + aug_len;
            if let Some(encoding) = cie.lsda_encoding {
                lsda = self.read_encoded(cursor, encoding, cie.address_size)?;
            }
            cursor.set_position(aug_end);
        }

        let instr_offset = cursor.position() as u64;
        let instr_end = usize::try_from(end).map_err(|_| DwarfErrorKind::Overflow)?;
        let instructions = self
            .data
            .get(cursor.position()..instr_end)
            .ok_or(DwarfErrorKind::Truncated)?;

        Ok(Fde {
            offset,
            cie_offset,
            initial_location,
            address_range,
            lsda,
            instructions,
            instructions_offset: instr_offset,
        })
    }

    /// Reads a pointer encoded per the `DW_EH_PE_*` scheme.
    ///
    /// Returns `None` for `DW_EH_PE_omit`. A `pcrel` pointer is relative
    /// to its own location in the loaded section.
    fn read_encoded(
        &self,
        cursor: &mut Cursor<'_>,
        encoding: u8,
        address_size: u8,
    ) -> Result<Option<u64>, DwarfError> {
        if encoding == c::DW_EH_PE_omit {
            return Ok(None);
        }

        if encoding & 0x70 == c::DW_EH_PE_aligned {
            let align = usize::from(address_size);
            let misalign = cursor.position() % align;
            if misalign != 0 {
                cursor.skip(align - misalign)?;
            }
        }

        let field_address = self.section_address + cursor.position() as u64;

        let value = match encoding & 0x0f {
            c::DW_EH_PE_absptr => cursor.read_address(address_size)?,
            c::DW_EH_PE_uleb128 => cursor.read_uleb128()?,
            c::DW_EH_PE_udata2 => cursor.read_u16()?.into(),
            c::DW_EH_PE_udata4 => cursor.read_u32()?.into(),
            c::DW_EH_PE_udata8 => cursor.read_u64()?,
            c::DW_EH_PE_sleb128 => cursor.read_sleb128()? as u64,
            c::DW_EH_PE_sdata2 => cursor.read_i16()? as u64,
            c::DW_EH_PE_sdata4 => cursor.read_i32()? as u64,
            c::DW_EH_PE_sdata8 => cursor.read_i64()? as u64,
            _ => {
                return Err(DwarfErrorKind::UnknownOpcode {
                    section: ".eh_frame",
                    opcode: encoding,
                }
                .into())
            }
        };

        let value = match encoding & 0x70 {
            c::DW_EH_PE_pcrel => value.wrapping_add(field_address),
            c::DW_EH_PE_datarel => value.wrapping_add(self.section_address),
            // textrel and funcrel bases are not available to a static
            // reader; the raw value is the best we can report.
            _ => value,
        };

        Ok(Some(value))
    }
}

/// Fallible iterator over the entries of a [`FrameSection`].
pub struct EntryIter<'data> {
    section: FrameSection<'data>,
    offset: u64,
    done: bool,
}

impl<'data> FallibleIterator for EntryIter<'data> {
    type Item = Entry<'data>;
    type Error = DwarfError;

    fn next(&mut self) -> Result<Option<Entry<'data>>, DwarfError> {
        if self.done {
            return Ok(None);
        }
        match self.section.parse_entry(self.offset) {
            Ok(Some(entry)) => {
                let end = match &entry {
                    Entry::Cie(cie) => {
                        cie.initial_instructions_offset + cie.initial_instructions.len() as u64
                    }
                    Entry::Fde(fde) => fde.instructions_offset + fde.instructions.len() as u64,
                };
                self.offset = end;
                Ok(Some(entry))
            }
            Ok(None) => {
                self.done = true;
                Ok(None)
            }
            Err(err) => {
                self.done = true;
                Err(err)
            }
        }
    }
}

/// The rule for recovering one register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterRule<'data> {
    /// The register is not preserved; its value is lost.
    Undefined,
    /// The register keeps its value across the call.
    SameValue,
    /// Saved at `CFA + offset`.
    Offset(i64),
    /// The value is `CFA + offset` itself.
    ValOffset(i64),
    /// Saved in another register.
    Register(u64),
    /// Saved at the address an expression computes.
    Expression(&'data [u8]),
    /// The value an expression computes.
    ValExpression(&'data [u8]),
}

/// The rule for computing the canonical frame address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CfaRule<'data> {
    /// No rule has been established.
    Unspecified,
    /// `CFA = register + offset`.
    RegisterOffset {
        /// The base register.
        register: u64,
        /// The signed offset.
        offset: i64,
    },
    /// An expression computes the CFA.
    Expression(&'data [u8]),
}

/// The register-rule table in force at one program counter.
#[derive(Clone, Debug)]
pub struct FrameRules<'data> {
    /// The CFA computation rule.
    pub cfa: CfaRule<'data>,
    registers: BTreeMap<u64, RegisterRule<'data>>,
    /// Bytes of callee arguments on the stack (`DW_CFA_GNU_args_size`).
    pub args_size: u64,
}

impl<'data> FrameRules<'data> {
    fn new() -> Self {
        FrameRules {
            cfa: CfaRule::Unspecified,
            registers: BTreeMap::new(),
            args_size: 0,
        }
    }

    /// The rule for `register`; registers never mentioned are `None`
    /// ("unspecified" in DWARF terms).
    pub fn register(&self, register: u64) -> Option<RegisterRule<'data>> {
        self.registers.get(&register).copied()
    }

    /// All mentioned registers and their rules, in register order.
    pub fn registers(&self) -> impl Iterator<Item = (u64, RegisterRule<'data>)> + '_ {
        self.registers.iter().map(|(&reg, &rule)| (reg, rule))
    }
}

/// Executes CFI programs to produce register-rule tables.
pub struct Unwinder<'data> {
    section: FrameSection<'data>,
    cie: Cie<'data>,
    rules: FrameRules<'data>,
    initial: Option<FrameRules<'data>>,
    stack: Vec<FrameRules<'data>>,
    loc: u64,
}

impl<'data> Unwinder<'data> {
    /// Prepares an unwinder for one CIE.
    pub fn new(section: &FrameSection<'data>, cie: &Cie<'data>) -> Self {
        Unwinder {
            section: *section,
            cie: *cie,
            rules: FrameRules::new(),
            initial: None,
            stack: Vec::new(),
            loc: 0,
        }
    }

    /// Computes the rules in force at `pc` within `fde`.
    ///
    /// The CIE's initial instructions run first, their result seeds the
    /// restore rules, then the FDE program runs until it advances past
    /// `pc`.
    pub fn rules_at(&mut self, fde: &Fde<'data>, pc: u64) -> Result<FrameRules<'data>, DwarfError> {
        self.rules = FrameRules::new();
        self.initial = None;
        self.stack.clear();
        self.loc = fde.initial_location;

        self.run(
            self.cie.initial_instructions,
            self.cie.initial_instructions_offset,
            None,
        )?;
        self.initial = Some(self.rules.clone());

        self.loc = fde.initial_location;
        self.run(fde.instructions, fde.instructions_offset, Some(pc))?;
        Ok(self.rules.clone())
    }

    /// Computes the rules in force at the FDE's entry point.
    pub fn entry_rules(&mut self, fde: &Fde<'data>) -> Result<FrameRules<'data>, DwarfError> {
        self.rules_at(fde, fde.initial_location)
    }

    fn run(
        &mut self,
        instructions: &'data [u8],
        instructions_offset: u64,
        stop_after: Option<u64>,
    ) -> Result<(), DwarfError> {
        let mut cursor = Cursor::new(instructions, self.section.endian);
        let code_align = self.cie.code_alignment_factor;
        let data_align = self.cie.data_alignment_factor;

        while !cursor.is_empty() {
            let opcode = cursor.read_u8()?;
            let primary = opcode & 0xc0;
            let low = opcode & 0x3f;

            match primary {
                c::DW_CFA_advance_loc => {
                    self.loc = self.loc.wrapping_add(u64::from(low) * code_align);
                }
                c::DW_CFA_offset => {
                    let offset = cursor.read_uleb128()?;
                    self.set_register(
                        low.into(),
                        RegisterRule::Offset(offset as i64 * data_align),
                    );
                }
                c::DW_CFA_restore => self.restore_register(low.into())?,
                _ => match opcode {
                    c::DW_CFA_nop => {}
                    c::DW_CFA_set_loc => {
                        self.loc = if self.section.is_eh {
                            // The operand is an encoded pointer; pcrel is
                            // relative to its position in the section.
                            let start = usize::try_from(instructions_offset)
                                .map_err(|_| DwarfErrorKind::Overflow)?
                                + cursor.position();
                            let mut at =
                                Cursor::new_at(self.section.data, start, self.section.endian);
                            let value = self
                                .section
                                .read_encoded(&mut at, self.cie.fde_encoding, self.cie.address_size)?
                                .ok_or(DwarfErrorKind::BadEnumValue("set_loc encoding"))?;
                            cursor.skip(at.position() - start)?;
                            value
                        } else {
                            cursor.read_address(self.cie.address_size)?
                        };
                    }
                    c::DW_CFA_advance_loc1 => {
                        let delta = cursor.read_u8()?;
                        self.loc = self.loc.wrapping_add(u64::from(delta) * code_align);
                    }
                    c::DW_CFA_advance_loc2 => {
                        let delta = cursor.read_u16()?;
                        self.loc = self.loc.wrapping_add(u64::from(delta) * code_align);
                    }
                    c::DW_CFA_advance_loc4 => {
                        let delta = cursor.read_u32()?;
                        self.loc = self.loc.wrapping_add(u64::from(delta) * code_align);
                    }
                    c::DW_CFA_offset_extended => {
                        let register = cursor.read_uleb128()?;
                        let offset = cursor.read_uleb128()?;
                        self.set_register(
                            register,
                            RegisterRule::Offset(offset as i64 * data_align),
                        );
                    }
                    c::DW_CFA_restore_extended => {
                        let register = cursor.read_uleb128()?;
                        self.restore_register(register)?;
                    }
                    c::DW_CFA_undefined => {
                        let register = cursor.read_uleb128()?;
                        self.set_register(register, RegisterRule::Undefined);
                    }
                    c::DW_CFA_same_value => {
                        let register = cursor.read_uleb128()?;
                        self.set_register(register, RegisterRule::SameValue);
                    }
                    c::DW_CFA_register => {
                        let register = cursor.read_uleb128()?;
                        let target = cursor.read_uleb128()?;
                        self.set_register(register, RegisterRule::Register(target));
                    }
                    c::DW_CFA_remember_state => self.stack.push(self.rules.clone()),
                    c::DW_CFA_restore_state => {
                        self.rules = self
                            .stack
                            .pop()
                            .ok_or(DwarfErrorKind::BadEnumValue("restore_state"))?;
                    }
                    c::DW_CFA_def_cfa => {
                        let register = cursor.read_uleb128()?;
                        let offset = cursor.read_uleb128()?;
                        self.rules.cfa = CfaRule::RegisterOffset {
                            register,
                            offset: offset as i64,
                        };
                    }
                    c::DW_CFA_def_cfa_sf => {
                        let register = cursor.read_uleb128()?;
                        let offset = cursor.read_sleb128()?;
                        self.rules.cfa = CfaRule::RegisterOffset {
                            register,
                            offset: offset * data_align,
                        };
                    }
                    c::DW_CFA_def_cfa_register => {
                        let register = cursor.read_uleb128()?;
                        match self.rules.cfa {
                            CfaRule::RegisterOffset { offset, .. } => {
                                self.rules.cfa = CfaRule::RegisterOffset { register, offset };
                            }
                            _ => {
                                return Err(
                                    DwarfErrorKind::BadEnumValue("def_cfa_register").into()
                                )
                            }
                        }
                    }
                    c::DW_CFA_def_cfa_offset => {
                        let offset = cursor.read_uleb128()?;
                        match self.rules.cfa {
                            CfaRule::RegisterOffset { register, .. } => {
                                self.rules.cfa = CfaRule::RegisterOffset {
                                    register,
                                    offset: offset as i64,
                                };
                            }
                            _ => {
                                return Err(DwarfErrorKind::BadEnumValue("def_cfa_offset").into())
                            }
                        }
                    }
                    c::DW_CFA_def_cfa_offset_sf => {
                        let offset = cursor.read_sleb128()?;
                        match self.rules.cfa {
                            CfaRule::RegisterOffset { register, .. } => {
                                self.rules.cfa = CfaRule::RegisterOffset {
                                    register,
                                    offset: offset * data_align,
                                };
                            }
                            _ => {
                                return Err(
                                    DwarfErrorKind::BadEnumValue("def_cfa_offset_sf").into()
                                )
                            }
                        }
                    }
                    c::DW_CFA_def_cfa_expression => {
                        let expr = read_block(&mut cursor)?;
                        self.rules.cfa = CfaRule::Expression(expr);
                    }
                    c::DW_CFA_expression => {
                        let register = cursor.read_uleb128()?;
                        let expr = read_block(&mut cursor)?;
                        self.set_register(register, RegisterRule::Expression(expr));
                    }
                    c::DW_CFA_val_expression => {
                        let register = cursor.read_uleb128()?;
                        let expr = read_block(&mut cursor)?;
                        self.set_register(register, RegisterRule::ValExpression(expr));
                    }
                    c::DW_CFA_offset_extended_sf => {
                        let register = cursor.read_uleb128()?;
                        let offset = cursor.read_sleb128()?;
                        self.set_register(register, RegisterRule::Offset(offset * data_align));
                    }
                    c::DW_CFA_val_offset => {
                        let register = cursor.read_uleb128()?;
                        let offset = cursor.read_uleb128()?;
                        self.set_register(
                            register,
                            RegisterRule::ValOffset(offset as i64 * data_align),
                        );
                    }
                    c::DW_CFA_val_offset_sf => {
                        let register = cursor.read_uleb128()?;
                        let offset = cursor.read_sleb128()?;
                        self.set_register(register, RegisterRule::ValOffset(offset * data_align));
                    }
                    c::DW_CFA_GNU_window_save => {
                        // The SPARC register-window convention: the out
                        // registers move to the ins, the locals and ins are
                        // found in the register save area.
                        for register in 8..16u64 {
                            self.set_register(register, RegisterRule::Register(register + 16));
                        }
                        for register in 16..32u64 {
                            let offset = (register - 16) * u64::from(self.cie.address_size);
                            self.set_register(register, RegisterRule::Offset(offset as i64));
                        }
                    }
                    c::DW_CFA_GNU_args_size => {
                        self.rules.args_size = cursor.read_uleb128()?;
                    }
                    c::DW_CFA_GNU_negative_offset_extended => {
                        let register = cursor.read_uleb128()?;
                        let offset = cursor.read_uleb128()?;
                        self.set_register(
                            register,
                            RegisterRule::Offset(-(offset as i64) * data_align),
                        );
                    }
                    other => {
                        return Err(DwarfErrorKind::UnknownOpcode {
                            section: if self.section.is_eh {
                                ".eh_frame"
                            } else {
                                ".debug_frame"
                            },
                            opcode: other,
                        }
                        .into())
                    }
                },
            }

            if let Some(pc) = stop_after {
                if self.loc > pc {
                    break;
                }
            }
        }
        Ok(())
    }

    fn set_register(&mut self, register: u64, rule: RegisterRule<'data>) {
        self.rules.registers.insert(register, rule);
    }

    fn restore_register(&mut self, register: u64) -> Result<(), DwarfError> {
        let initial = self
            .initial
            .as_ref()
            .ok_or(DwarfErrorKind::BadEnumValue("restore in initial instructions"))?;
        match initial.register(register) {
            Some(rule) => self.rules.registers.insert(register, rule),
            None => self.rules.registers.remove(&register),
        };
        Ok(())
    }
}

fn read_block<'data>(cursor: &mut Cursor<'data>) -> Result<&'data [u8], DwarfError> {
    let len = cursor.read_uleb128()?;
    let len = usize::try_from(len).map_err(|_| DwarfErrorKind::Overflow)?;
    Ok(cursor.read_bytes(len)?)
}
