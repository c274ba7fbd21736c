//! The line-number program: header decoding and the row state machine.

use fallible_iterator::FallibleIterator;
use relic_common::{Cursor, Format};

use crate::attr::{decode_value, AttrValue, UnitEncoding};
use crate::abbrev::AttrSpec;
use crate::constants as c;
use crate::{DwarfError, DwarfErrorKind, Sections};

/// One file entry of a line program header.
#[derive(Clone, Copy, Debug)]
pub struct FileEntry<'data> {
    /// The path, in whatever form the producer chose.
    pub path: AttrValue<'data>,
    /// Index into the include directories.
    pub dir_index: u64,
    /// Modification time, when recorded.
    pub mtime: u64,
    /// File size, when recorded.
    pub size: u64,
    /// MD5 digest, when recorded (DWARF 5).
    pub md5: Option<&'data [u8]>,
}

/// A decoded line program header, versions 2 through 5.
#[derive(Clone, Debug)]
pub struct LineHeader<'data> {
    /// Offset of the program within `.debug_line`.
    pub offset: u64,
    /// 32- or 64-bit DWARF.
    pub format: Format,
    /// Version of the line table.
    pub version: u16,
    /// Address size; from the header in v5, from the caller before that.
    pub address_size: u8,
    /// Minimum instruction length.
    pub min_instr_length: u8,
    /// Maximum operations per instruction (VLIW); 1 before v4.
    pub max_ops_per_instruction: u8,
    /// Initial value of the `is_stmt` register.
    pub default_is_stmt: bool,
    /// Smallest line increment a special opcode can encode.
    pub line_base: i8,
    /// Number of line increments a special opcode can encode.
    pub line_range: u8,
    /// First special opcode.
    pub opcode_base: u8,
    /// Operand counts of the standard opcodes, indexed by opcode - 1.
    pub standard_opcode_lengths: Vec<u8>,
    /// Include directories. Index 0 is implicit before v5.
    pub include_directories: Vec<AttrValue<'data>>,
    /// File entries. Index 0 is implicit before v5.
    pub file_names: Vec<FileEntry<'data>>,
    /// Offset of the first program byte, within the section.
    pub program_start: u64,
    /// Offset one past the program, within the section.
    pub end_offset: u64,
}

impl<'data> LineHeader<'data> {
    /// Parses a line program header at `offset` of `.debug_line`.
    ///
    /// `address_size` seeds `DW_LNE_set_address` decoding for versions
    /// before 5, which do not record it themselves.
    pub fn parse(
        sections: &Sections<'data>,
        offset: u64,
        address_size: u8,
    ) -> Result<LineHeader<'data>, DwarfError> {
        let data = sections.debug_line;
        let start = usize::try_from(offset).map_err(|_| DwarfErrorKind::Overflow)?;
        let mut cursor = Cursor::new_at(data, start, sections.endian);

        let (unit_length, format) = cursor.read_initial_length()?;
        let end_offset = (cursor.position() as u64)
            .checked_add(unit_length)
            .ok_or(DwarfErrorKind::Overflow)?;
        if end_offset > data.len() as u64 {
            return Err(DwarfErrorKind::BadLength.into());
        }

        let version = cursor.read_u16()?;
        if !(2..=5).contains(&version) {
            return Err(DwarfErrorKind::UnsupportedVersion {
                section: ".debug_line",
                version,
            }
            .into());
        }

        let mut address_size = address_size;
        if version >= 5 {
            address_size = cursor.read_u8()?;
            let segment_size = cursor.read_u8()?;
            if segment_size != 0 {
                return Err(DwarfErrorKind::BadEnumValue("segment_selector_size").into());
            }
        }
        if address_size != 4 && address_size != 8 {
            return Err(DwarfErrorKind::BadAddressSize(address_size).into());
        }

        let header_length = cursor.read_offset(format)?;
        let program_start = (cursor.position() as u64)
            .checked_add(header_length)
            .ok_or(DwarfErrorKind::Overflow)?;
        if program_start > end_offset {
            return Err(DwarfErrorKind::BadLength.into());
        }

        let min_instr_length = cursor.read_u8()?;
        let max_ops_per_instruction = if version >= 4 { cursor.read_u8()? } else { 1 };
        if max_ops_per_instruction == 0 {
            return Err(DwarfErrorKind::BadZeroField("maximum_operations_per_instruction").into());
        }
        let default_is_stmt = cursor.read_u8()? != 0;
        let line_base = cursor.read_i8()?;
        let line_range = cursor.read_u8()?;
        if line_range == 0 {
            return Err(DwarfErrorKind::BadZeroField("line_range").into());
        }
        let opcode_base = cursor.read_u8()?;

        let mut standard_opcode_lengths = Vec::new();
        for _ in 1..opcode_base {
            standard_opcode_lengths.push(cursor.read_u8()?);
        }

        let encoding = UnitEncoding {
            endian: sections.endian,
            format,
            address_size,
            version,
            unit_offset: 0,
        };

        let mut include_directories = Vec::new();
        let mut file_names = Vec::new();

        if version >= 5 {
            // Directories and files are described by a small schema of
            // (content description, form) pairs.
            let dir_formats = read_entry_formats(&mut cursor)?;
            let dir_count = cursor.read_uleb128()?;
            for _ in 0..dir_count {
                let mut path = None;
                for &(content, ref spec) in &dir_formats {
                    let value = decode_value(&mut cursor, spec, &encoding)?;
                    if content == c::DW_LNCT_path {
                        path = Some(value);
                    }
                }
                include_directories
                    .push(path.ok_or(DwarfErrorKind::BadEnumValue("directory entry"))?);
            }

            let file_formats = read_entry_formats(&mut cursor)?;
            let file_count = cursor.read_uleb128()?;
            for _ in 0..file_count {
                let mut entry = FileEntry {
                    path: AttrValue::String(b""),
                    dir_index: 0,
                    mtime: 0,
                    size: 0,
                    md5: None,
                };
                for &(content, ref spec) in &file_formats {
                    let value = decode_value(&mut cursor, spec, &encoding)?;
                    match content {
                        c::DW_LNCT_path => entry.path = value,
                        c::DW_LNCT_directory_index => entry.dir_index = unsigned_of(&value),
                        c::DW_LNCT_timestamp => entry.mtime = unsigned_of(&value),
                        c::DW_LNCT_size => entry.size = unsigned_of(&value),
                        c::DW_LNCT_MD5 => {
                            if let AttrValue::Data16(digest) = value {
                                entry.md5 = Some(digest);
                            }
                        }
                        _ => {}
                    }
                }
                file_names.push(entry);
            }
        } else {
            // A NUL-terminated list of directories, then file tuples.
            loop {
                let dir = cursor.read_cstr()?;
                if dir.is_empty() {
                    break;
                }
                include_directories.push(AttrValue::String(dir));
            }
            loop {
                let name = cursor.read_cstr()?;
                if name.is_empty() {
                    break;
                }
                file_names.push(FileEntry {
                    path: AttrValue::String(name),
                    dir_index: cursor.read_uleb128()?,
                    mtime: cursor.read_uleb128()?,
                    size: cursor.read_uleb128()?,
                    md5: None,
                });
            }
        }

        Ok(LineHeader {
            offset,
            format,
            version,
            address_size,
            min_instr_length,
            max_ops_per_instruction,
            default_is_stmt,
            line_base,
            line_range,
            opcode_base,
            standard_opcode_lengths,
            include_directories,
            file_names,
            program_start,
            end_offset,
        })
    }

    /// Runs the program, yielding committed rows.
    pub fn rows<'header>(
        &'header self,
        sections: &Sections<'data>,
    ) -> LineRows<'data, 'header> {
        LineRows {
            header: self,
            cursor: Cursor::new_at(
                sections.debug_line,
                usize::try_from(self.program_start).unwrap_or(usize::MAX),
                sections.endian,
            ),
            state: LineRow::new(self),
            done: false,
        }
    }
}

fn read_entry_formats(
    cursor: &mut Cursor<'_>,
) -> Result<Vec<(u64, AttrSpec)>, DwarfError> {
    let count = cursor.read_u8()?;
    let mut formats = Vec::with_capacity(count.into());
    for _ in 0..count {
        let content = cursor.read_uleb128()?;
        let form = cursor.read_uleb128()?;
        formats.push((
            content,
            AttrSpec {
                name: 0,
                form,
                implicit_const: None,
            },
        ));
    }
    Ok(formats)
}

fn unsigned_of(value: &AttrValue<'_>) -> u64 {
    match *value {
        AttrValue::Udata(v) => v,
        AttrValue::Sdata(v) => v as u64,
        _ => 0,
    }
}

/// The line-number state machine registers, which double as an emitted row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineRow {
    /// Program counter.
    pub address: u64,
    /// VLIW operation index within the instruction at `address`.
    pub op_index: u64,
    /// File index.
    pub file: u64,
    /// Source line; 0 means "no line".
    pub line: u64,
    /// Source column; 0 means "no column".
    pub column: u64,
    /// Whether this is a recommended statement boundary.
    pub is_stmt: bool,
    /// Whether this is the start of a basic block.
    pub basic_block: bool,
    /// Whether this row ends a sequence; its address is one past the end.
    pub end_sequence: bool,
    /// Whether this is where a breakpoint for function entry belongs.
    pub prologue_end: bool,
    /// Whether this is where a breakpoint for function exit belongs.
    pub epilogue_begin: bool,
    /// Instruction set architecture register.
    pub isa: u64,
    /// Discriminator register.
    pub discriminator: u64,
}

impl LineRow {
    fn new(header: &LineHeader<'_>) -> Self {
        LineRow {
            address: 0,
            op_index: 0,
            file: 1,
            line: 1,
            column: 0,
            is_stmt: header.default_is_stmt,
            basic_block: false,
            end_sequence: false,
            prologue_end: false,
            epilogue_begin: false,
            isa: 0,
            discriminator: 0,
        }
    }
}

/// Fallible iterator over the rows a line program commits.
pub struct LineRows<'data, 'header> {
    header: &'header LineHeader<'data>,
    cursor: Cursor<'data>,
    state: LineRow,
    done: bool,
}

impl LineRows<'_, '_> {
    fn advance(&mut self, operation_advance: u64) {
        let header = self.header;
        let max_ops = u64::from(header.max_ops_per_instruction);
        let total = self.state.op_index + operation_advance;
        self.state.address = self
            .state
            .address
            .wrapping_add(u64::from(header.min_instr_length) * (total / max_ops));
        self.state.op_index = total % max_ops;
    }

    fn emit(&mut self) -> LineRow {
        let row = self.state;
        self.state.basic_block = false;
        self.state.prologue_end = false;
        self.state.epilogue_begin = false;
        self.state.discriminator = 0;
        row
    }

    fn next_inner(&mut self) -> Result<Option<LineRow>, DwarfError> {
        let header = self.header;
        loop {
            if self.cursor.position() as u64 >= header.end_offset {
                self.done = true;
                return Ok(None);
            }

            let opcode = self.cursor.read_u8()?;
            if opcode >= header.opcode_base {
                // Special opcode: both an address and a line advance.
                let adjusted = u64::from(opcode - header.opcode_base);
                let operation_advance = adjusted / u64::from(header.line_range);
                let line_increment =
                    i64::from(header.line_base) + (adjusted % u64::from(header.line_range)) as i64;
                self.advance(operation_advance);
                self.state.line = self.state.line.wrapping_add(line_increment as u64);
                return Ok(Some(self.emit()));
            }

            match opcode {
                0 => {
                    // Extended opcode, length prefixed.
                    let length = self.cursor.read_uleb128()?;
                    let length = usize::try_from(length).map_err(|_| DwarfErrorKind::Overflow)?;
                    let operand_end = self
                        .cursor
                        .position()
                        .checked_add(length)
                        .ok_or(DwarfErrorKind::Overflow)?;
                    if length == 0 {
                        return Err(DwarfErrorKind::BadZeroField("extended opcode length").into());
                    }
                    let sub_opcode = self.cursor.read_u8()?;
                    match sub_opcode {
                        c::DW_LNE_end_sequence => {
                            self.state.end_sequence = true;
                            let row = self.state;
                            self.state = LineRow::new(header);
                            self.cursor.set_position(operand_end);
                            return Ok(Some(row));
                        }
                        c::DW_LNE_set_address => {
                            self.state.address = self.cursor.read_address(header.address_size)?;
                            self.state.op_index = 0;
                        }
                        c::DW_LNE_define_file if header.version <= 4 => {
                            // Decoded for side effect on the file table; the
                            // borrow rules keep the entry with the caller.
                            let _name = self.cursor.read_cstr()?;
                            let _dir = self.cursor.read_uleb128()?;
                            let _mtime = self.cursor.read_uleb128()?;
                            let _size = self.cursor.read_uleb128()?;
                        }
                        c::DW_LNE_set_discriminator => {
                            self.state.discriminator = self.cursor.read_uleb128()?;
                        }
                        _ => {
                            // Unknown vendor extension: skip its operands.
                        }
                    }
                    self.cursor.set_position(operand_end);
                }
                c::DW_LNS_copy => return Ok(Some(self.emit())),
                c::DW_LNS_advance_pc => {
                    let advance = self.cursor.read_uleb128()?;
                    self.advance(advance);
                }
                c::DW_LNS_advance_line => {
                    let delta = self.cursor.read_sleb128()?;
                    self.state.line = self.state.line.wrapping_add(delta as u64);
                }
                c::DW_LNS_set_file => self.state.file = self.cursor.read_uleb128()?,
                c::DW_LNS_set_column => self.state.column = self.cursor.read_uleb128()?,
                c::DW_LNS_negate_stmt => self.state.is_stmt = !self.state.is_stmt,
                c::DW_LNS_set_basic_block => self.state.basic_block = true,
                c::DW_LNS_const_add_pc => {
                    let adjusted = u64::from(255 - header.opcode_base);
                    self.advance(adjusted / u64::from(header.line_range));
                }
                c::DW_LNS_fixed_advance_pc => {
                    let advance = self.cursor.read_u16()?;
                    self.state.address = self.state.address.wrapping_add(advance.into());
                    self.state.op_index = 0;
                }
                c::DW_LNS_set_prologue_end => self.state.prologue_end = true,
                c::DW_LNS_set_epilogue_begin => self.state.epilogue_begin = true,
                c::DW_LNS_set_isa => self.state.isa = self.cursor.read_uleb128()?,
                other => {
                    // A standard opcode this reader does not know; its
                    // operand count is in the header, so it can be skipped.
                    let operands = header
                        .standard_opcode_lengths
                        .get(usize::from(other) - 1)
                        .copied()
                        .unwrap_or(0);
                    for _ in 0..operands {
                        self.cursor.read_uleb128()?;
                    }
                }
            }
        }
    }
}

impl FallibleIterator for LineRows<'_, '_> {
    type Item = LineRow;
    type Error = DwarfError;

    fn next(&mut self) -> Result<Option<LineRow>, DwarfError> {
        if self.done {
            return Ok(None);
        }
        let result = self.next_inner();
        if result.is_err() {
            self.done = true;
        }
        result
    }
}
