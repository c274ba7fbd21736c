use fallible_iterator::FallibleIterator;
use relic_common::{Endian, Format};
use relic_dwarf::abbrev::AbbrevCache;
use relic_dwarf::constants as c;
use relic_dwarf::frame::{CfaRule, Entry, FrameSection, RegisterRule, Unwinder};
use relic_dwarf::line::LineHeader;
use relic_dwarf::lists::{ListsHeader, LocIter, Range, RangeIter};
use relic_dwarf::unit::{
    units, DieArena, EntriesCursor, SplitTable, Unit, UnitHeader, UnitType,
};
use relic_dwarf::Sections;
use similar_asserts::assert_eq;

fn uleb(value: u64, out: &mut Vec<u8>) {
    let mut value = value;
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn sleb(value: i64, out: &mut Vec<u8>) {
    let mut value = value;
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
        out.push(if done { byte } else { byte | 0x80 });
        if done {
            break;
        }
    }
}

/// Abbrev table: 1 = compile_unit (children), 2 = subprogram (children,
/// with sibling), 3 = variable (leaf), 4 = subprogram (leaf).
fn sample_abbrev() -> Vec<u8> {
    let mut out = Vec::new();

    uleb(1, &mut out);
    uleb(c::DW_TAG_compile_unit, &mut out);
    out.push(1);
    uleb(c::DW_AT_name, &mut out);
    uleb(c::DW_FORM_string, &mut out);
    uleb(c::DW_AT_low_pc, &mut out);
    uleb(c::DW_FORM_addr, &mut out);
    uleb(0, &mut out);
    uleb(0, &mut out);

    uleb(2, &mut out);
    uleb(c::DW_TAG_subprogram, &mut out);
    out.push(1);
    uleb(c::DW_AT_sibling, &mut out);
    uleb(c::DW_FORM_ref4, &mut out);
    uleb(c::DW_AT_name, &mut out);
    uleb(c::DW_FORM_string, &mut out);
    uleb(0, &mut out);
    uleb(0, &mut out);

    uleb(3, &mut out);
    uleb(c::DW_TAG_variable, &mut out);
    out.push(0);
    uleb(c::DW_AT_name, &mut out);
    uleb(c::DW_FORM_string, &mut out);
    uleb(0, &mut out);
    uleb(0, &mut out);

    uleb(4, &mut out);
    uleb(c::DW_TAG_subprogram, &mut out);
    out.push(0);
    uleb(c::DW_AT_name, &mut out);
    uleb(c::DW_FORM_string, &mut out);
    uleb(0, &mut out);
    uleb(0, &mut out);

    uleb(0, &mut out);
    out
}

/// One DWARF 4 compile unit:
///
/// ```text
/// compile_unit "test.c"
/// ├── subprogram "main" (with DW_AT_sibling)
/// │   └── variable "x"
/// └── subprogram "helper"
/// ```
fn sample_info() -> Vec<u8> {
    let mut body = Vec::new();
    // Header minus the initial length: version, abbrev offset, addr size.
    body.extend_from_slice(&4u16.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes());
    body.push(8);

    let die_offset = |body: &Vec<u8>| body.len() as u32 + 4;

    // Root DIE.
    uleb(1, &mut body);
    body.extend_from_slice(b"test.c\0");
    body.extend_from_slice(&0x1000u64.to_le_bytes());

    // subprogram "main" with a sibling pointer, patched below.
    let _main_offset = die_offset(&body);
    uleb(2, &mut body);
    let sibling_field = body.len();
    body.extend_from_slice(&0u32.to_le_bytes());
    body.extend_from_slice(b"main\0");

    // variable "x".
    uleb(3, &mut body);
    body.extend_from_slice(b"x\0");
    // End of main's children.
    uleb(0, &mut body);

    // subprogram "helper"; this is main's sibling.
    let helper_offset = die_offset(&body);
    uleb(4, &mut body);
    body.extend_from_slice(b"helper\0");
    // End of the root's children.
    uleb(0, &mut body);

    // The sibling form is unit-relative.
    body[sibling_field..sibling_field + 4].copy_from_slice(&helper_offset.to_le_bytes());

    let mut out = Vec::new();
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

fn sample_sections<'a>(info: &'a [u8], abbrev: &'a [u8]) -> Sections<'a> {
    let mut sections = Sections::empty(Endian::Little);
    sections.debug_info = info;
    sections.debug_abbrev = abbrev;
    sections
}

#[test]
fn test_unit_scan() {
    let info = sample_info();
    let abbrev = sample_abbrev();
    let sections = sample_sections(&info, &abbrev);

    let headers: Vec<_> = units(&sections).collect().unwrap();
    assert_eq!(headers.len(), 1);

    let header = headers[0];
    assert_eq!(header.version, 4);
    assert_eq!(header.unit_type, UnitType::Compile);
    assert_eq!(header.address_size, 8);
    assert_eq!(header.format, Format::Dwarf32);
    assert_eq!(header.end_offset, info.len() as u64);
}

#[test]
fn test_two_consecutive_units() {
    let single = sample_info();
    let mut info = single.clone();
    info.extend_from_slice(&single);
    let abbrev = sample_abbrev();
    let sections = sample_sections(&info, &abbrev);

    let headers: Vec<_> = units(&sections).collect().unwrap();
    assert_eq!(headers.len(), 2);
    assert_eq!(headers[1].offset, single.len() as u64);
    assert_eq!(headers[1].end_offset, info.len() as u64);
}

#[test]
fn test_die_tree_walk() {
    let info = sample_info();
    let abbrev = sample_abbrev();
    let sections = sample_sections(&info, &abbrev);

    let cache = AbbrevCache::new();
    let header = units(&sections).next().unwrap().unwrap();
    let table = cache.get(&abbrev, header.abbrev_offset, Endian::Little).unwrap();

    let mut cursor = EntriesCursor::new(&sections, &header, table, false);
    let mut seen = Vec::new();
    while let Some(entry) = cursor.next().unwrap() {
        seen.push((entry.tag(), entry.depth));
    }
    assert_eq!(
        seen,
        vec![
            (c::DW_TAG_compile_unit, 0),
            (c::DW_TAG_subprogram, 1),
            (c::DW_TAG_variable, 2),
            (c::DW_TAG_subprogram, 1),
        ]
    );
}

#[test]
fn test_sibling_skip() {
    let info = sample_info();
    let abbrev = sample_abbrev();
    let sections = sample_sections(&info, &abbrev);

    let cache = AbbrevCache::new();
    let header = units(&sections).next().unwrap().unwrap();
    let table = cache.get(&abbrev, header.abbrev_offset, Endian::Little).unwrap();

    let mut cursor = EntriesCursor::new(&sections, &header, table, false);
    let _root = cursor.next().unwrap().unwrap();
    let main = cursor.next().unwrap().unwrap();
    assert!(main.sibling.is_some());

    // Skipping main's children lands on "helper" without visiting "x".
    cursor.skip_children(&main).unwrap();
    let next = cursor.next().unwrap().unwrap();
    assert_eq!(next.tag(), c::DW_TAG_subprogram);
    assert_eq!(next.depth, 1);
    assert_eq!(Some(next.offset), main.sibling);
}

#[test]
fn test_die_arena_relations() {
    let info = sample_info();
    let abbrev = sample_abbrev();
    let sections = sample_sections(&info, &abbrev);

    let cache = AbbrevCache::new();
    let header = units(&sections).next().unwrap().unwrap();
    let table = cache.get(&abbrev, header.abbrev_offset, Endian::Little).unwrap();

    let arena = DieArena::build(&sections, &header, table, false).unwrap();
    assert_eq!(arena.len(), 4);

    // Ids in depth-first order: 0 root, 1 main, 2 x, 3 helper.
    assert_eq!(arena.parent(0), None);
    assert_eq!(arena.parent(1), Some(0));
    assert_eq!(arena.parent(2), Some(1));
    assert_eq!(arena.parent(3), Some(0));

    assert_eq!(arena.next_sibling(1), Some(3));
    assert_eq!(arena.next_sibling(2), None);
    assert_eq!(arena.next_sibling(3), None);

    let children: Vec<_> = arena.children(0).collect();
    assert_eq!(children, vec![1, 3]);

    let offset = arena.get(3).unwrap().offset;
    assert_eq!(arena.by_offset(offset), Some(3));
}

#[test]
fn test_unit_base_attributes() {
    let info = sample_info();
    let abbrev = sample_abbrev();
    let sections = sample_sections(&info, &abbrev);

    let cache = AbbrevCache::new();
    let header = units(&sections).next().unwrap().unwrap();
    let unit = Unit::parse(&sections, &cache, header, false).unwrap();
    assert_eq!(unit.low_pc, Some(0x1000));
    assert_eq!(unit.dwo_id, None);
}

/// A DWARF 5 unit with the given type and unit id; the single root DIE has
/// no attributes.
fn v5_unit(unit_type: u8, dwo_id: u64) -> (Vec<u8>, Vec<u8>) {
    let mut abbrev = Vec::new();
    uleb(1, &mut abbrev);
    uleb(c::DW_TAG_compile_unit, &mut abbrev);
    abbrev.push(0);
    uleb(0, &mut abbrev);
    uleb(0, &mut abbrev);
    uleb(0, &mut abbrev);

    let mut body = Vec::new();
    body.extend_from_slice(&5u16.to_le_bytes());
    body.push(unit_type);
    body.push(8);
    body.extend_from_slice(&0u32.to_le_bytes());
    body.extend_from_slice(&dwo_id.to_le_bytes());
    uleb(1, &mut body);

    let mut info = Vec::new();
    info.extend_from_slice(&(body.len() as u32).to_le_bytes());
    info.extend_from_slice(&body);
    (info, abbrev)
}

#[test]
fn test_v5_skeleton_header() {
    let (info, abbrev) = v5_unit(c::DW_UT_skeleton, 0xfeed_f00d_dead_beef);
    let sections = sample_sections(&info, &abbrev);

    let header = units(&sections).next().unwrap().unwrap();
    assert_eq!(header.version, 5);
    assert_eq!(header.unit_type, UnitType::Skeleton);
    assert_eq!(header.dwo_id, Some(0xfeed_f00d_dead_beef));
}

#[test]
fn test_skeleton_split_pairing() {
    let (main_info, main_abbrev) = v5_unit(c::DW_UT_skeleton, 0x1122_3344_5566_7788);
    let (split_info, split_abbrev) = v5_unit(c::DW_UT_split_compile, 0x1122_3344_5566_7788);

    let main = sample_sections(&main_info, &main_abbrev);
    let split = sample_sections(&split_info, &split_abbrev);

    let table = SplitTable::pair(&main, &split).unwrap();
    assert_eq!(table.links().len(), 1);
    let link = table.by_id(0x1122_3344_5566_7788).unwrap();
    assert_eq!(link.skeleton, 0);
    assert_eq!(link.split, 0);
}

#[test]
fn test_split_pairing_rejects_mismatched_ids() {
    let (main_info, main_abbrev) = v5_unit(c::DW_UT_skeleton, 1);
    let (split_info, split_abbrev) = v5_unit(c::DW_UT_split_compile, 2);

    let main = sample_sections(&main_info, &main_abbrev);
    let split = sample_sections(&split_info, &split_abbrev);

    let table = SplitTable::pair(&main, &split).unwrap();
    assert!(table.links().is_empty());
    assert!(table.by_id(1).is_none());
}

fn test_unit_header() -> UnitHeader {
    UnitHeader {
        offset: 0,
        unit_length: 0,
        format: Format::Dwarf32,
        version: 4,
        unit_type: UnitType::Compile,
        abbrev_offset: 0,
        address_size: 8,
        dwo_id: None,
        type_signature: None,
        type_offset: None,
        header_size: 11,
        end_offset: 0,
    }
}

fn bare_unit() -> Unit {
    Unit {
        header: test_unit_header(),
        addr_base: None,
        str_offsets_base: None,
        loclists_base: None,
        rnglists_base: None,
        ranges_base: None,
        low_pc: None,
        stmt_list: None,
        dwo_name: None,
        dwo_id: None,
    }
}

#[test]
fn test_rnglists_start_length() {
    // A .debug_rnglists contribution holding DW_RLE_start_length
    // 0x400000+0x20 followed by end_of_list.
    let mut body = Vec::new();
    body.extend_from_slice(&5u16.to_le_bytes());
    body.push(8);
    body.push(0);
    body.extend_from_slice(&0u32.to_le_bytes());
    let entries_at = body.len() as u64 + 4;
    body.push(c::DW_RLE_start_length);
    body.extend_from_slice(&0x40_0000u64.to_le_bytes());
    uleb(0x20, &mut body);
    body.push(c::DW_RLE_end_of_list);

    let mut section = Vec::new();
    section.extend_from_slice(&(body.len() as u32).to_le_bytes());
    section.extend_from_slice(&body);

    let mut sections = Sections::empty(Endian::Little);
    sections.debug_rnglists = &section;

    let header = ListsHeader::parse(&section, 0, Endian::Little, ".debug_rnglists").unwrap();
    assert_eq!(header.version, 5);
    assert_eq!(header.address_size, 8);
    assert_eq!(header.segment_size, 0);
    assert_eq!(header.offset_entry_count, 0);
    assert_eq!(header.entries_offset, entries_at);

    let mut unit = bare_unit();
    unit.header.version = 5;
    let ranges: Vec<_> = RangeIter::rnglists(&sections, &unit, entries_at)
        .unwrap()
        .collect()
        .unwrap();
    assert_eq!(
        ranges,
        vec![Range {
            begin: 0x40_0000,
            end: 0x40_0020
        }]
    );
}

#[test]
fn test_legacy_ranges_with_base_selection() {
    let mut section = Vec::new();
    // Base address selection to 0x40000000, then [0x10, 0x20), then end.
    section.extend_from_slice(&u64::MAX.to_le_bytes());
    section.extend_from_slice(&0x4000_0000u64.to_le_bytes());
    section.extend_from_slice(&0x10u64.to_le_bytes());
    section.extend_from_slice(&0x20u64.to_le_bytes());
    section.extend_from_slice(&0u64.to_le_bytes());
    section.extend_from_slice(&0u64.to_le_bytes());

    let mut sections = Sections::empty(Endian::Little);
    sections.debug_ranges = &section;

    let unit = bare_unit();
    let ranges: Vec<_> = RangeIter::legacy(&sections, &unit, 0)
        .unwrap()
        .collect()
        .unwrap();
    assert_eq!(
        ranges,
        vec![Range {
            begin: 0x4000_0010,
            end: 0x4000_0020
        }]
    );
}

#[test]
fn test_legacy_loclist() {
    let mut section = Vec::new();
    section.extend_from_slice(&0x1000u64.to_le_bytes());
    section.extend_from_slice(&0x1010u64.to_le_bytes());
    section.extend_from_slice(&2u16.to_le_bytes());
    section.extend_from_slice(&[0x30, 0x9f]); // DW_OP_lit0, DW_OP_stack_value
    section.extend_from_slice(&0u64.to_le_bytes());
    section.extend_from_slice(&0u64.to_le_bytes());

    let mut sections = Sections::empty(Endian::Little);
    sections.debug_loc = &section;

    let unit = bare_unit();
    let entries: Vec<_> = LocIter::legacy(&sections, &unit, 0)
        .unwrap()
        .collect()
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].range,
        Some(Range {
            begin: 0x1000,
            end: 0x1010
        })
    );
    assert_eq!(entries[0].expr, &[0x30, 0x9f]);
}

#[test]
fn test_gnu_dwo_loclist() {
    // .debug_addr with two entries, no header (DebugFission layout).
    let mut addr = Vec::new();
    addr.extend_from_slice(&0x5000u64.to_le_bytes());
    addr.extend_from_slice(&0x5040u64.to_le_bytes());

    let mut section = Vec::new();
    section.push(c::DW_LLE_GNU_start_end_entry);
    uleb(0, &mut section);
    uleb(1, &mut section);
    section.extend_from_slice(&1u16.to_le_bytes());
    section.push(0x55); // DW_OP_reg5
    section.push(c::DW_LLE_GNU_end_of_list_entry);

    let mut sections = Sections::empty(Endian::Little);
    sections.debug_loc = &section;
    sections.debug_addr = &addr;

    let unit = bare_unit();
    let entries: Vec<_> = LocIter::gnu_dwo(&sections, &unit, 0)
        .unwrap()
        .collect()
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].range,
        Some(Range {
            begin: 0x5000,
            end: 0x5040
        })
    );
    assert_eq!(entries[0].expr, &[0x55]);
}

/// The minimal line program: set_address 0x10, one special opcode that
/// advances nothing, then end_sequence.
fn minimal_line_section() -> Vec<u8> {
    let mut header = Vec::new();
    header.extend_from_slice(&4u16.to_le_bytes()); // version

    let mut post = Vec::new();
    post.push(1); // minimum_instruction_length
    post.push(1); // maximum_operations_per_instruction
    post.push(1); // default_is_stmt
    post.push((-5i8) as u8); // line_base
    post.push(14); // line_range
    post.push(13); // opcode_base
    post.extend_from_slice(&[0, 1, 1, 1, 1, 0, 0, 0, 1, 0, 0, 1]);
    post.push(0); // end of include directories
    post.extend_from_slice(b"a.c\0");
    uleb(0, &mut post);
    uleb(0, &mut post);
    uleb(0, &mut post);
    post.push(0); // end of file names

    header.extend_from_slice(&(post.len() as u32).to_le_bytes()); // header_length
    header.extend_from_slice(&post);

    // The program.
    header.extend_from_slice(&[0x00, 0x09, 0x02]);
    header.extend_from_slice(&0x10u64.to_le_bytes());
    header.push(0x12); // special: advance 0 ops, line += 0
    header.extend_from_slice(&[0x00, 0x01, 0x01]); // end_sequence

    let mut section = Vec::new();
    section.extend_from_slice(&(header.len() as u32).to_le_bytes());
    section.extend_from_slice(&header);
    section
}

#[test]
fn test_line_program_minimal() {
    let section = minimal_line_section();
    let mut sections = Sections::empty(Endian::Little);
    sections.debug_line = &section;

    let header = LineHeader::parse(&sections, 0, 8).unwrap();
    assert_eq!(header.version, 4);
    assert_eq!(header.opcode_base, 13);
    assert_eq!(header.line_base, -5);
    assert_eq!(header.line_range, 14);
    assert_eq!(header.file_names.len(), 1);

    let rows: Vec<_> = header.rows(&sections).collect().unwrap();
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0].address, 0x10);
    assert_eq!(rows[0].line, 1);
    assert!(rows[0].is_stmt);
    assert!(!rows[0].end_sequence);

    assert_eq!(rows[1].address, 0x10);
    assert_eq!(rows[1].line, 1);
    assert!(rows[1].end_sequence);
}

#[test]
fn test_line_rows_nondecreasing_within_sequence() {
    let section = minimal_line_section();
    let mut sections = Sections::empty(Endian::Little);
    sections.debug_line = &section;

    let header = LineHeader::parse(&sections, 0, 8).unwrap();
    let rows: Vec<_> = header.rows(&sections).collect().unwrap();

    let mut last = None;
    for row in &rows {
        if let Some(prev) = last {
            assert!(row.address >= prev);
        }
        last = Some(row.address);
        if row.end_sequence {
            last = None;
        }
    }
    assert!(rows.last().unwrap().end_sequence);
}

#[test]
fn test_line_v5_header() {
    let mut header = Vec::new();
    header.extend_from_slice(&5u16.to_le_bytes());
    header.push(8); // address_size
    header.push(0); // segment_selector_size

    let mut post = Vec::new();
    post.push(1); // min_instr
    post.push(1); // max_ops
    post.push(1); // default_is_stmt
    post.push((-5i8) as u8);
    post.push(14);
    post.push(13);
    post.extend_from_slice(&[0, 1, 1, 1, 1, 0, 0, 0, 1, 0, 0, 1]);

    // Directory schema: one (path, string) column; one directory.
    post.push(1);
    uleb(c::DW_LNCT_path, &mut post);
    uleb(c::DW_FORM_string, &mut post);
    uleb(1, &mut post);
    post.extend_from_slice(b"/src\0");

    // File schema: (path, string) and (directory_index, udata); one file.
    post.push(2);
    uleb(c::DW_LNCT_path, &mut post);
    uleb(c::DW_FORM_string, &mut post);
    uleb(c::DW_LNCT_directory_index, &mut post);
    uleb(c::DW_FORM_udata, &mut post);
    uleb(1, &mut post);
    post.extend_from_slice(b"main.c\0");
    uleb(0, &mut post);

    header.extend_from_slice(&(post.len() as u32).to_le_bytes());
    header.extend_from_slice(&post);
    header.extend_from_slice(&[0x00, 0x01, 0x01]); // end_sequence

    let mut section = Vec::new();
    section.extend_from_slice(&(header.len() as u32).to_le_bytes());
    section.extend_from_slice(&header);

    let mut sections = Sections::empty(Endian::Little);
    sections.debug_line = &section;

    let parsed = LineHeader::parse(&sections, 0, 4).unwrap();
    assert_eq!(parsed.version, 5);
    assert_eq!(parsed.address_size, 8);
    assert_eq!(parsed.include_directories.len(), 1);
    assert_eq!(parsed.file_names.len(), 1);
    assert_eq!(parsed.file_names[0].dir_index, 0);
}

/// One CIE and one FDE in `.debug_frame`, x86-64 flavored.
fn sample_debug_frame() -> Vec<u8> {
    let mut cie_body = Vec::new();
    cie_body.extend_from_slice(&u32::MAX.to_le_bytes()); // CIE id
    cie_body.push(1); // version
    cie_body.push(0); // empty augmentation
    uleb(1, &mut cie_body); // code alignment
    sleb(-8, &mut cie_body); // data alignment
    cie_body.push(16); // return address register
    // def_cfa rsp+8; ra saved at cfa-8.
    cie_body.push(c::DW_CFA_def_cfa);
    uleb(7, &mut cie_body);
    uleb(8, &mut cie_body);
    cie_body.push(c::DW_CFA_offset | 16);
    uleb(1, &mut cie_body);

    let mut out = Vec::new();
    out.extend_from_slice(&(cie_body.len() as u32).to_le_bytes());
    out.extend_from_slice(&cie_body);

    let mut fde_body = Vec::new();
    fde_body.extend_from_slice(&0u32.to_le_bytes()); // CIE offset
    fde_body.extend_from_slice(&0x1000u64.to_le_bytes()); // initial location
    fde_body.extend_from_slice(&0x100u64.to_le_bytes()); // address range
    fde_body.push(c::DW_CFA_advance_loc | 4);
    fde_body.push(c::DW_CFA_def_cfa_offset);
    uleb(16, &mut fde_body);

    out.extend_from_slice(&(fde_body.len() as u32).to_le_bytes());
    out.extend_from_slice(&fde_body);
    out
}

#[test]
fn test_debug_frame_entries() {
    let data = sample_debug_frame();
    let section = FrameSection::debug_frame(&data, Endian::Little, 8);

    let entries: Vec<_> = section.entries().collect().unwrap();
    assert_eq!(entries.len(), 2);

    let cie = match &entries[0] {
        Entry::Cie(cie) => *cie,
        other => panic!("expected CIE, got {other:?}"),
    };
    assert_eq!(cie.code_alignment_factor, 1);
    assert_eq!(cie.data_alignment_factor, -8);
    assert_eq!(cie.return_address_register, 16);

    let fde = match &entries[1] {
        Entry::Fde(fde) => *fde,
        other => panic!("expected FDE, got {other:?}"),
    };
    assert_eq!(fde.initial_location, 0x1000);
    assert_eq!(fde.address_range, 0x100);
    assert!(fde.contains(0x10ff));
    assert!(!fde.contains(0x1100));
}

#[test]
fn test_frame_rules_at_pc() {
    let data = sample_debug_frame();
    let section = FrameSection::debug_frame(&data, Endian::Little, 8);
    let (cie, fde) = section.fde_for(0x1000).unwrap().unwrap();

    let mut unwinder = Unwinder::new(&section, &cie);

    // At the entry point the CIE program is in force.
    let rules = unwinder.entry_rules(&fde).unwrap();
    assert_eq!(
        rules.cfa,
        CfaRule::RegisterOffset {
            register: 7,
            offset: 8
        }
    );
    assert_eq!(rules.register(16), Some(RegisterRule::Offset(-8)));
    // The CFA rule at the entry PC must be established.
    assert!(rules.cfa != CfaRule::Unspecified);

    // Past the first advance the FDE widened the CFA offset.
    let rules = unwinder.rules_at(&fde, 0x1004).unwrap();
    assert_eq!(
        rules.cfa,
        CfaRule::RegisterOffset {
            register: 7,
            offset: 16
        }
    );
    // The register rule carries over from the initial instructions.
    assert_eq!(rules.register(16), Some(RegisterRule::Offset(-8)));
}

#[test]
fn test_eh_frame_with_augmentation() {
    let section_address = 0x2000u64;

    let mut cie_body = Vec::new();
    cie_body.extend_from_slice(&0u32.to_le_bytes()); // CIE id in .eh_frame
    cie_body.push(1);
    cie_body.extend_from_slice(b"zR\0");
    uleb(1, &mut cie_body);
    sleb(-8, &mut cie_body);
    cie_body.push(16);
    uleb(1, &mut cie_body); // augmentation data length
    cie_body.push(c::DW_EH_PE_pcrel | c::DW_EH_PE_sdata4);
    cie_body.push(c::DW_CFA_def_cfa);
    uleb(7, &mut cie_body);
    uleb(8, &mut cie_body);

    let mut out = Vec::new();
    out.extend_from_slice(&(cie_body.len() as u32).to_le_bytes());
    out.extend_from_slice(&cie_body);

    let fde_offset = out.len() as u64;
    let mut fde_body = Vec::new();
    // Distance back to the CIE from this field.
    fde_body.extend_from_slice(&((fde_offset + 4) as u32).to_le_bytes());
    // initial_location, pcrel sdata4: the field sits at
    // section_address + fde_offset + 8.
    let field_address = section_address + fde_offset + 8;
    let target = 0x3000i64;
    fde_body.extend_from_slice(&((target - field_address as i64) as i32).to_le_bytes());
    fde_body.extend_from_slice(&0x40u32.to_le_bytes()); // address range
    uleb(0, &mut fde_body); // augmentation data length

    out.extend_from_slice(&(fde_body.len() as u32).to_le_bytes());
    out.extend_from_slice(&fde_body);
    // .eh_frame terminator.
    out.extend_from_slice(&0u32.to_le_bytes());

    let section = FrameSection::eh_frame(&out, Endian::Little, 8, section_address);
    let entries: Vec<_> = section.entries().collect().unwrap();
    assert_eq!(entries.len(), 2);

    match &entries[0] {
        Entry::Cie(cie) => {
            assert!(cie.has_augmentation_data);
            assert_eq!(cie.fde_encoding, c::DW_EH_PE_pcrel | c::DW_EH_PE_sdata4);
        }
        other => panic!("expected CIE, got {other:?}"),
    }
    match &entries[1] {
        Entry::Fde(fde) => {
            assert_eq!(fde.initial_location, 0x3000);
            assert_eq!(fde.address_range, 0x40);
        }
        other => panic!("expected FDE, got {other:?}"),
    }
}

#[test]
fn test_rnglistx_resolution() {
    // A contribution with a one-entry offsets array; index 0 resolves
    // through the array into the list body.
    let mut body = Vec::new();
    body.extend_from_slice(&5u16.to_le_bytes());
    body.push(8);
    body.push(0);
    body.extend_from_slice(&1u32.to_le_bytes()); // offset_entry_count
    body.extend_from_slice(&4u32.to_le_bytes()); // offsets[0]
    body.push(c::DW_RLE_start_length);
    body.extend_from_slice(&0x40_0000u64.to_le_bytes());
    uleb(0x20, &mut body);
    body.push(c::DW_RLE_end_of_list);

    let mut section = Vec::new();
    section.extend_from_slice(&(body.len() as u32).to_le_bytes());
    section.extend_from_slice(&body);

    let mut sections = Sections::empty(Endian::Little);
    sections.debug_rnglists = &section;

    let mut unit = bare_unit();
    unit.header.version = 5;

    let offset = unit.rnglist_offset(&sections, 0).unwrap();
    assert_eq!(offset, 16);

    let ranges: Vec<_> = RangeIter::rnglists(&sections, &unit, offset)
        .unwrap()
        .collect()
        .unwrap();
    assert_eq!(
        ranges,
        vec![Range {
            begin: 0x40_0000,
            end: 0x40_0020
        }]
    );
}

#[test]
fn test_addrx_resolution() {
    // A DWARF 5 .debug_addr contribution: header then two addresses.
    let mut addr = Vec::new();
    addr.extend_from_slice(&20u32.to_le_bytes()); // unit_length
    addr.extend_from_slice(&5u16.to_le_bytes()); // version
    addr.push(8); // address_size
    addr.push(0); // segment_selector_size
    addr.extend_from_slice(&0x7000u64.to_le_bytes());
    addr.extend_from_slice(&0x8000u64.to_le_bytes());

    let mut sections = Sections::empty(Endian::Little);
    sections.debug_addr = &addr;

    let mut unit = bare_unit();
    unit.header.version = 5;

    // With no DW_AT_addr_base the base defaults to one past the header.
    assert_eq!(unit.address(&sections, 0).unwrap(), 0x7000);
    assert_eq!(unit.address(&sections, 1).unwrap(), 0x8000);
    assert!(unit.address(&sections, 2).is_err());
}

#[test]
fn test_str_offsets_resolution() {
    let mut sections = Sections::empty(Endian::Little);

    let debug_str = b"\0hello\0world\0";
    let mut offsets = Vec::new();
    offsets.extend_from_slice(&8u32.to_le_bytes()); // unit_length
    offsets.extend_from_slice(&5u16.to_le_bytes());
    offsets.extend_from_slice(&0u16.to_le_bytes()); // padding
    offsets.extend_from_slice(&1u32.to_le_bytes()); // -> "hello"
    offsets.extend_from_slice(&7u32.to_le_bytes()); // -> "world"

    sections.debug_str = debug_str;
    sections.debug_str_offsets = &offsets;

    let mut unit = bare_unit();
    unit.header.version = 5;

    use relic_dwarf::attr::AttrValue;
    let hello = unit
        .string(&sections, &AttrValue::StrOffsetsIndex(0))
        .unwrap();
    assert_eq!(hello, b"hello");
    let world = unit
        .string(&sections, &AttrValue::StrOffsetsIndex(1))
        .unwrap();
    assert_eq!(world, b"world");
}
