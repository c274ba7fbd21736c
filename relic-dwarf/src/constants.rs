//! DWARF constants for versions 2 through 5 plus the GNU vendor extensions
//! this toolchain decodes.

#![allow(missing_docs)]

// Unit types (DWARF 5, §7.5.1).
pub const DW_UT_compile: u8 = 0x01;
pub const DW_UT_type: u8 = 0x02;
pub const DW_UT_partial: u8 = 0x03;
pub const DW_UT_skeleton: u8 = 0x04;
pub const DW_UT_split_compile: u8 = 0x05;
pub const DW_UT_split_type: u8 = 0x06;

// Children determination.
pub const DW_CHILDREN_no: u8 = 0x00;
pub const DW_CHILDREN_yes: u8 = 0x01;

// Tags used by the scanner itself; consumers get the raw value either way.
pub const DW_TAG_compile_unit: u64 = 0x11;
pub const DW_TAG_partial_unit: u64 = 0x3c;
pub const DW_TAG_type_unit: u64 = 0x41;
pub const DW_TAG_skeleton_unit: u64 = 0x4a;
pub const DW_TAG_subprogram: u64 = 0x2e;
pub const DW_TAG_variable: u64 = 0x34;
pub const DW_TAG_base_type: u64 = 0x24;
pub const DW_TAG_GNU_call_site: u64 = 0x4109;
pub const DW_TAG_GNU_call_site_parameter: u64 = 0x410a;

// Attributes interpreted by the readers.
pub const DW_AT_sibling: u64 = 0x01;
pub const DW_AT_name: u64 = 0x03;
pub const DW_AT_stmt_list: u64 = 0x10;
pub const DW_AT_low_pc: u64 = 0x11;
pub const DW_AT_high_pc: u64 = 0x12;
pub const DW_AT_language: u64 = 0x13;
pub const DW_AT_comp_dir: u64 = 0x1b;
pub const DW_AT_ranges: u64 = 0x55;
pub const DW_AT_str_offsets_base: u64 = 0x72;
pub const DW_AT_addr_base: u64 = 0x73;
pub const DW_AT_rnglists_base: u64 = 0x74;
pub const DW_AT_dwo_name: u64 = 0x76;
pub const DW_AT_loclists_base: u64 = 0x8c;
pub const DW_AT_GNU_dwo_name: u64 = 0x2130;
pub const DW_AT_GNU_dwo_id: u64 = 0x2131;
pub const DW_AT_GNU_ranges_base: u64 = 0x2132;
pub const DW_AT_GNU_addr_base: u64 = 0x2133;

// Attribute forms (§7.5.6).
pub const DW_FORM_addr: u64 = 0x01;
pub const DW_FORM_block2: u64 = 0x03;
pub const DW_FORM_block4: u64 = 0x04;
pub const DW_FORM_data2: u64 = 0x05;
pub const DW_FORM_data4: u64 = 0x06;
pub const DW_FORM_data8: u64 = 0x07;
pub const DW_FORM_string: u64 = 0x08;
pub const DW_FORM_block: u64 = 0x09;
pub const DW_FORM_block1: u64 = 0x0a;
pub const DW_FORM_data1: u64 = 0x0b;
pub const DW_FORM_flag: u64 = 0x0c;
pub const DW_FORM_sdata: u64 = 0x0d;
pub const DW_FORM_strp: u64 = 0x0e;
pub const DW_FORM_udata: u64 = 0x0f;
pub const DW_FORM_ref_addr: u64 = 0x10;
pub const DW_FORM_ref1: u64 = 0x11;
pub const DW_FORM_ref2: u64 = 0x12;
pub const DW_FORM_ref4: u64 = 0x13;
pub const DW_FORM_ref8: u64 = 0x14;
pub const DW_FORM_ref_udata: u64 = 0x15;
pub const DW_FORM_indirect: u64 = 0x16;
pub const DW_FORM_sec_offset: u64 = 0x17;
pub const DW_FORM_exprloc: u64 = 0x18;
pub const DW_FORM_flag_present: u64 = 0x19;
pub const DW_FORM_strx: u64 = 0x1a;
pub const DW_FORM_addrx: u64 = 0x1b;
pub const DW_FORM_ref_sup4: u64 = 0x1c;
pub const DW_FORM_strp_sup: u64 = 0x1d;
pub const DW_FORM_data16: u64 = 0x1e;
pub const DW_FORM_line_strp: u64 = 0x1f;
pub const DW_FORM_ref_sig8: u64 = 0x20;
pub const DW_FORM_implicit_const: u64 = 0x21;
pub const DW_FORM_loclistx: u64 = 0x22;
pub const DW_FORM_rnglistx: u64 = 0x23;
pub const DW_FORM_ref_sup8: u64 = 0x24;
pub const DW_FORM_strx1: u64 = 0x25;
pub const DW_FORM_strx2: u64 = 0x26;
pub const DW_FORM_strx3: u64 = 0x27;
pub const DW_FORM_strx4: u64 = 0x28;
pub const DW_FORM_addrx1: u64 = 0x29;
pub const DW_FORM_addrx2: u64 = 0x2a;
pub const DW_FORM_addrx3: u64 = 0x2b;
pub const DW_FORM_addrx4: u64 = 0x2c;
pub const DW_FORM_GNU_addr_index: u64 = 0x1f01;
pub const DW_FORM_GNU_str_index: u64 = 0x1f02;
pub const DW_FORM_GNU_ref_alt: u64 = 0x1f20;
pub const DW_FORM_GNU_strp_alt: u64 = 0x1f21;

// Expression opcodes (§7.7.1).
pub const DW_OP_addr: u8 = 0x03;
pub const DW_OP_deref: u8 = 0x06;
pub const DW_OP_const1u: u8 = 0x08;
pub const DW_OP_const1s: u8 = 0x09;
pub const DW_OP_const2u: u8 = 0x0a;
pub const DW_OP_const2s: u8 = 0x0b;
pub const DW_OP_const4u: u8 = 0x0c;
pub const DW_OP_const4s: u8 = 0x0d;
pub const DW_OP_const8u: u8 = 0x0e;
pub const DW_OP_const8s: u8 = 0x0f;
pub const DW_OP_constu: u8 = 0x10;
pub const DW_OP_consts: u8 = 0x11;
pub const DW_OP_dup: u8 = 0x12;
pub const DW_OP_drop: u8 = 0x13;
pub const DW_OP_over: u8 = 0x14;
pub const DW_OP_pick: u8 = 0x15;
pub const DW_OP_swap: u8 = 0x16;
pub const DW_OP_rot: u8 = 0x17;
pub const DW_OP_xderef: u8 = 0x18;
pub const DW_OP_abs: u8 = 0x19;
pub const DW_OP_and: u8 = 0x1a;
pub const DW_OP_div: u8 = 0x1b;
pub const DW_OP_minus: u8 = 0x1c;
pub const DW_OP_mod: u8 = 0x1d;
pub const DW_OP_mul: u8 = 0x1e;
pub const DW_OP_neg: u8 = 0x1f;
pub const DW_OP_not: u8 = 0x20;
pub const DW_OP_or: u8 = 0x21;
pub const DW_OP_plus: u8 = 0x22;
pub const DW_OP_plus_uconst: u8 = 0x23;
pub const DW_OP_shl: u8 = 0x24;
pub const DW_OP_shr: u8 = 0x25;
pub const DW_OP_shra: u8 = 0x26;
pub const DW_OP_xor: u8 = 0x27;
pub const DW_OP_bra: u8 = 0x28;
pub const DW_OP_eq: u8 = 0x29;
pub const DW_OP_ge: u8 = 0x2a;
pub const DW_OP_gt: u8 = 0x2b;
pub const DW_OP_le: u8 = 0x2c;
pub const DW_OP_lt: u8 = 0x2d;
pub const DW_OP_ne: u8 = 0x2e;
pub const DW_OP_skip: u8 = 0x2f;
pub const DW_OP_lit0: u8 = 0x30;
pub const DW_OP_lit31: u8 = 0x4f;
pub const DW_OP_reg0: u8 = 0x50;
pub const DW_OP_reg31: u8 = 0x6f;
pub const DW_OP_breg0: u8 = 0x70;
pub const DW_OP_breg31: u8 = 0x8f;
pub const DW_OP_regx: u8 = 0x90;
pub const DW_OP_fbreg: u8 = 0x91;
pub const DW_OP_bregx: u8 = 0x92;
pub const DW_OP_piece: u8 = 0x93;
pub const DW_OP_deref_size: u8 = 0x94;
pub const DW_OP_xderef_size: u8 = 0x95;
pub const DW_OP_nop: u8 = 0x96;
pub const DW_OP_push_object_address: u8 = 0x97;
pub const DW_OP_call2: u8 = 0x98;
pub const DW_OP_call4: u8 = 0x99;
pub const DW_OP_call_ref: u8 = 0x9a;
pub const DW_OP_form_tls_address: u8 = 0x9b;
pub const DW_OP_call_frame_cfa: u8 = 0x9c;
pub const DW_OP_bit_piece: u8 = 0x9d;
pub const DW_OP_implicit_value: u8 = 0x9e;
pub const DW_OP_stack_value: u8 = 0x9f;
pub const DW_OP_implicit_pointer: u8 = 0xa0;
pub const DW_OP_addrx: u8 = 0xa1;
pub const DW_OP_constx: u8 = 0xa2;
pub const DW_OP_entry_value: u8 = 0xa3;
pub const DW_OP_const_type: u8 = 0xa4;
pub const DW_OP_regval_type: u8 = 0xa5;
pub const DW_OP_deref_type: u8 = 0xa6;
pub const DW_OP_xderef_type: u8 = 0xa7;
pub const DW_OP_convert: u8 = 0xa8;
pub const DW_OP_reinterpret: u8 = 0xa9;
pub const DW_OP_GNU_push_tls_address: u8 = 0xe0;
pub const DW_OP_GNU_implicit_pointer: u8 = 0xf2;
pub const DW_OP_GNU_entry_value: u8 = 0xf3;
pub const DW_OP_GNU_const_type: u8 = 0xf4;
pub const DW_OP_GNU_regval_type: u8 = 0xf5;
pub const DW_OP_GNU_deref_type: u8 = 0xf6;
pub const DW_OP_GNU_convert: u8 = 0xf7;
pub const DW_OP_GNU_reinterpret: u8 = 0xf9;
pub const DW_OP_GNU_parameter_ref: u8 = 0xfa;
pub const DW_OP_GNU_addr_index: u8 = 0xfb;
pub const DW_OP_GNU_const_index: u8 = 0xfc;

// Line number standard opcodes (§6.2.5.2).
pub const DW_LNS_copy: u8 = 0x01;
pub const DW_LNS_advance_pc: u8 = 0x02;
pub const DW_LNS_advance_line: u8 = 0x03;
pub const DW_LNS_set_file: u8 = 0x04;
pub const DW_LNS_set_column: u8 = 0x05;
pub const DW_LNS_negate_stmt: u8 = 0x06;
pub const DW_LNS_set_basic_block: u8 = 0x07;
pub const DW_LNS_const_add_pc: u8 = 0x08;
pub const DW_LNS_fixed_advance_pc: u8 = 0x09;
pub const DW_LNS_set_prologue_end: u8 = 0x0a;
pub const DW_LNS_set_epilogue_begin: u8 = 0x0b;
pub const DW_LNS_set_isa: u8 = 0x0c;

// Line number extended opcodes.
pub const DW_LNE_end_sequence: u8 = 0x01;
pub const DW_LNE_set_address: u8 = 0x02;
pub const DW_LNE_define_file: u8 = 0x03;
pub const DW_LNE_set_discriminator: u8 = 0x04;

// Line number table content descriptions (DWARF 5, §6.2.4.1).
pub const DW_LNCT_path: u64 = 0x1;
pub const DW_LNCT_directory_index: u64 = 0x2;
pub const DW_LNCT_timestamp: u64 = 0x3;
pub const DW_LNCT_size: u64 = 0x4;
pub const DW_LNCT_MD5: u64 = 0x5;

// Range list entries (DWARF 5, §7.25).
pub const DW_RLE_end_of_list: u8 = 0x00;
pub const DW_RLE_base_addressx: u8 = 0x01;
pub const DW_RLE_startx_endx: u8 = 0x02;
pub const DW_RLE_startx_length: u8 = 0x03;
pub const DW_RLE_offset_pair: u8 = 0x04;
pub const DW_RLE_base_address: u8 = 0x05;
pub const DW_RLE_start_end: u8 = 0x06;
pub const DW_RLE_start_length: u8 = 0x07;

// Location list entries (DWARF 5, §7.29).
pub const DW_LLE_end_of_list: u8 = 0x00;
pub const DW_LLE_base_addressx: u8 = 0x01;
pub const DW_LLE_startx_endx: u8 = 0x02;
pub const DW_LLE_startx_length: u8 = 0x03;
pub const DW_LLE_offset_pair: u8 = 0x04;
pub const DW_LLE_default_location: u8 = 0x05;
pub const DW_LLE_base_address: u8 = 0x06;
pub const DW_LLE_start_end: u8 = 0x07;
pub const DW_LLE_start_length: u8 = 0x08;

// DebugFission .debug_loc.dwo entries.
pub const DW_LLE_GNU_end_of_list_entry: u8 = 0x00;
pub const DW_LLE_GNU_base_address_selection_entry: u8 = 0x01;
pub const DW_LLE_GNU_start_end_entry: u8 = 0x02;
pub const DW_LLE_GNU_start_length_entry: u8 = 0x03;

// Call frame instructions (§7.24). High-two-bit opcodes carry their operand
// in the low six bits.
pub const DW_CFA_advance_loc: u8 = 0x40;
pub const DW_CFA_offset: u8 = 0x80;
pub const DW_CFA_restore: u8 = 0xc0;
pub const DW_CFA_nop: u8 = 0x00;
pub const DW_CFA_set_loc: u8 = 0x01;
pub const DW_CFA_advance_loc1: u8 = 0x02;
pub const DW_CFA_advance_loc2: u8 = 0x03;
pub const DW_CFA_advance_loc4: u8 = 0x04;
pub const DW_CFA_offset_extended: u8 = 0x05;
pub const DW_CFA_restore_extended: u8 = 0x06;
pub const DW_CFA_undefined: u8 = 0x07;
pub const DW_CFA_same_value: u8 = 0x08;
pub const DW_CFA_register: u8 = 0x09;
pub const DW_CFA_remember_state: u8 = 0x0a;
pub const DW_CFA_restore_state: u8 = 0x0b;
pub const DW_CFA_def_cfa: u8 = 0x0c;
pub const DW_CFA_def_cfa_register: u8 = 0x0d;
pub const DW_CFA_def_cfa_offset: u8 = 0x0e;
pub const DW_CFA_def_cfa_expression: u8 = 0x0f;
pub const DW_CFA_expression: u8 = 0x10;
pub const DW_CFA_offset_extended_sf: u8 = 0x11;
pub const DW_CFA_def_cfa_sf: u8 = 0x12;
pub const DW_CFA_def_cfa_offset_sf: u8 = 0x13;
pub const DW_CFA_val_offset: u8 = 0x14;
pub const DW_CFA_val_offset_sf: u8 = 0x15;
pub const DW_CFA_val_expression: u8 = 0x16;
pub const DW_CFA_GNU_window_save: u8 = 0x2d;
pub const DW_CFA_GNU_args_size: u8 = 0x2e;
pub const DW_CFA_GNU_negative_offset_extended: u8 = 0x2f;

// Pointer encodings for .eh_frame (LSB psABI).
pub const DW_EH_PE_absptr: u8 = 0x00;
pub const DW_EH_PE_uleb128: u8 = 0x01;
pub const DW_EH_PE_udata2: u8 = 0x02;
pub const DW_EH_PE_udata4: u8 = 0x03;
pub const DW_EH_PE_udata8: u8 = 0x04;
pub const DW_EH_PE_sleb128: u8 = 0x09;
pub const DW_EH_PE_sdata2: u8 = 0x0a;
pub const DW_EH_PE_sdata4: u8 = 0x0b;
pub const DW_EH_PE_sdata8: u8 = 0x0c;
pub const DW_EH_PE_pcrel: u8 = 0x10;
pub const DW_EH_PE_textrel: u8 = 0x20;
pub const DW_EH_PE_datarel: u8 = 0x30;
pub const DW_EH_PE_funcrel: u8 = 0x40;
pub const DW_EH_PE_aligned: u8 = 0x50;
pub const DW_EH_PE_indirect: u8 = 0x80;
pub const DW_EH_PE_omit: u8 = 0xff;
