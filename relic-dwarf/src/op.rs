//! DWARF expression interpretation.
//!
//! [`OpIter`] walks an expression block and yields each operation with its
//! decoded operands. Operations that embed a sub-expression expose it via
//! [`Op::subexpression`], which can be fed back into another [`OpIter`]
//! with the same encoding.

use fallible_iterator::FallibleIterator;
use relic_common::Cursor;

use crate::attr::UnitEncoding;
use crate::constants as c;
use crate::{DwarfError, DwarfErrorKind};

/// One decoded operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand<'data> {
    /// The operation takes no operand in this slot.
    None,
    /// An unsigned literal, register number, size, or count.
    Unsigned(u64),
    /// A signed literal or offset.
    Signed(i64),
    /// A machine address.
    Address(u64),
    /// An index into `.debug_addr`.
    AddressIndex(u64),
    /// Raw bytes: an implicit value or a sub-expression.
    Bytes(&'data [u8]),
    /// A reference to a DIE in the same unit (unit-relative offset).
    DieRef(u64),
    /// A reference to a DIE anywhere in `.debug_info`.
    DebugInfoRef(u64),
    /// A branch target resolved to an absolute offset within the block.
    BranchTarget(u64),
}

/// One decoded operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Op<'data> {
    /// Offset of the opcode within the expression block.
    pub offset: u64,
    /// The opcode.
    pub code: u8,
    /// First operand.
    pub op1: Operand<'data>,
    /// Second operand.
    pub op2: Operand<'data>,
}

impl<'data> Op<'data> {
    /// The embedded sub-expression of operations that carry one
    /// (`entry_value`, `implicit_value`, `const_type`).
    pub fn subexpression(&self) -> Option<&'data [u8]> {
        match (self.code, self.op1, self.op2) {
            (c::DW_OP_entry_value | c::DW_OP_GNU_entry_value, Operand::Bytes(bytes), _) => {
                Some(bytes)
            }
            (c::DW_OP_implicit_value, Operand::Bytes(bytes), _) => Some(bytes),
            (c::DW_OP_const_type | c::DW_OP_GNU_const_type, _, Operand::Bytes(bytes)) => {
                Some(bytes)
            }
            _ => None,
        }
    }

    /// The literal value of `DW_OP_lit0..=lit31`, if this is one.
    pub fn literal(&self) -> Option<u64> {
        (c::DW_OP_lit0..=c::DW_OP_lit31)
            .contains(&self.code)
            .then(|| u64::from(self.code - c::DW_OP_lit0))
    }

    /// The register of `DW_OP_reg0..=reg31` or `DW_OP_breg0..=breg31`.
    pub fn register(&self) -> Option<u64> {
        if (c::DW_OP_reg0..=c::DW_OP_reg31).contains(&self.code) {
            Some(u64::from(self.code - c::DW_OP_reg0))
        } else if (c::DW_OP_breg0..=c::DW_OP_breg31).contains(&self.code) {
            Some(u64::from(self.code - c::DW_OP_breg0))
        } else {
            None
        }
    }
}

/// Fallible iterator over the operations of an expression block.
///
/// A malformed operation yields its error and exhausts the iterator.
pub struct OpIter<'data> {
    data: &'data [u8],
    pos: usize,
    encoding: UnitEncoding,
    done: bool,
}

impl<'data> OpIter<'data> {
    /// Creates an interpreter over an expression block.
    pub fn new(data: &'data [u8], encoding: UnitEncoding) -> Self {
        OpIter {
            data,
            pos: 0,
            encoding,
            done: false,
        }
    }
}

impl<'data> FallibleIterator for OpIter<'data> {
    type Item = Op<'data>;
    type Error = DwarfError;

    fn next(&mut self) -> Result<Option<Op<'data>>, DwarfError> {
        if self.done || self.pos >= self.data.len() {
            self.done = true;
            return Ok(None);
        }
        match self.next_inner() {
            Ok(op) => Ok(Some(op)),
            Err(err) => {
                self.done = true;
                Err(err)
            }
        }
    }
}

impl<'data> OpIter<'data> {
    fn next_inner(&mut self) -> Result<Op<'data>, DwarfError> {
        let mut cursor = Cursor::new_at(self.data, self.pos, self.encoding.endian);
        let offset = cursor.position() as u64;
        let code = cursor.read_u8()?;

        let mut op1 = Operand::None;
        let mut op2 = Operand::None;

        match code {
            c::DW_OP_addr => {
                op1 = Operand::Address(cursor.read_address(self.encoding.address_size)?)
            }
            c::DW_OP_const1u => op1 = Operand::Unsigned(cursor.read_u8()?.into()),
            c::DW_OP_const1s => op1 = Operand::Signed(cursor.read_i8()?.into()),
            c::DW_OP_const2u => op1 = Operand::Unsigned(cursor.read_u16()?.into()),
            c::DW_OP_const2s => op1 = Operand::Signed(cursor.read_i16()?.into()),
            c::DW_OP_const4u => op1 = Operand::Unsigned(cursor.read_u32()?.into()),
            c::DW_OP_const4s => op1 = Operand::Signed(cursor.read_i32()?.into()),
            c::DW_OP_const8u => op1 = Operand::Unsigned(cursor.read_u64()?),
            c::DW_OP_const8s => op1 = Operand::Signed(cursor.read_i64()?),
            c::DW_OP_constu => op1 = Operand::Unsigned(cursor.read_uleb128()?),
            c::DW_OP_consts => op1 = Operand::Signed(cursor.read_sleb128()?),
            c::DW_OP_pick | c::DW_OP_deref_size | c::DW_OP_xderef_size => {
                op1 = Operand::Unsigned(cursor.read_u8()?.into())
            }
            c::DW_OP_plus_uconst | c::DW_OP_regx | c::DW_OP_piece => {
                op1 = Operand::Unsigned(cursor.read_uleb128()?)
            }
            c::DW_OP_fbreg => op1 = Operand::Signed(cursor.read_sleb128()?),
            c::DW_OP_bregx => {
                op1 = Operand::Unsigned(cursor.read_uleb128()?);
                op2 = Operand::Signed(cursor.read_sleb128()?);
            }
            c::DW_OP_bit_piece => {
                op1 = Operand::Unsigned(cursor.read_uleb128()?);
                op2 = Operand::Unsigned(cursor.read_uleb128()?);
            }
            c::DW_OP_skip | c::DW_OP_bra => {
                let displacement = cursor.read_i16()?;
                let after = cursor.position() as i64;
                let target = after
                    .checked_add(displacement.into())
                    .filter(|&t| t >= 0)
                    .ok_or(DwarfErrorKind::Overflow)?;
                op1 = Operand::BranchTarget(target as u64);
            }
            c::DW_OP_implicit_value => {
                let len = read_block_len(&mut cursor)?;
                op1 = Operand::Bytes(cursor.read_bytes(len)?);
            }
            c::DW_OP_implicit_pointer | c::DW_OP_GNU_implicit_pointer => {
                let die = if self.encoding.version == 2 {
                    cursor.read_address(self.encoding.address_size)?
                } else {
                    cursor.read_offset(self.encoding.format)?
                };
                op1 = Operand::DebugInfoRef(die);
                op2 = Operand::Signed(cursor.read_sleb128()?);
            }
            c::DW_OP_addrx
            | c::DW_OP_constx
            | c::DW_OP_GNU_addr_index
            | c::DW_OP_GNU_const_index => op1 = Operand::AddressIndex(cursor.read_uleb128()?),
            c::DW_OP_entry_value | c::DW_OP_GNU_entry_value => {
                let len = read_block_len(&mut cursor)?;
                op1 = Operand::Bytes(cursor.read_bytes(len)?);
            }
            c::DW_OP_const_type | c::DW_OP_GNU_const_type => {
                op1 = Operand::DieRef(cursor.read_uleb128()?);
                let len = cursor.read_u8()? as usize;
                op2 = Operand::Bytes(cursor.read_bytes(len)?);
            }
            c::DW_OP_regval_type | c::DW_OP_GNU_regval_type => {
                op1 = Operand::Unsigned(cursor.read_uleb128()?);
                op2 = Operand::DieRef(cursor.read_uleb128()?);
            }
            c::DW_OP_deref_type | c::DW_OP_xderef_type | c::DW_OP_GNU_deref_type => {
                op1 = Operand::Unsigned(cursor.read_u8()?.into());
                op2 = Operand::DieRef(cursor.read_uleb128()?);
            }
            c::DW_OP_convert
            | c::DW_OP_reinterpret
            | c::DW_OP_GNU_convert
            | c::DW_OP_GNU_reinterpret => op1 = Operand::DieRef(cursor.read_uleb128()?),
            c::DW_OP_GNU_parameter_ref => op1 = Operand::DieRef(cursor.read_u32()?.into()),
            c::DW_OP_call2 => op1 = Operand::DieRef(cursor.read_u16()?.into()),
            c::DW_OP_call4 => op1 = Operand::DieRef(cursor.read_u32()?.into()),
            c::DW_OP_call_ref => {
                op1 = Operand::DebugInfoRef(cursor.read_offset(self.encoding.format)?)
            }

            // Single-byte operations, including the literal and register
            // ranges whose operand is implied by the opcode.
            c::DW_OP_deref
            | c::DW_OP_dup
            | c::DW_OP_drop
            | c::DW_OP_over
            | c::DW_OP_swap
            | c::DW_OP_rot
            | c::DW_OP_xderef
            | c::DW_OP_abs
            | c::DW_OP_and
            | c::DW_OP_div
            | c::DW_OP_minus
            | c::DW_OP_mod
            | c::DW_OP_mul
            | c::DW_OP_neg
            | c::DW_OP_not
            | c::DW_OP_or
            | c::DW_OP_plus
            | c::DW_OP_shl
            | c::DW_OP_shr
            | c::DW_OP_shra
            | c::DW_OP_xor
            | c::DW_OP_eq
            | c::DW_OP_ge
            | c::DW_OP_gt
            | c::DW_OP_le
            | c::DW_OP_lt
            | c::DW_OP_ne
            | c::DW_OP_nop
            | c::DW_OP_push_object_address
            | c::DW_OP_form_tls_address
            | c::DW_OP_call_frame_cfa
            | c::DW_OP_stack_value
            | c::DW_OP_GNU_push_tls_address => {}
            code if (c::DW_OP_lit0..=c::DW_OP_lit31).contains(&code) => {}
            code if (c::DW_OP_reg0..=c::DW_OP_reg31).contains(&code) => {}
            code if (c::DW_OP_breg0..=c::DW_OP_breg31).contains(&code) => {
                op1 = Operand::Signed(cursor.read_sleb128()?)
            }

            other => {
                return Err(DwarfErrorKind::UnknownOpcode {
                    section: "expression",
                    opcode: other,
                }
                .into())
            }
        }

        self.pos = cursor.position();
        Ok(Op {
            offset,
            code,
            op1,
            op2,
        })
    }
}

fn read_block_len(cursor: &mut Cursor<'_>) -> Result<usize, DwarfError> {
    let len = cursor.read_uleb128()?;
    usize::try_from(len).map_err(|_| DwarfErrorKind::Overflow.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    use relic_common::{Endian, Format};
    use similar_asserts::assert_eq;

    fn encoding() -> UnitEncoding {
        UnitEncoding {
            endian: Endian::Little,
            format: Format::Dwarf32,
            address_size: 8,
            version: 4,
            unit_offset: 0,
        }
    }

    fn ops(data: &[u8]) -> Vec<Op<'_>> {
        OpIter::new(data, encoding()).collect().unwrap()
    }

    #[test]
    fn test_simple_expression() {
        // DW_OP_fbreg -16, DW_OP_deref
        let decoded = ops(&[c::DW_OP_fbreg, 0x70, c::DW_OP_deref]);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].code, c::DW_OP_fbreg);
        assert_eq!(decoded[0].op1, Operand::Signed(-16));
        assert_eq!(decoded[1].code, c::DW_OP_deref);
        assert_eq!(decoded[1].offset, 2);
    }

    #[test]
    fn test_literals_and_registers() {
        let decoded = ops(&[0x33, 0x55, 0x72, 0x04]);
        assert_eq!(decoded[0].literal(), Some(3));
        assert_eq!(decoded[1].register(), Some(5));
        assert_eq!(decoded[2].code, 0x72); // DW_OP_breg2
        assert_eq!(decoded[2].register(), Some(2));
        assert_eq!(decoded[2].op1, Operand::Signed(4));
    }

    #[test]
    fn test_branch_targets_resolved() {
        // offset 0: DW_OP_lit0
        // offset 1: DW_OP_bra +2  (target = 4 + 2 = 6)
        // offset 4: DW_OP_lit1
        // offset 5: DW_OP_nop
        // offset 6: DW_OP_lit2
        let decoded = ops(&[0x30, c::DW_OP_bra, 0x02, 0x00, 0x31, c::DW_OP_nop, 0x32]);
        assert_eq!(decoded[1].op1, Operand::BranchTarget(6));

        // A backward skip: offset 1 + 3 operand bytes = 4, displacement -4.
        let decoded = ops(&[0x30, c::DW_OP_skip, 0xfc, 0xff, 0x30]);
        assert_eq!(decoded[1].op1, Operand::BranchTarget(0));
    }

    #[test]
    fn test_implicit_value_block() {
        let decoded = ops(&[c::DW_OP_implicit_value, 0x03, 0xaa, 0xbb, 0xcc]);
        assert_eq!(decoded[0].op1, Operand::Bytes(&[0xaa, 0xbb, 0xcc]));
        assert_eq!(decoded[0].subexpression(), Some(&[0xaa, 0xbb, 0xcc][..]));
    }

    #[test]
    fn test_entry_value_recursion() {
        // entry_value whose sub-expression is DW_OP_reg5.
        let decoded = ops(&[c::DW_OP_GNU_entry_value, 0x01, 0x55]);
        let sub = decoded[0].subexpression().unwrap();
        let inner = OpIter::new(sub, encoding()).collect::<Vec<_>>().unwrap();
        assert_eq!(inner[0].register(), Some(5));
    }

    #[test]
    fn test_typed_ops() {
        // const_type: die ref 0x20, 2-byte constant.
        let decoded = ops(&[c::DW_OP_const_type, 0x20, 0x02, 0x2a, 0x00]);
        assert_eq!(decoded[0].op1, Operand::DieRef(0x20));
        assert_eq!(decoded[0].op2, Operand::Bytes(&[0x2a, 0x00]));

        // regval_type: register 5, die ref 0x30.
        let decoded = ops(&[c::DW_OP_regval_type, 0x05, 0x30]);
        assert_eq!(decoded[0].op1, Operand::Unsigned(5));
        assert_eq!(decoded[0].op2, Operand::DieRef(0x30));

        // convert with the void type (0).
        let decoded = ops(&[c::DW_OP_convert, 0x00]);
        assert_eq!(decoded[0].op1, Operand::DieRef(0));
    }

    #[test]
    fn test_unknown_opcode_exhausts_iterator() {
        let mut iter = OpIter::new(&[0x30, 0x02, 0x30], encoding());
        assert!(iter.next().unwrap().is_some());
        assert!(iter.next().is_err());
        assert!(iter.next().unwrap().is_none());
    }
}
