// Binary decode: picks apart a fetched 32-bit word and builds the rich
// Instruction type for the executor.
//
// ARM v4 encodings, by the top bits after the condition field:
//
// 000 Data processing (register operand) / multiply / swap / halfword / BX / PSR
// 001 Data processing (immediate operand) / MSR immediate
// 010 Single data transfer, immediate offset
// 011 Single data transfer, register offset
// 100 Block data transfer
// 101 Branch / Branch with link
// 111 1111: Software interrupt
//
// The 000 block is heavily aliased, so decoding proceeds from the most
// specific bit signature down, exactly like a hardware decoder would
// prioritise its match lines.

use crate::fields::{DataOp, Offset, Operand2, PsrTarget, ShiftAmount, ShiftType};
use crate::instructions::{HalfKind, Instruction};

// Fixed signatures, most specific first
const _BX: u32 = 0x12fff1;
const _MUL: u32 = 0b000000;
const _MULL: u32 = 0b00001;
const _SWP: u32 = 0b00010;
const _MRS: u32 = 0b001111;
const _PSR: u32 = 0b10;

/// Splits `word` into big-endian bit groups of the given lengths, so the
/// decoder can pattern match whole encodings as slices.
pub fn split_word(word: u32, lengths: &[u32]) -> Vec<u32> {
    debug_assert_eq!(lengths.iter().sum::<u32>(), 32);
    let mut result = Vec::with_capacity(lengths.len());
    let mut shift = 32;
    for &length in lengths {
        shift -= length;
        result.push((word >> shift) & (((1u64 << length) - 1) as u32));
    }
    result
}

fn sign_extend_24(value: u32) -> i32 {
    ((value << 8) as i32) >> 8
}

/// Decodes a 32-bit word into an instruction, or `None` for encodings the
/// ARM v4 instruction set leaves undefined. The condition field is carried
/// by the caller; only bits 27..0 matter here.
pub fn parse_instruction(word: u32) -> Option<Instruction> {
    // Branch and exchange has a full 24-bit signature
    if let [_, _BX, rm] = split_word(word, &[4, 24, 4]).as_slice() {
        return Some(Instruction::BranchExchange { rm: *rm as usize });
    }
    // Multiply: 000000AS .... 1001 ....
    if let [_, _MUL, a, s, rd, rn, rs, 0b1001, rm] = split_word(word, &[4, 6, 1, 1, 4, 4, 4, 4, 4]).as_slice() {
        return Some(Instruction::Multiply {
            acc: *a != 0,
            s: *s != 0,
            rd: *rd as usize,
            rn: *rn as usize,
            rs: *rs as usize,
            rm: *rm as usize,
        });
    }
    // Long multiply: 00001UAS .... 1001 ....
    if let [_, _MULL, u, a, s, rd_hi, rd_lo, rs, 0b1001, rm] =
        split_word(word, &[4, 5, 1, 1, 1, 4, 4, 4, 4, 4]).as_slice()
    {
        return Some(Instruction::MultiplyLong {
            signed: *u != 0,
            acc: *a != 0,
            s: *s != 0,
            rd_hi: *rd_hi as usize,
            rd_lo: *rd_lo as usize,
            rs: *rs as usize,
            rm: *rm as usize,
        });
    }
    // Swap: 00010B00 .... 00001001 ....
    if let [_, _SWP, b, 0b00, rn, rd, 0b00001001, rm] = split_word(word, &[4, 5, 1, 2, 4, 4, 8, 4]).as_slice() {
        return Some(Instruction::Swap {
            byte: *b != 0,
            rd: *rd as usize,
            rm: *rm as usize,
            rn: *rn as usize,
        });
    }
    // Halfword and signed transfers: 000PUIWL .... 1SH1 ....
    if let [_, 0b000, p, u, i, w, l, rn, rd, hi, 1, s, h, 1, lo] =
        split_word(word, &[4, 3, 1, 1, 1, 1, 1, 4, 4, 4, 1, 1, 1, 1, 4]).as_slice()
    {
        if *s != 0 || *h != 0 {
            // signed stores are undefined in ARM v4
            if *l == 0 && *s != 0 {
                return None;
            }
            let kind = match (*s, *h) {
                (0, _) => HalfKind::Unsigned,
                (_, 0) => HalfKind::SignedByte,
                _ => HalfKind::SignedHalf,
            };
            let offset = if *i != 0 {
                Offset::Immediate(hi << 4 | lo)
            } else if *hi == 0 {
                Offset::Register { rm: *lo as usize, shift: ShiftType::LSL, amount: 0 }
            } else {
                return None;
            };
            return Some(Instruction::HalfTransfer {
                load: *l != 0,
                kind,
                pre: *p != 0,
                up: *u != 0,
                writeback: *w != 0,
                rn: *rn as usize,
                rd: *rd as usize,
                offset,
            });
        }
        return None;
    }
    // MRS: 00010P 001111 .... 000000000000
    if let [_, 0b00010, ps, _MRS, rd, 0] = split_word(word, &[4, 5, 1, 6, 4, 12]).as_slice() {
        let src = if *ps != 0 { PsrTarget::Spsr } else { PsrTarget::Cpsr };
        return Some(Instruction::Mrs { rd: *rd as usize, src });
    }
    // MSR, register and immediate forms: 00I10P10 mask 1111 ....
    if let [_, 0b00, 0, _PSR, p, _PSR, mask, 0b1111, 0b00000000, rm] =
        split_word(word, &[4, 2, 1, 2, 1, 2, 4, 4, 8, 4]).as_slice()
    {
        return Some(msr(*p, *mask, Operand2::Register {
            rm: *rm as usize,
            shift: ShiftType::LSL,
            amount: ShiftAmount::Fixed(0),
        }));
    }
    if let [_, 0b00, 1, _PSR, p, _PSR, mask, 0b1111, rotate, value] =
        split_word(word, &[4, 2, 1, 2, 1, 2, 4, 4, 4, 8]).as_slice()
    {
        return Some(msr(*p, *mask, Operand2::Immediate { value: *value, rotate: *rotate }));
    }
    // Data processing: 00I opcode S ....
    if let [_, 0b00, i, opcode, s, rn, rd, operand] = split_word(word, &[4, 2, 1, 4, 1, 4, 4, 12]).as_slice() {
        let op = DataOp::from_bits(*opcode);
        // a test opcode without S is PSR-transfer space, handled above
        if op.is_test() && *s == 0 {
            return None;
        }
        // 1xx1 low nibbles of the register form belong to the multiply and
        // transfer classes matched earlier
        if *i == 0 && operand & 0b1001_0000 == 0b1001_0000 {
            return None;
        }
        let op2 = if *i != 0 {
            Operand2::Immediate { value: operand & 0xff, rotate: operand >> 8 }
        } else {
            register_operand(*operand)
        };
        return Some(Instruction::DataProcessing {
            op,
            s: *s != 0,
            rd: *rd as usize,
            rn: *rn as usize,
            op2,
        });
    }
    // Single data transfer: 01IPUBWL ....
    if let [_, 0b01, i, p, u, b, w, l, rn, rd, operand] =
        split_word(word, &[4, 2, 1, 1, 1, 1, 1, 1, 4, 4, 12]).as_slice()
    {
        let offset = if *i == 0 {
            Offset::Immediate(*operand)
        } else if operand & 0b1_0000 == 0 {
            // register offset shifted by a constant; a register-specified
            // amount is not encodable here
            let shift = ShiftType::from_bits(operand >> 5);
            let amount = operand >> 7 & 0x1f;
            let shift = if shift == ShiftType::ROR && amount == 0 { ShiftType::RRX } else { shift };
            Offset::Register { rm: (operand & 0xf) as usize, shift, amount }
        } else {
            return None;
        };
        return Some(Instruction::SingleTransfer {
            load: *l != 0,
            byte: *b != 0,
            pre: *p != 0,
            up: *u != 0,
            writeback: *w != 0,
            rn: *rn as usize,
            rd: *rd as usize,
            offset,
        });
    }
    // Block data transfer: 100PUSWL ....
    if let [_, 0b100, p, u, s, w, l, rn, rlist] = split_word(word, &[4, 3, 1, 1, 1, 1, 1, 4, 16]).as_slice() {
        return Some(Instruction::BlockTransfer {
            load: *l != 0,
            pre: *p != 0,
            up: *u != 0,
            psr: *s != 0,
            writeback: *w != 0,
            rn: *rn as usize,
            rlist: *rlist as u16,
        });
    }
    // Branch: 101L ....
    if let [_, 0b101, link, offset] = split_word(word, &[4, 3, 1, 24]).as_slice() {
        return Some(Instruction::Branch {
            link: *link != 0,
            offset: sign_extend_24(*offset) << 2,
        });
    }
    // Software interrupt: 1111 ....
    if let [_, 0b1111, number] = split_word(word, &[4, 4, 24]).as_slice() {
        return Some(Instruction::Swi { number: *number });
    }
    None
}

fn msr(p: u32, mask: u32, op: Operand2) -> Instruction {
    let target = if p != 0 { PsrTarget::Spsr } else { PsrTarget::Cpsr };
    // no control-field bit in the mask means a flags-only write
    Instruction::Msr { target, flags_only: mask & 1 == 0, op }
}

fn register_operand(operand: u32) -> Operand2 {
    let rm = (operand & 0xf) as usize;
    if operand & 0b1_0000 == 0 {
        let amount = operand >> 7 & 0x1f;
        let shift = ShiftType::from_bits(operand >> 5);
        let shift = if shift == ShiftType::ROR && amount == 0 { ShiftType::RRX } else { shift };
        Operand2::Register { rm, shift, amount: ShiftAmount::Fixed(amount) }
    } else {
        Operand2::Register {
            rm,
            shift: ShiftType::from_bits(operand >> 5),
            amount: ShiftAmount::Reg((operand >> 8 & 0xf) as usize),
        }
    }
}
