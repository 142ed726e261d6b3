// The structured disassembly payload handed to the host: opcode pieces plus
// a list of tagged arguments, so a front-end can style registers, constants
// and shifts without re-parsing text. The plain-text rendering lives on
// `Instruction::as_asm`; this is its machine-readable sibling.

use serde::{Deserialize, Serialize};

use crate::fields::{Condition, Offset, Operand2, ShiftAmount, ShiftType};
use crate::instructions::{HalfKind, Instruction};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrettyInstr {
    pub opcode_prefix: String,
    pub cond: String,
    pub opcode_suffix: String,
    pub args: Vec<Argument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstantStyle {
    Address,
    UnsignedDecimal,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Argument {
    Register {
        index: usize,
        negative: bool,
        write_back: bool,
    },
    Psr {
        name: String,
        flag_only: bool,
    },
    Shift {
        #[serde(rename = "type")]
        shift_type: String,
        amount: Box<Argument>,
    },
    Constant {
        value: u32,
        style: ConstantStyle,
    },
    RegisterSet {
        registers: Vec<usize>,
        caret: bool,
    },
}

fn register(index: usize) -> Argument {
    Argument::Register { index, negative: false, write_back: false }
}

fn constant(value: u32, style: ConstantStyle) -> Argument {
    Argument::Constant { value, style }
}

/// The shift argument for a register operand, if the shift does anything.
fn shift_argument(shift: ShiftType, amount: ShiftAmount) -> Option<Argument> {
    let (shift, amount) = match (shift, amount) {
        (ShiftType::LSL, ShiftAmount::Fixed(0)) => return None,
        (ShiftType::RRX, _) => (ShiftType::RRX, constant(1, ConstantStyle::UnsignedDecimal)),
        (ShiftType::LSR, ShiftAmount::Fixed(0)) | (ShiftType::ASR, ShiftAmount::Fixed(0)) => {
            (shift, constant(32, ConstantStyle::UnsignedDecimal))
        }
        (_, ShiftAmount::Fixed(n)) => (shift, constant(n, ConstantStyle::UnsignedDecimal)),
        (_, ShiftAmount::Reg(rs)) => (shift, register(rs)),
    };
    Some(Argument::Shift { shift_type: shift.name().to_uppercase(), amount: Box::new(amount) })
}

fn operand2_args(op2: &Operand2, args: &mut Vec<Argument>) {
    match *op2 {
        Operand2::Immediate { value, rotate } => {
            args.push(constant(value.rotate_right(2 * rotate), ConstantStyle::Unknown));
        }
        Operand2::Register { rm, shift, amount } => {
            args.push(register(rm));
            if let Some(arg) = shift_argument(shift, amount) {
                args.push(arg);
            }
        }
    }
}

fn offset_args(offset: &Offset, up: bool, args: &mut Vec<Argument>) {
    match *offset {
        Offset::Immediate(0) => {}
        Offset::Immediate(n) => {
            let value = if up { n } else { n.wrapping_neg() };
            args.push(constant(value, ConstantStyle::UnsignedDecimal));
        }
        Offset::Register { rm, shift, amount } => {
            args.push(Argument::Register { index: rm, negative: !up, write_back: false });
            if let Some(arg) = shift_argument(shift, ShiftAmount::Fixed(amount)) {
                args.push(arg);
            }
        }
    }
}

fn registers_of(rlist: u16) -> Vec<usize> {
    (0..16).filter(|r| rlist >> r & 1 != 0).collect()
}

/// Builds the structured rendering of a decoded instruction. `addr` is the
/// instruction's own address, used for absolute branch targets.
pub fn pretty(instr: &Instruction, cond: Condition, addr: u32) -> PrettyInstr {
    let mut p = PrettyInstr {
        opcode_prefix: String::new(),
        cond: cond.suffix().to_string(),
        opcode_suffix: String::new(),
        args: Vec::new(),
    };
    match *instr {
        Instruction::DataProcessing { op, s, rd, rn, op2 } => {
            p.opcode_prefix = op.mnemonic().to_string();
            if s && !op.is_test() {
                p.opcode_suffix.push('s');
            }
            if !op.is_test() {
                p.args.push(register(rd));
            }
            if op.uses_rn() {
                p.args.push(register(rn));
            }
            operand2_args(&op2, &mut p.args);
        }
        Instruction::Multiply { acc, s, rd, rn, rs, rm } => {
            p.opcode_prefix = String::from(if acc { "mla" } else { "mul" });
            if s {
                p.opcode_suffix.push('s');
            }
            p.args.push(register(rd));
            p.args.push(register(rm));
            p.args.push(register(rs));
            if acc {
                p.args.push(register(rn));
            }
        }
        Instruction::MultiplyLong { signed, acc, s, rd_hi, rd_lo, rs, rm } => {
            p.opcode_prefix = String::from(match (signed, acc) {
                (false, false) => "umull",
                (false, true) => "umlal",
                (true, false) => "smull",
                (true, true) => "smlal",
            });
            if s {
                p.opcode_suffix.push('s');
            }
            p.args.push(register(rd_lo));
            p.args.push(register(rd_hi));
            p.args.push(register(rm));
            p.args.push(register(rs));
        }
        Instruction::Branch { link, offset } => {
            p.opcode_prefix = String::from(if link { "bl" } else { "b" });
            let target = addr.wrapping_add(8).wrapping_add(offset as u32);
            p.args.push(constant(target, ConstantStyle::Address));
        }
        Instruction::BranchExchange { rm } => {
            p.opcode_prefix = String::from("bx");
            p.args.push(register(rm));
        }
        Instruction::SingleTransfer { load, byte, up, writeback, rn, rd, offset, .. } => {
            p.opcode_prefix = String::from(if load { "ldr" } else { "str" });
            if byte {
                p.opcode_suffix.push('b');
            }
            p.args.push(register(rd));
            p.args.push(Argument::Register { index: rn, negative: false, write_back: writeback });
            offset_args(&offset, up, &mut p.args);
        }
        Instruction::HalfTransfer { load, kind, up, writeback, rn, rd, offset, .. } => {
            p.opcode_prefix = String::from(if load { "ldr" } else { "str" });
            p.opcode_suffix = String::from(match kind {
                HalfKind::Unsigned => "h",
                HalfKind::SignedByte => "sb",
                HalfKind::SignedHalf => "sh",
            });
            p.args.push(register(rd));
            p.args.push(Argument::Register { index: rn, negative: false, write_back: writeback });
            offset_args(&offset, up, &mut p.args);
        }
        Instruction::BlockTransfer { load, pre, up, psr, writeback, rn, rlist } => {
            p.opcode_prefix = String::from(if load { "ldm" } else { "stm" });
            p.opcode_suffix = String::from(match (pre, up) {
                (false, true) => "ia",
                (true, true) => "ib",
                (false, false) => "da",
                (true, false) => "db",
            });
            p.args.push(Argument::Register { index: rn, negative: false, write_back: writeback });
            p.args.push(Argument::RegisterSet { registers: registers_of(rlist), caret: psr });
        }
        Instruction::Swap { byte, rd, rm, rn } => {
            p.opcode_prefix = String::from("swp");
            if byte {
                p.opcode_suffix.push('b');
            }
            p.args.push(register(rd));
            p.args.push(register(rm));
            p.args.push(register(rn));
        }
        Instruction::Mrs { rd, src } => {
            p.opcode_prefix = String::from("mrs");
            p.args.push(register(rd));
            p.args.push(Argument::Psr { name: src.name().to_string(), flag_only: false });
        }
        Instruction::Msr { target, flags_only, op } => {
            p.opcode_prefix = String::from("msr");
            p.args.push(Argument::Psr { name: target.name().to_string(), flag_only: flags_only });
            operand2_args(&op, &mut p.args);
        }
        Instruction::Swi { number } => {
            p.opcode_prefix = String::from("swi");
            p.args.push(constant(number, ConstantStyle::UnsignedDecimal));
        }
    }
    p
}
