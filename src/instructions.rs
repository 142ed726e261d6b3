// One variant per ARM v4 instruction class; the parser builds these and the
// processor hands them back here for execution. Flag updates go through
// CpsrFlags so every class states exactly which flags it touches and stays
// silent about the rest.

use crate::fields::{register_name, Condition, DataOp, Mode, Offset, Operand2, PsrTarget, ShiftAmount, ShiftType};
use crate::registers::CpsrFlags;
use crate::processor::CPU;

/// Flavour of a halfword/signed transfer, the SH bits of the encoding.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HalfKind {
    Unsigned,
    SignedByte,
    SignedHalf,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Instruction {
    DataProcessing { op: DataOp, s: bool, rd: usize, rn: usize, op2: Operand2 },
    Multiply { acc: bool, s: bool, rd: usize, rn: usize, rs: usize, rm: usize },
    MultiplyLong { signed: bool, acc: bool, s: bool, rd_hi: usize, rd_lo: usize, rs: usize, rm: usize },
    Branch { link: bool, offset: i32 },
    BranchExchange { rm: usize },
    SingleTransfer { load: bool, byte: bool, pre: bool, up: bool, writeback: bool, rn: usize, rd: usize, offset: Offset },
    HalfTransfer { load: bool, kind: HalfKind, pre: bool, up: bool, writeback: bool, rn: usize, rd: usize, offset: Offset },
    BlockTransfer { load: bool, pre: bool, up: bool, psr: bool, writeback: bool, rn: usize, rlist: u16 },
    Swap { byte: bool, rd: usize, rm: usize, rn: usize },
    Mrs { rd: usize, src: PsrTarget },
    Msr { target: PsrTarget, flags_only: bool, op: Operand2 },
    Swi { number: u32 },
}

impl Instruction {
    pub fn execute(&self, cpu: &mut CPU) {
        match *self {
            Self::DataProcessing { op, s, rd, rn, op2 } => data_processing(cpu, op, s, rd, rn, op2),
            Self::Multiply { acc, s, rd, rn, rs, rm } => multiply(cpu, acc, s, rd, rn, rs, rm),
            Self::MultiplyLong { signed, acc, s, rd_hi, rd_lo, rs, rm } => {
                multiply_long(cpu, signed, acc, s, rd_hi, rd_lo, rs, rm)
            }
            Self::Branch { link, offset } => branch(cpu, link, offset),
            Self::BranchExchange { rm } => branch_exchange(cpu, rm),
            Self::SingleTransfer { load, byte, pre, up, writeback, rn, rd, offset } => {
                single_transfer(cpu, load, byte, pre, up, writeback, rn, rd, offset)
            }
            Self::HalfTransfer { load, kind, pre, up, writeback, rn, rd, offset } => {
                half_transfer(cpu, load, kind, pre, up, writeback, rn, rd, offset)
            }
            Self::BlockTransfer { load, pre, up, psr, writeback, rn, rlist } => {
                block_transfer(cpu, load, pre, up, psr, writeback, rn, rlist)
            }
            Self::Swap { byte, rd, rm, rn } => swap(cpu, byte, rd, rm, rn),
            Self::Mrs { rd, src } => mrs(cpu, rd, src),
            Self::Msr { target, flags_only, op } => msr(cpu, target, flags_only, op),
            Self::Swi { number } => {
                cpu.software_interrupt(number);
                if !cpu.is_waiting() {
                    cpu.cycles(1, 2, 0);
                }
            }
        }
    }
}

/// 33-bit addition: C is the carry out of bit 31, V the signed overflow.
/// Subtraction goes through here as `a + !b + 1`, which makes C the inverted
/// borrow by construction.
fn add_with_flags(a: u32, b: u32, carry: u32) -> (u32, CpsrFlags) {
    let wide = a as u64 + b as u64 + carry as u64;
    let result = wide as u32;
    let mut flags = CpsrFlags::nz(result);
    flags.c = Some(wide >> 32 != 0);
    flags.v = Some((!(a ^ b) & (a ^ result)) >> 31 != 0);
    (result, flags)
}

/// N/Z from the result, C from the shifter, V untouched.
fn logical_flags(result: u32, shifter_carry: bool) -> (u32, CpsrFlags) {
    let mut flags = CpsrFlags::nz(result);
    flags.c = Some(shifter_carry);
    (result, flags)
}

fn data_processing(cpu: &mut CPU, op: DataOp, s: bool, rd: usize, rn: usize, op2: Operand2) {
    let register_shift = matches!(op2, Operand2::Register { amount: ShiftAmount::Reg(_), .. });
    let (operand, shifter_carry) = op2.resolve(cpu);
    let a = cpu.reg(rn);
    let carry = cpu.regs.cpsr().c() as u32;
    let (result, flags) = match op {
        DataOp::AND | DataOp::TST => logical_flags(a & operand, shifter_carry),
        DataOp::EOR | DataOp::TEQ => logical_flags(a ^ operand, shifter_carry),
        DataOp::SUB | DataOp::CMP => add_with_flags(a, !operand, 1),
        DataOp::RSB => add_with_flags(operand, !a, 1),
        DataOp::ADD | DataOp::CMN => add_with_flags(a, operand, 0),
        DataOp::ADC => add_with_flags(a, operand, carry),
        DataOp::SBC => add_with_flags(a, !operand, carry),
        DataOp::RSC => add_with_flags(operand, !a, carry),
        DataOp::ORR => logical_flags(a | operand, shifter_carry),
        DataOp::MOV => logical_flags(operand, shifter_carry),
        DataOp::BIC => logical_flags(a & !operand, shifter_carry),
        DataOp::MVN => logical_flags(!operand, shifter_carry),
    };
    let writes = !op.is_test();
    if writes {
        cpu.set_reg(rd, result);
    }
    if s {
        if writes && rd == 15 {
            // S with a PC destination restores the CPSR from the SPSR
            let mode = cpu.regs.mode();
            if let Some(spsr) = cpu.regs.spsr(mode) {
                cpu.write_cpsr(spsr);
            }
        } else {
            let mut cpsr = cpu.regs.cpsr();
            flags.apply(&mut cpsr);
            cpu.regs.set_cpsr(cpsr);
        }
    }
    cpu.cycles(0, 1, register_shift as u64);
    if writes && rd == 15 {
        cpu.cycles(1, 1, 0);
    }
}

/// Internal cycles taken by the Booth multiplier for a given multiplier
/// value; it terminates early once the significant bits run out.
fn multiplier_cycles(value: u32, signed: bool) -> u64 {
    let all_ones = |mask: u32| signed && value & mask == mask;
    if value & 0xffff_ff00 == 0 || all_ones(0xffff_ff00) {
        1
    } else if value & 0xffff_0000 == 0 || all_ones(0xffff_0000) {
        2
    } else if value & 0xff00_0000 == 0 || all_ones(0xff00_0000) {
        3
    } else {
        4
    }
}

fn multiply(cpu: &mut CPU, acc: bool, s: bool, rd: usize, rn: usize, rs: usize, rm: usize) {
    let multiplier = cpu.reg(rs);
    let mut result = cpu.reg(rm).wrapping_mul(multiplier);
    if acc {
        result = result.wrapping_add(cpu.reg(rn));
    }
    cpu.set_reg(rd, result);
    if s {
        // C and V survive a multiply untouched
        let mut cpsr = cpu.regs.cpsr();
        CpsrFlags::nz(result).apply(&mut cpsr);
        cpu.regs.set_cpsr(cpsr);
    }
    cpu.cycles(0, 1, multiplier_cycles(multiplier, true) + acc as u64);
}

fn multiply_long(cpu: &mut CPU, signed: bool, acc: bool, s: bool, rd_hi: usize, rd_lo: usize, rs: usize, rm: usize) {
    let multiplier = cpu.reg(rs);
    let mut result: u64 = if signed {
        (cpu.reg(rm) as i32 as i64).wrapping_mul(multiplier as i32 as i64) as u64
    } else {
        (cpu.reg(rm) as u64).wrapping_mul(multiplier as u64)
    };
    if acc {
        result = result.wrapping_add((cpu.reg(rd_hi) as u64) << 32 | cpu.reg(rd_lo) as u64);
    }
    cpu.set_reg(rd_lo, result as u32);
    cpu.set_reg(rd_hi, (result >> 32) as u32);
    if s {
        let mut flags = CpsrFlags::new();
        flags.n = Some(result >> 63 != 0);
        flags.z = Some(result == 0);
        let mut cpsr = cpu.regs.cpsr();
        flags.apply(&mut cpsr);
        cpu.regs.set_cpsr(cpsr);
    }
    cpu.cycles(0, 1, multiplier_cycles(multiplier, signed) + 1 + acc as u64);
}

fn branch(cpu: &mut CPU, link: bool, offset: i32) {
    let target = cpu.reg(15).wrapping_add(offset as u32);
    if link {
        // the return address is the instruction after the branch
        let lr = cpu.reg(15).wrapping_sub(4);
        cpu.set_reg(14, lr);
    }
    cpu.set_reg(15, target);
    cpu.cycles(1, 2, 0);
}

fn branch_exchange(cpu: &mut CPU, rm: usize) {
    let target = cpu.reg(rm);
    if target & 1 != 0 {
        cpu.fault("thumb state is not supported");
        return;
    }
    cpu.set_reg(15, target);
    cpu.cycles(1, 2, 0);
}

fn single_transfer(
    cpu: &mut CPU,
    load: bool,
    byte: bool,
    pre: bool,
    up: bool,
    writeback: bool,
    rn: usize,
    rd: usize,
    offset: Offset,
) {
    let base = cpu.reg(rn);
    let resolved = offset.resolve(cpu);
    let indexed = if up { base.wrapping_add(resolved) } else { base.wrapping_sub(resolved) };
    let addr = if pre { indexed } else { base };
    if load {
        let value = if byte { cpu.mem.read_byte(addr) as u32 } else { cpu.mem.read_word(addr) };
        // writeback lands first, so a load into the base register wins
        if !pre || writeback {
            cpu.set_reg(rn, indexed);
        }
        cpu.set_reg(rd, value);
        cpu.cycles(1, 1, 1);
        if rd == 15 {
            cpu.cycles(1, 1, 0);
        }
    } else {
        // a store of the base register happens before writeback and a store
        // of the PC sees the address of the instruction plus 12
        let value = if rd == 15 { cpu.reg(15).wrapping_add(4) } else { cpu.reg(rd) };
        if byte {
            cpu.mem.write_byte(addr, value as u8);
        } else {
            cpu.mem.write_word(addr, value);
        }
        if !pre || writeback {
            cpu.set_reg(rn, indexed);
        }
        cpu.cycles(2, 0, 0);
    }
}

fn half_transfer(
    cpu: &mut CPU,
    load: bool,
    kind: HalfKind,
    pre: bool,
    up: bool,
    writeback: bool,
    rn: usize,
    rd: usize,
    offset: Offset,
) {
    let base = cpu.reg(rn);
    let resolved = offset.resolve(cpu);
    let indexed = if up { base.wrapping_add(resolved) } else { base.wrapping_sub(resolved) };
    let addr = if pre { indexed } else { base };
    if load {
        let value = match kind {
            HalfKind::Unsigned => {
                let half = cpu.mem.read_halfword(addr) as u32;
                if addr & 1 != 0 {
                    half.rotate_right(8)
                } else {
                    half
                }
            }
            HalfKind::SignedByte => cpu.mem.read_signed_byte(addr),
            HalfKind::SignedHalf => {
                if addr & 1 != 0 {
                    cpu.mem.read_signed_byte(addr)
                } else {
                    cpu.mem.read_signed_halfword(addr)
                }
            }
        };
        if !pre || writeback {
            cpu.set_reg(rn, indexed);
        }
        cpu.set_reg(rd, value);
        cpu.cycles(1, 1, 1);
        if rd == 15 {
            cpu.cycles(1, 1, 0);
        }
    } else {
        let value = if rd == 15 { cpu.reg(15).wrapping_add(4) } else { cpu.reg(rd) };
        cpu.mem.write_halfword(addr, value as u16);
        if !pre || writeback {
            cpu.set_reg(rn, indexed);
        }
        cpu.cycles(2, 0, 0);
    }
}

fn block_transfer(cpu: &mut CPU, load: bool, pre: bool, up: bool, psr: bool, writeback: bool, rn: usize, rlist: u16) {
    // an empty register list transfers the whole bank
    let rlist = if rlist == 0 { 0xffff } else { rlist };
    let count = u32::from(rlist.count_ones());
    let total = 4 * count;
    let base = cpu.reg(rn);
    let updated = if up { base.wrapping_add(total) } else { base.wrapping_sub(total) };
    let start = match (pre, up) {
        (false, true) => base,
        (true, true) => base.wrapping_add(4),
        (false, false) => base.wrapping_sub(total).wrapping_add(4),
        (true, false) => base.wrapping_sub(total),
    };
    let pc_in_list = rlist & 0x8000 != 0;
    // S without PC in the list reaches through to the user bank and permits
    // no writeback
    let user_bank = psr && !(load && pc_in_list);
    let lowest = rlist.trailing_zeros() as usize;
    if load {
        if writeback && !user_bank {
            cpu.set_reg(rn, updated);
        }
        let mut addr = start;
        for r in 0..16 {
            if rlist >> r & 1 == 0 {
                continue;
            }
            let value = cpu.mem.read_word(addr);
            if user_bank {
                cpu.regs.set(r, Mode::User, value);
            } else {
                cpu.set_reg(r, value);
            }
            addr = addr.wrapping_add(4);
        }
        if psr && pc_in_list {
            let mode = cpu.regs.mode();
            if let Some(spsr) = cpu.regs.spsr(mode) {
                cpu.write_cpsr(spsr);
            }
        }
        cpu.cycles(1, count as u64, 1);
        if pc_in_list {
            cpu.cycles(1, 1, 0);
        }
    } else {
        let mut addr = start;
        for r in 0..16 {
            if rlist >> r & 1 == 0 {
                continue;
            }
            let value = if r == 15 {
                cpu.reg(15).wrapping_add(4)
            } else if r == rn {
                // the lowest-numbered register goes out before writeback
                // would land, everything else after
                if writeback && r != lowest {
                    updated
                } else {
                    base
                }
            } else if user_bank {
                cpu.regs.get(r, Mode::User)
            } else {
                cpu.reg(r)
            };
            cpu.mem.write_word(addr, value);
            addr = addr.wrapping_add(4);
        }
        if writeback && !user_bank {
            cpu.set_reg(rn, updated);
        }
        cpu.cycles(2, count as u64 - 1, 0);
    }
}

fn swap(cpu: &mut CPU, byte: bool, rd: usize, rm: usize, rn: usize) {
    let addr = cpu.reg(rn);
    if byte {
        let old = cpu.mem.read_byte(addr);
        let new = cpu.reg(rm);
        cpu.mem.write_byte(addr, new as u8);
        cpu.set_reg(rd, old as u32);
    } else {
        let old = cpu.mem.read_word(addr);
        let new = cpu.reg(rm);
        cpu.mem.write_word(addr, new);
        cpu.set_reg(rd, old);
    }
    cpu.cycles(2, 1, 1);
}

fn mrs(cpu: &mut CPU, rd: usize, src: PsrTarget) {
    let value = match src {
        PsrTarget::Cpsr => cpu.regs.cpsr().0,
        // no SPSR exists in user and system mode; such a read yields zero
        PsrTarget::Spsr => cpu.regs.spsr(cpu.regs.mode()).unwrap_or(0),
    };
    cpu.set_reg(rd, value);
    cpu.cycles(0, 1, 0);
}

fn msr(cpu: &mut CPU, target: PsrTarget, flags_only: bool, op: Operand2) {
    let (value, _) = op.resolve(cpu);
    match target {
        PsrTarget::Cpsr => {
            if flags_only {
                let cpsr = cpu.regs.cpsr().with_flag_bits(value);
                cpu.regs.set_cpsr(cpsr);
            } else {
                cpu.write_cpsr(value);
            }
        }
        PsrTarget::Spsr => {
            let mode = cpu.regs.mode();
            if mode.has_spsr() {
                let new = if flags_only {
                    crate::registers::Cpsr(cpu.regs.spsr(mode).unwrap_or(0)).with_flag_bits(value).0
                } else {
                    value
                };
                cpu.regs.set_spsr(mode, new);
            }
        }
    }
    cpu.cycles(0, 1, 0);
}

// --- text rendering ------------------------------------------------------

fn operand2_asm(op2: Operand2) -> String {
    match op2 {
        Operand2::Immediate { value, rotate } => format!("#{}", value.rotate_right(2 * rotate)),
        Operand2::Register { rm, shift, amount } => {
            let rm = register_name(rm);
            match (shift, amount) {
                (ShiftType::LSL, ShiftAmount::Fixed(0)) => rm,
                (ShiftType::RRX, _) => format!("{}, rrx", rm),
                (ShiftType::LSR, ShiftAmount::Fixed(0)) | (ShiftType::ASR, ShiftAmount::Fixed(0)) => {
                    format!("{}, {} #32", rm, shift.name())
                }
                (_, ShiftAmount::Fixed(n)) => format!("{}, {} #{}", rm, shift.name(), n),
                (_, ShiftAmount::Reg(rs)) => format!("{}, {} {}", rm, shift.name(), register_name(rs)),
            }
        }
    }
}

fn address_asm(rn: usize, offset: &Offset, pre: bool, up: bool, writeback: bool) -> String {
    let sign = if up { "" } else { "-" };
    let offset_txt = match *offset {
        Offset::Immediate(0) => String::new(),
        Offset::Immediate(n) => format!(", #{}{}", sign, n),
        Offset::Register { rm, shift, amount } => {
            let reg = format!(", {}{}", sign, register_name(rm));
            match (shift, amount) {
                (ShiftType::LSL, 0) => reg,
                (ShiftType::RRX, _) => format!("{}, rrx", reg),
                (ShiftType::LSR, 0) | (ShiftType::ASR, 0) => format!("{}, {} #32", reg, shift.name()),
                _ => format!("{}, {} #{}", reg, shift.name(), amount),
            }
        }
    };
    if pre {
        format!("[{}{}]{}", register_name(rn), offset_txt, if writeback { "!" } else { "" })
    } else {
        format!("[{}]{}", register_name(rn), offset_txt)
    }
}

fn rlist_asm(rlist: u16, caret: bool) -> String {
    let mut parts = Vec::new();
    let mut r = 0;
    while r < 16 {
        if rlist >> r & 1 != 0 {
            let first = r;
            while r + 1 < 16 && rlist >> (r + 1) & 1 != 0 {
                r += 1;
            }
            if r > first {
                parts.push(format!("{}-{}", register_name(first), register_name(r)));
            } else {
                parts.push(register_name(first));
            }
        }
        r += 1;
    }
    format!("{{{}}}{}", parts.join(", "), if caret { "^" } else { "" })
}

impl Instruction {
    /// Canonical assembly text of the instruction, as shown in the debugger's
    /// disassembly panel. `addr` is the instruction's own address, needed to
    /// print absolute branch targets.
    pub fn as_asm(&self, cond: Condition, addr: u32) -> String {
        let c = cond.suffix();
        match *self {
            Self::DataProcessing { op, s, rd, rn, op2 } => {
                let set = if s && !op.is_test() { "s" } else { "" };
                if op.is_test() {
                    format!("{}{} {}, {}", op.mnemonic(), c, register_name(rn), operand2_asm(op2))
                } else if op.uses_rn() {
                    format!(
                        "{}{}{} {}, {}, {}",
                        op.mnemonic(),
                        c,
                        set,
                        register_name(rd),
                        register_name(rn),
                        operand2_asm(op2)
                    )
                } else {
                    format!("{}{}{} {}, {}", op.mnemonic(), c, set, register_name(rd), operand2_asm(op2))
                }
            }
            Self::Multiply { acc, s, rd, rn, rs, rm } => {
                let set = if s { "s" } else { "" };
                if acc {
                    format!(
                        "mla{}{} {}, {}, {}, {}",
                        c,
                        set,
                        register_name(rd),
                        register_name(rm),
                        register_name(rs),
                        register_name(rn)
                    )
                } else {
                    format!("mul{}{} {}, {}, {}", c, set, register_name(rd), register_name(rm), register_name(rs))
                }
            }
            Self::MultiplyLong { signed, acc, s, rd_hi, rd_lo, rs, rm } => {
                let mnemonic = match (signed, acc) {
                    (false, false) => "umull",
                    (false, true) => "umlal",
                    (true, false) => "smull",
                    (true, true) => "smlal",
                };
                format!(
                    "{}{}{} {}, {}, {}, {}",
                    mnemonic,
                    c,
                    if s { "s" } else { "" },
                    register_name(rd_lo),
                    register_name(rd_hi),
                    register_name(rm),
                    register_name(rs)
                )
            }
            Self::Branch { link, offset } => {
                let target = addr.wrapping_add(8).wrapping_add(offset as u32);
                format!("b{}{} 0x{:x}", if link { "l" } else { "" }, c, target)
            }
            Self::BranchExchange { rm } => format!("bx{} {}", c, register_name(rm)),
            Self::SingleTransfer { load, byte, pre, up, writeback, rn, rd, offset } => format!(
                "{}{}{} {}, {}",
                if load { "ldr" } else { "str" },
                c,
                if byte { "b" } else { "" },
                register_name(rd),
                address_asm(rn, &offset, pre, up, writeback)
            ),
            Self::HalfTransfer { load, kind, pre, up, writeback, rn, rd, offset } => {
                let suffix = match kind {
                    HalfKind::Unsigned => "h",
                    HalfKind::SignedByte => "sb",
                    HalfKind::SignedHalf => "sh",
                };
                format!(
                    "{}{}{} {}, {}",
                    if load { "ldr" } else { "str" },
                    c,
                    suffix,
                    register_name(rd),
                    address_asm(rn, &offset, pre, up, writeback)
                )
            }
            Self::BlockTransfer { load, pre, up, psr, writeback, rn, rlist } => {
                let mode = match (pre, up) {
                    (false, true) => "ia",
                    (true, true) => "ib",
                    (false, false) => "da",
                    (true, false) => "db",
                };
                format!(
                    "{}{}{} {}{}, {}",
                    if load { "ldm" } else { "stm" },
                    c,
                    mode,
                    register_name(rn),
                    if writeback { "!" } else { "" },
                    rlist_asm(rlist, psr)
                )
            }
            Self::Swap { byte, rd, rm, rn } => format!(
                "swp{}{} {}, {}, [{}]",
                c,
                if byte { "b" } else { "" },
                register_name(rd),
                register_name(rm),
                register_name(rn)
            ),
            Self::Mrs { rd, src } => format!("mrs{} {}, {}", c, register_name(rd), src.name()),
            Self::Msr { target, flags_only, op } => format!(
                "msr{} {}{}, {}",
                c,
                target.name(),
                if flags_only { "_flg" } else { "" },
                operand2_asm(op)
            ),
            Self::Swi { number } => format!("swi{} {}", c, number),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::CPU;

    fn cpu() -> CPU {
        CPU::new()
    }

    #[test]
    fn add_sets_carry_and_overflow() {
        let mut cpu = cpu();
        cpu.set_reg(1, 0xffff_ffff);
        Instruction::DataProcessing {
            op: DataOp::ADD,
            s: true,
            rd: 0,
            rn: 1,
            op2: Operand2::Immediate { value: 1, rotate: 0 },
        }
        .execute(&mut cpu);
        assert_eq!(cpu.reg(0), 0);
        let cpsr = cpu.regs.cpsr();
        assert!(cpsr.z() && cpsr.c() && !cpsr.n() && !cpsr.v());

        cpu.set_reg(1, 0x7fff_ffff);
        Instruction::DataProcessing {
            op: DataOp::ADD,
            s: true,
            rd: 0,
            rn: 1,
            op2: Operand2::Immediate { value: 1, rotate: 0 },
        }
        .execute(&mut cpu);
        let cpsr = cpu.regs.cpsr();
        assert!(cpsr.n() && cpsr.v() && !cpsr.c() && !cpsr.z());
    }

    #[test]
    fn subtraction_carry_is_not_borrow() {
        let mut cpu = cpu();
        cpu.set_reg(1, 5);
        let cmp = |imm| Instruction::DataProcessing {
            op: DataOp::CMP,
            s: true,
            rd: 0,
            rn: 1,
            op2: Operand2::Immediate { value: imm, rotate: 0 },
        };
        cmp(3).execute(&mut cpu);
        assert!(cpu.regs.cpsr().c());
        cmp(9).execute(&mut cpu);
        assert!(!cpu.regs.cpsr().c());
        cmp(5).execute(&mut cpu);
        assert!(cpu.regs.cpsr().c() && cpu.regs.cpsr().z());
    }

    #[test]
    fn str_with_base_as_source_stores_original_base() {
        let mut cpu = cpu();
        cpu.set_reg(1, 0x100);
        Instruction::SingleTransfer {
            load: false,
            byte: false,
            pre: true,
            up: true,
            writeback: true,
            rn: 1,
            rd: 1,
            offset: Offset::Immediate(8),
        }
        .execute(&mut cpu);
        assert_eq!(cpu.mem.read_word(0x108), 0x100);
        assert_eq!(cpu.reg(1), 0x108);
    }

    #[test]
    fn ldr_into_base_keeps_loaded_value() {
        let mut cpu = cpu();
        cpu.mem.write_word(0x208, 0xdead_beef);
        cpu.set_reg(1, 0x200);
        Instruction::SingleTransfer {
            load: true,
            byte: false,
            pre: true,
            up: true,
            writeback: true,
            rn: 1,
            rd: 1,
            offset: Offset::Immediate(8),
        }
        .execute(&mut cpu);
        assert_eq!(cpu.reg(1), 0xdead_beef);
    }

    #[test]
    fn empty_rlist_moves_the_whole_bank() {
        let mut cpu = cpu();
        for r in 0..8 {
            cpu.set_reg(r, r as u32 * 11);
        }
        cpu.set_reg(0, 0x1000);
        Instruction::BlockTransfer {
            load: false,
            pre: false,
            up: true,
            psr: false,
            writeback: true,
            rn: 0,
            rlist: 0,
        }
        .execute(&mut cpu);
        assert_eq!(cpu.reg(0), 0x1040);
        assert_eq!(cpu.mem.read_word(0x1004), 11);
        assert_eq!(cpu.mem.read_word(0x101c), 77);
        // the base was the lowest-numbered register, so its original value
        // went out
        assert_eq!(cpu.mem.read_word(0x1000), 0x1000);
    }

    #[test]
    fn stmfd_with_base_first_stores_original_base() {
        let mut cpu = cpu();
        cpu.set_reg(0, 0x2000);
        cpu.set_reg(1, 0x1111);
        // stmfd r0!, {r0, r1} = stmdb
        Instruction::BlockTransfer {
            load: false,
            pre: true,
            up: false,
            psr: false,
            writeback: true,
            rn: 0,
            rlist: 0b11,
        }
        .execute(&mut cpu);
        assert_eq!(cpu.reg(0), 0x1ff8);
        assert_eq!(cpu.mem.read_word(0x1ff8), 0x2000);
        assert_eq!(cpu.mem.read_word(0x1ffc), 0x1111);
    }

    #[test]
    fn long_multiply_accumulates_64_bits() {
        let mut cpu = cpu();
        cpu.set_reg(1, 0xffff_ffff);
        cpu.set_reg(2, 2);
        Instruction::MultiplyLong {
            signed: false,
            acc: false,
            s: false,
            rd_hi: 4,
            rd_lo: 3,
            rs: 2,
            rm: 1,
        }
        .execute(&mut cpu);
        assert_eq!(cpu.reg(3), 0xffff_fffe);
        assert_eq!(cpu.reg(4), 1);

        // smull of two negatives is positive
        cpu.set_reg(1, (-3i32) as u32);
        cpu.set_reg(2, (-4i32) as u32);
        Instruction::MultiplyLong {
            signed: true,
            acc: false,
            s: false,
            rd_hi: 4,
            rd_lo: 3,
            rs: 2,
            rm: 1,
        }
        .execute(&mut cpu);
        assert_eq!(cpu.reg(3), 12);
        assert_eq!(cpu.reg(4), 0);
    }

    #[test]
    fn swap_is_a_read_then_write() {
        let mut cpu = cpu();
        cpu.mem.write_word(0x300, 0xaaaa_bbbb);
        cpu.set_reg(1, 0x1234_5678);
        cpu.set_reg(2, 0x300);
        Instruction::Swap { byte: false, rd: 0, rm: 1, rn: 2 }.execute(&mut cpu);
        assert_eq!(cpu.reg(0), 0xaaaa_bbbb);
        assert_eq!(cpu.mem.read_word(0x300), 0x1234_5678);
    }

    #[test]
    fn renders_canonical_text() {
        let instr = Instruction::DataProcessing {
            op: DataOp::ADD,
            s: true,
            rd: 2,
            rn: 1,
            op2: Operand2::Register { rm: 0, shift: ShiftType::LSL, amount: ShiftAmount::Fixed(3) },
        };
        assert_eq!(instr.as_asm(Condition::AL, 0), "adds r2, r1, r0, lsl #3");
        let instr = Instruction::BlockTransfer {
            load: true,
            pre: false,
            up: true,
            psr: false,
            writeback: true,
            rn: 13,
            rlist: 0b1000_0000_0000_0111,
        };
        assert_eq!(instr.as_asm(Condition::EQ, 0), "ldmeqia sp!, {r0-r2, pc}");
        let instr = Instruction::Branch { link: true, offset: 8 };
        assert_eq!(instr.as_asm(Condition::AL, 0x100), "bl 0x110");
    }
}
