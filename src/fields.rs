// Rich types for the instruction fields: conditions, modes, data ops and the
// shifter operand, each carrying its own encoding and naming rules so the
// parser, executor and assembler never trade in raw bit patterns.

use crate::processor::CPU;
use crate::registers::Cpsr;

/// The 16 condition predicates over the CPSR N/Z/C/V flags (bits 31..28 of
/// every ARM instruction).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Condition {
    EQ,
    NE,
    CS,
    CC,
    MI,
    PL,
    VS,
    VC,
    HI,
    LS,
    GE,
    LT,
    GT,
    LE,
    AL,
    NV,
}

pub const CONDITIONS: [Condition; 16] = [
    Condition::EQ,
    Condition::NE,
    Condition::CS,
    Condition::CC,
    Condition::MI,
    Condition::PL,
    Condition::VS,
    Condition::VC,
    Condition::HI,
    Condition::LS,
    Condition::GE,
    Condition::LT,
    Condition::GT,
    Condition::LE,
    Condition::AL,
    Condition::NV,
];

impl Condition {
    pub fn from_bits(bits: u32) -> Self {
        CONDITIONS[(bits & 0xf) as usize]
    }
    pub fn bits(self) -> u32 {
        CONDITIONS.iter().position(|&c| c == self).unwrap() as u32
    }
    pub fn passes(self, cpsr: Cpsr) -> bool {
        let (n, z, c, v) = (cpsr.n(), cpsr.z(), cpsr.c(), cpsr.v());
        match self {
            Self::EQ => z,
            Self::NE => !z,
            Self::CS => c,
            Self::CC => !c,
            Self::MI => n,
            Self::PL => !n,
            Self::VS => v,
            Self::VC => !v,
            Self::HI => c && !z,
            Self::LS => !c || z,
            Self::GE => n == v,
            Self::LT => n != v,
            Self::GT => !z && (n == v),
            Self::LE => z || (n != v),
            Self::AL => true,
            Self::NV => false,
        }
    }
    pub fn name(self) -> &'static str {
        match self {
            Self::EQ => "eq",
            Self::NE => "ne",
            Self::CS => "cs",
            Self::CC => "cc",
            Self::MI => "mi",
            Self::PL => "pl",
            Self::VS => "vs",
            Self::VC => "vc",
            Self::HI => "hi",
            Self::LS => "ls",
            Self::GE => "ge",
            Self::LT => "lt",
            Self::GT => "gt",
            Self::LE => "le",
            Self::AL => "al",
            Self::NV => "nv",
        }
    }
    /// Mnemonic suffix; the always condition is spelled as nothing.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::AL => "",
            _ => self.name(),
        }
    }
    pub fn from_suffix(s: &str) -> Option<Self> {
        // hs/lo are the usual aliases for cs/cc
        match s {
            "hs" => return Some(Self::CS),
            "lo" => return Some(Self::CC),
            _ => {}
        }
        CONDITIONS.iter().copied().find(|c| c.name() == s)
    }
}

/// The seven processor modes recognized in the CPSR mode field.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mode {
    User,
    Fiq,
    Irq,
    Svc,
    Abt,
    Und,
    Sys,
}

impl Mode {
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits & 0x1f {
            0b10000 => Some(Self::User),
            0b10001 => Some(Self::Fiq),
            0b10010 => Some(Self::Irq),
            0b10011 => Some(Self::Svc),
            0b10111 => Some(Self::Abt),
            0b11011 => Some(Self::Und),
            0b11111 => Some(Self::Sys),
            _ => None,
        }
    }
    pub fn bits(self) -> u32 {
        match self {
            Self::User => 0b10000,
            Self::Fiq => 0b10001,
            Self::Irq => 0b10010,
            Self::Svc => 0b10011,
            Self::Abt => 0b10111,
            Self::Und => 0b11011,
            Self::Sys => 0b11111,
        }
    }
    /// USR and SYS run on the user bank and carry no SPSR.
    pub fn has_spsr(self) -> bool {
        !matches!(self, Self::User | Self::Sys)
    }
}

/// The sixteen data processing operations, bits 24..21 of the encoding.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DataOp {
    AND,
    EOR,
    SUB,
    RSB,
    ADD,
    ADC,
    SBC,
    RSC,
    TST,
    TEQ,
    CMP,
    CMN,
    ORR,
    MOV,
    BIC,
    MVN,
}

pub const DATA_OPS: [DataOp; 16] = [
    DataOp::AND,
    DataOp::EOR,
    DataOp::SUB,
    DataOp::RSB,
    DataOp::ADD,
    DataOp::ADC,
    DataOp::SBC,
    DataOp::RSC,
    DataOp::TST,
    DataOp::TEQ,
    DataOp::CMP,
    DataOp::CMN,
    DataOp::ORR,
    DataOp::MOV,
    DataOp::BIC,
    DataOp::MVN,
];

impl DataOp {
    pub fn from_bits(bits: u32) -> Self {
        DATA_OPS[(bits & 0xf) as usize]
    }
    pub fn bits(self) -> u32 {
        DATA_OPS.iter().position(|&op| op == self).unwrap() as u32
    }
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::AND => "and",
            Self::EOR => "eor",
            Self::SUB => "sub",
            Self::RSB => "rsb",
            Self::ADD => "add",
            Self::ADC => "adc",
            Self::SBC => "sbc",
            Self::RSC => "rsc",
            Self::TST => "tst",
            Self::TEQ => "teq",
            Self::CMP => "cmp",
            Self::CMN => "cmn",
            Self::ORR => "orr",
            Self::MOV => "mov",
            Self::BIC => "bic",
            Self::MVN => "mvn",
        }
    }
    /// TST/TEQ/CMP/CMN update flags only; their Rd field is ignored.
    pub fn is_test(self) -> bool {
        matches!(self, Self::TST | Self::TEQ | Self::CMP | Self::CMN)
    }
    /// Logical operations take C from the shifter and leave V alone.
    pub fn is_logical(self) -> bool {
        matches!(
            self,
            Self::AND | Self::EOR | Self::TST | Self::TEQ | Self::ORR | Self::MOV | Self::BIC | Self::MVN
        )
    }
    /// MOV/MVN ignore their Rn field.
    pub fn uses_rn(self) -> bool {
        !matches!(self, Self::MOV | Self::MVN)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShiftType {
    LSL,
    LSR,
    ASR,
    ROR,
    RRX,
}

impl ShiftType {
    /// Shift field bits 6..5 of a register operand. ROR with amount 0 encodes RRX;
    /// the parser resolves that before constructing the type.
    pub fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => Self::LSL,
            1 => Self::LSR,
            2 => Self::ASR,
            _ => Self::ROR,
        }
    }
    pub fn bits(self) -> u32 {
        match self {
            Self::LSL => 0,
            Self::LSR => 1,
            Self::ASR => 2,
            Self::ROR | Self::RRX => 3,
        }
    }
    pub fn name(self) -> &'static str {
        match self {
            Self::LSL => "lsl",
            Self::LSR => "lsr",
            Self::ASR => "asr",
            Self::ROR => "ror",
            Self::RRX => "rrx",
        }
    }
}

/// Shift amount of a register-form operand: a 5-bit constant from the
/// instruction or the bottom byte of a register.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShiftAmount {
    Fixed(u32),
    Reg(usize),
}

/// The shifter operand of data processing instructions and MSR.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operand2 {
    /// An 8-bit value rotated right by twice the 4-bit rotate field.
    Immediate { value: u32, rotate: u32 },
    Register { rm: usize, shift: ShiftType, amount: ShiftAmount },
}

impl Operand2 {
    /// Runs the barrel shifter: yields the operand value and the shifter
    /// carry-out observed by logical instructions.
    pub fn resolve(&self, cpu: &CPU) -> (u32, bool) {
        let carry_in = cpu.regs.cpsr().c();
        match *self {
            Self::Immediate { value, rotate } => {
                let result = value.rotate_right(2 * rotate);
                let carry = if rotate == 0 { carry_in } else { result >> 31 != 0 };
                (result, carry)
            }
            Self::Register { rm, shift, amount } => {
                let value = cpu.reg(rm);
                match amount {
                    ShiftAmount::Fixed(0) => match shift {
                        // LSL #0 passes the value through untouched
                        ShiftType::LSL => (value, carry_in),
                        // LSR #0 and ASR #0 encode a shift by 32
                        ShiftType::LSR | ShiftType::ASR => barrel_shift(shift, value, 32, carry_in),
                        ShiftType::ROR | ShiftType::RRX => barrel_shift(ShiftType::RRX, value, 1, carry_in),
                    },
                    ShiftAmount::Fixed(n) => barrel_shift(shift, value, n, carry_in),
                    ShiftAmount::Reg(rs) => {
                        let n = cpu.reg(rs) & 0xff;
                        if n == 0 {
                            (value, carry_in)
                        } else {
                            barrel_shift(shift, value, n, carry_in)
                        }
                    }
                }
            }
        }
    }
    /// True when the operand mentions the given register.
    pub fn uses_reg(&self, r: usize) -> bool {
        match *self {
            Self::Immediate { .. } => false,
            Self::Register { rm, amount, .. } => rm == r || amount == ShiftAmount::Reg(r),
        }
    }
}

/// The barrel shifter proper, for amounts of at least 1. The zero-amount
/// special cases live in `Operand2::resolve`.
pub fn barrel_shift(shift: ShiftType, value: u32, amount: u32, carry_in: bool) -> (u32, bool) {
    debug_assert!(amount >= 1);
    match shift {
        ShiftType::LSL => {
            if amount < 32 {
                (value << amount, value >> (32 - amount) & 1 != 0)
            } else if amount == 32 {
                (0, value & 1 != 0)
            } else {
                (0, false)
            }
        }
        ShiftType::LSR => {
            if amount < 32 {
                (value >> amount, value >> (amount - 1) & 1 != 0)
            } else if amount == 32 {
                (0, value >> 31 != 0)
            } else {
                (0, false)
            }
        }
        ShiftType::ASR => {
            if amount < 32 {
                (((value as i32) >> amount) as u32, value >> (amount - 1) & 1 != 0)
            } else {
                // saturates to sign replication
                (((value as i32) >> 31) as u32, value >> 31 != 0)
            }
        }
        ShiftType::ROR => {
            let n = amount % 32;
            if n == 0 {
                (value, value >> 31 != 0)
            } else {
                (value.rotate_right(n), value >> (n - 1) & 1 != 0)
            }
        }
        ShiftType::RRX => {
            let result = (value >> 1) | ((carry_in as u32) << 31);
            (result, value & 1 != 0)
        }
    }
}

/// Address offset of single and halfword data transfers. The register form
/// shifts by a constant only; a register-specified amount is not encodable
/// there.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Offset {
    Immediate(u32),
    Register { rm: usize, shift: ShiftType, amount: u32 },
}

impl Offset {
    pub fn resolve(&self, cpu: &CPU) -> u32 {
        match *self {
            Self::Immediate(n) => n,
            Self::Register { rm, shift, amount } => {
                let value = cpu.reg(rm);
                let carry = cpu.regs.cpsr().c();
                if amount == 0 {
                    match shift {
                        ShiftType::LSL => value,
                        ShiftType::LSR | ShiftType::ASR => barrel_shift(shift, value, 32, carry).0,
                        ShiftType::ROR | ShiftType::RRX => barrel_shift(ShiftType::RRX, value, 1, carry).0,
                    }
                } else {
                    barrel_shift(shift, value, amount, carry).0
                }
            }
        }
    }
}

/// Target of an MRS/MSR transfer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PsrTarget {
    Cpsr,
    Spsr,
}

impl PsrTarget {
    pub fn name(self) -> &'static str {
        match self {
            Self::Cpsr => "cpsr",
            Self::Spsr => "spsr",
        }
    }
}

pub fn register_name(index: usize) -> String {
    match index {
        13 => String::from("sp"),
        14 => String::from("lr"),
        15 => String::from("pc"),
        _ => format!("r{}", index),
    }
}

/// Tries to express `value` as an 8-bit constant rotated right by an even
/// amount; returns the (value, rotate) encoding fields on success.
pub fn encode_immediate(value: u32) -> Option<(u32, u32)> {
    for rotate in 0..16 {
        let v = value.rotate_left(2 * rotate);
        if v < 0x100 {
            return Some((v, rotate));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifts_and_carries() {
        assert_eq!(barrel_shift(ShiftType::LSL, 1, 1, false), (2, false));
        assert_eq!(barrel_shift(ShiftType::LSL, 0x8000_0001, 1, false), (2, true));
        assert_eq!(barrel_shift(ShiftType::LSL, 1, 32, false), (0, true));
        assert_eq!(barrel_shift(ShiftType::LSL, 1, 33, true), (0, false));
        assert_eq!(barrel_shift(ShiftType::LSR, 3, 1, false), (1, true));
        assert_eq!(barrel_shift(ShiftType::LSR, 0x8000_0000, 32, false), (0, true));
        assert_eq!(barrel_shift(ShiftType::ASR, 0x8000_0000, 4, false), (0xf800_0000, false));
        assert_eq!(barrel_shift(ShiftType::ASR, 0x8000_0000, 40, false), (0xffff_ffff, true));
        assert_eq!(barrel_shift(ShiftType::ROR, 0x1, 1, false), (0x8000_0000, true));
        assert_eq!(barrel_shift(ShiftType::ROR, 0xf000_000f, 32, false), (0xf000_000f, true));
        assert_eq!(barrel_shift(ShiftType::RRX, 0x3, 1, true), (0x8000_0001, true));
    }

    #[test]
    fn immediate_encoding() {
        assert_eq!(encode_immediate(0xff), Some((0xff, 0)));
        assert_eq!(encode_immediate(0x3f0), Some((0xfc, 15)));
        assert_eq!(encode_immediate(0xff00_0000), Some((0xff, 4)));
        assert_eq!(encode_immediate(0x102), None);
        assert_eq!(encode_immediate(0xffff_ffff), None);
    }

    #[test]
    fn condition_round_trip() {
        for bits in 0..16 {
            assert_eq!(Condition::from_bits(bits).bits(), bits);
        }
        assert_eq!(Condition::from_suffix("hs"), Some(Condition::CS));
        assert_eq!(Condition::from_suffix("al"), Some(Condition::AL));
        assert_eq!(Condition::from_suffix("xy"), None);
    }

    #[test]
    fn mode_bits_round_trip() {
        for mode in [Mode::User, Mode::Fiq, Mode::Irq, Mode::Svc, Mode::Abt, Mode::Und, Mode::Sys].iter() {
            assert_eq!(Mode::from_bits(mode.bits()), Some(*mode));
        }
        assert_eq!(Mode::from_bits(0b00000), None);
        assert_eq!(Mode::from_bits(0b10100), None);
    }
}
