// Text to bits: mnemonic decomposition and the per-class operand grammars.
// The inverse of the binary parser, and just as naturally messy.

use std::collections::HashMap;

use crate::fields::{encode_immediate, Condition, DATA_OPS};

use super::expression::{evaluate, Cursor};
use super::lexer::Token;

/// Base mnemonics ordered so that the longest possible match is tried first;
/// decomposition backtracks through this list until the suffixes work out
/// (`bls` is `b` + `ls`, not `bl` + `s`).
const BASES: [&str; 31] = [
    "umull", "umlal", "smull", "smlal", "ldm", "stm", "ldr", "str", "swp", "mrs", "msr", "swi", "adr", "mul",
    "mla", "and", "eor", "sub", "rsb", "add", "adc", "sbc", "rsc", "tst", "teq", "cmp", "cmn", "orr", "mov",
    "bic", "mvn",
];

#[derive(Debug, Clone)]
pub struct Mnemonic {
    pub base: String,
    pub cond: Condition,
    pub s: bool,
    pub byte: bool,
    /// `h`, `sb` or `sh` on a load/store.
    pub half: Option<&'static str>,
    /// Raw block addressing suffix (`ia`, `fd`, ...); resolved against the
    /// transfer direction at encode time.
    pub block: Option<&'static str>,
}

/// Splits a full mnemonic like `ldreqsb` into base, condition and suffixes.
pub fn decompose(name: &str) -> Option<Mnemonic> {
    for base in BASES.iter() {
        if let Some(rest) = name.strip_prefix(base) {
            if let Some(m) = with_condition(base, rest) {
                return Some(m);
            }
        }
    }
    // b/bl/bx clash with too many other mnemonics for the table above
    for base in ["bx", "bl", "b"].iter() {
        if let Some(rest) = name.strip_prefix(base) {
            if let Some(m) = with_condition(base, rest) {
                return Some(m);
            }
        }
    }
    None
}

fn with_condition(base: &str, rest: &str) -> Option<Mnemonic> {
    if let Some(m) = suffixes(base, Condition::AL, rest) {
        return Some(m);
    }
    if rest.len() >= 2 && rest.is_char_boundary(2) {
        if let Some(cond) = Condition::from_suffix(&rest[..2]) {
            return suffixes(base, cond, &rest[2..]);
        }
    }
    None
}

fn suffixes(base: &str, cond: Condition, tail: &str) -> Option<Mnemonic> {
    let mut m = Mnemonic {
        base: String::from(base),
        cond,
        s: false,
        byte: false,
        half: None,
        block: None,
    };
    let dp = DATA_OPS.iter().any(|op| op.mnemonic() == base);
    let multiply = matches!(base, "mul" | "mla" | "umull" | "umlal" | "smull" | "smlal");
    match base {
        _ if dp || multiply => match tail {
            "" => Some(m),
            "s" => {
                m.s = true;
                Some(m)
            }
            _ => None,
        },
        "b" | "bl" | "bx" | "mrs" | "msr" | "swi" | "adr" => {
            if tail.is_empty() {
                Some(m)
            } else {
                None
            }
        }
        "ldr" | "str" => match tail {
            "" => Some(m),
            "b" => {
                m.byte = true;
                Some(m)
            }
            "h" => {
                m.half = Some("h");
                Some(m)
            }
            "sb" if base == "ldr" => {
                m.half = Some("sb");
                Some(m)
            }
            "sh" if base == "ldr" => {
                m.half = Some("sh");
                Some(m)
            }
            _ => None,
        },
        "swp" => match tail {
            "" => Some(m),
            "b" => {
                m.byte = true;
                Some(m)
            }
            _ => None,
        },
        "ldm" | "stm" => match tail {
            // a bare ldm/stm means increment-after
            "" => {
                m.block = Some("ia");
                Some(m)
            }
            "ia" | "ib" | "da" | "db" | "fd" | "ed" | "fa" | "ea" => {
                m.block = Some(match tail {
                    "ia" => "ia",
                    "ib" => "ib",
                    "da" => "da",
                    "db" => "db",
                    "fd" => "fd",
                    "ed" => "ed",
                    "fa" => "fa",
                    _ => "ea",
                });
                Some(m)
            }
            _ => None,
        },
        _ => None,
    }
}

/// Stack alias resolution: the pre/up bits for a block suffix, which for the
/// full/empty ascending/descending aliases depend on the direction.
fn block_mode(suffix: &str, load: bool) -> (bool, bool) {
    match (suffix, load) {
        ("ia", _) | ("fd", true) | ("ea", false) => (false, true),
        ("ib", _) | ("ed", true) | ("fa", false) => (true, true),
        ("da", _) | ("fa", true) | ("ed", false) => (false, false),
        _ => (true, false),
    }
}

fn register_index(name: &str) -> Option<usize> {
    match name {
        "sp" => Some(13),
        "lr" => Some(14),
        "pc" => Some(15),
        _ => {
            let n = name.strip_prefix('r')?.parse::<usize>().ok()?;
            if n < 16 && !name[1..].starts_with('0') || name == "r0" {
                Some(n)
            } else {
                None
            }
        }
    }
}

struct Operands<'a> {
    cursor: Cursor<'a>,
    symbols: &'a HashMap<String, u32>,
    addr: u32,
}

impl<'a> Operands<'a> {
    fn register(&mut self) -> Result<usize, String> {
        match self.cursor.next() {
            Some(Token::Ident(name)) => {
                register_index(name).ok_or_else(|| format!("`{}` is not a register", name))
            }
            _ => Err(String::from("expected a register")),
        }
    }
    fn comma(&mut self) -> Result<(), String> {
        self.cursor.expect(&Token::Comma, "`,`")
    }
    fn expr(&mut self) -> Result<u32, String> {
        evaluate(&mut self.cursor, self.symbols)
    }
    fn peek_register(&self) -> bool {
        match self.cursor.peek() {
            Some(Token::Ident(name)) => register_index(name).is_some(),
            _ => false,
        }
    }
    fn done(&self) -> Result<(), String> {
        if self.cursor.at_end() {
            Ok(())
        } else {
            Err(String::from("unexpected trailing operands"))
        }
    }
}

/// Encodes one instruction statement into its 32-bit word.
pub fn encode_instruction(
    m: &Mnemonic,
    tokens: &[Token],
    addr: u32,
    symbols: &HashMap<String, u32>,
) -> Result<u32, String> {
    let mut a = Operands { cursor: Cursor::new(tokens), symbols, addr };
    let cond = m.cond.bits() << 28;
    let word = match m.base.as_str() {
        "mul" | "mla" => {
            let rd = a.register()?;
            a.comma()?;
            let rm = a.register()?;
            a.comma()?;
            let rs = a.register()?;
            let rn = if m.base == "mla" {
                a.comma()?;
                a.register()?
            } else {
                0
            };
            if rd == 15 || rm == 15 || rs == 15 || rn == 15 {
                return Err(String::from("r15 is not a valid multiply operand"));
            }
            if rd == rm {
                return Err(String::from("multiply destination must differ from the first operand"));
            }
            let acc = (m.base == "mla") as u32;
            cond | acc << 21 | (m.s as u32) << 20 | (rd as u32) << 16 | (rn as u32) << 12 | (rs as u32) << 8
                | 0b1001 << 4
                | rm as u32
        }
        "umull" | "umlal" | "smull" | "smlal" => {
            let rd_lo = a.register()?;
            a.comma()?;
            let rd_hi = a.register()?;
            a.comma()?;
            let rm = a.register()?;
            a.comma()?;
            let rs = a.register()?;
            if rd_lo == 15 || rd_hi == 15 || rm == 15 || rs == 15 {
                return Err(String::from("r15 is not a valid multiply operand"));
            }
            if rd_lo == rd_hi || rd_lo == rm || rd_hi == rm {
                return Err(String::from("long multiply registers must be distinct"));
            }
            let signed = m.base.starts_with('s') as u32;
            let acc = m.base.ends_with("lal") as u32;
            cond | 1 << 23
                | signed << 22
                | acc << 21
                | (m.s as u32) << 20
                | (rd_hi as u32) << 16
                | (rd_lo as u32) << 12
                | (rs as u32) << 8
                | 0b1001 << 4
                | rm as u32
        }
        "b" | "bl" => {
            let target = a.expr()?;
            let offset = target.wrapping_sub(addr.wrapping_add(8)) as i32;
            if offset % 4 != 0 {
                return Err(String::from("branch target is not word-aligned"));
            }
            let words = offset >> 2;
            if !(-0x80_0000..0x80_0000).contains(&words) {
                return Err(String::from("branch target out of range"));
            }
            cond | 0b101 << 25 | ((m.base == "bl") as u32) << 24 | (words as u32 & 0xff_ffff)
        }
        "bx" => cond | 0x12f_ff1 << 4 | a.register()? as u32,
        "swi" => {
            let number = a.expr()?;
            if number > 0xff_ffff {
                return Err(String::from("interrupt number does not fit in 24 bits"));
            }
            cond | 0b1111 << 24 | number
        }
        "ldr" | "str" if m.half.is_some() => {
            let load = m.base == "ldr";
            let rd = a.register()?;
            a.comma()?;
            let addr_parts = parse_address(&mut a, 255)?;
            let (s, h) = match m.half.unwrap() {
                "h" => (0u32, 1u32),
                "sb" => (1, 0),
                _ => (1, 1),
            };
            if !load && s == 1 {
                return Err(String::from("signed stores do not exist"));
            }
            let (i, hi, lo) = match addr_parts.offset {
                AddressOffset::Immediate(n) => (1u32, n >> 4, n & 0xf),
                AddressOffset::Register(rm, shift_bits) => {
                    if shift_bits != 0 {
                        return Err(String::from("halfword transfers take no shifted offset"));
                    }
                    (0, 0, rm as u32)
                }
            };
            cond | (addr_parts.pre as u32) << 24
                | (addr_parts.up as u32) << 23
                | i << 22
                | (addr_parts.writeback as u32) << 21
                | (load as u32) << 20
                | (addr_parts.rn as u32) << 16
                | (rd as u32) << 12
                | hi << 8
                | 1 << 7
                | s << 6
                | h << 5
                | 1 << 4
                | lo
        }
        "ldr" | "str" => {
            let load = m.base == "ldr";
            let rd = a.register()?;
            a.comma()?;
            let addr_parts = parse_address(&mut a, 4095)?;
            let (i, offset12) = match addr_parts.offset {
                AddressOffset::Immediate(n) => (0u32, n),
                AddressOffset::Register(rm, shift_bits) => (1, shift_bits | rm as u32),
            };
            cond | 0b01 << 26
                | i << 25
                | (addr_parts.pre as u32) << 24
                | (addr_parts.up as u32) << 23
                | (m.byte as u32) << 22
                | (addr_parts.writeback as u32) << 21
                | (load as u32) << 20
                | (addr_parts.rn as u32) << 16
                | (rd as u32) << 12
                | offset12
        }
        "ldm" | "stm" => {
            let load = m.base == "ldm";
            let rn = a.register()?;
            let writeback = a.cursor.accept(&Token::Bang);
            a.comma()?;
            let rlist = parse_register_list(&mut a)?;
            let caret = a.cursor.accept(&Token::Caret);
            let (pre, up) = block_mode(m.block.unwrap(), load);
            if caret && writeback && !(load && rlist & 0x8000 != 0) {
                return Err(String::from("user-bank transfer permits no writeback"));
            }
            cond | 0b100 << 25
                | (pre as u32) << 24
                | (up as u32) << 23
                | (caret as u32) << 22
                | (writeback as u32) << 21
                | (load as u32) << 20
                | (rn as u32) << 16
                | u32::from(rlist)
        }
        "swp" => {
            let rd = a.register()?;
            a.comma()?;
            let rm = a.register()?;
            a.comma()?;
            a.cursor.expect(&Token::LBracket, "`[`")?;
            let rn = a.register()?;
            a.cursor.expect(&Token::RBracket, "`]`")?;
            cond | 0b00010 << 23 | (m.byte as u32) << 22 | (rn as u32) << 16 | (rd as u32) << 12 | 0b1001 << 4
                | rm as u32
        }
        "mrs" => {
            let rd = a.register()?;
            a.comma()?;
            let ps = match a.cursor.next() {
                Some(Token::Ident(name)) if name == "cpsr" => 0u32,
                Some(Token::Ident(name)) if name == "spsr" => 1,
                _ => return Err(String::from("expected cpsr or spsr")),
            };
            cond | 0b00010 << 23 | ps << 22 | 0b001111 << 16 | (rd as u32) << 12
        }
        "msr" => {
            let (ps, mask) = match a.cursor.next() {
                Some(Token::Ident(name)) => match name.as_str() {
                    "cpsr" | "cpsr_all" => (0u32, 0b1001u32),
                    "cpsr_flg" => (0, 0b1000),
                    "spsr" | "spsr_all" => (1, 0b1001),
                    "spsr_flg" => (1, 0b1000),
                    _ => return Err(String::from("expected cpsr, cpsr_flg, spsr or spsr_flg")),
                },
                _ => return Err(String::from("expected a status register")),
            };
            a.comma()?;
            let (i, operand) = if a.cursor.accept(&Token::Hash) {
                let value = a.expr()?;
                let (imm, rotate) = encode_immediate(value)
                    .ok_or_else(|| format!("cannot encode {:#x} as a rotated 8-bit immediate", value))?;
                (1u32, rotate << 8 | imm)
            } else {
                (0, a.register()? as u32)
            };
            cond | i << 25 | 0b10 << 23 | ps << 22 | 0b10 << 20 | mask << 16 | 0b1111 << 12 | operand
        }
        "adr" => {
            let rd = a.register()?;
            a.comma()?;
            let target = a.expr()?;
            let diff = target.wrapping_sub(addr.wrapping_add(8));
            let (op, imm) = if let Some((value, rotate)) = encode_immediate(diff) {
                (0b0100u32, rotate << 8 | value) // add rd, pc, #diff
            } else if let Some((value, rotate)) = encode_immediate(diff.wrapping_neg()) {
                (0b0010, rotate << 8 | value) // sub rd, pc, #-diff
            } else {
                return Err(String::from("address is out of range for adr"));
            };
            cond | 1 << 25 | op << 21 | 15 << 16 | (rd as u32) << 12 | imm
        }
        // the sixteen data processing operations
        base => {
            let op = DATA_OPS
                .iter()
                .find(|op| op.mnemonic() == base)
                .ok_or_else(|| format!("unknown mnemonic `{}`", base))?;
            let (rd, rn, s) = if op.is_test() {
                (0, a.register()?, true)
            } else if op.uses_rn() {
                let rd = a.register()?;
                a.comma()?;
                (rd, a.register()?, m.s)
            } else {
                (a.register()?, 0, m.s)
            };
            a.comma()?;
            let (i, operand) = parse_operand2(&mut a)?;
            cond | i << 25 | op.bits() << 21 | (s as u32) << 20 | (rn as u32) << 16 | (rd as u32) << 12 | operand
        }
    };
    a.done()?;
    Ok(word)
}

fn parse_operand2(a: &mut Operands) -> Result<(u32, u32), String> {
    if a.cursor.accept(&Token::Hash) {
        let value = a.expr()?;
        let (imm, rotate) = encode_immediate(value)
            .ok_or_else(|| format!("cannot encode {:#x} as a rotated 8-bit immediate", value))?;
        return Ok((1, rotate << 8 | imm));
    }
    let rm = a.register()? as u32;
    if !a.cursor.accept(&Token::Comma) {
        return Ok((0, rm));
    }
    let shift = match a.cursor.next() {
        Some(Token::Ident(name)) => name.clone(),
        _ => return Err(String::from("expected a shift operation")),
    };
    if shift == "rrx" {
        return Ok((0, 0b11 << 5 | rm));
    }
    let shift_bits = match shift.as_str() {
        "lsl" => 0u32,
        "lsr" => 1,
        "asr" => 2,
        "ror" => 3,
        _ => return Err(format!("`{}` is not a shift operation", shift)),
    };
    if a.cursor.accept(&Token::Hash) {
        let amount = a.expr()?;
        let encoded = match (shift_bits, amount) {
            (0, 0..=31) => amount,
            (1, 1..=31) | (2, 1..=31) | (3, 1..=31) => amount,
            (1, 32) | (2, 32) => 0,
            _ => return Err(format!("shift amount {} out of range", amount)),
        };
        Ok((0, encoded << 7 | shift_bits << 5 | rm))
    } else {
        let rs = a.register()? as u32;
        Ok((0, rs << 8 | shift_bits << 5 | 1 << 4 | rm))
    }
}

enum AddressOffset {
    Immediate(u32),
    /// Register with the pre-packed shift field bits (11..4).
    Register(usize, u32),
}

struct Address {
    rn: usize,
    offset: AddressOffset,
    pre: bool,
    up: bool,
    writeback: bool,
}

/// The load/store address grammar: `[rn]`, `[rn, #±off]{!}`,
/// `[rn, ±rm{, shift #n}]{!}`, the post-indexed `[rn], ...` forms, and
/// PC-relative `label` / `[expr]` with the offset computed here.
fn parse_address(a: &mut Operands, max_offset: u32) -> Result<Address, String> {
    if a.cursor.accept(&Token::LBracket) {
        if a.peek_register() {
            let rn = a.register()?;
            if a.cursor.accept(&Token::RBracket) {
                if a.cursor.accept(&Token::Comma) {
                    // post-indexed
                    let (up, offset) = parse_offset(a, max_offset)?;
                    return Ok(Address { rn, offset, pre: false, up, writeback: false });
                }
                let writeback = a.cursor.accept(&Token::Bang);
                return Ok(Address { rn, offset: AddressOffset::Immediate(0), pre: true, up: true, writeback });
            }
            a.comma()?;
            let (up, offset) = parse_offset(a, max_offset)?;
            a.cursor.expect(&Token::RBracket, "`]`")?;
            let writeback = a.cursor.accept(&Token::Bang);
            return Ok(Address { rn, offset, pre: true, up, writeback });
        }
        let target = a.expr()?;
        a.cursor.expect(&Token::RBracket, "`]`")?;
        return pc_relative(a, target, max_offset);
    }
    let target = a.expr()?;
    pc_relative(a, target, max_offset)
}

fn pc_relative(a: &Operands, target: u32, max_offset: u32) -> Result<Address, String> {
    let diff = target.wrapping_sub(a.addr.wrapping_add(8)) as i32;
    let (up, magnitude) = if diff < 0 { (false, diff.unsigned_abs()) } else { (true, diff as u32) };
    if magnitude > max_offset {
        return Err(format!("address is out of range ({} bytes away)", diff));
    }
    Ok(Address { rn: 15, offset: AddressOffset::Immediate(magnitude), pre: true, up, writeback: false })
}

fn parse_offset(a: &mut Operands, max_offset: u32) -> Result<(bool, AddressOffset), String> {
    if a.cursor.accept(&Token::Hash) {
        let value = a.expr()?;
        let (up, magnitude) = if (value as i32) < 0 { (false, value.wrapping_neg()) } else { (true, value) };
        if magnitude > max_offset {
            return Err(format!("offset {} out of range", magnitude));
        }
        return Ok((up, AddressOffset::Immediate(magnitude)));
    }
    let up = if a.cursor.accept(&Token::Minus) {
        false
    } else {
        a.cursor.accept(&Token::Plus);
        true
    };
    let rm = a.register()?;
    if !a.cursor.accept(&Token::Comma) {
        return Ok((up, AddressOffset::Register(rm, 0)));
    }
    let shift = match a.cursor.next() {
        Some(Token::Ident(name)) => name.clone(),
        _ => return Err(String::from("expected a shift operation")),
    };
    if shift == "rrx" {
        return Ok((up, AddressOffset::Register(rm, 0b11 << 5)));
    }
    let shift_bits = match shift.as_str() {
        "lsl" => 0u32,
        "lsr" => 1,
        "asr" => 2,
        "ror" => 3,
        _ => return Err(format!("`{}` is not a shift operation", shift)),
    };
    a.cursor.expect(&Token::Hash, "`#`")?;
    let amount = a.expr()?;
    let encoded = match (shift_bits, amount) {
        (0, 0..=31) => amount,
        (1, 1..=31) | (2, 1..=31) | (3, 1..=31) => amount,
        (1, 32) | (2, 32) => 0,
        _ => return Err(format!("shift amount {} out of range", amount)),
    };
    Ok((up, AddressOffset::Register(rm, encoded << 7 | shift_bits << 5)))
}

fn parse_register_list(a: &mut Operands) -> Result<u16, String> {
    a.cursor.expect(&Token::LBrace, "`{`")?;
    let mut rlist = 0u16;
    if a.cursor.accept(&Token::RBrace) {
        return Ok(rlist);
    }
    loop {
        let first = a.register()?;
        if a.cursor.accept(&Token::Minus) {
            let last = a.register()?;
            if last < first {
                return Err(String::from("descending register range"));
            }
            for r in first..=last {
                rlist |= 1 << r;
            }
        } else {
            rlist |= 1 << first;
        }
        if !a.cursor.accept(&Token::Comma) {
            break;
        }
    }
    a.cursor.expect(&Token::RBrace, "`}`")?;
    Ok(rlist)
}

/// Encodes a `dw` directive: one 32-bit little-endian word per expression.
pub fn encode_dw(tokens: &[Token], symbols: &HashMap<String, u32>) -> Result<Vec<u8>, String> {
    let mut cursor = Cursor::new(tokens);
    let mut bytes = Vec::new();
    loop {
        let value = evaluate(&mut cursor, symbols)?;
        bytes.extend_from_slice(&value.to_le_bytes());
        if !cursor.accept(&Token::Comma) {
            break;
        }
    }
    if cursor.at_end() {
        Ok(bytes)
    } else {
        Err(String::from("unexpected trailing operands"))
    }
}

/// Number of words a `dw` line will emit, for the sizing pass: top-level
/// commas plus one.
pub fn dw_size(tokens: &[Token]) -> u32 {
    let commas = tokens.iter().filter(|t| **t == Token::Comma).count() as u32;
    4 * (commas + 1)
}

#[cfg(test)]
mod tests {
    use super::super::lexer::tokenize;
    use super::*;
    use crate::fields::Condition;

    fn encode(source: &str) -> Result<u32, String> {
        encode_at(source, 0)
    }

    fn encode_at(source: &str, addr: u32) -> Result<u32, String> {
        let (tokens, _) = tokenize(source).unwrap();
        let name = match &tokens[0] {
            Token::Ident(name) => name.clone(),
            _ => panic!("no mnemonic"),
        };
        let m = decompose(&name).ok_or_else(|| format!("unknown mnemonic `{}`", name))?;
        encode_instruction(&m, &tokens[1..], addr, &HashMap::new())
    }

    #[test]
    fn decomposes_mnemonics() {
        let m = decompose("bls").unwrap();
        assert_eq!((m.base.as_str(), m.cond), ("b", Condition::LS));
        let m = decompose("bllt").unwrap();
        assert_eq!((m.base.as_str(), m.cond), ("bl", Condition::LT));
        let m = decompose("ldreqsh").unwrap();
        assert_eq!((m.base.as_str(), m.cond, m.half), ("ldr", Condition::EQ, Some("sh")));
        let m = decompose("stmfd").unwrap();
        assert_eq!((m.base.as_str(), m.block), ("stm", Some("fd")));
        let m = decompose("addeqs").unwrap();
        assert_eq!((m.base.as_str(), m.cond, m.s), ("add", Condition::EQ, true));
        assert!(decompose("frob").is_none());
        assert!(decompose("strsh").is_none());
    }

    #[test]
    fn encodes_data_processing() {
        assert_eq!(encode("mov r0, #1"), Ok(0xe3a0_0001));
        assert_eq!(encode("adds r2, r1, r0, lsl #3"), Ok(0xe091_2180));
        assert_eq!(encode("cmp r1, #5"), Ok(0xe351_0005));
        assert_eq!(encode("mvneq r0, r1, asr r2"), Ok(0x01e0_0251));
        assert_eq!(encode("mov r0, #0xff000000"), Ok(0xe3a0_04ff));
        assert!(encode("mov r0, #0x102").unwrap_err().contains("immediate"));
    }

    #[test]
    fn encodes_memory_forms() {
        assert_eq!(encode("ldr r0, [r1]"), Ok(0xe591_0000));
        assert_eq!(encode("ldr r0, [r1, #4]!"), Ok(0xe5b1_0004));
        assert_eq!(encode("str r0, [r1], #-8"), Ok(0xe401_0008));
        assert_eq!(encode("ldrb r0, [r1, -r2, lsl #2]"), Ok(0xe751_0102));
        assert_eq!(encode("strh r0, [r1]"), Ok(0xe1c1_00b0));
        assert_eq!(encode("ldrsh r1, [r0, #6]"), Ok(0xe1d0_10f6));
        assert_eq!(encode("ldrsb r1, [r0, r2]"), Ok(0xe191_10d2));
        assert!(encode("strsb r0, [r1]").is_err());
    }

    #[test]
    fn encodes_block_transfers() {
        assert_eq!(encode("stmfd sp!, {r0, r1}"), Ok(0xe92d_0003));
        assert_eq!(encode("ldmfd sp!, {r0-r2, pc}"), Ok(0xe8bd_8007));
        assert_eq!(encode("stmia r0!, {}"), Ok(0xe8a0_0000));
        assert_eq!(encode("ldmib r1, {r2}^"), Ok(0xe9d1_0004));
    }

    #[test]
    fn encodes_branches_and_system() {
        assert_eq!(encode_at("b 0x10", 0), Ok(0xea00_0002));
        assert_eq!(encode_at("bl 0x0", 8), Ok(0xebff_fffc));
        assert_eq!(encode("bx lr"), Ok(0xe12f_ff1e));
        assert_eq!(encode("swi 2"), Ok(0xef00_0002));
        assert_eq!(encode("mrs r0, cpsr"), Ok(0xe10f_0000));
        assert_eq!(encode("msr cpsr_flg, #0xf0000000"), Ok(0xe328_f20f));
        assert_eq!(encode("msr cpsr, r0"), Ok(0xe129_f000));
        assert_eq!(encode("swp r0, r1, [r2]"), Ok(0xe102_0091));
    }

    #[test]
    fn adr_uses_pc_relative_add_or_sub() {
        // forwards: add rd, pc, #8
        assert_eq!(encode_at("adr r0, 0x10", 0), Ok(0xe28f_0008));
        // backwards: sub rd, pc, #16
        assert_eq!(encode_at("adr r0, 0x0", 8), Ok(0xe24f_0010));
    }

    #[test]
    fn round_trips_through_the_decoder() {
        use crate::parser::parse_instruction;
        for source in [
            "add r1, r2, r3",
            "subs r0, r0, #1",
            "mov r4, r5, ror #7",
            "mla r3, r1, r2, r0",
            "umull r0, r1, r2, r3",
            "ldr r0, [r1, #20]",
            "strb r2, [r3], r4",
            "ldrh r5, [r6, #-2]!",
            "stmdb sp!, {r0-r4, lr}",
            "swpb r1, r2, [r3]",
            "swi 17",
        ]
        .iter()
        {
            let word = encode(source).unwrap_or_else(|e| panic!("{}: {}", source, e));
            let decoded = parse_instruction(word)
                .unwrap_or_else(|| panic!("`{}` encoded to undecodable {:08x}", source, word));
            let rendered = decoded.as_asm(Condition::AL, 0);
            let reencoded = encode(&rendered).unwrap_or_else(|e| panic!("{} -> `{}`: {}", source, rendered, e));
            assert_eq!(word, reencoded, "{} -> {} -> {}", source, word, rendered);
        }
    }
}
