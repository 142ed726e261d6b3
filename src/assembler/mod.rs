// The two-pass assembler. Pass one lexes every line, sizes its emission and
// collects labels, `equ` definitions and `;!` expectation directives; pass
// two evaluates expressions against the full symbol table and encodes. All
// errors are accumulated with their line numbers, and a program with any
// error in it is not produced.

pub mod lexer;

mod encoder;
mod expression;

use std::collections::HashMap;

use thiserror::Error;

use crate::program::{Expectations, Program, SourceLine};
use encoder::Mnemonic;
use lexer::{tokenize, Token};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line_number}: {message}")]
pub struct AssembleError {
    pub line_number: u32,
    pub message: String,
}

enum Emission {
    Instruction(Mnemonic, Vec<Token>),
    Data(Vec<Token>),
}

struct Statement {
    line_number: u32,
    text: String,
    comment: Option<String>,
    addr: u32,
    emission: Emission,
}

pub fn assemble(source: &str) -> Result<Program, Vec<AssembleError>> {
    let mut errors: Vec<AssembleError> = Vec::new();
    let mut symbols: HashMap<String, u32> = HashMap::new();
    let mut equs: Vec<(u32, String, Vec<Token>)> = Vec::new();
    let mut statements: Vec<Statement> = Vec::new();
    let mut expectations = Expectations::default();
    let mut addr = 0u32;

    let mut error = |line_number: u32, message: String| {
        errors.push(AssembleError { line_number, message });
    };

    // pass 1: lex, size, collect symbols
    for (index, raw) in source.lines().enumerate() {
        let line_number = index as u32 + 1;
        let (tokens, comment) = match tokenize(raw) {
            Ok(lexed) => lexed,
            Err(message) => {
                error(line_number, message);
                continue;
            }
        };
        if let Some(text) = comment.as_ref().and_then(|c| c.strip_prefix('!')) {
            if let Err(message) = parse_directive(text, &mut expectations) {
                error(line_number, message);
            }
        }
        let mut tokens = &tokens[..];
        // optional label, by colon or by not being a mnemonic
        if let Some(Token::Ident(first)) = tokens.first() {
            let is_statement = first == "dw" || encoder::decompose(first).is_some();
            match tokens.get(1) {
                Some(Token::Colon) => {
                    define_label(&mut symbols, first, addr).unwrap_or_else(|m| error(line_number, m));
                    tokens = &tokens[2..];
                }
                Some(Token::Ident(second)) if second == "equ" => {
                    equs.push((line_number, first.clone(), tokens[2..].to_vec()));
                    continue;
                }
                _ if !is_statement => {
                    define_label(&mut symbols, first, addr).unwrap_or_else(|m| error(line_number, m));
                    tokens = &tokens[1..];
                }
                _ => {}
            }
        }
        let (name, rest) = match tokens.first() {
            None => continue,
            Some(Token::Ident(name)) => (name, &tokens[1..]),
            Some(_) => {
                error(line_number, String::from("expected a mnemonic or directive"));
                continue;
            }
        };
        let (emission, size) = if name == "dw" {
            (Emission::Data(rest.to_vec()), encoder::dw_size(rest))
        } else {
            match encoder::decompose(name) {
                Some(m) => (Emission::Instruction(m, rest.to_vec()), 4),
                None => {
                    error(line_number, format!("unknown mnemonic `{}`", name));
                    continue;
                }
            }
        };
        statements.push(Statement {
            line_number,
            text: raw.trim_end().to_string(),
            comment,
            addr,
            emission,
        });
        addr += size;
    }

    // pass 2a: equ definitions, in file order so earlier ones feed later ones
    for (line_number, name, tokens) in equs {
        let mut cursor = expression::Cursor::new(&tokens);
        match expression::evaluate(&mut cursor, &symbols).and_then(|value| {
            if cursor.at_end() {
                Ok(value)
            } else {
                Err(String::from("unexpected trailing operands"))
            }
        }) {
            Ok(value) => define_label(&mut symbols, &name, value).unwrap_or_else(|m| error(line_number, m)),
            Err(message) => error(line_number, message),
        }
    }

    // pass 2b: encode against the complete symbol table
    let mut image = vec![0u8; addr as usize];
    let mut lines = Vec::with_capacity(statements.len());
    for statement in &statements {
        let bytes = match &statement.emission {
            Emission::Instruction(m, tokens) => {
                encoder::encode_instruction(m, tokens, statement.addr, &symbols).map(|word| word.to_le_bytes().to_vec())
            }
            Emission::Data(tokens) => encoder::encode_dw(tokens, &symbols),
        };
        match bytes {
            Ok(bytes) => {
                let at = statement.addr as usize;
                image[at..at + bytes.len()].copy_from_slice(&bytes);
                lines.push(SourceLine {
                    number: statement.line_number,
                    text: statement.text.clone(),
                    comment: statement.comment.clone(),
                    addr: statement.addr,
                    len: bytes.len() as u32,
                });
            }
            Err(message) => errors.push(AssembleError { line_number: statement.line_number, message }),
        }
    }

    if errors.is_empty() {
        Ok(Program { image, symbols, lines, expectations })
    } else {
        errors.sort_by_key(|e| e.line_number);
        Err(errors)
    }
}

fn define_label(symbols: &mut HashMap<String, u32>, name: &str, value: u32) -> Result<(), String> {
    if expression::is_operator(name) || name == "equ" || name == "dw" {
        return Err(format!("`{}` is a reserved word", name));
    }
    if symbols.insert(name.to_string(), value).is_some() {
        return Err(format!("symbol `{}` is defined twice", name));
    }
    Ok(())
}

/// `;! halts N`, `;! output <text>` and `;! rN V` expectation directives.
fn parse_directive(text: &str, expectations: &mut Expectations) -> Result<(), String> {
    let body = text.trim_start();
    if let Some(rest) = body.strip_prefix("halts") {
        expectations.halts = Some(parse_value(rest)?);
        return Ok(());
    }
    if let Some(rest) = body.strip_prefix("output") {
        let rest = rest.strip_prefix(' ').unwrap_or(rest);
        let unescaped = unescape(rest);
        match expectations.output.as_mut() {
            Some(text) => text.push_str(&unescaped),
            None => expectations.output = Some(unescaped),
        }
        return Ok(());
    }
    if let Some(rest) = body.strip_prefix('r') {
        let mut parts = rest.split_whitespace();
        let register = parts
            .next()
            .and_then(|t| t.parse::<usize>().ok())
            .filter(|r| *r < 16)
            .ok_or_else(|| String::from("bad register in directive"))?;
        let value = parse_value(parts.next().ok_or_else(|| String::from("missing directive value"))?)?;
        expectations.registers.push((register, value));
        return Ok(());
    }
    Err(format!("unknown directive `;!{}`", text))
}

fn parse_value(text: &str) -> Result<u32, String> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = if let Some(hex) = digits.strip_prefix("0x") {
        u32::from_str_radix(hex, 16)
    } else if let Some(bin) = digits.strip_prefix("0b") {
        u32::from_str_radix(bin, 2)
    } else {
        digits.parse::<u32>()
    }
    .map_err(|_| format!("bad number `{}`", text))?;
    Ok(if negative { value.wrapping_neg() } else { value })
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_a_loop_with_labels() {
        let program = assemble(
            "\
count   equ 3
        mov r0, #count
loop:   subs r0, r0, #1
        bne loop
        swi 2
",
        )
        .expect("program should assemble");
        assert_eq!(program.image.len(), 16);
        assert_eq!(program.symbols.get("count"), Some(&3));
        assert_eq!(program.symbols.get("loop"), Some(&4));
        // bne loop at 8 jumps back by 12
        let word = u32::from_le_bytes([program.image[8], program.image[9], program.image[10], program.image[11]]);
        assert_eq!(word, 0x1aff_fffd);
    }

    #[test]
    fn forward_references_resolve_in_the_second_pass() {
        let program = assemble(
            "\
        ldr r0, data
        swi 2
data    dw 0xdeadbeef, 17
",
        )
        .unwrap();
        assert_eq!(program.symbols.get("data"), Some(&8));
        // ldr r0, [pc, #0] reaches address 8 from 0
        let word = u32::from_le_bytes([program.image[0], program.image[1], program.image[2], program.image[3]]);
        assert_eq!(word, 0xe59f_0000);
        assert_eq!(&program.image[8..12], &[0xef, 0xbe, 0xad, 0xde]);
        assert_eq!(&program.image[12..16], &[17, 0, 0, 0]);
    }

    #[test]
    fn errors_accumulate_with_line_numbers() {
        let errors = assemble(
            "\
        mov r0, #0x102
        frobnicate r1
        b nowhere
",
        )
        .unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0].line_number, 1);
        assert!(errors[0].message.contains("immediate"));
        assert!(errors[1].message.contains("unknown mnemonic"));
        assert!(errors[2].message.contains("unresolved symbol"));
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let errors = assemble("x: mov r0, #1\nx: mov r0, #2\n").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("defined twice"));
    }

    #[test]
    fn source_map_covers_emitting_lines_only() {
        let program = assemble(
            "\
; a comment line
start   mov r0, #1      ; set up
        dw 1, 2, 3
",
        )
        .unwrap();
        assert_eq!(program.lines.len(), 2);
        assert_eq!(program.lines[0].number, 2);
        assert_eq!(program.lines[0].addr, 0);
        assert_eq!(program.lines[0].len, 4);
        assert_eq!(program.lines[0].comment.as_deref(), Some(" set up"));
        assert_eq!(program.lines[1].addr, 4);
        assert_eq!(program.lines[1].len, 12);
        assert_eq!(program.line_at(8).unwrap().number, 3);
        assert!(program.line_at(16).is_none());
    }

    #[test]
    fn expectation_directives_parse() {
        let program = assemble(
            "\
;! halts 2
;! output 6r1\\n
;! r0 42
;! r1 -1
        swi 2
",
        )
        .unwrap();
        assert_eq!(program.expectations.halts, Some(2));
        assert_eq!(program.expectations.output.as_deref(), Some("6r1\n"));
        assert_eq!(program.expectations.registers, vec![(0, 42), (1, 0xffff_ffff)]);
    }

    #[test]
    fn adr_expands_to_pc_relative_arithmetic() {
        let program = assemble(
            "\
        adr r0, msg
        swi 2
msg     dw 'H'
",
        )
        .unwrap();
        let word = u32::from_le_bytes([program.image[0], program.image[1], program.image[2], program.image[3]]);
        // add r0, pc, #0
        assert_eq!(word, 0xe28f_0000);
    }
}
