// Line lexer for the assembly source. Mnemonics, register names and
// operator keywords are case-insensitive, so identifiers come out
// lowercased. A `;` starts the comment, which the lexer hands back
// separately because the `;!` expectation directives live there.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Identifier or keyword, lowercased.
    Ident(String),
    /// Numeric literal: decimal, 0x hex, 0b binary or a character literal.
    Number(u32),
    Comma,
    Colon,
    Hash,
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Bang,
    Caret,
}

/// Splits one source line into tokens and the comment text (without the
/// leading `;`).
pub fn tokenize(line: &str) -> Result<(Vec<Token>, Option<String>), String> {
    let mut tokens = Vec::new();
    let mut chars = line.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            ';' => {
                let comment = line[i + 1..].to_string();
                return Ok((tokens, Some(comment)));
            }
            c if c.is_whitespace() => {}
            ',' => tokens.push(Token::Comma),
            ':' => tokens.push(Token::Colon),
            '#' => tokens.push(Token::Hash),
            '+' => tokens.push(Token::Plus),
            '-' => tokens.push(Token::Minus),
            '*' => tokens.push(Token::Star),
            '/' => tokens.push(Token::Slash),
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            '[' => tokens.push(Token::LBracket),
            ']' => tokens.push(Token::RBracket),
            '{' => tokens.push(Token::LBrace),
            '}' => tokens.push(Token::RBrace),
            '!' => tokens.push(Token::Bang),
            '^' => tokens.push(Token::Caret),
            '\'' => tokens.push(Token::Number(char_literal(&mut chars)?)),
            '0'..='9' => tokens.push(Token::Number(number(c, &mut chars)?)),
            c if c.is_alphabetic() || c == '_' || c == '.' => {
                let mut ident = String::new();
                ident.push(c);
                while let Some((_, c)) = chars.peek() {
                    if c.is_alphanumeric() || *c == '_' || *c == '.' {
                        ident.push(*c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident.to_lowercase()));
            }
            c => return Err(format!("unexpected character `{}`", c)),
        }
    }
    Ok((tokens, None))
}

fn char_literal(chars: &mut std::iter::Peekable<std::str::CharIndices>) -> Result<u32, String> {
    let c = match chars.next() {
        Some((_, '\\')) => match chars.next() {
            Some((_, 'n')) => '\n',
            Some((_, 't')) => '\t',
            Some((_, 'r')) => '\r',
            Some((_, '0')) => '\0',
            Some((_, '\\')) => '\\',
            Some((_, '\'')) => '\'',
            _ => return Err(String::from("unknown escape in character literal")),
        },
        Some((_, c)) => c,
        None => return Err(String::from("unterminated character literal")),
    };
    match chars.next() {
        Some((_, '\'')) => Ok(c as u32),
        _ => Err(String::from("unterminated character literal")),
    }
}

fn number(first: char, chars: &mut std::iter::Peekable<std::str::CharIndices>) -> Result<u32, String> {
    let mut text = String::new();
    text.push(first);
    while let Some((_, c)) = chars.peek() {
        if c.is_alphanumeric() || *c == '_' {
            text.push(*c);
            chars.next();
        } else {
            break;
        }
    }
    let text = text.to_lowercase().replace('_', "");
    let (digits, radix) = if let Some(hex) = text.strip_prefix("0x") {
        (hex, 16)
    } else if let Some(bin) = text.strip_prefix("0b") {
        (bin, 2)
    } else {
        (text.as_str(), 10)
    };
    u32::from_str_radix(digits, radix).map_err(|_| format!("bad numeric literal `{}`", text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use Token::*;

    #[test]
    fn lexes_an_instruction_line() {
        let (tokens, comment) = tokenize("loop: ADD r0, R1, #0x10 ; advance").unwrap();
        assert_eq!(
            tokens,
            vec![
                Ident(String::from("loop")),
                Colon,
                Ident(String::from("add")),
                Ident(String::from("r0")),
                Comma,
                Ident(String::from("r1")),
                Comma,
                Hash,
                Number(16),
            ]
        );
        assert_eq!(comment, Some(String::from(" advance")));
    }

    #[test]
    fn lexes_literals() {
        let (tokens, _) = tokenize("dw 0b101, 'A', '\\n', 42").unwrap();
        assert_eq!(
            tokens,
            vec![
                Ident(String::from("dw")),
                Number(5),
                Comma,
                Number(65),
                Comma,
                Number(10),
                Comma,
                Number(42),
            ]
        );
    }

    #[test]
    fn lexes_addressing_punctuation() {
        let (tokens, _) = tokenize("ldmfd sp!, {r0-r2, pc}^").unwrap();
        assert_eq!(
            tokens,
            vec![
                Ident(String::from("ldmfd")),
                Ident(String::from("sp")),
                Bang,
                Comma,
                LBrace,
                Ident(String::from("r0")),
                Minus,
                Ident(String::from("r2")),
                Comma,
                Ident(String::from("pc")),
                RBrace,
                Caret,
            ]
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(tokenize("mov r0, @5").is_err());
        assert!(tokenize("dw 0xzz").is_err());
        assert!(tokenize("mov r0, 'a").is_err());
    }
}
