//! Byte-level lexer for Java-like source text.
//!
//! Produces identifiers, literals and single-byte punctuation with their byte
//! spans. Whitespace and comments are skipped. Non-ASCII bytes are treated as
//! identifier characters, so UTF-8 identifiers survive as one lexeme.

use super::ParseError;
use memchr::{memchr, memmem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexemeKind {
    Ident,
    Literal,
    Punct(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lexeme {
    pub kind: LexemeKind,
    pub from: usize,
    pub to: usize,
}

impl Lexeme {
    pub fn text<'a>(&self, source: &'a [u8]) -> &'a [u8] {
        &source[self.from..self.to]
    }

    pub fn is_punct(&self, ch: u8) -> bool {
        self.kind == LexemeKind::Punct(ch)
    }

    pub fn is_ident(&self) -> bool {
        self.kind == LexemeKind::Ident
    }
}

#[inline]
fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

/// Split `source` into lexemes
pub fn lex(source: &[u8]) -> Result<Vec<Lexeme>, ParseError> {
    let mut lexemes = Vec::with_capacity(source.len() / 4);
    let mut i = 0;
    let len = source.len();

    while i < len {
        let b = source[i];

        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if b == b'/' && i + 1 < len {
            match source[i + 1] {
                b'/' => {
                    i = match memchr(b'\n', &source[i + 2..]) {
                        Some(nl) => i + 2 + nl + 1,
                        None => len,
                    };
                    continue;
                }
                b'*' => {
                    i = match memmem::find(&source[i + 2..], b"*/") {
                        Some(end) => i + 2 + end + 2,
                        None => return Err(ParseError::at(i, "unterminated block comment")),
                    };
                    continue;
                }
                _ => {}
            }
        }

        let start = i;
        let kind = if b == b'"' {
            i = if source[i..].starts_with(b"\"\"\"") {
                scan_text_block(source, i)?
            } else {
                scan_quoted(source, i, b'"', "unterminated string literal")?
            };
            LexemeKind::Literal
        } else if b == b'\'' {
            i = scan_quoted(source, i, b'\'', "unterminated character literal")?;
            LexemeKind::Literal
        } else if b.is_ascii_digit() || (b == b'.' && source.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            i = scan_number(source, i);
            LexemeKind::Literal
        } else if is_ident_byte(b) {
            while i < len && is_ident_byte(source[i]) {
                i += 1;
            }
            LexemeKind::Ident
        } else {
            i += 1;
            LexemeKind::Punct(b)
        };

        lexemes.push(Lexeme { kind, from: start, to: i });
    }

    Ok(lexemes)
}

/// Scan a single-line quoted literal starting at `start`; returns the end offset
fn scan_quoted(source: &[u8], start: usize, quote: u8, what: &'static str) -> Result<usize, ParseError> {
    let mut i = start + 1;
    while i < source.len() {
        match source[i] {
            b'\\' => i += 2,
            b'\n' => break,
            b if b == quote => return Ok(i + 1),
            _ => i += 1,
        }
    }
    Err(ParseError::at(start, what))
}

fn scan_text_block(source: &[u8], start: usize) -> Result<usize, ParseError> {
    let mut i = start + 3;
    while i < source.len() {
        if source[i] == b'\\' {
            i += 2;
        } else if source[i..].starts_with(b"\"\"\"") {
            return Ok(i + 3);
        } else {
            i += 1;
        }
    }
    Err(ParseError::at(start, "unterminated text block"))
}

fn scan_number(source: &[u8], start: usize) -> usize {
    let is_hex = source[start..].starts_with(b"0x") || source[start..].starts_with(b"0X");
    let mut i = start;
    while i < source.len() {
        let b = source[i];
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'.' {
            i += 1;
        } else if (b == b'+' || b == b'-') && i > start {
            // Exponent sign: 1e-5, 0x1p+3
            let prev = source[i - 1].to_ascii_lowercase();
            if (prev == b'e' && !is_hex) || prev == b'p' {
                i += 1;
            } else {
                break;
            }
        } else {
            break;
        }
    }
    i
}
