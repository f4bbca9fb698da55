//! Source tokenization for the search index.
//!
//! - [`lexer`] - byte-level lexer (identifiers, literals, punctuation)
//! - [`extractor`] - structural tagging of package, type, field and method names
//! - [`terms`] - turns tokens into lower-cased index terms with a kind payload
//! - [`line_map`] - byte offset to line/column translation
//!
//! ```
//! use srcdb::parser::{extract_tokens, TokenKind};
//!
//! let source = b"package my_package;\npublic class MyClass {\n}\n";
//! let tokens = extract_tokens(source).unwrap();
//! let package = tokens.iter().find(|t| t.kind == TokenKind::PackageDeclaration).unwrap();
//! assert_eq!(package.span.slice(source), Some(&b"my_package"[..]));
//! ```

pub mod extractor;
pub mod lexer;
pub mod line_map;
pub mod terms;

pub use extractor::extract_tokens;
pub use line_map::LineMap;
pub use terms::{terms_from_tokens, Term, ERROR_TERM};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structural role of a token. The numeric tag is stored as the term payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum TokenKind {
    #[default]
    Generic = 0,
    PackageDeclaration = 1,
    ClassDeclaration = 2,
    FieldDeclaration = 3,
    MethodDeclaration = 4,
}

impl TokenKind {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn is_declaration(self) -> bool {
        self != TokenKind::Generic
    }
}

/// Half-open byte range into the source buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenSpan {
    pub from: u32,
    pub to: u32,
}

impl TokenSpan {
    pub fn new(from: u32, to: u32) -> Self {
        Self { from, to }
    }

    /// The covered bytes, or `None` if the span does not fit `source`
    pub fn slice(self, source: &[u8]) -> Option<&[u8]> {
        source.get(self.from as usize..self.to as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: TokenSpan,
}

/// Why a file could not be tokenized
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at line {}, column {}", .line + 1, .column + 1)]
pub struct ParseError {
    pub offset: usize,
    /// Zero-based
    pub line: u32,
    /// Zero-based
    pub column: u32,
    pub message: &'static str,
}

impl ParseError {
    pub(crate) fn at(offset: usize, message: &'static str) -> Self {
        Self {
            offset,
            line: 0,
            column: 0,
            message,
        }
    }

    pub(crate) fn locate(mut self, lines: &LineMap) -> Self {
        let pos = lines.position(self.offset);
        self.line = pos.line;
        self.column = pos.column;
        self
    }
}
