use super::{Token, TokenKind, TokenSpan};
use serde::{Deserialize, Serialize};

/// Text of the term emitted when a token span does not fit the source
pub const ERROR_TERM: &str = "<error>";

/// A lower-cased index term with the structural kind of the token it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub text: String,
    pub span: TokenSpan,
    pub kind: TokenKind,
}

impl Term {
    /// Payload stored alongside the term in the search index
    pub fn payload(&self) -> u8 {
        self.kind.tag()
    }

    pub fn is_error(&self) -> bool {
        self.text == ERROR_TERM
    }
}

/// Turn tokens into index terms, one per token and in token order.
///
/// Invalid UTF-8 is replaced lossily. A span that falls outside `source`
/// produces [`ERROR_TERM`] instead of failing the file.
pub fn terms_from_tokens(source: &[u8], tokens: &[Token]) -> Vec<Term> {
    tokens
        .iter()
        .map(|token| {
            let text = match token.span.slice(source) {
                Some(bytes) => String::from_utf8_lossy(bytes).to_lowercase(),
                None => {
                    log::warn!(
                        "token span {}..{} outside source of {} bytes",
                        token.span.from,
                        token.span.to,
                        source.len()
                    );
                    ERROR_TERM.to_string()
                }
            };
            Term {
                text,
                span: token.span,
                kind: token.kind,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::extract_tokens;

    #[test]
    fn test_terms_are_lowercased_with_payload() {
        let source = b"package My_Package;\nclass MyClass {}";
        let tokens = extract_tokens(source).unwrap();
        let terms = terms_from_tokens(source, &tokens);

        assert_eq!(terms.len(), tokens.len());
        let package = terms.iter().find(|t| t.kind == TokenKind::PackageDeclaration).unwrap();
        assert_eq!(package.text, "my_package");
        assert_eq!(package.payload(), 1);
        let class = terms.iter().find(|t| t.kind == TokenKind::ClassDeclaration).unwrap();
        assert_eq!(class.text, "myclass");
        assert_eq!(class.payload(), 2);
    }

    #[test]
    fn test_out_of_range_span_is_sentinel() {
        let tokens = [
            Token {
                kind: TokenKind::Generic,
                span: TokenSpan::new(0, 3),
            },
            Token {
                kind: TokenKind::FieldDeclaration,
                span: TokenSpan::new(2, 40),
            },
        ];
        let terms = terms_from_tokens(b"abcd", &tokens);
        assert_eq!(terms[0].text, "abc");
        assert!(terms[1].is_error());
        assert_eq!(terms[1].payload(), TokenKind::FieldDeclaration.tag());
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let source = b"caf\xff";
        let tokens = [Token {
            kind: TokenKind::Generic,
            span: TokenSpan::new(0, 4),
        }];
        assert_eq!(terms_from_tokens(source, &tokens)[0].text, "caf\u{fffd}");
    }
}
