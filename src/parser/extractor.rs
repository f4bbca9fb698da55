//! Structural token extraction.
//!
//! Runs the lexer, then walks the lexemes with a scope stack to tag the names
//! introduced by package, type, field and method declarations. Everything else
//! stays [`TokenKind::Generic`]. This is a recognizer, not a full Java parser:
//! it only needs brace and parenthesis balance to be right.

use super::lexer::{self, Lexeme, LexemeKind};
use super::{LineMap, ParseError, Token, TokenKind, TokenSpan};

const KEYWORDS: &[&[u8]] = &[
    b"abstract", b"assert", b"boolean", b"break", b"byte", b"case", b"catch", b"char",
    b"class", b"const", b"continue", b"default", b"do", b"double", b"else", b"enum",
    b"extends", b"final", b"finally", b"float", b"for", b"goto", b"if", b"implements",
    b"import", b"instanceof", b"int", b"interface", b"long", b"native", b"new", b"package",
    b"private", b"protected", b"public", b"return", b"short", b"static", b"strictfp",
    b"super", b"switch", b"synchronized", b"this", b"throw", b"throws", b"transient",
    b"try", b"void", b"volatile", b"while", b"true", b"false", b"null",
];

fn is_keyword(text: &[u8]) -> bool {
    KEYWORDS.contains(&text)
}

/// Extract the ordered token stream of `source`.
///
/// Empty, whitespace-only and comment-only inputs produce no tokens. Malformed
/// input (unterminated comments or literals, unbalanced braces or parentheses)
/// is a [`ParseError`] carrying the location of the problem.
pub fn extract_tokens(source: &[u8]) -> Result<Vec<Token>, ParseError> {
    if u32::try_from(source.len()).is_err() {
        return Err(ParseError::at(0, "file too large to tokenize"));
    }

    let located = |err: ParseError| err.locate(&LineMap::new(source));
    let lexemes = lexer::lex(source).map_err(located)?;
    let annotated = Annotator::new(source, &lexemes).run().map_err(located)?;

    let mut tokens = Vec::with_capacity(lexemes.len());
    let mut i = 0;
    while i < lexemes.len() {
        if let Some((start, end)) = annotated.package {
            if i == start {
                tokens.push(Token {
                    kind: TokenKind::PackageDeclaration,
                    span: span_of(lexemes[start].from, lexemes[end].to),
                });
                i = end + 1;
                continue;
            }
        }
        tokens.push(Token {
            kind: annotated.kinds[i],
            span: span_of(lexemes[i].from, lexemes[i].to),
        });
        i += 1;
    }

    Ok(tokens)
}

#[inline]
fn span_of(from: usize, to: usize) -> TokenSpan {
    // Lengths were checked against u32::MAX above
    TokenSpan::new(from as u32, to as u32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    File,
    TypeBody,
    Block,
}

#[derive(Debug, Clone, Copy)]
struct Scope {
    kind: ScopeKind,
    parens: u32,
    /// Inside an enum body, before the `;` that ends the constant list
    enum_constants: bool,
    /// Rest of the current member is an initializer or a signature
    skip_member: bool,
    /// Current member already declared a field (so `, next` is another one)
    field_declarator: bool,
    /// Open `<` of type arguments or type parameters in the current member
    angles: u32,
}

impl Scope {
    fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            parens: 0,
            enum_constants: false,
            skip_member: false,
            field_declarator: false,
            angles: 0,
        }
    }

    fn reset_member(&mut self) {
        self.skip_member = false;
        self.field_declarator = false;
        self.angles = 0;
    }

    fn at_member_level(&self) -> bool {
        self.kind == ScopeKind::TypeBody && self.parens == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeFlavor {
    Class,
    Enum,
}

struct Annotated {
    kinds: Vec<TokenKind>,
    /// Inclusive lexeme range of the package name
    package: Option<(usize, usize)>,
}

struct Annotator<'a> {
    source: &'a [u8],
    lexemes: &'a [Lexeme],
    kinds: Vec<TokenKind>,
    package: Option<(usize, usize)>,
    scopes: Vec<Scope>,
    /// Saw `class Name ...`, waiting for the body's `{`
    pending_type: Option<TypeFlavor>,
}

impl<'a> Annotator<'a> {
    fn new(source: &'a [u8], lexemes: &'a [Lexeme]) -> Self {
        Self {
            source,
            lexemes,
            kinds: vec![TokenKind::Generic; lexemes.len()],
            package: None,
            scopes: vec![Scope::new(ScopeKind::File)],
            pending_type: None,
        }
    }

    fn run(mut self) -> Result<Annotated, ParseError> {
        let mut i = 0;
        while i < self.lexemes.len() {
            let lexeme = self.lexemes[i];
            i = match lexeme.kind {
                LexemeKind::Ident => self.ident(i),
                LexemeKind::Punct(ch) => {
                    self.punct(i, ch)?;
                    i + 1
                }
                LexemeKind::Literal => i + 1,
            };
        }

        if self.scopes.len() > 1 {
            return Err(ParseError::at(self.source.len(), "unexpected end of input, unclosed '{'"));
        }
        if self.scope().parens > 0 {
            return Err(ParseError::at(self.source.len(), "unexpected end of input, unclosed '('"));
        }

        Ok(Annotated {
            kinds: self.kinds,
            package: self.package,
        })
    }

    fn scope(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    fn punct(&mut self, i: usize, ch: u8) -> Result<(), ParseError> {
        let offset = self.lexemes[i].from;
        match ch {
            b'{' => {
                let top = *self.scope();
                let scope = match self.pending_type.take() {
                    Some(flavor) => Scope {
                        enum_constants: flavor == TypeFlavor::Enum,
                        ..Scope::new(ScopeKind::TypeBody)
                    },
                    // Body of an enum constant, `A { ... }`
                    None if top.at_member_level() && top.enum_constants => Scope::new(ScopeKind::TypeBody),
                    // Anonymous class, `new Name(...) { ... }`
                    None if self.creates_instance(i) => Scope::new(ScopeKind::TypeBody),
                    None => Scope::new(ScopeKind::Block),
                };
                self.scopes.push(scope);
            }
            b'}' => {
                let closed = match self.scopes.pop() {
                    Some(scope) if scope.kind != ScopeKind::File => scope,
                    _ => return Err(ParseError::at(offset, "unbalanced '}'")),
                };
                if closed.parens > 0 {
                    return Err(ParseError::at(offset, "unclosed '(' before '}'"));
                }
                self.scope().reset_member();
            }
            b'(' => self.scope().parens += 1,
            b')' => {
                let scope = self.scope();
                if scope.parens == 0 {
                    return Err(ParseError::at(offset, "unbalanced ')'"));
                }
                scope.parens -= 1;
            }
            b';' => {
                let scope = self.scope();
                if scope.parens == 0 {
                    scope.reset_member();
                    scope.enum_constants = false;
                    self.pending_type = None;
                }
            }
            b'=' => {
                let scope = self.scope();
                if scope.at_member_level() {
                    scope.skip_member = true;
                }
            }
            b'<' => {
                let scope = self.scope();
                if scope.at_member_level() && !scope.skip_member {
                    scope.angles += 1;
                }
            }
            b'>' => {
                let scope = self.scope();
                if scope.at_member_level() {
                    scope.angles = scope.angles.saturating_sub(1);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Handle the identifier at `i`; returns the index of the next lexeme to visit
    fn ident(&mut self, i: usize) -> usize {
        let text = self.lexemes[i].text(self.source);
        let prev = i.checked_sub(1).map(|j| self.lexemes[j]);
        let next = self.lexemes.get(i + 1).copied();
        let after_dot = prev.is_some_and(|p| p.is_punct(b'.'));
        let next_is_ident = next.is_some_and(|n| n.is_ident());

        match text {
            b"package" if !after_dot && self.scopes.len() == 1 && self.package.is_none() => {
                return self.package_name(i);
            }
            b"class" | b"interface" | b"enum" if !after_dot && next_is_ident => {
                let flavor = if text == b"enum" { TypeFlavor::Enum } else { TypeFlavor::Class };
                return self.type_name(i + 1, flavor);
            }
            b"record" if !after_dot && next_is_ident => {
                let opens = self
                    .lexemes
                    .get(i + 2)
                    .is_some_and(|l| l.is_punct(b'(') || l.is_punct(b'<'));
                if opens {
                    return self.type_name(i + 1, TypeFlavor::Class);
                }
            }
            _ => {}
        }

        let scope = *self.scope();
        if !scope.at_member_level() || self.pending_type.is_some() || is_keyword(text) {
            return i + 1;
        }

        let next_is = |ch: u8| next.is_some_and(|n| n.is_punct(ch));
        let prev_is = |ch: u8| prev.is_some_and(|p| p.is_punct(ch));

        if scope.enum_constants {
            let annotated = prev.is_some_and(|p| p.is_ident())
                && i >= 2
                && self.lexemes[i - 2].is_punct(b'@');
            let starts = prev_is(b'{') || prev_is(b',') || annotated;
            let ends = next.is_none() || [b',', b';', b'(', b'{', b'}'].into_iter().any(next_is);
            if starts && ends {
                self.kinds[i] = TokenKind::FieldDeclaration;
            }
            return i + 1;
        }

        if next_is(b'(') {
            let declares = !scope.skip_member
                && !after_dot
                && !prev_is(b'@')
                && !prev.is_some_and(|p| p.text(self.source) == b"new");
            if declares {
                self.kinds[i] = TokenKind::MethodDeclaration;
                self.scope().skip_member = true;
            }
        } else if scope.angles == 0 && (next_is(b'=') || next_is(b';') || next_is(b',')) {
            let type_end = prev.is_some_and(|p| p.is_ident() || p.is_punct(b'>') || p.is_punct(b']'));
            if (!scope.skip_member && type_end) || (prev_is(b',') && scope.field_declarator) {
                self.kinds[i] = TokenKind::FieldDeclaration;
                self.scope().field_declarator = true;
            }
        }

        i + 1
    }

    /// Whether the `{` at `brace` directly follows `new Name<...>(...)`
    fn creates_instance(&self, brace: usize) -> bool {
        let lexemes = self.lexemes;
        let Some(mut j) = brace.checked_sub(1).filter(|&j| lexemes[j].is_punct(b')')) else {
            return false;
        };

        // Back to the matching '('
        let mut depth = 0u32;
        loop {
            let lexeme = lexemes[j];
            if lexeme.is_punct(b')') {
                depth += 1;
            } else if lexeme.is_punct(b'(') {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            match j.checked_sub(1) {
                Some(prev) => j = prev,
                None => return false,
            }
        }

        // Optional type arguments, `new Foo<Bar>()`
        let Some(mut j) = j.checked_sub(1) else {
            return false;
        };
        if lexemes[j].is_punct(b'>') {
            let mut depth = 0u32;
            loop {
                if lexemes[j].is_punct(b'>') {
                    depth += 1;
                } else if lexemes[j].is_punct(b'<') {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                match j.checked_sub(1) {
                    Some(prev) => j = prev,
                    None => return false,
                }
            }
            let Some(prev) = j.checked_sub(1) else {
                return false;
            };
            j = prev;
        }

        // Possibly qualified type name, then `new`
        loop {
            if !lexemes[j].is_ident() {
                return false;
            }
            let Some(prev) = j.checked_sub(1) else {
                return false;
            };
            if lexemes[prev].is_punct(b'.') {
                match prev.checked_sub(1) {
                    Some(before) => j = before,
                    None => return false,
                }
            } else {
                return lexemes[prev].text(self.source) == b"new";
            }
        }
    }

    fn type_name(&mut self, name: usize, flavor: TypeFlavor) -> usize {
        self.kinds[name] = TokenKind::ClassDeclaration;
        self.pending_type = Some(flavor);
        name + 1
    }

    /// `package a.b.c` - mark the qualified name as one range
    fn package_name(&mut self, i: usize) -> usize {
        let lexemes = self.lexemes;
        if !lexemes.get(i + 1).is_some_and(|l| l.is_ident()) || self.scope().parens > 0 {
            return i + 1;
        }
        let mut end = i + 1;
        while end + 2 < lexemes.len() && lexemes[end + 1].is_punct(b'.') && lexemes[end + 2].is_ident() {
            end += 2;
        }
        self.package = Some((i + 1, end));
        end + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names_of(source: &str, kind: TokenKind) -> Vec<String> {
        extract_tokens(source.as_bytes())
            .unwrap()
            .into_iter()
            .filter(|t| t.kind == kind)
            .map(|t| String::from_utf8(t.span.slice(source.as_bytes()).unwrap().to_vec()).unwrap())
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(extract_tokens(b"").unwrap().is_empty());
        assert!(extract_tokens(b"  \n\t ").unwrap().is_empty());
        assert!(extract_tokens(b"/* nothing */ // here").unwrap().is_empty());
    }

    #[test]
    fn test_package_and_class() {
        let source = "package my_package;\npublic class MyClass {\n}\n";
        let tokens = extract_tokens(source.as_bytes()).unwrap();

        let packages: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::PackageDeclaration)
            .collect();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].span.slice(source.as_bytes()), Some(&b"my_package"[..]));
        assert_eq!(names_of(source, TokenKind::ClassDeclaration), vec!["MyClass"]);

        for pair in tokens.windows(2) {
            assert!(pair[0].span.from <= pair[1].span.from);
            assert!(pair[0].span.to <= pair[1].span.from);
        }
    }

    #[test]
    fn test_qualified_package_is_one_token() {
        let source = "package com.example.pkg;\n";
        assert_eq!(names_of(source, TokenKind::PackageDeclaration), vec!["com.example.pkg"]);
        let tokens = extract_tokens(source.as_bytes()).unwrap();
        // package keyword, the name, and ';'
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_multiple_classes() {
        let source = "package pkg;\nclass A {}\nclass B {}\ninterface C {}\n";
        assert_eq!(names_of(source, TokenKind::ClassDeclaration), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_class_literal_is_not_a_declaration() {
        let source = "class A { Object k = A.class; }";
        assert_eq!(names_of(source, TokenKind::ClassDeclaration), vec!["A"]);
        assert_eq!(names_of(source, TokenKind::FieldDeclaration), vec!["k"]);
    }

    #[test]
    fn test_methods_and_constructors() {
        let source = r#"
            package pkg;
            class A extends B implements C, D {
                public A() { super(); }
                @Override
                public <T> List<T> items(int n) throws IOException { return call(n); }
                abstract void run() throws IOException, Exception;
                static { init(); }
            }
        "#;
        assert_eq!(names_of(source, TokenKind::MethodDeclaration), vec!["A", "items", "run"]);
        assert!(names_of(source, TokenKind::FieldDeclaration).is_empty());
    }

    #[test]
    fn test_fields() {
        let source = r#"
            class A {
                private int a, b = 2, c;
                Map<String, List<Integer>> map = new HashMap<String, List<Integer>>();
                int[] arr = {1, 2};
                static final String NAME = compute(1, 2);
            }
        "#;
        assert_eq!(
            names_of(source, TokenKind::FieldDeclaration),
            vec!["a", "b", "c", "map", "arr", "NAME"]
        );
        assert!(names_of(source, TokenKind::MethodDeclaration).is_empty());
    }

    #[test]
    fn test_enum_constants_and_methods() {
        let source = "enum E { SOME_VALUE, @Deprecated OTHER(1) { void g() {} }, LAST; int x; void f() {} }";
        assert_eq!(names_of(source, TokenKind::ClassDeclaration), vec!["E"]);
        assert_eq!(
            names_of(source, TokenKind::FieldDeclaration),
            vec!["SOME_VALUE", "OTHER", "LAST", "x"]
        );
        assert_eq!(names_of(source, TokenKind::MethodDeclaration), vec!["g", "f"]);
    }

    #[test]
    fn test_nested_and_local_types() {
        let source = r#"
            class Outer {
                static class Inner { int depth; }
                void m() { class Local { void n() {} } int notAField = 1; }
                record Point(int x, int y) { double length() { return 0; } }
            }
        "#;
        assert_eq!(
            names_of(source, TokenKind::ClassDeclaration),
            vec!["Outer", "Inner", "Local", "Point"]
        );
        assert_eq!(names_of(source, TokenKind::FieldDeclaration), vec!["depth"]);
        assert_eq!(names_of(source, TokenKind::MethodDeclaration), vec!["m", "n", "length"]);
    }

    #[test]
    fn test_type_bounds_are_not_fields() {
        let source = r#"
            class A {
                Map<? extends K, V> cache;
                List<? super Number> sink, spare;
                public <T extends Comparable, U> U convert(T t) { return null; }
                static <K extends Key<K>, V> void put(K k, V v) {}
            }
        "#;
        assert_eq!(names_of(source, TokenKind::FieldDeclaration), vec!["cache", "sink", "spare"]);
        assert_eq!(names_of(source, TokenKind::MethodDeclaration), vec!["convert", "put"]);
    }

    #[test]
    fn test_anonymous_class_methods() {
        let source = r#"
            class A {
                Runnable r = new Runnable() { public void run() {} };
                Comparator<String> c = new java.util.Comparator<String>() {
                    int calls;
                    public int compare(String a, String b) { return 0; }
                };
                void start() {
                    submit(new Task<>(1) { void call() { if (ready()) { go(); } } });
                    int[] counts = new int[] {1, 2};
                }
            }
        "#;
        assert_eq!(names_of(source, TokenKind::FieldDeclaration), vec!["r", "c", "calls"]);
        assert_eq!(
            names_of(source, TokenKind::MethodDeclaration),
            vec!["run", "compare", "start", "call"]
        );
    }

    #[test]
    fn test_statements_inside_methods_are_generic() {
        let source = "class A { void f() { int local = 1; g(local); } }";
        assert_eq!(names_of(source, TokenKind::MethodDeclaration), vec!["f"]);
        assert!(names_of(source, TokenKind::FieldDeclaration).is_empty());
        let tokens = extract_tokens(source.as_bytes()).unwrap();
        assert_eq!(tokens.len(), 20);
    }

    #[test]
    fn test_annotations_are_not_methods() {
        let source = "@Entity(name = \"x\") class A { @Column(length = 5) String s; }";
        assert_eq!(names_of(source, TokenKind::MethodDeclaration), Vec::<String>::new());
        assert_eq!(names_of(source, TokenKind::FieldDeclaration), vec!["s"]);
    }

    #[test]
    fn test_unbalanced_input_is_an_error() {
        let err = extract_tokens(b"class A {\n  void f() {\n}").unwrap_err();
        assert_eq!(err.message, "unexpected end of input, unclosed '{'");

        let err = extract_tokens(b"class A { }\n}").unwrap_err();
        assert_eq!((err.line, err.column), (1, 0));

        assert!(extract_tokens(b"class A { void f() { g()); } }").is_err());
        assert!(extract_tokens(b"class A { String s = \"open; }").is_err());
    }

    #[test]
    fn test_literals_and_punctuation_are_generic() {
        let source = "x = \"str\" + 'c' + 42;";
        let tokens = extract_tokens(source.as_bytes()).unwrap();
        assert_eq!(tokens.len(), 8);
        assert!(tokens.iter().all(|t| t.kind == TokenKind::Generic));
    }
}
