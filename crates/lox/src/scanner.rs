// SPDX-License-Identifier: GPL-3.0-or-later
//
// Copyright (C) 2026 Lox Contributors

//! Source text → token stream.
//!
//! The scanner is lazy: it holds a cursor into the source bytes and
//! produces one [`Token`] per call to [`Scanner::scan_token`], with no
//! lookahead buffer beyond the two characters `peek`/`peek_next` expose.
//! Tokens borrow their lexeme from the source rather than copying it.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    // Single-character
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Minus,
    Plus,
    Semicolon,
    Slash,
    Star,
    Question,
    Colon,
    // One or two character
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    // Literals
    Identifier,
    String,
    Number,
    // Keywords
    And,
    Class,
    Continue,
    Case,
    Default,
    Else,
    False,
    For,
    Fun,
    If,
    Nil,
    Or,
    Print,
    Return,
    Super,
    Switch,
    This,
    True,
    Var,
    While,
    Error,
    Eof,
}

/// A single lexical token.
///
/// `lexeme` borrows directly from the source text; `message` is only
/// meaningful when `kind` is [`TokenKind::Error`], in which case it replaces
/// `lexeme` as the diagnostic text.
#[derive(Clone, Copy, Debug)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub lexeme: &'src str,
    pub line: u32,
}

pub struct Scanner<'src> {
    source: &'src [u8],
    start: usize,
    current: usize,
    line: u32,
}

impl<'src> Scanner<'src> {
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        Self {
            source: source.as_bytes(),
            start: 0,
            current: 0,
            line: 1,
        }
    }

    /// Scan and return the next token. Calling this past the end of source
    /// keeps returning EOF tokens.
    pub fn scan_token(&mut self) -> Token<'src> {
        self.skip_whitespace_and_comments();
        self.start = self.current;

        if self.is_at_end() {
            return self.make_token(TokenKind::Eof);
        }

        let c = self.advance();

        if is_alpha(c) {
            return self.identifier();
        }
        if c.is_ascii_digit() {
            return self.number();
        }

        match c {
            b'(' => self.make_token(TokenKind::LeftParen),
            b')' => self.make_token(TokenKind::RightParen),
            b'{' => self.make_token(TokenKind::LeftBrace),
            b'}' => self.make_token(TokenKind::RightBrace),
            b';' => self.make_token(TokenKind::Semicolon),
            b',' => self.make_token(TokenKind::Comma),
            b'.' => self.make_token(TokenKind::Dot),
            b'-' => self.make_token(TokenKind::Minus),
            b'+' => self.make_token(TokenKind::Plus),
            b'/' => self.make_token(TokenKind::Slash),
            b'*' => self.make_token(TokenKind::Star),
            b'?' => self.make_token(TokenKind::Question),
            b':' => self.make_token(TokenKind::Colon),
            b'!' => {
                let kind = if self.matches(b'=') {
                    TokenKind::BangEqual
                } else {
                    TokenKind::Bang
                };
                self.make_token(kind)
            }
            b'=' => {
                let kind = if self.matches(b'=') {
                    TokenKind::EqualEqual
                } else {
                    TokenKind::Equal
                };
                self.make_token(kind)
            }
            b'<' => {
                let kind = if self.matches(b'=') {
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                };
                self.make_token(kind)
            }
            b'>' => {
                let kind = if self.matches(b'=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                };
                self.make_token(kind)
            }
            b'"' => self.string(),
            _ => self.error_token("Unexpected character."),
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> u8 {
        let c = self.source[self.current];
        self.current += 1;
        c
    }

    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.source[self.current]
        }
    }

    fn peek_next(&self) -> u8 {
        if self.current + 1 >= self.source.len() {
            0
        } else {
            self.source[self.current + 1]
        }
    }

    fn matches(&mut self, expected: u8) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                b' ' | b'\r' | b'\t' => {
                    self.current += 1;
                }
                b'\n' => {
                    self.line += 1;
                    self.current += 1;
                }
                b'/' if self.peek_next() == b'/' => {
                    while self.peek() != b'\n' && !self.is_at_end() {
                        self.current += 1;
                    }
                }
                b'/' if self.peek_next() == b'*' => {
                    self.skip_block_comment();
                }
                _ => return,
            }
        }
    }

    /// Nested-tolerant: a `/*` inside a block comment opens another nesting
    /// level rather than being ignored. Leaves the cursor past the comment,
    /// or at end of source if it was never terminated (the caller reports
    /// that as an error token at the next `scan_token` call).
    fn skip_block_comment(&mut self) {
        self.current += 2; // consume "/*"
        let mut depth = 1usize;
        while depth > 0 {
            if self.is_at_end() {
                return;
            }
            if self.peek() == b'/' && self.peek_next() == b'*' {
                self.current += 2;
                depth += 1;
            } else if self.peek() == b'*' && self.peek_next() == b'/' {
                self.current += 2;
                depth -= 1;
            } else {
                if self.peek() == b'\n' {
                    self.line += 1;
                }
                self.current += 1;
            }
        }
    }

    fn string(&mut self) -> Token<'src> {
        while self.peek() != b'"' && !self.is_at_end() {
            if self.peek() == b'\n' {
                self.line += 1;
            }
            self.current += 1;
        }
        if self.is_at_end() {
            return self.error_token("Unterminated string.");
        }
        self.current += 1; // closing quote
        self.make_token(TokenKind::String)
    }

    fn number(&mut self) -> Token<'src> {
        while self.peek().is_ascii_digit() {
            self.current += 1;
        }
        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.current += 1;
            while self.peek().is_ascii_digit() {
                self.current += 1;
            }
        }
        self.make_token(TokenKind::Number)
    }

    fn identifier(&mut self) -> Token<'src> {
        while is_alpha(self.peek()) || self.peek().is_ascii_digit() {
            self.current += 1;
        }
        let text = &self.source[self.start..self.current];
        self.make_token(keyword_kind(text).unwrap_or(TokenKind::Identifier))
    }

    fn make_token(&self, kind: TokenKind) -> Token<'src> {
        Token {
            kind,
            lexeme: std::str::from_utf8(&self.source[self.start..self.current])
                .expect("scanner operates on valid UTF-8 source"),
            line: self.line,
        }
    }

    fn error_token(&self, message: &'static str) -> Token<'src> {
        Token {
            kind: TokenKind::Error,
            lexeme: message,
            line: self.line,
        }
    }
}

const fn is_alpha(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn keyword_kind(text: &[u8]) -> Option<TokenKind> {
    match text {
        b"and" => Some(TokenKind::And),
        b"class" => Some(TokenKind::Class),
        b"continue" => Some(TokenKind::Continue),
        b"case" => Some(TokenKind::Case),
        b"default" => Some(TokenKind::Default),
        b"else" => Some(TokenKind::Else),
        b"false" => Some(TokenKind::False),
        b"for" => Some(TokenKind::For),
        b"fun" => Some(TokenKind::Fun),
        b"if" => Some(TokenKind::If),
        b"nil" => Some(TokenKind::Nil),
        b"or" => Some(TokenKind::Or),
        b"print" => Some(TokenKind::Print),
        b"return" => Some(TokenKind::Return),
        b"super" => Some(TokenKind::Super),
        b"switch" => Some(TokenKind::Switch),
        b"this" => Some(TokenKind::This),
        b"true" => Some(TokenKind::True),
        b"var" => Some(TokenKind::Var),
        b"while" => Some(TokenKind::While),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> std::vec::Vec<TokenKind> {
        let mut scanner = Scanner::new(source);
        let mut out = std::vec::Vec::new();
        loop {
            let token = scanner.scan_token();
            let done = token.kind == TokenKind::Eof;
            out.push(token.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn scans_arithmetic_expression() {
        assert_eq!(
            kinds("1 + 2 * 3;"),
            std::vec![
                TokenKind::Number,
                TokenKind::Plus,
                TokenKind::Number,
                TokenKind::Star,
                TokenKind::Number,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn recognizes_all_keywords_not_identifiers() {
        let source = "and class continue case default else false for fun if nil or print \
                       return super switch this true var while";
        let kinds = kinds(source);
        assert!(!kinds.contains(&TokenKind::Identifier));
        assert_eq!(kinds.last(), Some(&TokenKind::Eof));
    }

    #[test]
    fn distinguishes_one_and_two_char_operators() {
        assert_eq!(kinds("! != = == < <= > >="), std::vec![
            TokenKind::Bang,
            TokenKind::BangEqual,
            TokenKind::Equal,
            TokenKind::EqualEqual,
            TokenKind::Less,
            TokenKind::LessEqual,
            TokenKind::Greater,
            TokenKind::GreaterEqual,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn skips_line_and_nested_block_comments() {
        assert_eq!(
            kinds("// comment\n1 /* outer /* inner */ still outer */ + 2"),
            std::vec![
                TokenKind::Number,
                TokenKind::Plus,
                TokenKind::Number,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_block_comment_reaches_eof_without_panicking() {
        let mut scanner = Scanner::new("/* never closed");
        let token = scanner.scan_token();
        assert_eq!(token.kind, TokenKind::Eof);
    }

    #[test]
    fn unterminated_string_is_an_error_token() {
        let mut scanner = Scanner::new("\"unterminated");
        let token = scanner.scan_token();
        assert_eq!(token.kind, TokenKind::Error);
        assert_eq!(token.lexeme, "Unterminated string.");
    }

    #[test]
    fn strings_may_span_multiple_lines_advancing_the_line_counter() {
        let mut scanner = Scanner::new("\"a\nb\"\nfoo");
        let string_token = scanner.scan_token();
        assert_eq!(string_token.kind, TokenKind::String);
        let ident = scanner.scan_token();
        assert_eq!(ident.line, 3);
    }

    #[test]
    fn number_literal_requires_a_digit_after_the_dot() {
        // `1.` with nothing after the dot scans as NUMBER("1") then DOT.
        assert_eq!(
            kinds("1."),
            std::vec![TokenKind::Number, TokenKind::Dot, TokenKind::Eof]
        );
    }

    proptest::proptest! {
        #[test]
        fn tokenizing_identifiers_and_numbers_recovers_their_text(
            words in proptest::collection::vec(
                proptest::string::string_regex("[a-zA-Z_][a-zA-Z0-9_]{0,8}|[0-9]{1,6}").unwrap(),
                1..20,
            )
        ) {
            let source = words.join(" ");
            let mut scanner = Scanner::new(&source);
            let mut recovered = std::vec::Vec::new();
            loop {
                let token = scanner.scan_token();
                if token.kind == TokenKind::Eof {
                    break;
                }
                proptest::prop_assert_ne!(token.kind, TokenKind::Error);
                recovered.push(token.lexeme.to_owned());
            }
            proptest::prop_assert_eq!(recovered, words);
        }
    }
}
