//! Token scanner for transpiled C text.
//!
//! The scanner is deliberately shallow: it knows enough about C to find
//! brace depth and declaration shapes. Comments, string and character
//! literals and whole preprocessor lines never produce tokens.

/// Kind of a token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    Literal, // string or char literal

    LParen,   // (
    RParen,   // )
    LBrace,   // {
    RBrace,   // }
    LBracket, // [
    RBracket, // ]
    Comma,    // ,
    Semi,     // ;
    Star,     // *
    Ellipsis, // ...
    Equal,    // =

    /// Any other punctuation character.
    Punct,
}

/// A single token with its byte range and 1-based line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    pub line: usize,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

/// Lex a C source string into tokens.
///
/// Tokens refer to `source` via byte offsets.
pub fn lex(source: &str) -> Vec<Token> {
    let mut lexer = Lexer {
        chars: source.as_bytes(),
        index: 0,
        line: 1,
        at_line_start: true,
    };
    lexer.run()
}

struct Lexer<'src> {
    chars: &'src [u8],
    index: usize,
    line: usize,
    at_line_start: bool,
}

impl<'src> Lexer<'src> {
    fn run(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.peek_char() {
            if ch == b'\n' {
                self.consume_char();
                continue;
            }
            if is_whitespace(ch) {
                self.consume_char();
                continue;
            }
            if ch == b'#' && self.at_line_start {
                self.skip_preprocessor_line();
                continue;
            }
            if ch == b'/' && self.peek_next() == Some(b'/') {
                self.skip_line_comment();
                continue;
            }
            if ch == b'/' && self.peek_next() == Some(b'*') {
                self.skip_block_comment();
                continue;
            }

            self.at_line_start = false;
            let start = self.index;
            let line = self.line;
            let kind = match ch {
                b'(' => self.single(TokenKind::LParen),
                b')' => self.single(TokenKind::RParen),
                b'{' => self.single(TokenKind::LBrace),
                b'}' => self.single(TokenKind::RBrace),
                b'[' => self.single(TokenKind::LBracket),
                b']' => self.single(TokenKind::RBracket),
                b',' => self.single(TokenKind::Comma),
                b';' => self.single(TokenKind::Semi),
                b'*' => self.single(TokenKind::Star),
                b'=' => self.single(TokenKind::Equal),
                b'.' if self.peek_next() == Some(b'.') && self.peek_at(2) == Some(b'.') => {
                    self.index += 3;
                    TokenKind::Ellipsis
                }
                b'"' | b'\'' => {
                    self.lex_quoted(ch);
                    TokenKind::Literal
                }
                b'0'..=b'9' => {
                    self.lex_number();
                    TokenKind::Number
                }
                _ if is_ident_start(ch) => {
                    self.lex_ident();
                    TokenKind::Ident
                }
                _ => self.single(TokenKind::Punct),
            };

            tokens.push(Token {
                kind,
                start,
                end: self.index,
                line,
            });
        }

        tokens
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.consume_char();
        kind
    }

    fn skip_preprocessor_line(&mut self) {
        while let Some(ch) = self.peek_char() {
            match ch {
                b'\\' if self.peek_next() == Some(b'\n') => {
                    self.consume_char();
                    self.consume_char();
                }
                b'\\' if self.peek_next() == Some(b'\r') && self.peek_at(2) == Some(b'\n') => {
                    self.index += 2;
                    self.consume_char();
                }
                b'\n' => return,
                b'/' if self.peek_next() == Some(b'*') => self.skip_block_comment(),
                _ => self.consume_char(),
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch == b'\n' {
                return;
            }
            self.consume_char();
        }
    }

    fn skip_block_comment(&mut self) {
        self.index += 2;
        while let Some(ch) = self.peek_char() {
            if ch == b'*' && self.peek_next() == Some(b'/') {
                self.index += 2;
                return;
            }
            self.consume_char();
        }
    }

    fn lex_quoted(&mut self, quote: u8) {
        self.consume_char();
        while let Some(ch) = self.peek_char() {
            match ch {
                b'\\' => {
                    self.consume_char();
                    if self.peek_char().is_some() {
                        self.consume_char();
                    }
                }
                // Unterminated literal ends at the line break.
                b'\n' => return,
                _ if ch == quote => {
                    self.consume_char();
                    return;
                }
                _ => self.consume_char(),
            }
        }
    }

    fn lex_number(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_alphanumeric() || ch == b'.' || ch == b'_' {
                self.consume_char();
            } else {
                break;
            }
        }
    }

    fn lex_ident(&mut self) {
        while let Some(ch) = self.peek_char() {
            if is_ident_continue(ch) {
                self.consume_char();
            } else {
                break;
            }
        }
    }

    fn peek_char(&self) -> Option<u8> {
        self.chars.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.peek_at(1)
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.chars.get(self.index + offset).copied()
    }

    fn consume_char(&mut self) {
        if let Some(ch) = self.peek_char() {
            self.index += 1;
            if ch == b'\n' {
                self.line += 1;
                self.at_line_start = true;
            }
        }
    }
}

fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\r' | b'\x0b' | b'\x0c')
}

// Bytes of multi-byte UTF-8 characters count as identifier bytes, so a
// token never ends inside a character.
fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_' || ch >= 0x80
}

fn is_ident_continue(ch: u8) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}
