//! Lexer for song notation.
//!
//! Converts raw source bytes into a stream of [`Token`]s. Words are maximal
//! runs of printable ASCII; `//` starts a comment that runs to end of line.
//! Newlines are significant because directive arguments must share a line
//! with their directive.

use super::error::CompileError;
use super::token::{Keyword, Pos, Token, TokenKind};

pub struct Lexer<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            bytes: source,
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            self.skip_comment();

            if self.is_at_end() {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    pos: self.here(),
                });
                break;
            }

            let byte = self.peek();

            if byte == b'\n' {
                tokens.push(Token {
                    kind: TokenKind::Newline,
                    pos: self.here(),
                });
                self.advance();
                self.line += 1;
                self.col = 1;
                continue;
            }

            if !byte.is_ascii_graphic() {
                return Err(CompileError::unexpected(
                    format!("unexpected byte 0x{byte:02x}"),
                    self.here(),
                ));
            }

            tokens.push(self.lex_word());
        }

        Ok(tokens)
    }

    fn here(&self) -> Pos {
        Pos {
            offset: self.pos,
            line: self.line,
            col: self.col,
        }
    }

    fn peek(&self) -> u8 {
        self.bytes[self.pos]
    }

    fn peek_next(&self) -> Option<u8> {
        self.bytes.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> u8 {
        let byte = self.bytes[self.pos];
        self.pos += 1;
        if byte != b'\n' {
            self.col += 1;
        }
        byte
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn at_comment(&self) -> bool {
        !self.is_at_end() && self.peek() == b'/' && self.peek_next() == Some(b'/')
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() {
            match self.peek() {
                b' ' | b'\t' | b'\r' => {
                    self.advance();
                }
                _ => break,
            }
        }
    }

    fn skip_comment(&mut self) {
        if self.at_comment() {
            while !self.is_at_end() && self.peek() != b'\n' {
                self.advance();
            }
        }
    }

    fn lex_word(&mut self) -> Token {
        let pos = self.here();
        let start = self.pos;

        while !self.is_at_end() && self.peek().is_ascii_graphic() && !self.at_comment() {
            self.advance();
        }

        // Only printable ASCII was consumed, so this is valid UTF-8.
        let word = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();

        let kind = if let Some(keyword) = Keyword::from_word(&word) {
            TokenKind::Keyword(keyword)
        } else if word.bytes().all(|b| b.is_ascii_digit()) {
            match word.parse::<u32>() {
                Ok(n) => TokenKind::Number(n),
                Err(_) => TokenKind::Word(word),
            }
        } else {
            TokenKind::Word(word)
        };

        Token { kind, pos }
    }
}
