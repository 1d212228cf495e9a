//! Token types for the song lexer.

/// A position in the source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    /// Byte offset from the start of the source.
    pub offset: usize,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column, counted in bytes.
    pub col: usize,
}

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
}

/// The kind of token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(Keyword),
    /// A run of digits that fits in a `u32`.
    Number(u32),
    /// Any other word: note names, lengths, label names.
    Word(String),
    Newline,
    Eof,
}

/// Reserved words. Matched case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Tempo,
    Rest,
    Repeat,
    End,
    Label,
    Jump,
    Call,
    Return,
    Break,
}

impl Keyword {
    pub fn from_word(word: &str) -> Option<Keyword> {
        let keyword = match word.to_ascii_uppercase().as_str() {
            "TEMPO" => Keyword::Tempo,
            "REST" => Keyword::Rest,
            "REPEAT" => Keyword::Repeat,
            "END" => Keyword::End,
            "LABEL" => Keyword::Label,
            "JUMP" => Keyword::Jump,
            "CALL" => Keyword::Call,
            "RETURN" => Keyword::Return,
            "BREAK" => Keyword::Break,
            _ => return None,
        };
        Some(keyword)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Tempo => "TEMPO",
            Keyword::Rest => "REST",
            Keyword::Repeat => "REPEAT",
            Keyword::End => "END",
            Keyword::Label => "LABEL",
            Keyword::Jump => "JUMP",
            Keyword::Call => "CALL",
            Keyword::Return => "RETURN",
            Keyword::Break => "BREAK",
        }
    }
}

impl TokenKind {
    /// Source-like spelling for error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Keyword(k) => k.as_str().to_string(),
            TokenKind::Number(n) => n.to_string(),
            TokenKind::Word(w) => format!("'{w}'"),
            TokenKind::Newline => "end of line".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }

    /// Whether this token ends the current line.
    pub fn ends_line(&self) -> bool {
        matches!(self, TokenKind::Newline | TokenKind::Eof)
    }
}
