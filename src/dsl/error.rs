//! Error types for the song compiler.

use std::fmt;

use super::token::Pos;

/// An error that occurred during compilation. Compilation stops at the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub kind: ErrorKind,
    /// Byte offset of the offending token.
    pub offset: usize,
    pub line: usize,
    pub col: usize,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnexpectedToken,
    InvalidPitch,
    InvalidDuration,
    UnterminatedDirective,
}

impl CompileError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, pos: Pos) -> Self {
        Self {
            kind,
            offset: pos.offset,
            line: pos.line,
            col: pos.col,
            message: message.into(),
        }
    }

    pub fn unexpected(message: impl Into<String>, pos: Pos) -> Self {
        Self::new(ErrorKind::UnexpectedToken, message, pos)
    }

    pub fn invalid_pitch(message: impl Into<String>, pos: Pos) -> Self {
        Self::new(ErrorKind::InvalidPitch, message, pos)
    }

    pub fn invalid_duration(message: impl Into<String>, pos: Pos) -> Self {
        Self::new(ErrorKind::InvalidDuration, message, pos)
    }

    pub fn unterminated(message: impl Into<String>, pos: Pos) -> Self {
        Self::new(ErrorKind::UnterminatedDirective, message, pos)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::UnexpectedToken => "unexpected token",
            ErrorKind::InvalidPitch => "invalid pitch",
            ErrorKind::InvalidDuration => "invalid duration",
            ErrorKind::UnterminatedDirective => "unterminated directive",
        };
        f.write_str(name)
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}:{}] {}: {} (offset {})",
            self.line, self.col, self.kind, self.message, self.offset
        )
    }
}

impl std::error::Error for CompileError {}
