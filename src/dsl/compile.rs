//! Code generator — turns the token stream into a [`Program`] in one pass.
//!
//! Each statement emits at most one instruction as soon as it is read.
//! Forward references to labels are recorded and patched after the last
//! token; the token stream itself is never revisited.

use std::collections::HashMap;

use crate::vm::instruction::{Control, Instruction, Length};
use crate::vm::program::Program;

use super::error::CompileError;
use super::note::{looks_like_note, parse_length, parse_note_name};
use super::token::{Keyword, Pos, Token, TokenKind};

/// Highest tempo a `TEMPO` directive accepts.
pub const MAX_TEMPO: u32 = 1000;

/// A jump or call whose label was not yet defined when it was read.
struct Fixup {
    index: usize,
    label: String,
    pos: Pos,
}

pub struct CodeGen {
    tokens: Vec<Token>,
    pos: usize,
    instructions: Vec<Instruction>,
    labels: HashMap<String, usize>,
    fixups: Vec<Fixup>,
    /// Index and position of every `REPEAT` still waiting for its `END`.
    open_repeats: Vec<(usize, Pos)>,
}

impl CodeGen {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            instructions: Vec::new(),
            labels: HashMap::new(),
            fixups: Vec::new(),
            open_repeats: Vec::new(),
        }
    }

    pub fn generate(mut self) -> Result<Program, CompileError> {
        loop {
            let token = self.advance();
            match token.kind {
                TokenKind::Newline => continue,
                TokenKind::Eof => break,
                TokenKind::Keyword(keyword) => self.statement(keyword, token.pos)?,
                TokenKind::Number(frequency) => self.note(frequency, &token)?,
                TokenKind::Word(ref word) => {
                    let frequency = parse_note_name(word).ok_or_else(|| {
                        if is_digits(word) {
                            CompileError::invalid_pitch(
                                format!("frequency {word} Hz too large"),
                                token.pos,
                            )
                        } else if looks_like_note(word) {
                            CompileError::invalid_pitch(format!("invalid note '{word}'"), token.pos)
                        } else {
                            CompileError::unexpected(format!("unexpected '{word}'"), token.pos)
                        }
                    })?;
                    self.note(frequency, &token)?;
                }
            }
        }

        if let Some(&(_, pos)) = self.open_repeats.last() {
            return Err(CompileError::unterminated("REPEAT without END", pos));
        }

        self.resolve_labels()?;
        Ok(Program::new(self.instructions))
    }

    fn statement(&mut self, keyword: Keyword, pos: Pos) -> Result<(), CompileError> {
        match keyword {
            Keyword::Tempo => {
                let bpm = self.expect_number(keyword, pos)?;
                if bpm == 0 || bpm > MAX_TEMPO {
                    return Err(CompileError::invalid_duration(
                        format!("tempo {bpm} outside 1..={MAX_TEMPO}"),
                        pos,
                    ));
                }
                self.emit(Instruction::Tempo { bpm });
            }
            Keyword::Rest => {
                let length = self.expect_length("REST", pos)?;
                self.emit(Instruction::Rest { length });
            }
            Keyword::Repeat => {
                let count = self.expect_number(keyword, pos)?;
                self.open_repeats.push((self.instructions.len(), pos));
                // `exit` is patched when the matching END is read.
                self.emit(Instruction::Control(Control::Repeat { count, exit: 0 }));
            }
            Keyword::End => {
                let (start, _) = self
                    .open_repeats
                    .pop()
                    .ok_or_else(|| CompileError::unexpected("END without REPEAT", pos))?;
                self.emit(Instruction::Control(Control::EndRepeat { body: start + 1 }));
                let exit = self.instructions.len();
                if let Instruction::Control(Control::Repeat { exit: slot, .. }) =
                    &mut self.instructions[start]
                {
                    *slot = exit;
                }
            }
            Keyword::Label => {
                let name = self.expect_label(keyword, pos)?;
                if self.labels.contains_key(&name) {
                    return Err(CompileError::unexpected(
                        format!("label '{name}' defined twice"),
                        pos,
                    ));
                }
                self.labels.insert(name, self.instructions.len());
            }
            Keyword::Jump | Keyword::Call => {
                let label = self.expect_label(keyword, pos)?;
                let index = self.instructions.len();
                let control = if keyword == Keyword::Jump {
                    Control::Jump(0)
                } else {
                    Control::Call(0)
                };
                self.emit(Instruction::Control(control));
                self.fixups.push(Fixup { index, label, pos });
            }
            Keyword::Return => self.emit(Instruction::Control(Control::Return)),
            Keyword::Break => self.emit(Instruction::Breakpoint),
        }
        Ok(())
    }

    fn note(&mut self, frequency: u32, pitch: &Token) -> Result<(), CompileError> {
        if frequency == 0 {
            return Err(CompileError::invalid_pitch(
                "frequency must be above 0 Hz",
                pitch.pos,
            ));
        }
        let what = match &pitch.kind {
            TokenKind::Word(w) => w.clone(),
            other => other.describe(),
        };
        let length = self.expect_length(&what, pitch.pos)?;
        self.emit(Instruction::Note { frequency, length });
        Ok(())
    }

    fn resolve_labels(&mut self) -> Result<(), CompileError> {
        for fixup in &self.fixups {
            let target = *self.labels.get(&fixup.label).ok_or_else(|| {
                CompileError::unterminated(format!("undefined label '{}'", fixup.label), fixup.pos)
            })?;
            if let Instruction::Control(Control::Jump(t) | Control::Call(t)) =
                &mut self.instructions[fixup.index]
            {
                *t = target;
            }
        }
        Ok(())
    }

    fn emit(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if !self.is_at_end() {
            self.pos += 1;
        }
        token
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    /// Take the argument of a directive, which must be on the same line.
    fn argument(&mut self, directive: &str, pos: Pos) -> Result<Token, CompileError> {
        if self.peek().kind.ends_line() {
            return Err(CompileError::unterminated(
                format!("{directive} needs an argument on the same line"),
                pos,
            ));
        }
        Ok(self.advance())
    }

    fn expect_number(&mut self, keyword: Keyword, pos: Pos) -> Result<u32, CompileError> {
        let t = self.argument(keyword.as_str(), pos)?;
        match t.kind {
            TokenKind::Number(n) => Ok(n),
            TokenKind::Word(w) if is_digits(&w) && keyword == Keyword::Tempo => {
                Err(CompileError::invalid_duration(
                    format!("tempo {w} outside 1..={MAX_TEMPO}"),
                    t.pos,
                ))
            }
            other => Err(CompileError::unexpected(
                format!("expected number after {}, got {}", keyword.as_str(), other.describe()),
                t.pos,
            )),
        }
    }

    fn expect_label(&mut self, keyword: Keyword, pos: Pos) -> Result<String, CompileError> {
        let t = self.argument(keyword.as_str(), pos)?;
        match t.kind {
            TokenKind::Word(name) if is_label_name(&name) => Ok(name),
            other => Err(CompileError::unexpected(
                format!("expected label name after {}, got {}", keyword.as_str(), other.describe()),
                t.pos,
            )),
        }
    }

    fn expect_length(&mut self, what: &str, pos: Pos) -> Result<Length, CompileError> {
        if self.peek().kind.ends_line() {
            return Err(CompileError::invalid_duration(
                format!("missing length after {what}"),
                pos,
            ));
        }
        let t = self.advance();
        let word = match &t.kind {
            TokenKind::Word(w) => w.clone(),
            other => other.describe(),
        };
        parse_length(&word)
            .ok_or_else(|| CompileError::invalid_duration(format!("invalid length {word}"), t.pos))
    }
}

/// A digit run too long for `u32` reaches the parser as a word.
fn is_digits(word: &str) -> bool {
    !word.is_empty() && word.bytes().all(|b| b.is_ascii_digit())
}

fn is_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
