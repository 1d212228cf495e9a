//! Song compiler — notation bytes → tokens → instruction sequence.

pub mod compile;
pub mod decompile;
pub mod error;
pub mod lexer;
pub mod note;
pub mod token;

pub use error::{CompileError, ErrorKind};

use compile::CodeGen;
use lexer::Lexer;

use crate::vm::program::Program;

/// The song compiler.
///
/// Lexes source bytes into tokens, then generates instructions in a single
/// pass. Compilation is all-or-nothing: the first error aborts it.
pub struct Compiler;

impl Compiler {
    /// Split source bytes into tokens.
    pub fn tokenize(source: &[u8]) -> Result<Vec<token::Token>, CompileError> {
        Lexer::new(source).tokenize()
    }

    /// Compile source bytes into a [`Program`] with its cursor at the start.
    pub fn compile(source: &[u8]) -> Result<Program, CompileError> {
        let tokens = Self::tokenize(source)?;
        CodeGen::new(tokens).generate()
    }

    /// Render a program back into canonical notation.
    pub fn decompile(program: &Program) -> String {
        decompile::decompile(program)
    }
}

/// Compile source bytes into a [`Program`]. See [`Compiler::compile`].
pub fn compile(source: &[u8]) -> Result<Program, CompileError> {
    Compiler::compile(source)
}
