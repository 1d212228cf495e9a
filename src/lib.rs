//! Beeper — a song compiler and tone-playing virtual machine for the PC speaker.
//!
//! Song text compiles into a [`Program`], which a [`Machine`] executes
//! against a [`ToneSink`]. Execution can run to the end or stop at every
//! instruction and at explicit breakpoints for debugging.

pub mod config;
pub mod debug;
pub mod dsl;
pub mod report;
pub mod sink;
pub mod vm;

pub use dsl::{compile, CompileError, ErrorKind};
pub use sink::{Silencer, SinkError, ToneSink};
pub use vm::{Machine, Mode, Outcome, Program, RuntimeFault};
