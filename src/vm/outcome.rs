//! Results of a [`Machine::run`](super::Machine::run) call.
//!
//! Normal termination and debug suspension are [`Outcome`] variants of their
//! own. Only genuine runtime errors are carried as a [`RuntimeFault`].

use std::fmt;

/// What kind of runtime error stopped execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// A control transfer pointed past the end of the program.
    InvalidJumpTarget,
    /// The control stack exceeded its maximum depth.
    StackOverflow,
    /// A `RETURN` or `END` found no matching frame on the control stack.
    StackUnderflow,
    /// A tone's frequency or duration is outside what the sink can play.
    OutOfRangeTone,
    /// The sink reported an error while emitting.
    SinkFailure,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaultKind::InvalidJumpTarget => "invalid jump target",
            FaultKind::StackOverflow => "stack overflow",
            FaultKind::StackUnderflow => "stack underflow",
            FaultKind::OutOfRangeTone => "out of range tone",
            FaultKind::SinkFailure => "sink failure",
        };
        f.write_str(name)
    }
}

/// A runtime error, positioned at the instruction that raised it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeFault {
    pub kind: FaultKind,
    /// Index of the faulting instruction. The program cursor is left here.
    pub cursor: usize,
    pub detail: Option<String>,
}

impl RuntimeFault {
    pub fn new(kind: FaultKind, cursor: usize) -> Self {
        Self {
            kind,
            cursor,
            detail: None,
        }
    }

    pub fn with_detail(kind: FaultKind, cursor: usize, detail: impl Into<String>) -> Self {
        Self {
            kind,
            cursor,
            detail: Some(detail.into()),
        }
    }
}

impl fmt::Display for RuntimeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at instruction {}", self.kind, self.cursor)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeFault {}

/// The result of one execution call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The cursor reached the end sentinel.
    ProgramEnded,
    /// Execution suspended before the instruction at `cursor`.
    Breakpoint { cursor: usize },
    /// Execution stopped on an error.
    Fault(RuntimeFault),
}

impl Outcome {
    /// The fault, if this outcome is one.
    pub fn fault(&self) -> Option<&RuntimeFault> {
        match self {
            Outcome::Fault(fault) => Some(fault),
            _ => None,
        }
    }

    /// Whether this outcome is a fault.
    pub fn is_fault(&self) -> bool {
        matches!(self, Outcome::Fault(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::ProgramEnded => f.write_str("program ended"),
            Outcome::Breakpoint { cursor } => write!(f, "breakpoint at instruction {cursor}"),
            Outcome::Fault(fault) => write!(f, "{fault}"),
        }
    }
}
