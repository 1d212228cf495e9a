//! Instruction set — the compiled form of a song.
//!
//! Pitches are resolved to hertz at compile time. Lengths are either absolute
//! milliseconds or tempo-relative ticks that the [`Machine`](super::Machine)
//! resolves against its tempo register when the instruction runs.

use std::fmt;

/// Ticks per quarter note. 960 divides cleanly by 2, 3, 4, 5, 6, 8, 10, 12,
/// 15, 16, 20, 24, 32, so dotted and triplet values stay integral.
pub const TICKS_PER_BEAT: u32 = 960;

/// Ticks in a whole note (four beats).
pub const TICKS_PER_WHOLE: u32 = 4 * TICKS_PER_BEAT;

/// How long a note or rest lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Length {
    /// Absolute duration, independent of tempo.
    Millis(u32),
    /// Musical duration at [`TICKS_PER_BEAT`] resolution.
    Ticks(u32),
}

impl Length {
    /// A quarter note.
    pub const QUARTER: Length = Length::Ticks(TICKS_PER_BEAT);

    /// Resolve to milliseconds at the given tempo.
    ///
    /// Formula: `ticks * 60000 / (TICKS_PER_BEAT * bpm)`, rounded to the
    /// nearest millisecond. Returns `None` when `bpm` is zero or the result
    /// does not fit in a `u32`.
    pub fn to_millis(self, bpm: u32) -> Option<u32> {
        match self {
            Length::Millis(ms) => Some(ms),
            Length::Ticks(ticks) => {
                if bpm == 0 {
                    return None;
                }
                let numerator = ticks as u64 * 60_000;
                let denominator = TICKS_PER_BEAT as u64 * bpm as u64;
                let ms = (numerator + denominator / 2) / denominator;
                u32::try_from(ms).ok()
            }
        }
    }
}

/// A control-flow directive.
///
/// Targets are instruction indices. A target equal to the program length is
/// the end sentinel and is a legal destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    /// Continue at `target`.
    Jump(usize),
    /// Push a return address and continue at `target`.
    Call(usize),
    /// Pop a return address pushed by [`Control::Call`].
    Return,
    /// Open a loop that plays its body `count` times. With a count of zero
    /// the body is skipped by continuing at `exit`.
    Repeat { count: u32, exit: usize },
    /// Close the innermost loop; `body` is the first instruction inside it.
    EndRepeat { body: usize },
}

impl Control {
    /// The instruction index this directive may transfer to, if any.
    pub fn target(&self) -> Option<usize> {
        match *self {
            Control::Jump(t) | Control::Call(t) => Some(t),
            Control::Repeat { exit, .. } => Some(exit),
            Control::EndRepeat { body } => Some(body),
            Control::Return => None,
        }
    }
}

/// One compiled operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// Sound `frequency` hertz for `length`.
    Note { frequency: u32, length: Length },
    /// Stay silent for `length`.
    Rest { length: Length },
    /// Set the tempo register, in beats per minute.
    Tempo { bpm: u32 },
    /// Redirect execution.
    Control(Control),
    /// Debug suspension marker.
    Breakpoint,
}

impl Instruction {
    /// Short mnemonic used by diagnostics.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Note { .. } => "NOTE",
            Instruction::Rest { .. } => "REST",
            Instruction::Tempo { .. } => "TEMPO",
            Instruction::Control(Control::Jump(_)) => "JUMP",
            Instruction::Control(Control::Call(_)) => "CALL",
            Instruction::Control(Control::Return) => "RETURN",
            Instruction::Control(Control::Repeat { .. }) => "REPEAT",
            Instruction::Control(Control::EndRepeat { .. }) => "END",
            Instruction::Breakpoint => "BREAK",
        }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Length::Millis(ms) => write!(f, "{ms}ms"),
            Length::Ticks(ticks) => write!(f, "{ticks}t"),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Note { frequency, length } => write!(f, "NOTE {frequency}Hz {length}"),
            Instruction::Rest { length } => write!(f, "REST {length}"),
            Instruction::Tempo { bpm } => write!(f, "TEMPO {bpm}"),
            Instruction::Control(Control::Repeat { count, exit }) => {
                write!(f, "REPEAT {count} (exit @{exit})")
            }
            Instruction::Control(control) => match control.target() {
                Some(target) => write!(f, "{} @{target}", self.mnemonic()),
                None => f.write_str(self.mnemonic()),
            },
            Instruction::Breakpoint => f.write_str("BREAK"),
        }
    }
}
