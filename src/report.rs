//! Diagnostic text for the player: progress line, outcomes, compile errors,
//! dry-run tone listings.
//!
//! Everything here returns strings. Printing is left to the binary.

use std::fmt::Write;

use crate::dsl::CompileError;
use crate::sink::memory::Tone;
use crate::vm::{Outcome, Program};

/// The in-place progress line, `cursor/len`.
pub fn progress(cursor: usize, len: usize) -> String {
    format!("{cursor}/{len}")
}

/// One line describing where the program stopped and why.
pub fn describe_outcome(outcome: &Outcome, program: &Program) -> String {
    match outcome {
        Outcome::ProgramEnded => format!("ended after {} instructions", program.len()),
        Outcome::Breakpoint { cursor } => match program.instructions().get(*cursor) {
            Some(next) => format!("break at {cursor}/{}: next {next}", program.len()),
            None => format!("break at {cursor}/{}", program.len()),
        },
        Outcome::Fault(fault) => match program.instructions().get(fault.cursor) {
            Some(instruction) => format!("fault: {fault} [{instruction}]"),
            None => format!("fault: {fault}"),
        },
    }
}

/// A compile error followed by the offending source line and a caret under
/// the error column.
pub fn describe_compile_error(error: &CompileError, source: &[u8]) -> String {
    let mut out = format!("compile error: {error}");
    let line = String::from_utf8_lossy(source)
        .lines()
        .nth(error.line.saturating_sub(1))
        .map(str::to_owned);
    if let Some(line) = line {
        let _ = write!(
            out,
            "\n  {line}\n  {}^",
            " ".repeat(error.col.saturating_sub(1))
        );
    }
    out
}

/// A dry-run listing, one tone per line, with a total.
pub fn tone_listing(tones: &[Tone]) -> String {
    let mut out = String::new();
    let mut total: u64 = 0;
    for tone in tones {
        total += u64::from(tone.duration_ms);
        if tone.frequency == 0 {
            let _ = writeln!(out, "rest {:>6} ms", tone.duration_ms);
        } else {
            let _ = writeln!(out, "{:>5} Hz {:>6} ms", tone.frequency, tone.duration_ms);
        }
    }
    let _ = writeln!(out, "{} tones, {total} ms", tones.len());
    out
}
