//! Decompiler — renders a [`Program`] back into canonical notation.
//!
//! The output is not the original source: comments and spacing are lost,
//! labels are renamed after their target index, pitches use sharps and
//! lengths use their shortest spelling. Compiling the output yields the same
//! instruction sequence for any program the compiler produced.

use std::collections::BTreeSet;
use std::fmt::Write;

use crate::vm::instruction::{Control, Instruction};
use crate::vm::program::Program;

use super::note::{length_name, note_name};

const INDENT: &str = "  ";

/// Render `program` as notation text, one statement per line.
pub fn decompile(program: &Program) -> String {
    let targets: BTreeSet<usize> = program
        .instructions()
        .iter()
        .filter_map(|i| match i {
            Instruction::Control(Control::Jump(t) | Control::Call(t)) => Some(*t),
            _ => None,
        })
        .collect();

    let mut out = String::new();
    let mut depth = 0usize;

    for (index, instruction) in program.instructions().iter().enumerate() {
        if targets.contains(&index) {
            let _ = writeln!(out, "{}LABEL {}", INDENT.repeat(depth), label(index));
        }
        if let Instruction::Control(Control::EndRepeat { .. }) = instruction {
            depth = depth.saturating_sub(1);
        }

        out.push_str(&INDENT.repeat(depth));
        let _ = match instruction {
            Instruction::Note { frequency, length } => {
                let pitch = note_name(*frequency).unwrap_or_else(|| frequency.to_string());
                writeln!(out, "{pitch} {}", length_name(*length))
            }
            Instruction::Rest { length } => writeln!(out, "REST {}", length_name(*length)),
            Instruction::Tempo { bpm } => writeln!(out, "TEMPO {bpm}"),
            Instruction::Control(Control::Jump(t)) => writeln!(out, "JUMP {}", label(*t)),
            Instruction::Control(Control::Call(t)) => writeln!(out, "CALL {}", label(*t)),
            Instruction::Control(Control::Return) => writeln!(out, "RETURN"),
            Instruction::Control(Control::Repeat { count, .. }) => {
                depth += 1;
                writeln!(out, "REPEAT {count}")
            }
            Instruction::Control(Control::EndRepeat { .. }) => writeln!(out, "END"),
            Instruction::Breakpoint => writeln!(out, "BREAK"),
        };
    }

    if targets.contains(&program.len()) {
        let _ = writeln!(out, "LABEL {}", label(program.len()));
    }
    out
}

fn label(index: usize) -> String {
    format!("L{index}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::Compiler;
    use crate::vm::instruction::Length;

    #[test]
    fn canonical_text() {
        let program = Compiler::compile(b"tempo 100\nc4 1/4\nrest 3/8\n300 20ms\nbreak").unwrap();
        assert_eq!(
            decompile(&program),
            "TEMPO 100\nC4 Q\nREST Q.\n300 20ms\nBREAK\n"
        );
    }

    #[test]
    fn repeats_are_indented() {
        let program = Compiler::compile(b"REPEAT 2\nREPEAT 3\nA4 E\nEND\nEND").unwrap();
        assert_eq!(
            decompile(&program),
            "REPEAT 2\n  REPEAT 3\n    A4 E\n  END\nEND\n"
        );
    }

    #[test]
    fn labels_named_after_targets() {
        let program = Compiler::compile(b"CALL tune\nJUMP out\nLABEL tune\nG4 H\nRETURN\nLABEL out")
            .unwrap();
        assert_eq!(
            decompile(&program),
            "CALL L2\nJUMP L4\nLABEL L2\nG4 H\nRETURN\nLABEL L4\n"
        );
    }

    #[test]
    fn output_recompiles_to_same_instructions() {
        let src = b"TEMPO 140\nLABEL top\nREPEAT 4\nC#5 S\nREST 1/12\nEND\nCALL bar\nBREAK\nJUMP top\nLABEL bar\nBb3 W.\n1234 5ms\nRETURN";
        let program = Compiler::compile(src).unwrap();
        let again = Compiler::compile(decompile(&program).as_bytes()).unwrap();
        assert_eq!(again.instructions(), program.instructions());
    }

    #[test]
    fn hand_built_program_renders() {
        let program = Program::new(vec![Instruction::Note {
            frequency: 440,
            length: Length::Ticks(7),
        }]);
        assert_eq!(decompile(&program), "A4 7/3840\n");
    }
}
