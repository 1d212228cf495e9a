//! Virtual machine — interprets a [`Program`] against a [`ToneSink`].
//!
//! The Machine holds per-session registers (tempo, control stack, last
//! fault) and executes the program from its cursor until it ends, faults or
//! suspends. It never sleeps: the sink's blocking `emit` is the only clock.
//! Every call is synchronous and can be repeated to resume from the cursor,
//! which is how the debug loop single-steps.

pub mod instruction;
pub mod outcome;
pub mod program;

pub use instruction::{Control, Instruction, Length, TICKS_PER_BEAT};
pub use outcome::{FaultKind, Outcome, RuntimeFault};
pub use program::Program;

use crate::sink::{ToneRange, ToneSink};

/// Tempo register value before any `TEMPO` instruction runs.
pub const DEFAULT_TEMPO: u32 = 120;

/// Control stack depth limit.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Progress callback, invoked with `(cursor, len)` after every instruction.
pub type Reporter<'a> = &'a mut dyn FnMut(usize, usize);

/// How far one [`Machine::run`] call goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Run to the end or the first fault. Breakpoint markers do nothing.
    Continuous,
    /// Execute one instruction, then suspend at the next boundary.
    SingleStep,
    /// Run until the next explicit breakpoint marker.
    UntilBreakpoint,
}

/// An entry on the control stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// An open loop with this many passes still to go after the current one.
    Repeat { remaining: u32 },
    /// A subroutine call and where to continue after `RETURN`.
    Call { return_to: usize },
}

/// Execution state for one playback or debug session.
#[derive(Debug, Clone)]
pub struct Machine {
    tempo: u32,
    initial_tempo: u32,
    stack: Vec<Frame>,
    max_depth: usize,
    last_fault: Option<RuntimeFault>,
}

impl Machine {
    pub fn new() -> Self {
        Self {
            tempo: DEFAULT_TEMPO,
            initial_tempo: DEFAULT_TEMPO,
            stack: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            last_fault: None,
        }
    }

    /// Start with a tempo other than [`DEFAULT_TEMPO`].
    pub fn with_tempo(mut self, bpm: u32) -> Self {
        self.tempo = bpm;
        self.initial_tempo = bpm;
        self
    }

    /// Use a control stack limit other than [`DEFAULT_MAX_DEPTH`].
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Current tempo register, in beats per minute.
    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    /// Control stack, innermost frame last.
    pub fn stack(&self) -> &[Frame] {
        &self.stack
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// The most recent fault, kept for diagnostics until [`Machine::reset`].
    pub fn last_fault(&self) -> Option<&RuntimeFault> {
        self.last_fault.as_ref()
    }

    /// Restore the registers to their initial values for a fresh session.
    pub fn reset(&mut self) {
        self.tempo = self.initial_tempo;
        self.stack.clear();
        self.last_fault = None;
    }

    /// Execute `program` from its cursor.
    ///
    /// The instruction under the cursor always executes, so every call makes
    /// progress. Afterwards execution continues until the end sentinel, a
    /// fault, or a boundary where `mode` suspends. A fault leaves the cursor
    /// on the faulting instruction.
    pub fn run<S: ToneSink + ?Sized>(
        &mut self,
        program: &mut Program,
        sink: &S,
        mode: Mode,
        mut reporter: Option<Reporter<'_>>,
    ) -> Outcome {
        let range = sink.range();
        let mut first = true;

        while let Some(&instruction) = program.current() {
            let cursor = program.cursor();
            if !first && suspends(mode, &instruction) {
                return Outcome::Breakpoint { cursor };
            }
            first = false;

            tracing::trace!(cursor, %instruction, tempo = self.tempo, "execute");
            if let Err(fault) = self.execute(instruction, program, sink, &range) {
                tracing::debug!(%fault, "runtime fault");
                self.last_fault = Some(fault.clone());
                return Outcome::Fault(fault);
            }

            if let Some(report) = reporter.as_deref_mut() {
                report(program.cursor(), program.len());
            }
        }

        Outcome::ProgramEnded
    }

    fn execute<S: ToneSink + ?Sized>(
        &mut self,
        instruction: Instruction,
        program: &mut Program,
        sink: &S,
        range: &ToneRange,
    ) -> Result<(), RuntimeFault> {
        let cursor = program.cursor();
        match instruction {
            Instruction::Note { frequency, length } => {
                if !range.accepts_frequency(frequency) {
                    return Err(RuntimeFault::with_detail(
                        FaultKind::OutOfRangeTone,
                        cursor,
                        format!(
                            "frequency {frequency} Hz outside {}..={} Hz",
                            range.min_hz, range.max_hz
                        ),
                    ));
                }
                let ms = self.resolve(length, cursor, range)?;
                emit(sink, frequency, ms, cursor)?;
                program.advance();
            }
            Instruction::Rest { length } => {
                let ms = self.resolve(length, cursor, range)?;
                emit(sink, 0, ms, cursor)?;
                program.advance();
            }
            Instruction::Tempo { bpm } => {
                self.tempo = bpm;
                program.advance();
            }
            Instruction::Breakpoint => program.advance(),
            Instruction::Control(control) => self.control(control, program)?,
        }
        Ok(())
    }

    fn control(&mut self, control: Control, program: &mut Program) -> Result<(), RuntimeFault> {
        let cursor = program.cursor();
        match control {
            Control::Jump(target) => jump(program, target, cursor)?,
            Control::Call(target) => {
                check_target(program, target, cursor)?;
                self.push(Frame::Call { return_to: cursor + 1 }, cursor)?;
                jump(program, target, cursor)?;
            }
            Control::Return => match self.stack.last() {
                Some(&Frame::Call { return_to }) => {
                    check_target(program, return_to, cursor)?;
                    self.stack.pop();
                    jump(program, return_to, cursor)?;
                }
                _ => {
                    return Err(RuntimeFault::with_detail(
                        FaultKind::StackUnderflow,
                        cursor,
                        "RETURN without a pending CALL",
                    ))
                }
            },
            Control::Repeat { count, exit } => {
                if count == 0 {
                    jump(program, exit, cursor)?;
                } else {
                    self.push(
                        Frame::Repeat {
                            remaining: count - 1,
                        },
                        cursor,
                    )?;
                    program.advance();
                }
            }
            Control::EndRepeat { body } => {
                check_target(program, body, cursor)?;
                match self.stack.last_mut() {
                    Some(Frame::Repeat { remaining }) if *remaining > 0 => {
                        *remaining -= 1;
                        jump(program, body, cursor)?;
                    }
                    Some(Frame::Repeat { .. }) => {
                        self.stack.pop();
                        program.advance();
                    }
                    _ => {
                        return Err(RuntimeFault::with_detail(
                            FaultKind::StackUnderflow,
                            cursor,
                            "END without an open REPEAT",
                        ))
                    }
                }
            }
        }
        Ok(())
    }

    fn push(&mut self, frame: Frame, cursor: usize) -> Result<(), RuntimeFault> {
        if self.stack.len() >= self.max_depth {
            return Err(RuntimeFault::with_detail(
                FaultKind::StackOverflow,
                cursor,
                format!("control stack deeper than {}", self.max_depth),
            ));
        }
        self.stack.push(frame);
        Ok(())
    }

    /// Resolve a length to milliseconds at the current tempo and check it
    /// against the sink's limit.
    fn resolve(&self, length: Length, cursor: usize, range: &ToneRange) -> Result<u32, RuntimeFault> {
        match length.to_millis(self.tempo) {
            Some(ms) if range.accepts_duration(ms) => Ok(ms),
            Some(ms) => Err(RuntimeFault::with_detail(
                FaultKind::OutOfRangeTone,
                cursor,
                format!("duration {ms} ms longer than {} ms", range.max_ms),
            )),
            None => Err(RuntimeFault::with_detail(
                FaultKind::OutOfRangeTone,
                cursor,
                format!("length {length} cannot be resolved at tempo {}", self.tempo),
            )),
        }
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

fn suspends(mode: Mode, instruction: &Instruction) -> bool {
    match mode {
        Mode::Continuous => false,
        Mode::SingleStep => true,
        Mode::UntilBreakpoint => matches!(instruction, Instruction::Breakpoint),
    }
}

fn emit<S: ToneSink + ?Sized>(
    sink: &S,
    frequency: u32,
    ms: u32,
    cursor: usize,
) -> Result<(), RuntimeFault> {
    sink.emit(frequency, ms)
        .map_err(|e| RuntimeFault::with_detail(FaultKind::SinkFailure, cursor, e.to_string()))
}

fn check_target(program: &Program, target: usize, cursor: usize) -> Result<(), RuntimeFault> {
    if target > program.len() {
        return Err(RuntimeFault::with_detail(
            FaultKind::InvalidJumpTarget,
            cursor,
            format!("target {target} past end {}", program.len()),
        ));
    }
    Ok(())
}

fn jump(program: &mut Program, target: usize, cursor: usize) -> Result<(), RuntimeFault> {
    check_target(program, target, cursor)?;
    program.seek(target);
    tracing::trace!(from = cursor, to = target, "jump");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::memory::Tone;
    use crate::sink::MemorySink;

    fn note(frequency: u32, ms: u32) -> Instruction {
        Instruction::Note {
            frequency,
            length: Length::Millis(ms),
        }
    }

    fn tone(frequency: u32, duration_ms: u32) -> Tone {
        Tone {
            frequency,
            duration_ms,
        }
    }

    #[test]
    fn continuous_run_emits_in_order() {
        let mut program = Program::new(vec![
            Instruction::Tempo { bpm: 60 },
            Instruction::Note {
                frequency: 440,
                length: Length::QUARTER,
            },
            Instruction::Rest {
                length: Length::Millis(10),
            },
        ]);
        let sink = MemorySink::new();
        let mut machine = Machine::new();
        let outcome = machine.run(&mut program, &sink, Mode::Continuous, None);
        assert_eq!(outcome, Outcome::ProgramEnded);
        assert_eq!(sink.tones(), vec![tone(440, 1000), tone(0, 10)]);
        assert_eq!(machine.tempo(), 60);
        assert!(program.is_finished());
    }

    #[test]
    fn empty_program_ends_immediately() {
        let mut program = Program::new(Vec::new());
        let sink = MemorySink::new();
        let outcome = Machine::new().run(&mut program, &sink, Mode::SingleStep, None);
        assert_eq!(outcome, Outcome::ProgramEnded);
        assert!(sink.tones().is_empty());
    }

    #[test]
    fn tempo_affects_only_later_notes() {
        let mut program = Program::new(vec![
            Instruction::Note {
                frequency: 440,
                length: Length::QUARTER,
            },
            Instruction::Tempo { bpm: 240 },
            Instruction::Note {
                frequency: 440,
                length: Length::QUARTER,
            },
        ]);
        let sink = MemorySink::new();
        Machine::new().run(&mut program, &sink, Mode::Continuous, None);
        assert_eq!(sink.tones(), vec![tone(440, 500), tone(440, 250)]);
    }

    #[test]
    fn single_step_executes_one_instruction_per_call() {
        let mut program = Program::new(vec![note(440, 1), note(494, 1), note(523, 1)]);
        let sink = MemorySink::new();
        let mut machine = Machine::new();

        assert_eq!(
            machine.run(&mut program, &sink, Mode::SingleStep, None),
            Outcome::Breakpoint { cursor: 1 }
        );
        assert_eq!(sink.tones().len(), 1);
        assert_eq!(
            machine.run(&mut program, &sink, Mode::SingleStep, None),
            Outcome::Breakpoint { cursor: 2 }
        );
        assert_eq!(
            machine.run(&mut program, &sink, Mode::SingleStep, None),
            Outcome::ProgramEnded
        );
        assert_eq!(sink.tones().len(), 3);
    }

    #[test]
    fn until_breakpoint_stops_before_marker_and_resumes_past_it() {
        let mut program = Program::new(vec![
            note(440, 1),
            Instruction::Breakpoint,
            note(494, 1),
        ]);
        let sink = MemorySink::new();
        let mut machine = Machine::new();

        assert_eq!(
            machine.run(&mut program, &sink, Mode::UntilBreakpoint, None),
            Outcome::Breakpoint { cursor: 1 }
        );
        assert_eq!(program.cursor(), 1);
        assert_eq!(
            machine.run(&mut program, &sink, Mode::UntilBreakpoint, None),
            Outcome::ProgramEnded
        );
        assert_eq!(sink.tones(), vec![tone(440, 1), tone(494, 1)]);
    }

    #[test]
    fn continuous_ignores_breakpoint_markers() {
        let mut program = Program::new(vec![Instruction::Breakpoint, note(440, 1), Instruction::Breakpoint]);
        let sink = MemorySink::new();
        let outcome = Machine::new().run(&mut program, &sink, Mode::Continuous, None);
        assert_eq!(outcome, Outcome::ProgramEnded);
        assert_eq!(sink.tones().len(), 1);
    }

    #[test]
    fn repeat_plays_body_count_times() {
        let mut program = Program::new(vec![
            Instruction::Control(Control::Repeat { count: 3, exit: 3 }),
            note(440, 1),
            Instruction::Control(Control::EndRepeat { body: 1 }),
            note(880, 1),
        ]);
        let sink = MemorySink::new();
        let mut machine = Machine::new();
        assert_eq!(
            machine.run(&mut program, &sink, Mode::Continuous, None),
            Outcome::ProgramEnded
        );
        assert_eq!(
            sink.tones(),
            vec![tone(440, 1), tone(440, 1), tone(440, 1), tone(880, 1)]
        );
        assert!(machine.stack().is_empty());
    }

    #[test]
    fn repeat_zero_skips_body() {
        let mut program = Program::new(vec![
            Instruction::Control(Control::Repeat { count: 0, exit: 3 }),
            note(440, 1),
            Instruction::Control(Control::EndRepeat { body: 1 }),
            note(880, 1),
        ]);
        let sink = MemorySink::new();
        Machine::new().run(&mut program, &sink, Mode::Continuous, None);
        assert_eq!(sink.tones(), vec![tone(880, 1)]);
    }

    #[test]
    fn call_and_return() {
        let mut program = Program::new(vec![
            Instruction::Control(Control::Call(3)),
            note(330, 1),
            Instruction::Control(Control::Jump(5)),
            note(440, 1),
            Instruction::Control(Control::Return),
        ]);
        let sink = MemorySink::new();
        let mut machine = Machine::new();
        assert_eq!(
            machine.run(&mut program, &sink, Mode::Continuous, None),
            Outcome::ProgramEnded
        );
        assert_eq!(sink.tones(), vec![tone(440, 1), tone(330, 1)]);
        assert!(machine.stack().is_empty());
    }

    #[test]
    fn jump_past_end_is_invalid_target() {
        let mut program = Program::new(vec![note(440, 1), Instruction::Control(Control::Jump(9))]);
        let sink = MemorySink::new();
        let mut machine = Machine::new();
        let outcome = machine.run(&mut program, &sink, Mode::Continuous, None);
        let fault = outcome.fault().unwrap();
        assert_eq!(fault.kind, FaultKind::InvalidJumpTarget);
        assert_eq!(fault.cursor, 1);
        assert_eq!(program.cursor(), 1);
        assert_eq!(machine.last_fault(), Some(fault));
    }

    #[test]
    fn recursion_overflows_control_stack() {
        let mut program = Program::new(vec![Instruction::Control(Control::Call(0))]);
        let sink = MemorySink::new();
        let mut machine = Machine::new().with_max_depth(4);
        let outcome = machine.run(&mut program, &sink, Mode::Continuous, None);
        assert_eq!(outcome.fault().map(|f| f.kind), Some(FaultKind::StackOverflow));
        assert_eq!(machine.stack().len(), 4);
    }

    #[test]
    fn return_without_call_underflows() {
        let mut program = Program::new(vec![Instruction::Control(Control::Return)]);
        let sink = MemorySink::new();
        let outcome = Machine::new().run(&mut program, &sink, Mode::Continuous, None);
        assert_eq!(outcome.fault().map(|f| f.kind), Some(FaultKind::StackUnderflow));
    }

    #[test]
    fn end_without_repeat_underflows() {
        let mut program = Program::new(vec![Instruction::Control(Control::EndRepeat { body: 0 })]);
        let sink = MemorySink::new();
        let outcome = Machine::new().run(&mut program, &sink, Mode::Continuous, None);
        assert_eq!(outcome.fault().map(|f| f.kind), Some(FaultKind::StackUnderflow));
    }

    #[test]
    fn out_of_range_frequency_faults_before_emitting() {
        let mut program = Program::new(vec![note(440, 1), note(15, 1), note(440, 1)]);
        let sink = MemorySink::new();
        let outcome = Machine::new().run(&mut program, &sink, Mode::Continuous, None);
        let fault = outcome.fault().unwrap();
        assert_eq!(fault.kind, FaultKind::OutOfRangeTone);
        assert_eq!(fault.cursor, 1);
        assert_eq!(sink.tones(), vec![tone(440, 1)]);
    }

    #[test]
    fn overlong_duration_is_out_of_range() {
        let mut program = Program::new(vec![
            Instruction::Tempo { bpm: 1 },
            Instruction::Note {
                frequency: 440,
                length: Length::Ticks(4 * TICKS_PER_BEAT),
            },
        ]);
        let sink = MemorySink::new();
        let outcome = Machine::new().run(&mut program, &sink, Mode::Continuous, None);
        // A whole note at 1 bpm is four minutes.
        assert_eq!(
            outcome.fault().map(|f| (f.kind, f.cursor)),
            Some((FaultKind::OutOfRangeTone, 1))
        );
    }

    #[test]
    fn sink_error_becomes_sink_failure() {
        let mut program = Program::new(vec![note(440, 1), note(494, 1)]);
        let sink = MemorySink::new().failing_at(1);
        let outcome = Machine::new().run(&mut program, &sink, Mode::Continuous, None);
        let fault = outcome.fault().unwrap();
        assert_eq!(fault.kind, FaultKind::SinkFailure);
        assert_eq!(fault.cursor, 1);
        assert!(fault.detail.as_deref().unwrap().contains("injected"));
    }

    #[test]
    fn reporter_sees_every_instruction() {
        let mut program = Program::new(vec![note(440, 1), Instruction::Tempo { bpm: 90 }, note(494, 1)]);
        let sink = MemorySink::new();
        let mut seen = Vec::new();
        let mut report = |cursor: usize, len: usize| seen.push((cursor, len));
        Machine::new().run(&mut program, &sink, Mode::Continuous, Some(&mut report));
        assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn reset_restores_initial_registers() {
        let mut program = Program::new(vec![
            Instruction::Tempo { bpm: 200 },
            Instruction::Control(Control::Return),
        ]);
        let sink = MemorySink::new();
        let mut machine = Machine::new().with_tempo(90);
        machine.run(&mut program, &sink, Mode::Continuous, None);
        assert_eq!(machine.tempo(), 200);
        assert!(machine.last_fault().is_some());

        machine.reset();
        assert_eq!(machine.tempo(), 90);
        assert!(machine.last_fault().is_none());
        assert!(machine.stack().is_empty());
    }
}
