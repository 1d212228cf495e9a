//! Debugger — drives a [`Machine`] one command at a time.
//!
//! Each command becomes one `run` call: `Step` single-steps, `Continue` runs
//! to the next breakpoint marker. After every call the debugger hands a
//! one-line description of where execution stopped to the caller.

use std::collections::VecDeque;
use std::io;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use crate::report::describe_outcome;
use crate::sink::ToneSink;
use crate::vm::{Machine, Mode, Outcome, Program};

/// What the user asked the debugger to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugCommand {
    /// Execute one instruction.
    Step,
    /// Run until the next breakpoint marker.
    Continue,
    /// Stop the session where it is.
    Quit,
}

/// A source of debugger commands.
pub trait DebugInput {
    fn next_command(&mut self) -> io::Result<DebugCommand>;
}

/// How a debug session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugExit {
    /// The program ran to its end or faulted.
    Finished(Outcome),
    /// The user quit before the end.
    Quit { cursor: usize },
}

/// Maps a key event to a debugger command.
pub fn map_key(key: KeyEvent) -> Option<DebugCommand> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('d') => Some(DebugCommand::Quit),
            _ => None,
        };
    }
    match key.code {
        KeyCode::Char(' ') | KeyCode::Enter | KeyCode::Char('s') => Some(DebugCommand::Step),
        KeyCode::Char('c') => Some(DebugCommand::Continue),
        KeyCode::Char('q') | KeyCode::Esc => Some(DebugCommand::Quit),
        _ => None,
    }
}

/// Reads single keypresses from the terminal.
///
/// Raw mode is only held while waiting for a key, so diagnostics printed
/// between commands render normally.
#[derive(Debug, Default)]
pub struct KeyInput;

impl KeyInput {
    pub fn new() -> Self {
        Self
    }
}

impl DebugInput for KeyInput {
    fn next_command(&mut self) -> io::Result<DebugCommand> {
        let _raw = RawMode::enable()?;
        loop {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(command) = map_key(key) {
                    return Ok(command);
                }
            }
        }
    }
}

struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Steps through the whole program without asking. Used when there is no
/// terminal to read keys from.
#[derive(Debug, Default)]
pub struct AutoStep;

impl DebugInput for AutoStep {
    fn next_command(&mut self) -> io::Result<DebugCommand> {
        Ok(DebugCommand::Step)
    }
}

/// A fixed list of commands. Quits once the list runs out.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    commands: VecDeque<DebugCommand>,
}

impl ScriptedInput {
    pub fn new(commands: impl IntoIterator<Item = DebugCommand>) -> Self {
        Self {
            commands: commands.into_iter().collect(),
        }
    }
}

impl DebugInput for ScriptedInput {
    fn next_command(&mut self) -> io::Result<DebugCommand> {
        Ok(self.commands.pop_front().unwrap_or(DebugCommand::Quit))
    }
}

/// Interactive execution of one program.
pub struct Debugger<'m, I: DebugInput> {
    machine: &'m mut Machine,
    input: I,
}

impl<'m, I: DebugInput> Debugger<'m, I> {
    pub fn new(machine: &'m mut Machine, input: I) -> Self {
        Self { machine, input }
    }

    /// Run a session from the program's cursor until it ends, faults, or the
    /// input says quit. `show` receives the position line before the first
    /// command and after every call.
    pub fn session<S: ToneSink + ?Sized>(
        &mut self,
        program: &mut Program,
        sink: &S,
        mut show: impl FnMut(&str),
    ) -> io::Result<DebugExit> {
        if program.is_finished() {
            return Ok(DebugExit::Finished(Outcome::ProgramEnded));
        }
        show(&describe_outcome(
            &Outcome::Breakpoint {
                cursor: program.cursor(),
            },
            program,
        ));

        loop {
            let mode = match self.input.next_command()? {
                DebugCommand::Step => Mode::SingleStep,
                DebugCommand::Continue => Mode::UntilBreakpoint,
                DebugCommand::Quit => {
                    tracing::debug!(cursor = program.cursor(), "debugger quit");
                    return Ok(DebugExit::Quit {
                        cursor: program.cursor(),
                    });
                }
            };

            let outcome = self.machine.run(program, sink, mode, None);
            show(&describe_outcome(&outcome, program));
            if !matches!(outcome, Outcome::Breakpoint { .. }) {
                return Ok(DebugExit::Finished(outcome));
            }
        }
    }
}
