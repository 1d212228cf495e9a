//! beeper — compile a song and play it on the PC speaker.
//!
//! Reads notation from a file or stdin, compiles it, and plays it through
//! the speaker event device, the sound card, a WAV file, or a dry-run
//! listing. `--debug` steps through the program one instruction at a time.

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use beeper::config::PlayerConfig;
use beeper::debug::{AutoStep, DebugExit, DebugInput, Debugger, KeyInput};
use beeper::dsl::Compiler;
use beeper::report::{describe_compile_error, describe_outcome, progress, tone_listing};
use beeper::sink::speaker::SpeakerError;
use beeper::sink::{MemorySink, Silencer, SpeakerSink, ToneSink, WavSink};
use beeper::vm::Reporter;
use beeper::{Machine, Mode, Outcome, Program};

const EXIT_OK: i32 = 0;
const EXIT_USAGE: i32 = 1;
const EXIT_DEVICE_OPEN: i32 = 2;
const EXIT_DEVICE_QUERY: i32 = 3;
const EXIT_NO_SOUND: i32 = 4;
const EXIT_COMPILE: i32 = 5;
const EXIT_FAULT: i32 = 6;

#[derive(Parser, Debug)]
#[command(name = "beeper", version)]
#[command(about = "Compile a song and play it on the PC speaker")]
struct Args {
    /// Song file to play (default: stdin)
    #[arg(short = 'f', long)]
    filename: Option<PathBuf>,

    /// Speaker event device
    #[arg(short = 'e', long)]
    device: Option<PathBuf>,

    /// Compile only, do not play
    #[arg(short, long)]
    quiet: bool,

    /// Show a progress line while playing
    #[arg(short = 's', long)]
    display: bool,

    /// Print the compiled program as canonical notation
    #[arg(short, long)]
    decompile: bool,

    /// Step through the program interactively
    #[arg(long)]
    debug: bool,

    /// Starting tempo in beats per minute
    #[arg(short, long)]
    tempo: Option<u32>,

    /// Play through the sound card instead of the speaker
    #[arg(long, conflicts_with_all = ["wav", "dry_run"])]
    audio: bool,

    /// Render to a WAV file instead of the speaker
    #[arg(long, value_name = "PATH", conflicts_with = "dry_run")]
    wav: Option<PathBuf>,

    /// List the tones instead of playing them
    #[arg(long)]
    dry_run: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("BEEPER_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn main() {
    init_logging();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_USAGE } else { EXIT_OK };
            let _ = e.print();
            process::exit(code);
        }
    };

    process::exit(run(args));
}

/// Config file values with command-line overrides applied.
fn settings(args: &Args) -> PlayerConfig {
    let mut config = match PlayerConfig::load() {
        Ok(Some(config)) => config,
        Ok(None) => PlayerConfig::default(),
        Err(e) => {
            eprintln!("warning: {e}; using defaults");
            PlayerConfig::default()
        }
    };
    if let Some(device) = &args.device {
        config.device = device.clone();
    }
    if let Some(tempo) = args.tempo {
        config.tempo = tempo;
    }
    config.display |= args.display;
    config
}

fn read_source(filename: Option<&Path>) -> io::Result<Vec<u8>> {
    match filename {
        Some(path) => fs::read(path),
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

fn run(args: Args) -> i32 {
    let config = settings(&args);
    if let Err(e) = config.validate() {
        eprintln!("{e}");
        return EXIT_USAGE;
    }

    let source = match read_source(args.filename.as_deref()) {
        Ok(source) => source,
        Err(e) => {
            let name = args
                .filename
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "stdin".to_string());
            eprintln!("cannot read {name}: {e}");
            return EXIT_USAGE;
        }
    };

    let mut program = match Compiler::compile(&source) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{}", describe_compile_error(&e, &source));
            return EXIT_COMPILE;
        }
    };
    tracing::debug!(instructions = program.len(), "compiled");

    if args.decompile {
        print!("{}", Compiler::decompile(&program));
    }
    if args.quiet {
        return EXIT_OK;
    }

    let mut machine = Machine::new()
        .with_tempo(config.tempo)
        .with_max_depth(config.max_depth);
    let session = Session {
        machine: &mut machine,
        program: &mut program,
        debug: args.debug,
        // Keys can only be read when the song did not come in on stdin.
        interactive: args.filename.is_some() && io::stdin().is_terminal(),
        display: config.display,
    };

    if args.dry_run {
        let sink = MemorySink::new();
        let code = session.play(&sink);
        print!("{}", tone_listing(&sink.played()));
        return code;
    }

    if let Some(path) = &args.wav {
        let sink = match WavSink::create(path, config.sample_rate) {
            Ok(sink) => sink,
            Err(e) => {
                eprintln!("cannot create {}: {e}", path.display());
                return EXIT_DEVICE_OPEN;
            }
        };
        let code = session.play(&sink);
        if let Err(e) = sink.finalize() {
            eprintln!("cannot finish {}: {e}", path.display());
            return EXIT_DEVICE_OPEN;
        }
        return code;
    }

    if args.audio {
        #[cfg(feature = "audio")]
        {
            return match beeper::sink::AudioSink::open(config.volume) {
                Ok(sink) => session.play(&sink),
                Err(e) => {
                    eprintln!("{e}");
                    EXIT_DEVICE_OPEN
                }
            };
        }
        #[cfg(not(feature = "audio"))]
        {
            eprintln!("built without sound card support; rebuild with --features audio");
            return EXIT_USAGE;
        }
    }

    match SpeakerSink::open(&config.device) {
        Ok(sink) => session.play(&sink),
        Err(e) => {
            eprintln!("{e}");
            match e {
                SpeakerError::Open(..) => EXIT_DEVICE_OPEN,
                SpeakerError::Query(..) => EXIT_DEVICE_QUERY,
                SpeakerError::NoSound(_) => EXIT_NO_SOUND,
            }
        }
    }
}

/// One playback of a compiled program.
struct Session<'a> {
    machine: &'a mut Machine,
    program: &'a mut Program,
    debug: bool,
    interactive: bool,
    display: bool,
}

impl Session<'_> {
    fn play<S: ToneSink + ?Sized>(self, sink: &S) -> i32 {
        install_interrupt(sink.silencer());

        let outcome = if self.debug {
            let result = if self.interactive {
                eprintln!("space/enter: step  c: continue  q: quit");
                debug(self.machine, self.program, sink, KeyInput::new())
            } else {
                debug(self.machine, self.program, sink, AutoStep)
            };
            match result {
                Ok(Some(outcome)) => outcome,
                Ok(None) => {
                    let _ = sink.emit(0, 0);
                    return EXIT_OK;
                }
                Err(e) => {
                    let _ = sink.emit(0, 0);
                    eprintln!("cannot read debugger input: {e}");
                    return EXIT_USAGE;
                }
            }
        } else {
            let mut show = |cursor: usize, len: usize| eprint!("\r{}", progress(cursor, len));
            let reporter: Option<Reporter<'_>> = if self.display {
                Some(&mut show)
            } else {
                None
            };
            let outcome = self
                .machine
                .run(self.program, sink, Mode::Continuous, reporter);
            if self.display {
                eprintln!();
            }
            outcome
        };

        if outcome.is_fault() {
            let _ = sink.emit(0, 0);
        }
        let (code, message) = conclude(&outcome, self.program, self.debug);
        if let Some(message) = message {
            eprintln!("{message}");
        }
        code
    }
}

/// Exit code for a finished run, plus the diagnostic still to print. A debug
/// session has already shown where it stopped.
fn conclude(outcome: &Outcome, program: &Program, shown: bool) -> (i32, Option<String>) {
    match outcome {
        Outcome::Fault(_) if shown => (EXIT_FAULT, None),
        Outcome::Fault(_) => (EXIT_FAULT, Some(describe_outcome(outcome, program))),
        _ => (EXIT_OK, None),
    }
}

/// Run a debug session. `None` means the user quit early.
fn debug<S: ToneSink + ?Sized, I: DebugInput>(
    machine: &mut Machine,
    program: &mut Program,
    sink: &S,
    input: I,
) -> io::Result<Option<Outcome>> {
    let exit = Debugger::new(machine, input).session(program, sink, |line| eprintln!("{line}"))?;
    Ok(match exit {
        DebugExit::Finished(outcome) => Some(outcome),
        DebugExit::Quit { .. } => None,
    })
}

/// Silence and exit on SIGINT, SIGTERM or SIGHUP.
fn install_interrupt(silencer: Silencer) {
    let result = ctrlc::set_handler(move || {
        silencer.silence();
        eprintln!("\nSignal received");
        process::exit(EXIT_OK);
    });
    if let Err(e) = result {
        tracing::warn!(error = %e, "cannot install interrupt handler");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beeper::compile;
    use beeper::debug::{DebugCommand, ScriptedInput};
    use beeper::sink::MemorySink;

    #[test]
    fn fault_is_reported_once_after_debugging() {
        let mut program = compile(b"C4 10ms\nRETURN\n").unwrap();
        let sink = MemorySink::new();
        let mut machine = Machine::new();
        let mut lines = Vec::new();
        let exit = Debugger::new(&mut machine, ScriptedInput::new([DebugCommand::Continue]))
            .session(&mut program, &sink, |line| lines.push(line.to_string()))
            .unwrap();
        let DebugExit::Finished(outcome) = exit else {
            panic!("session did not finish");
        };

        let (code, message) = conclude(&outcome, &program, true);
        assert_eq!(code, EXIT_FAULT);
        assert_eq!(message, None);
        assert_eq!(lines.iter().filter(|l| l.starts_with("fault:")).count(), 1);
    }

    #[test]
    fn fault_is_reported_after_plain_playback() {
        let mut program = compile(b"RETURN\n").unwrap();
        let sink = MemorySink::new();
        let outcome = Machine::new().run(&mut program, &sink, Mode::Continuous, None);
        let (code, message) = conclude(&outcome, &program, false);
        assert_eq!(code, EXIT_FAULT);
        assert!(message.unwrap().starts_with("fault: stack underflow"));
    }

    #[test]
    fn clean_end_exits_zero() {
        let program = compile(b"C4 Q\n").unwrap();
        assert_eq!(conclude(&Outcome::ProgramEnded, &program, false), (EXIT_OK, None));
    }
}
