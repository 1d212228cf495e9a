//! Full pipeline integration tests — notation → compile → machine → recorded tones.
//!
//! Everything plays into a MemorySink, so no speaker or sound card is needed.

use beeper::dsl::Compiler;
use beeper::sink::memory::Tone;
use beeper::sink::{MemorySink, ToneSink};
use beeper::vm::{Control, FaultKind, Instruction, Length};
use beeper::{compile, ErrorKind, Machine, Mode, Outcome, Program};

const REFERENCE: &[u8] = b"TEMPO 120\nC4 Q\nREST Q\nD4 Q\n";

const SONG: &[u8] = b"// two bars and a tag
TEMPO 150
LABEL intro
REPEAT 2
  E5 E
  D#5 E
  E5 E
  REST E
END
CALL tag
TEMPO 90
G4 Q.
BREAK
C5 H
JUMP done

LABEL tag
  A4 S
  B4 S
  RETURN

LABEL done
";

/// Helper: play `program` to completion in the given mode, resuming after
/// every suspension. Returns the tones and the number of run calls.
fn play_resuming(program: &mut Program, mode: Mode) -> (Vec<Tone>, usize) {
    let sink = MemorySink::new();
    let mut machine = Machine::new();
    let mut calls = 0;
    loop {
        calls += 1;
        match machine.run(program, &sink, mode, None) {
            Outcome::Breakpoint { .. } => continue,
            Outcome::ProgramEnded => break,
            Outcome::Fault(fault) => panic!("unexpected fault: {fault}"),
        }
    }
    (sink.tones(), calls)
}

#[test]
fn reference_song_compiles_and_plays() {
    let mut program = compile(REFERENCE).unwrap();
    assert_eq!(
        program.instructions(),
        &[
            Instruction::Tempo { bpm: 120 },
            Instruction::Note {
                frequency: 261,
                length: Length::QUARTER,
            },
            Instruction::Rest {
                length: Length::QUARTER,
            },
            Instruction::Note {
                frequency: 294,
                length: Length::QUARTER,
            },
        ]
    );

    let sink = MemorySink::new();
    let outcome = Machine::new().run(&mut program, &sink, Mode::Continuous, None);
    assert_eq!(outcome, Outcome::ProgramEnded);
    assert_eq!(
        sink.tones(),
        vec![
            Tone {
                frequency: 261,
                duration_ms: 500
            },
            Tone {
                frequency: 0,
                duration_ms: 500
            },
            Tone {
                frequency: 294,
                duration_ms: 500
            },
        ]
    );
}

#[test]
fn compile_is_deterministic() {
    let a = compile(SONG).unwrap();
    let b = compile(SONG).unwrap();
    assert_eq!(a.instructions(), b.instructions());
    assert_eq!(a.cursor(), 0);
}

#[test]
fn rewind_replays_identically() {
    let mut program = compile(SONG).unwrap();
    let (first, _) = play_resuming(&mut program, Mode::Continuous);
    assert!(program.is_finished());

    program.rewind();
    assert_eq!(program.cursor(), 0);
    let (second, _) = play_resuming(&mut program, Mode::Continuous);
    assert_eq!(first, second);
}

#[test]
fn straight_line_playback_takes_one_step_per_instruction() {
    let mut program = compile(b"TEMPO 200\nC4 E\nD4 E\nREST S\nE4 Q\nBREAK\nF4 100ms").unwrap();
    let len = program.len();

    let mut steps = 0;
    let mut report = |_cursor: usize, _len: usize| steps += 1;
    let sink = MemorySink::new();
    let outcome = Machine::new().run(&mut program, &sink, Mode::Continuous, Some(&mut report));
    assert_eq!(outcome, Outcome::ProgramEnded);
    assert_eq!(steps, len);

    program.rewind();
    let (_, calls) = play_resuming(&mut program, Mode::SingleStep);
    assert_eq!(calls, len);
}

#[test]
fn stepping_and_breakpoints_match_continuous_playback() {
    let mut program = compile(SONG).unwrap();
    let (continuous, _) = play_resuming(&mut program, Mode::Continuous);

    program.rewind();
    let (stepped, _) = play_resuming(&mut program, Mode::SingleStep);

    program.rewind();
    let (until_break, calls) = play_resuming(&mut program, Mode::UntilBreakpoint);

    assert_eq!(continuous, stepped);
    assert_eq!(continuous, until_break);
    // One stop at the BREAK marker.
    assert_eq!(calls, 2);
}

#[test]
fn partial_stepping_then_continuous_matches_one_run() {
    let mut program = compile(SONG).unwrap();
    let (expected, _) = play_resuming(&mut program, Mode::Continuous);

    for steps in [1, 3, 7, 12] {
        program.rewind();
        let sink = MemorySink::new();
        let mut machine = Machine::new();
        for _ in 0..steps {
            let outcome = machine.run(&mut program, &sink, Mode::SingleStep, None);
            assert!(matches!(outcome, Outcome::Breakpoint { .. }));
        }
        let outcome = machine.run(&mut program, &sink, Mode::Continuous, None);
        assert_eq!(outcome, Outcome::ProgramEnded);
        assert_eq!(sink.tones(), expected, "after {steps} steps");
    }
}

#[test]
fn song_plays_expected_tone_sequence() {
    let mut program = compile(SONG).unwrap();
    let (tones, _) = play_resuming(&mut program, Mode::Continuous);
    let freqs: Vec<u32> = tones.iter().map(|t| t.frequency).collect();
    assert_eq!(
        freqs,
        vec![658, 622, 658, 0, 658, 622, 658, 0, 440, 494, 392, 522]
    );
    // Eighth at 150 bpm, dotted quarter at 90 bpm.
    assert_eq!(tones[0].duration_ms, 200);
    assert_eq!(tones[10].duration_ms, 1000);
}

#[test]
fn zero_length_notes_reach_the_sink() {
    let mut program = compile(b"TEMPO 120\nA4 0ms\nC4 0/4\nD4 Q\n").unwrap();
    let sink = MemorySink::new();
    let outcome = Machine::new().run(&mut program, &sink, Mode::Continuous, None);
    assert_eq!(outcome, Outcome::ProgramEnded);
    let tones: Vec<(u32, u32)> = sink
        .played()
        .iter()
        .map(|t| (t.frequency, t.duration_ms))
        .collect();
    assert_eq!(tones, vec![(440, 0), (261, 0), (294, 500)]);
}

#[test]
fn fault_stops_at_faulting_instruction() {
    let mut program = Program::new(vec![
        Instruction::Note {
            frequency: 440,
            length: Length::Millis(5),
        },
        Instruction::Note {
            frequency: 494,
            length: Length::Millis(5),
        },
        Instruction::Control(Control::Jump(42)),
        Instruction::Note {
            frequency: 523,
            length: Length::Millis(5),
        },
    ]);
    let sink = MemorySink::new();
    let mut machine = Machine::new();

    let outcome = machine.run(&mut program, &sink, Mode::Continuous, None);
    let fault = outcome.fault().cloned().unwrap();
    assert_eq!(fault.kind, FaultKind::InvalidJumpTarget);
    assert_eq!(fault.cursor, 2);
    assert_eq!(program.cursor(), 2);
    assert_eq!(machine.last_fault(), Some(&fault));
    assert_eq!(sink.played().len(), 2);

    // Running again faults again in the same place without emitting.
    let again = machine.run(&mut program, &sink, Mode::Continuous, None);
    assert_eq!(again.fault().map(|f| f.cursor), Some(2));
    assert_eq!(sink.played().len(), 2);
}

#[test]
fn silence_is_valid_between_every_step() {
    let mut program = compile(SONG).unwrap();
    let sink = MemorySink::new();
    let silencer = sink.silencer();
    let mut machine = Machine::new();

    sink.emit(0, 0).unwrap();
    loop {
        let outcome = machine.run(&mut program, &sink, Mode::SingleStep, None);
        sink.emit(0, 0).unwrap();
        sink.emit(0, 0).unwrap();
        silencer.silence();
        if outcome == Outcome::ProgramEnded {
            break;
        }
        assert!(!outcome.is_fault());
    }

    program.rewind();
    let (expected, _) = play_resuming(&mut program, Mode::Continuous);
    assert_eq!(sink.played(), expected);
}

#[test]
fn silence_is_valid_after_construction_and_after_fault() {
    let sink = MemorySink::new();
    let mut machine = Machine::new();
    sink.emit(0, 0).unwrap();

    let mut program = compile(b"C4 10ms\n99999 10ms\nD4 10ms\n").unwrap();
    let outcome = machine.run(&mut program, &sink, Mode::Continuous, None);
    assert_eq!(outcome.fault().map(|f| f.kind), Some(FaultKind::OutOfRangeTone));
    sink.emit(0, 0).unwrap();
    sink.silencer().silence();

    assert_eq!(sink.played().len(), 1);
    assert_eq!(sink.tones().len(), 4);
}

#[test]
fn silencer_works_from_another_thread() {
    let sink = MemorySink::new();
    let silencer = sink.silencer();
    std::thread::spawn(move || silencer.silence())
        .join()
        .unwrap();
    assert_eq!(
        sink.tones(),
        vec![Tone {
            frequency: 0,
            duration_ms: 0
        }]
    );
}

#[test]
fn undefined_label_is_unterminated_directive() {
    let err = compile(b"C4 Q\nJUMP nowhere\n").unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnterminatedDirective);
    assert_eq!(err.line, 2);
}

#[test]
fn compile_errors_are_all_or_nothing() {
    let err = compile(b"C4 Q\nD4 Q\nH4 Q\n").unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnexpectedToken);
    assert_eq!((err.line, err.col), (3, 1));
}

#[test]
fn decompiled_song_recompiles_to_same_program() {
    let program = compile(SONG).unwrap();
    let text = Compiler::decompile(&program);
    let again = compile(text.as_bytes()).unwrap();
    assert_eq!(again.instructions(), program.instructions());
}
