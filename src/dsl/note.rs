//! Pitch and length literals — "C4", "F#3", "Bb5"; "Q", "E.", "3/8", "250ms".
//!
//! Pitches resolve to whole hertz from a fixed octave-4 table, doubled or
//! halved per octave. Lengths resolve to ticks (tempo-relative) or
//! milliseconds (absolute).

use crate::vm::instruction::{Length, TICKS_PER_WHOLE};

/// Octave-4 frequencies, C through B.
const OCTAVE_4: [u32; 12] = [261, 277, 294, 311, 329, 349, 370, 392, 415, 440, 466, 494];

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Highest octave a note name may use.
pub const MAX_OCTAVE: i32 = 9;

/// Named lengths and their tick counts.
const NAMED_LENGTHS: [(char, u32); 6] = [
    ('W', TICKS_PER_WHOLE),
    ('H', TICKS_PER_WHOLE / 2),
    ('Q', TICKS_PER_WHOLE / 4),
    ('E', TICKS_PER_WHOLE / 8),
    ('S', TICKS_PER_WHOLE / 16),
    ('T', TICKS_PER_WHOLE / 32),
];

/// Frequency of semitone `semitone` (0 = C) in `octave`.
fn table_frequency(semitone: usize, octave: i32) -> u32 {
    let base = OCTAVE_4[semitone];
    if octave >= 4 {
        base << (octave - 4)
    } else {
        let shift = 4 - octave;
        (base + (1 << (shift - 1))) >> shift
    }
}

/// Whether `word` is shaped like a note name (starts with a note letter).
pub fn looks_like_note(word: &str) -> bool {
    word.chars()
        .next()
        .is_some_and(|c| matches!(c.to_ascii_uppercase(), 'A'..='G'))
}

/// Parse a note name into hertz.
///
/// Format: `<letter><optional accidental><octave>`
/// - Letter: C, D, E, F, G, A, B (either case)
/// - Accidental: # (sharp) or b (flat)
/// - Octave: 0 to 9 (C4 = 261 Hz, A4 = 440 Hz)
///
/// `B#4` wraps to `C5` and `Cb4` to `B3`.
pub fn parse_note_name(name: &str) -> Option<u32> {
    let chars: Vec<char> = name.chars().collect();
    if chars.is_empty() {
        return None;
    }

    let base: i32 = match chars[0].to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let mut i = 1;
    let accidental: i32 = if i < chars.len() && chars[i] == '#' {
        i += 1;
        1
    } else if i < chars.len() && chars[i] == 'b' {
        i += 1;
        -1
    } else {
        0
    };

    let octave_str: String = chars[i..].iter().collect();
    if octave_str.is_empty() || !octave_str.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let mut octave: i32 = octave_str.parse().ok()?;

    let mut semitone = base + accidental;
    if semitone < 0 {
        semitone += 12;
        octave -= 1;
    } else if semitone > 11 {
        semitone -= 12;
        octave += 1;
    }

    if !(0..=MAX_OCTAVE).contains(&octave) {
        return None;
    }
    Some(table_frequency(semitone as usize, octave))
}

/// Canonical note name for `frequency`, if it is exactly a table pitch.
/// Sharps are preferred over flats.
pub fn note_name(frequency: u32) -> Option<String> {
    (0..=MAX_OCTAVE).find_map(|octave| {
        (0..12)
            .find(|&s| table_frequency(s, octave) == frequency)
            .map(|s| format!("{}{octave}", SHARP_NAMES[s]))
    })
}

/// Parse a length literal.
///
/// - `W H Q E S T` (whole … thirty-second), optional trailing `.` for dotted
/// - `n/d`: fraction of a whole note, must land on a whole tick
/// - `<n>ms`: absolute milliseconds
pub fn parse_length(word: &str) -> Option<Length> {
    let upper = word.to_ascii_uppercase();

    if let Some(ms) = upper.strip_suffix("MS") {
        if ms.is_empty() || !ms.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        return ms.parse().ok().map(Length::Millis);
    }

    if let Some((num, den)) = upper.split_once('/') {
        let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !digits(num) || !digits(den) {
            return None;
        }
        let num: u64 = num.parse().ok()?;
        let den: u64 = den.parse().ok()?;
        if den == 0 {
            return None;
        }
        let scaled = num.checked_mul(TICKS_PER_WHOLE as u64)?;
        if scaled % den != 0 {
            return None;
        }
        return u32::try_from(scaled / den).ok().map(Length::Ticks);
    }

    let (name, dotted) = match upper.strip_suffix('.') {
        Some(name) => (name, true),
        None => (upper.as_str(), false),
    };
    let mut chars = name.chars();
    let letter = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    let ticks = NAMED_LENGTHS
        .iter()
        .find(|(c, _)| *c == letter)
        .map(|(_, t)| *t)?;
    Some(Length::Ticks(if dotted { ticks + ticks / 2 } else { ticks }))
}

/// Canonical spelling of `length` that [`parse_length`] reads back unchanged.
pub fn length_name(length: Length) -> String {
    match length {
        Length::Millis(ms) => format!("{ms}ms"),
        Length::Ticks(ticks) => {
            for (letter, t) in NAMED_LENGTHS {
                if ticks == t {
                    return letter.to_string();
                }
                if ticks == t + t / 2 {
                    return format!("{letter}.");
                }
            }
            let divisor = gcd(ticks, TICKS_PER_WHOLE).max(1);
            format!("{}/{}", ticks / divisor, TICKS_PER_WHOLE / divisor)
        }
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
