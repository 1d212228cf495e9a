//! Tone sinks — the hardware boundary the [`Machine`](crate::vm::Machine) plays through.
//!
//! A sink emits one tone at a time and blocks for its duration; that blocking
//! call is the only clock in the system. `emit(0, 0)` is the immediate-silence
//! primitive and must be valid in every state. [`Silencer`] exposes that same
//! primitive as a thread-safe handle so an interrupt handler can reach it
//! without going through the Machine.

pub mod memory;
pub mod oscillator;
pub mod speaker;
pub mod wav;

#[cfg(feature = "audio")]
pub mod audio;

use std::fmt;
use std::sync::Arc;

pub use memory::MemorySink;
pub use speaker::SpeakerSink;
pub use wav::WavSink;

#[cfg(feature = "audio")]
pub use audio::AudioSink;

/// Lowest tone the PC speaker driver accepts.
pub const SPEAKER_MIN_HZ: u32 = 21;
/// Highest tone the PC speaker driver accepts.
pub const SPEAKER_MAX_HZ: u32 = 32766;
/// Longest single tone a sink is asked to hold.
pub const MAX_TONE_MS: u32 = 60_000;

/// Errors reported by a sink while emitting.
#[derive(Debug)]
pub enum SinkError {
    /// Writing to the device or file failed.
    Io(std::io::Error),
    /// The device rejected the request.
    Device(String),
    /// The sink was already finished or closed.
    Closed,
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Io(e) => write!(f, "I/O error: {e}"),
            SinkError::Device(e) => write!(f, "device error: {e}"),
            SinkError::Closed => write!(f, "sink is closed"),
        }
    }
}

impl std::error::Error for SinkError {}

impl From<std::io::Error> for SinkError {
    fn from(e: std::io::Error) -> Self {
        SinkError::Io(e)
    }
}

/// The span of tones a sink can represent. Silence is always representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToneRange {
    pub min_hz: u32,
    pub max_hz: u32,
    pub max_ms: u32,
}

impl ToneRange {
    /// Range of the Linux `pcspkr` driver.
    pub const PC_SPEAKER: ToneRange = ToneRange {
        min_hz: SPEAKER_MIN_HZ,
        max_hz: SPEAKER_MAX_HZ,
        max_ms: MAX_TONE_MS,
    };

    /// Whether `frequency` can be played.
    pub fn accepts_frequency(&self, frequency: u32) -> bool {
        (self.min_hz..=self.max_hz).contains(&frequency)
    }

    /// Whether a tone of `duration_ms` can be held.
    pub fn accepts_duration(&self, duration_ms: u32) -> bool {
        duration_ms <= self.max_ms
    }
}

impl Default for ToneRange {
    fn default() -> Self {
        Self::PC_SPEAKER
    }
}

/// A single-channel tone output.
pub trait ToneSink {
    /// Sound `frequency` hertz for `duration_ms`, blocking until done.
    ///
    /// A frequency of zero is silence. `emit(0, 0)` returns at once and is
    /// idempotent.
    fn emit(&self, frequency: u32, duration_ms: u32) -> Result<(), SinkError>;

    /// What this sink can play.
    fn range(&self) -> ToneRange {
        ToneRange::PC_SPEAKER
    }

    /// A handle that silences this sink from any thread.
    fn silencer(&self) -> Silencer;
}

impl<S: ToneSink + ?Sized> ToneSink for &S {
    fn emit(&self, frequency: u32, duration_ms: u32) -> Result<(), SinkError> {
        (**self).emit(frequency, duration_ms)
    }

    fn range(&self) -> ToneRange {
        (**self).range()
    }

    fn silencer(&self) -> Silencer {
        (**self).silencer()
    }
}

impl<S: ToneSink + ?Sized> ToneSink for Box<S> {
    fn emit(&self, frequency: u32, duration_ms: u32) -> Result<(), SinkError> {
        (**self).emit(frequency, duration_ms)
    }

    fn range(&self) -> ToneRange {
        (**self).range()
    }

    fn silencer(&self) -> Silencer {
        (**self).silencer()
    }
}

/// Thread-safe handle to a sink's immediate-silence primitive.
///
/// Cloning is cheap. Calling [`Silencer::silence`] never blocks on state the
/// Machine holds, so it is safe from a signal-handling thread while another
/// thread is inside `emit`.
#[derive(Clone)]
pub struct Silencer {
    action: Arc<dyn Fn() + Send + Sync>,
}

impl Silencer {
    pub fn new(action: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            action: Arc::new(action),
        }
    }

    /// A silencer for sinks that never sound on their own.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// Stop any tone immediately.
    pub fn silence(&self) {
        (self.action)();
    }
}

impl fmt::Debug for Silencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Silencer")
    }
}
