//! WAV render sink — writes the song to a file instead of a device.
//!
//! Time is virtual here: `emit` renders `duration_ms` worth of samples and
//! returns as soon as they are written.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Mutex;

use super::oscillator::SquareOscillator;
use super::{Silencer, SinkError, ToneRange, ToneSink};

/// Default render rate.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

const AMPLITUDE: f32 = 0.25;

struct Render {
    writer: hound::WavWriter<BufWriter<File>>,
    oscillator: SquareOscillator,
}

/// A sink that renders square-wave tones into a mono 16-bit WAV file.
pub struct WavSink {
    render: Mutex<Option<Render>>,
}

impl WavSink {
    /// Create (or truncate) `path` for writing at `sample_rate`.
    pub fn create(path: impl AsRef<Path>, sample_rate: u32) -> Result<Self, SinkError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(path.as_ref(), spec).map_err(wav_error)?;
        tracing::debug!(path = %path.as_ref().display(), sample_rate, "rendering to wav");
        Ok(Self {
            render: Mutex::new(Some(Render {
                writer,
                oscillator: SquareOscillator::new(sample_rate, AMPLITUDE),
            })),
        })
    }

    /// Flush the header and close the file. Later emits fail with
    /// [`SinkError::Closed`], except the silence primitive.
    pub fn finalize(&self) -> Result<(), SinkError> {
        let render = self.lock().take().ok_or(SinkError::Closed)?;
        render.writer.finalize().map_err(wav_error)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Render>> {
        self.render.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ToneSink for WavSink {
    fn emit(&self, frequency: u32, duration_ms: u32) -> Result<(), SinkError> {
        if frequency == 0 && duration_ms == 0 {
            return Ok(());
        }
        let mut guard = self.lock();
        let render = guard.as_mut().ok_or(SinkError::Closed)?;
        let frames = render.oscillator.frames_for(duration_ms);
        for _ in 0..frames {
            let sample = render.oscillator.next_sample(frequency);
            render
                .writer
                .write_sample((sample * i16::MAX as f32) as i16)
                .map_err(wav_error)?;
        }
        Ok(())
    }

    fn range(&self) -> ToneRange {
        let nyquist = self
            .lock()
            .as_ref()
            .map_or(DEFAULT_SAMPLE_RATE, |r| r.oscillator.sample_rate())
            / 2;
        ToneRange {
            max_hz: nyquist.min(ToneRange::PC_SPEAKER.max_hz),
            ..ToneRange::PC_SPEAKER
        }
    }

    fn silencer(&self) -> Silencer {
        Silencer::noop()
    }
}

fn wav_error(e: hound::Error) -> SinkError {
    match e {
        hound::Error::IoError(io) => SinkError::Io(io),
        other => SinkError::Device(other.to_string()),
    }
}
