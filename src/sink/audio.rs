//! Sound-card sink — plays the square wave through the default cpal output.
//!
//! The main thread publishes the current frequency through an atomic; the
//! cpal callback reads it every buffer and renders the wave. Silencing is a
//! single atomic store, so the [`Silencer`] never waits on the audio thread.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::oscillator::SquareOscillator;
use super::{Silencer, SinkError, ToneRange, ToneSink};

/// Audio engine errors.
#[derive(Debug)]
pub enum AudioError {
    /// No audio output device found.
    NoOutputDevice,
    /// Failed to query device configuration.
    DeviceConfig(String),
    /// Failed to build the audio stream.
    StreamBuild(String),
    /// Failed to start the audio stream.
    StreamPlay(String),
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::NoOutputDevice => write!(f, "no audio output device found"),
            AudioError::DeviceConfig(e) => write!(f, "device config error: {e}"),
            AudioError::StreamBuild(e) => write!(f, "stream build error: {e}"),
            AudioError::StreamPlay(e) => write!(f, "stream play error: {e}"),
        }
    }
}

impl std::error::Error for AudioError {}

/// A tone sink that owns a cpal output stream.
pub struct AudioSink {
    _stream: cpal::Stream,
    frequency: Arc<AtomicU32>,
    sample_rate: u32,
}

impl AudioSink {
    /// Open the default output device at its default configuration.
    pub fn open(volume: f32) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceConfig(e.to_string()))?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels();

        let frequency = Arc::new(AtomicU32::new(0));
        let shared = Arc::clone(&frequency);
        let mut oscillator = SquareOscillator::new(sample_rate, volume);

        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_fn = |err: cpal::StreamError| {
            tracing::warn!("audio stream error: {err}");
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let hz = shared.load(Ordering::Relaxed);
                    for frame in data.chunks_mut(channels as usize) {
                        let sample = oscillator.next_sample(hz);
                        frame.fill(sample);
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))?;

        tracing::debug!(sample_rate, channels, "opened audio output");
        Ok(Self {
            _stream: stream,
            frequency,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl ToneSink for AudioSink {
    fn emit(&self, frequency: u32, duration_ms: u32) -> Result<(), SinkError> {
        self.frequency.store(frequency, Ordering::Relaxed);
        if duration_ms > 0 {
            thread::sleep(Duration::from_millis(duration_ms as u64));
        }
        self.frequency.store(0, Ordering::Relaxed);
        Ok(())
    }

    fn range(&self) -> ToneRange {
        ToneRange {
            max_hz: (self.sample_rate / 2).min(ToneRange::PC_SPEAKER.max_hz),
            ..ToneRange::PC_SPEAKER
        }
    }

    fn silencer(&self) -> Silencer {
        let frequency = Arc::clone(&self.frequency);
        Silencer::new(move || frequency.store(0, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires audio device — run manually with `cargo test --features audio -- --ignored`
    fn play_and_silence() {
        let sink = AudioSink::open(0.2).expect("no audio device");
        sink.emit(440, 100).unwrap();
        sink.silencer().silence();
        assert!(sink.range().max_hz <= sink.sample_rate() / 2);
    }

    #[test]
    fn audio_error_display() {
        assert_eq!(
            AudioError::NoOutputDevice.to_string(),
            "no audio output device found"
        );
        assert_eq!(
            AudioError::DeviceConfig("test".to_string()).to_string(),
            "device config error: test"
        );
    }
}
