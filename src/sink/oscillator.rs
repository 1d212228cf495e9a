//! Square-wave oscillator — what a PC speaker sounds like, rendered as samples.

/// Phase-accumulating square wave.
///
/// Phase is kept in `[0.0, 1.0)` and carried across frequency changes so
/// consecutive tones join without clicks at the boundary.
#[derive(Debug, Clone)]
pub struct SquareOscillator {
    phase: f64,
    sample_rate: u32,
    amplitude: f32,
}

impl SquareOscillator {
    pub fn new(sample_rate: u32, amplitude: f32) -> Self {
        Self {
            phase: 0.0,
            sample_rate,
            amplitude: amplitude.clamp(0.0, 1.0),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Produce the next sample at `frequency` hertz. Zero yields silence and
    /// resets the phase.
    pub fn next_sample(&mut self, frequency: u32) -> f32 {
        if frequency == 0 || self.sample_rate == 0 {
            self.phase = 0.0;
            return 0.0;
        }
        let value = if self.phase < 0.5 {
            self.amplitude
        } else {
            -self.amplitude
        };
        self.phase += frequency as f64 / self.sample_rate as f64;
        self.phase -= self.phase.floor();
        value
    }

    /// Number of frames covering `duration_ms` at this sample rate.
    pub fn frames_for(&self, duration_ms: u32) -> u64 {
        duration_ms as u64 * self.sample_rate as u64 / 1000
    }
}
