//! In-memory sink — records every emit and returns at once.
//!
//! Used for dry runs, where the tone list is printed instead of played, and
//! by tests that check what the Machine asked the hardware to do.

use std::sync::{Arc, Mutex};

use super::{Silencer, SinkError, ToneRange, ToneSink};

/// One recorded `emit` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tone {
    pub frequency: u32,
    pub duration_ms: u32,
}

/// A sink that records tones instead of sounding them.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    tones: Arc<Mutex<Vec<Tone>>>,
    range: ToneRange,
    fail_at: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a different representable range.
    pub fn with_range(mut self, range: ToneRange) -> Self {
        self.range = range;
        self
    }

    /// Fail the `n`th emit (zero-based) with a device error.
    pub fn failing_at(mut self, n: usize) -> Self {
        self.fail_at = Some(n);
        self
    }

    /// All recorded tones, in call order. Includes silence requests.
    pub fn tones(&self) -> Vec<Tone> {
        self.lock().clone()
    }

    /// Recorded tones excluding the immediate-silence primitive `emit(0, 0)`.
    pub fn played(&self) -> Vec<Tone> {
        self.lock()
            .iter()
            .copied()
            .filter(|t| t.frequency != 0 || t.duration_ms != 0)
            .collect()
    }

    /// Sum of all recorded durations.
    pub fn total_ms(&self) -> u64 {
        self.lock().iter().map(|t| t.duration_ms as u64).sum()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Tone>> {
        // A poisoned log is still a valid log.
        self.tones.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ToneSink for MemorySink {
    fn emit(&self, frequency: u32, duration_ms: u32) -> Result<(), SinkError> {
        let mut tones = self.lock();
        if frequency != 0 || duration_ms != 0 {
            let emitted = tones
                .iter()
                .filter(|t| t.frequency != 0 || t.duration_ms != 0)
                .count();
            if self.fail_at == Some(emitted) {
                return Err(SinkError::Device(format!("injected failure at emit {emitted}")));
            }
        }
        tones.push(Tone {
            frequency,
            duration_ms,
        });
        Ok(())
    }

    fn range(&self) -> ToneRange {
        self.range
    }

    fn silencer(&self) -> Silencer {
        let tones = Arc::clone(&self.tones);
        Silencer::new(move || {
            tones.lock().unwrap_or_else(|e| e.into_inner()).push(Tone {
                frequency: 0,
                duration_ms: 0,
            });
        })
    }
}
