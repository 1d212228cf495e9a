//! PC speaker sink — drives the Linux `pcspkr` input event device.
//!
//! Tones are written as `EV_SND`/`SND_TONE` input events; a value of zero
//! stops the tone. The device file is shared with the [`Silencer`] so an
//! interrupt handler can write the stop event without any lock.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::{Silencer, SinkError, ToneRange, ToneSink};

/// Where the `pcspkr` driver registers its event device.
pub const DEFAULT_DEVICE: &str = "/dev/input/by-path/platform-pcspkr-event-spkr";

const EV_SND: u16 = 0x12;
const SND_TONE: u16 = 0x02;

/// Errors opening or querying the speaker device.
#[derive(Debug)]
pub enum SpeakerError {
    /// The device file could not be opened.
    Open(PathBuf, std::io::Error),
    /// The capability query failed.
    Query(PathBuf, std::io::Error),
    /// The device does not report sound capability.
    NoSound(PathBuf),
}

impl fmt::Display for SpeakerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeakerError::Open(path, e) => write!(f, "cannot open {}: {e}", path.display()),
            SpeakerError::Query(path, e) => {
                write!(f, "cannot query capabilities of {}: {e}", path.display())
            }
            SpeakerError::NoSound(path) => {
                write!(f, "device {} does not support sound", path.display())
            }
        }
    }
}

impl std::error::Error for SpeakerError {}

/// A tone sink backed by an event device.
#[derive(Debug)]
pub struct SpeakerSink {
    device: Arc<File>,
    path: PathBuf,
}

impl SpeakerSink {
    /// Open `path` read-write and confirm it can produce sound.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SpeakerError> {
        let path = path.as_ref().to_path_buf();
        let device = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| SpeakerError::Open(path.clone(), e))?;

        if !supports_sound(&device).map_err(|e| SpeakerError::Query(path.clone(), e))? {
            return Err(SpeakerError::NoSound(path));
        }

        tracing::debug!(device = %path.display(), "opened speaker");
        Ok(Self {
            device: Arc::new(device),
            path,
        })
    }

    /// Path of the opened device.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ToneSink for SpeakerSink {
    fn emit(&self, frequency: u32, duration_ms: u32) -> Result<(), SinkError> {
        tracing::trace!(frequency, duration_ms, "tone");
        write_tone(&self.device, frequency)?;
        if duration_ms > 0 {
            thread::sleep(Duration::from_millis(duration_ms as u64));
        }
        // A tone is always stopped, even a zero-length one.
        if frequency != 0 {
            write_tone(&self.device, 0)?;
        }
        Ok(())
    }

    fn range(&self) -> ToneRange {
        ToneRange::PC_SPEAKER
    }

    fn silencer(&self) -> Silencer {
        let device = Arc::clone(&self.device);
        Silencer::new(move || {
            // Best effort: nothing useful to do with an error while shutting down.
            let _ = write_tone(&device, 0);
        })
    }
}

/// Encode one `struct input_event` with a zero timestamp (the kernel stamps it).
fn encode_event(kind: u16, code: u16, value: i32) -> Vec<u8> {
    let mut buf = vec![0u8; timeval_size()];
    buf.extend_from_slice(&kind.to_ne_bytes());
    buf.extend_from_slice(&code.to_ne_bytes());
    buf.extend_from_slice(&value.to_ne_bytes());
    buf
}

fn write_tone(mut device: &File, frequency: u32) -> Result<(), SinkError> {
    let value = i32::try_from(frequency)
        .map_err(|_| SinkError::Device(format!("frequency {frequency} Hz too large")))?;
    device.write_all(&encode_event(EV_SND, SND_TONE, value))?;
    Ok(())
}

#[cfg(target_os = "linux")]
fn timeval_size() -> usize {
    std::mem::size_of::<libc::timeval>()
}

#[cfg(not(target_os = "linux"))]
fn timeval_size() -> usize {
    2 * std::mem::size_of::<usize>()
}

/// Ask the driver for its event-type bitmap and test the `EV_SND` bit.
#[cfg(target_os = "linux")]
fn supports_sound(device: &File) -> std::io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    // EV_CNT (0x20) bits.
    let mut bits = [0u8; 4];
    // EVIOCGBIT(0, len) = _IOC(_IOC_READ, 'E', 0x20, len)
    let request: u64 = (2 << 30) | ((bits.len() as u64) << 16) | ((b'E' as u64) << 8) | 0x20;
    // SAFETY: the buffer outlives the call and its length is encoded in the request.
    let rc = unsafe { libc::ioctl(device.as_raw_fd(), request as _, bits.as_mut_ptr()) };
    if rc < 0 {
        return Err(std::io::Error::last_os_error());
    }
    let bit = EV_SND as usize;
    Ok(bits[bit / 8] & (1 << (bit % 8)) != 0)
}

#[cfg(not(target_os = "linux"))]
fn supports_sound(_device: &File) -> std::io::Result<bool> {
    Ok(true)
}
