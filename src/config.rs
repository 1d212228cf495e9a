//! Player configuration — defaults loaded from ~/.beeper/config.yaml.
//!
//! Every key is optional. Command-line flags override whatever is set here.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dsl::compile::MAX_TEMPO;
use crate::sink::speaker::DEFAULT_DEVICE;
use crate::sink::wav::DEFAULT_SAMPLE_RATE;
use crate::vm::{DEFAULT_MAX_DEPTH, DEFAULT_TEMPO};

/// Lowest WAV render rate accepted.
pub const MIN_SAMPLE_RATE: u32 = 8000;

/// Default sound-card amplitude, 0.0 to 1.0.
pub const DEFAULT_VOLUME: f32 = 0.2;

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, io::Error),
    Parse(PathBuf, serde_yaml::Error),
    /// A setting outside its usable range.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "cannot read {}: {e}", path.display()),
            ConfigError::Parse(path, e) => write!(f, "invalid config {}: {e}", path.display()),
            ConfigError::Invalid(msg) => write!(f, "invalid setting: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(_, e) => Some(e),
            ConfigError::Parse(_, e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

/// Player settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Speaker event device.
    pub device: PathBuf,
    /// Tempo before the song's first TEMPO directive.
    pub tempo: u32,
    /// Control stack depth limit.
    pub max_depth: usize,
    /// Show the progress line while playing.
    pub display: bool,
    /// Sound-card amplitude (`--audio` only).
    pub volume: f32,
    /// WAV render sample rate (`--wav` only).
    pub sample_rate: u32,
}

impl PlayerConfig {
    /// Load config from the standard path (~/.beeper/config.yaml).
    /// Returns None if there is no home directory or no file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = default_config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    /// Load config from a YAML file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the player cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tempo == 0 || self.tempo > MAX_TEMPO {
            return Err(ConfigError::Invalid(format!(
                "tempo {} outside 1..={MAX_TEMPO}",
                self.tempo
            )));
        }
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be at least 1".into()));
        }
        if self.sample_rate < MIN_SAMPLE_RATE {
            return Err(ConfigError::Invalid(format!(
                "sample_rate {} below {MIN_SAMPLE_RATE}",
                self.sample_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(ConfigError::Invalid(format!(
                "volume {} outside 0.0..=1.0",
                self.volume
            )));
        }
        Ok(())
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
            tempo: DEFAULT_TEMPO,
            max_depth: DEFAULT_MAX_DEPTH,
            display: false,
            volume: DEFAULT_VOLUME,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

/// ~/.beeper/config.yaml, if a home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    Some(dirs::home_dir()?.join(".beeper").join("config.yaml"))
}
