//! Module configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory name of the engine library, next to the host's modules directory
pub const LIBRARY_DIR_NAME: &str = "speechsw";

/// Configuration for the speech switch module
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpeechSwitchConfig {
    /// Engine library directory. Derived from the executable location when unset.
    #[serde(default)]
    pub library_dir: Option<PathBuf>,

    /// Engine tried first when no voice is selected (default: espeak)
    #[serde(default = "default_preferred_engine")]
    pub preferred_engine: String,

    /// Maximum samples per frame pushed to the host queue (default: 1000)
    #[serde(default = "default_audio_chunk_size")]
    pub audio_chunk_size: usize,

    /// Host queue bound in samples (default: 20 * 11025)
    #[serde(default = "default_audio_queue_max_size")]
    pub audio_queue_max_size: usize,

    /// Engine buffers held between the producer callback and delivery (default: 16)
    #[serde(default = "default_frame_channel_capacity")]
    pub frame_channel_capacity: usize,
}

fn default_preferred_engine() -> String {
    "espeak".to_string()
}

fn default_audio_chunk_size() -> usize {
    1000
}

fn default_audio_queue_max_size() -> usize {
    20 * 11025
}

fn default_frame_channel_capacity() -> usize {
    16
}

impl Default for SpeechSwitchConfig {
    fn default() -> Self {
        Self {
            library_dir: None,
            preferred_engine: default_preferred_engine(),
            audio_chunk_size: default_audio_chunk_size(),
            audio_queue_max_size: default_audio_queue_max_size(),
            frame_channel_capacity: default_frame_channel_capacity(),
        }
    }
}

impl SpeechSwitchConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Read(e, path.to_path_buf()))?;
        Self::from_toml_str(&contents)
    }

    pub fn with_library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.library_dir = Some(dir.into());
        self
    }

    pub fn with_preferred_engine(mut self, engine: impl Into<String>) -> Self {
        self.preferred_engine = engine.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audio_chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "audio_chunk_size",
                "must be greater than zero".to_string(),
            ));
        }
        if self.audio_queue_max_size == 0 {
            return Err(ConfigError::Invalid(
                "audio_queue_max_size",
                "must be greater than zero".to_string(),
            ));
        }
        if self.frame_channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "frame_channel_capacity",
                "must be greater than zero".to_string(),
            ));
        }
        if self.preferred_engine.contains(' ') {
            return Err(ConfigError::Invalid(
                "preferred_engine",
                format!("'{}' contains a space", self.preferred_engine),
            ));
        }
        Ok(())
    }

    /// Configured library directory, or `<exe dir>/../speechsw`
    pub fn resolve_library_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.library_dir {
            return Ok(dir.clone());
        }
        let exe = std::env::current_exe().map_err(|e| ConfigError::LibraryDir(e.to_string()))?;
        library_dir_for_exe(&exe)
    }
}

fn library_dir_for_exe(exe: &Path) -> Result<PathBuf, ConfigError> {
    let lib_exec_dir = exe
        .parent()
        .and_then(Path::parent)
        .ok_or_else(|| ConfigError::LibraryDir(format!("{} has no parent", exe.display())))?;
    Ok(lib_exec_dir.join(LIBRARY_DIR_NAME))
}
