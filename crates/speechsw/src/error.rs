use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to the host by the speech switch module
#[derive(Error, Debug)]
pub enum SpeechSwitchError {
    /// No usable engine could be discovered
    #[error(
        "Engine discovery failed: {0}\nLibrary directory: {1}\nSuggestion: Install at least one engine library or set library_dir in the configuration"
    )]
    Discovery(String, PathBuf),

    /// Voice name absent from the catalog
    #[error(
        "Voice not found: '{0}'\nSuggestion: Use list_voices() to see all available voices"
    )]
    UnknownVoice(String),

    /// Every default engine candidate failed to start
    #[error("No engine available\nTried: {0}")]
    NoEngineAvailable(String),

    /// A single engine failed to start
    #[error("Engine '{0}' failed to start: {1}")]
    EngineStart(String, #[source] EngineError),

    /// Speak request arrived with no engine loaded and none could be started
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for speech switch operations
pub type SpeechSwitchResult<T> = Result<T, SpeechSwitchError>;

/// Errors reported by an engine library implementation
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine '{0}' not found in {1}")]
    NotFound(String, PathBuf),

    #[error("Engine '{0}' refused to start: {1}")]
    StartRefused(String, String),

    #[error("IO error while loading engine: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for engine library operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Read(#[source] std::io::Error, PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value for '{0}': {1}")]
    Invalid(&'static str, String),

    #[error(
        "Unable to locate the engine library directory: {0}\nSuggestion: Set library_dir in the configuration"
    )]
    LibraryDir(String),
}

impl SpeechSwitchError {
    /// Whether the host should treat this error as fatal for the module
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Discovery(..) | Self::Config(_))
    }
}
