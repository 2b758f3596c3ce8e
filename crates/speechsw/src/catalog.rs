//! Voice discovery across all installed engines

use crate::engine::{EngineLibrary, join_native_voice, split_native_voice};
use crate::error::{SpeechSwitchError, SpeechSwitchResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Variant reported for every voice; engines expose no dialect descriptor
pub const DEFAULT_VARIANT: &str = "null";

/// One voice as presented to the host
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceEntry {
    /// `"<engine> <voice>"`, unique within a catalog
    pub display_name: String,
    /// Language with the regional subtag upper-cased, e.g. `en-US`
    pub language: String,
    pub variant: String,
}

impl VoiceEntry {
    pub fn new(engine_name: &str, voice_name: &str, language: &str) -> Self {
        Self {
            display_name: format!("{engine_name} {voice_name}"),
            language: normalize_language(language),
            variant: DEFAULT_VARIANT.to_string(),
        }
    }

    /// Engine part of the display name (before the first space)
    pub fn engine_name(&self) -> &str {
        self.display_name
            .split_once(' ')
            .map_or(self.display_name.as_str(), |(engine, _)| engine)
    }

    /// Voice part of the display name (after the first space)
    pub fn voice_name(&self) -> &str {
        self.display_name
            .split_once(' ')
            .map_or("", |(_, voice)| voice)
    }

    /// Voice in the engine's native `"name,language"` encoding
    pub fn native_voice(&self) -> String {
        join_native_voice(self.voice_name(), &self.language)
    }
}

/// Upper-case everything after the first hyphen: `en-us` -> `en-US`
pub fn normalize_language(language: &str) -> String {
    match language.split_once('-') {
        Some((primary, region)) => format!("{primary}-{}", region.to_uppercase()),
        None => language.to_string(),
    }
}

/// Ordered list of every voice of every engine that started during discovery
#[derive(Clone, Debug, Default)]
pub struct VoiceCatalog {
    engines: Vec<String>,
    voices: Vec<VoiceEntry>,
}

impl VoiceCatalog {
    pub fn new(engines: Vec<String>, voices: Vec<VoiceEntry>) -> Self {
        Self { engines, voices }
    }

    /// Start a throwaway instance of every engine in `lib_dir` and collect its voices.
    ///
    /// Engines that fail to start are skipped. Fails only when no voice is found.
    pub fn discover(library: &dyn EngineLibrary, lib_dir: &Path) -> SpeechSwitchResult<Self> {
        if !lib_dir.is_dir() {
            return Err(SpeechSwitchError::Discovery(
                "library directory does not exist".to_string(),
                lib_dir.to_path_buf(),
            ));
        }

        let engines = library.list_engines(lib_dir);
        log::info!("Found {} engine(s) in {}", engines.len(), lib_dir.display());

        let mut voices = Vec::new();
        for engine_name in &engines {
            let engine = match library.start(lib_dir, engine_name, None) {
                Ok(engine) => engine,
                Err(e) => {
                    log::warn!("Could not start {} during discovery: {}", engine_name, e);
                    continue;
                }
            };

            for native in engine.list_voices() {
                match split_native_voice(&native) {
                    Some((name, language)) => {
                        voices.push(VoiceEntry::new(engine_name, name, language));
                    }
                    None => {
                        log::warn!(
                            "Skipping voice '{}' of {}: missing ',language' suffix",
                            native,
                            engine_name
                        );
                    }
                }
            }
            engine.stop();
        }

        if voices.is_empty() {
            return Err(SpeechSwitchError::Discovery(
                format!("no usable voices among {} engine(s)", engines.len()),
                lib_dir.to_path_buf(),
            ));
        }

        let catalog = Self { engines, voices };
        catalog.log_voices();
        Ok(catalog)
    }

    /// Engine identifiers in discovery order, including engines that failed to start
    pub fn engines(&self) -> &[String] {
        &self.engines
    }

    pub fn voices(&self) -> &[VoiceEntry] {
        &self.voices
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn find(&self, display_name: &str) -> Option<&VoiceEntry> {
        self.voices.iter().find(|v| v.display_name == display_name)
    }

    /// Voices followed by a `None` end marker, as the host protocol expects
    pub fn to_host_list(&self) -> Vec<Option<VoiceEntry>> {
        self.voices
            .iter()
            .cloned()
            .map(Some)
            .chain(std::iter::once(None))
            .collect()
    }

    fn log_voices(&self) {
        for voice in &self.voices {
            log::debug!(
                "voice name = {}, language = {}, variant = {}",
                voice.display_name,
                voice.language,
                voice.variant
            );
        }
    }
}
