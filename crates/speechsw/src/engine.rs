//! Engine library abstraction
//!
//! Synthesis engines are opaque, dynamically discovered units. An [`EngineLibrary`] lists
//! the engines installed in a library directory and starts them; a started engine is a
//! [`SynthesisEngine`] handle shared between the control thread (which owns it) and the
//! synthesis worker (which only calls [`SynthesisEngine::speak`] / [`SynthesisEngine::speak_char`]).

use crate::error::EngineResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Producer callback bound to an engine at start.
///
/// Invoked on the synthesis worker once per generated buffer with
/// `(samples, engine_cancelled)`; a zero-length buffer marks end of utterance.
/// Returning `true` asks the engine to abort synthesis.
pub type AudioCallback = Arc<dyn Fn(&[i16], bool) -> bool + Send + Sync>;

/// Shared handle to a started engine
pub type EngineHandle = Arc<dyn SynthesisEngine>;

/// Punctuation verbosity understood by engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PunctuationLevel {
    None,
    #[default]
    Some,
    Most,
    All,
}

impl fmt::Display for PunctuationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PunctuationLevel::None => "none",
            PunctuationLevel::Some => "some",
            PunctuationLevel::Most => "most",
            PunctuationLevel::All => "all",
        };
        f.write_str(name)
    }
}

/// A loaded synthesis engine
pub trait SynthesisEngine: Send + Sync {
    /// Voices in the engine's native `"Name,language-region"` encoding
    fn list_voices(&self) -> Vec<String>;

    /// Switch to a voice given in native encoding
    fn set_voice(&self, voice: &str) -> bool;

    /// Set the speaking speed multiplier (1.0 is the engine's normal speed)
    fn set_speed(&self, speed: f32) -> bool;

    /// Set the relative pitch multiplier (1.0 is the voice's natural pitch)
    fn set_pitch(&self, pitch: f32) -> bool;

    fn set_punctuation(&self, level: PunctuationLevel) -> bool;

    /// Synthesize prose. Blocks until synthesis completes or the callback aborts it.
    fn speak(&self, text: &str, is_utf8: bool) -> bool;

    /// Synthesize a single character. Blocks like [`SynthesisEngine::speak`].
    fn speak_char(&self, ch: &str) -> bool;

    fn sample_rate(&self) -> u32;

    /// Release engine resources. Idempotent.
    fn stop(&self);
}

/// Discovers and starts engines
pub trait EngineLibrary: Send + Sync {
    /// Engine identifiers found in `lib_dir`, in discovery order
    fn list_engines(&self, lib_dir: &Path) -> Vec<String>;

    /// Start an engine, binding `callback` as its audio producer.
    ///
    /// Discovery passes `None` to start a throwaway instance that only lists voices.
    fn start(
        &self,
        lib_dir: &Path,
        engine_name: &str,
        callback: Option<AudioCallback>,
    ) -> EngineResult<EngineHandle>;
}

/// Split a native voice string on its last comma into `(name, language)`.
///
/// Returns `None` when the string has no comma.
pub fn split_native_voice(native: &str) -> Option<(&str, &str)> {
    native.rsplit_once(',')
}

/// Combine a voice name and language into the engine's native encoding
pub fn join_native_voice(name: &str, language: &str) -> String {
    format!("{name},{language}")
}
