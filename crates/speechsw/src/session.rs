//! The single live engine and the parameters applied to it

use crate::catalog::VoiceCatalog;
use crate::engine::{AudioCallback, EngineHandle, EngineLibrary};
use crate::error::{SpeechSwitchError, SpeechSwitchResult};
use crate::params::{pitch_to_multiplier, punctuation_level, rate_to_speed};
use crate::types::{CapitalLettersMode, PunctuationMode, VoiceParams};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cancellation signal shared by the control thread and the producer callback
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct ActiveEngine {
    name: String,
    handle: EngineHandle,
    sample_rate: u32,
    voice: Option<String>,
}

/// Last values the live engine accepted. Wiped whenever the engine changes.
#[derive(Debug, Default)]
struct AppliedParams {
    rate: Option<i32>,
    pitch: Option<i32>,
    punctuation: Option<PunctuationMode>,
    volume: Option<i32>,
    pitch_range: Option<i32>,
    capital_letters: Option<CapitalLettersMode>,
    language: Option<Option<String>>,
}

/// Owns at most one started engine.
///
/// Only the control thread mutates the session; the synthesis worker receives a clone of
/// the handle through [`EngineSession::handle`].
pub struct EngineSession {
    library: Arc<dyn EngineLibrary>,
    lib_dir: PathBuf,
    catalog: Arc<VoiceCatalog>,
    preferred_engine: String,
    callback: AudioCallback,
    cancel: CancellationFlag,
    active: Option<ActiveEngine>,
    applied: AppliedParams,
}

impl EngineSession {
    pub fn new(
        library: Arc<dyn EngineLibrary>,
        lib_dir: impl Into<PathBuf>,
        catalog: Arc<VoiceCatalog>,
        preferred_engine: impl Into<String>,
        callback: AudioCallback,
        cancel: CancellationFlag,
    ) -> Self {
        Self {
            library,
            lib_dir: lib_dir.into(),
            catalog,
            preferred_engine: preferred_engine.into(),
            callback,
            cancel,
            active: None,
            applied: AppliedParams::default(),
        }
    }

    pub fn is_live(&self) -> bool {
        self.active.is_some()
    }

    pub fn engine_name(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.name.as_str())
    }

    /// Native voice string last sent to the engine
    pub fn selected_voice(&self) -> Option<&str> {
        self.active.as_ref().and_then(|a| a.voice.as_deref())
    }

    /// Sample rate of the live engine, 0 when none is live
    pub fn sample_rate(&self) -> u32 {
        self.active.as_ref().map_or(0, |a| a.sample_rate)
    }

    pub fn handle(&self) -> Option<EngineHandle> {
        self.active.as_ref().map(|a| a.handle.clone())
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn lib_dir(&self) -> &Path {
        &self.lib_dir
    }

    /// Make the voice with this catalog display name current, switching engines if needed
    pub fn select_voice(&mut self, display_name: &str) -> SpeechSwitchResult<()> {
        let entry = self
            .catalog
            .find(display_name)
            .ok_or_else(|| SpeechSwitchError::UnknownVoice(display_name.to_string()))?;
        let engine_name = entry.engine_name().to_string();
        let native = entry.native_voice();

        if let Some(active) = &self.active {
            if active.name == engine_name && active.voice.as_deref() == Some(native.as_str()) {
                return Ok(());
            }
            if active.name != engine_name {
                self.stop();
            }
        }
        if self.active.is_none() {
            self.start_engine(&engine_name)?;
        }

        if let Some(active) = self.active.as_mut() {
            if active.voice.as_deref() != Some(native.as_str()) {
                log::info!("Setting voice {} on {}", native, active.name);
                if !active.handle.set_voice(&native) {
                    log::warn!("Engine {} rejected voice {}", active.name, native);
                }
                active.voice = Some(native);
            }
        }
        Ok(())
    }

    /// Start the preferred engine, or the first discovered engine that starts
    pub fn select_default_engine(&mut self) -> SpeechSwitchResult<()> {
        if self.is_live() {
            return Ok(());
        }
        log::info!("Selecting default engine");

        let engines = self.catalog.engines().to_vec();
        let preferred_name = self.preferred_engine.clone();
        let preferred = engines.iter().find(|name| **name == preferred_name);
        let candidates = preferred
            .into_iter()
            .chain(engines.iter().filter(|name| **name != preferred_name));

        for name in candidates {
            match self.start_engine(name) {
                Ok(()) => return Ok(()),
                Err(e) => log::warn!("{}", e),
            }
        }

        log::error!("All engines failed to start");
        Err(SpeechSwitchError::NoEngineAvailable(if engines.is_empty() {
            "no engines discovered".to_string()
        } else {
            engines.join(", ")
        }))
    }

    fn start_engine(&mut self, engine_name: &str) -> SpeechSwitchResult<()> {
        if let Some(active) = &self.active {
            if active.name == engine_name {
                log::debug!("Engine {} already started", engine_name);
                return Ok(());
            }
            self.stop();
        }

        log::info!("Starting engine {}", engine_name);
        let handle = self
            .library
            .start(&self.lib_dir, engine_name, Some(self.callback.clone()))
            .map_err(|e| SpeechSwitchError::EngineStart(engine_name.to_string(), e))?;
        let sample_rate = handle.sample_rate();
        log::debug!("Engine {} runs at {} Hz", engine_name, sample_rate);

        self.active = Some(ActiveEngine {
            name: engine_name.to_string(),
            handle,
            sample_rate,
            voice: None,
        });
        self.applied = AppliedParams::default();
        Ok(())
    }

    /// Forward every parameter that differs from what the engine last accepted
    pub fn apply_params(&mut self, params: &VoiceParams) {
        if self.applied.language.as_ref() != Some(&params.language_override) {
            log::debug!("Language {:?} follows the selected voice", params.language_override);
            self.applied.language = Some(params.language_override.clone());
        }
        if self.applied.rate != Some(params.rate) {
            self.apply_rate(params.rate);
        }
        if self.applied.volume != Some(params.volume) {
            log::debug!("Volume {} not supported by engines", params.volume);
            self.applied.volume = Some(params.volume);
        }
        if self.applied.pitch != Some(params.pitch) {
            self.apply_pitch(params.pitch);
        }
        if self.applied.pitch_range != Some(params.pitch_range) {
            log::debug!("Pitch range {} not supported by engines", params.pitch_range);
            self.applied.pitch_range = Some(params.pitch_range);
        }
        if self.applied.punctuation != Some(params.punctuation) {
            self.apply_punctuation(params.punctuation);
        }
        if self.applied.capital_letters != Some(params.capital_letters) {
            log::debug!(
                "Capital letter mode {:?} not supported by engines",
                params.capital_letters
            );
            self.applied.capital_letters = Some(params.capital_letters);
        }
    }

    /// Set speaking rate on the [-100, 100] scale. Returns whether the engine accepted it.
    pub fn apply_rate(&mut self, rate: i32) -> bool {
        let Some(active) = &self.active else {
            log::debug!("No engine to set rate on");
            return false;
        };
        let speed = rate_to_speed(rate);
        if active.handle.set_speed(speed) {
            log::debug!("Speed set to {}", speed);
            self.applied.rate = Some(rate);
            true
        } else {
            log::warn!("Unable to set speed to {} on {}", speed, active.name);
            false
        }
    }

    /// Set pitch on the [-100, 100] scale. Returns whether the engine accepted it.
    pub fn apply_pitch(&mut self, pitch: i32) -> bool {
        let Some(active) = &self.active else {
            log::debug!("No engine to set pitch on");
            return false;
        };
        let multiplier = pitch_to_multiplier(pitch);
        if active.handle.set_pitch(multiplier) {
            log::debug!("Pitch set to {}", multiplier);
            self.applied.pitch = Some(pitch);
            true
        } else {
            log::warn!("Unable to set pitch to {} on {}", multiplier, active.name);
            false
        }
    }

    pub fn apply_punctuation(&mut self, mode: PunctuationMode) -> bool {
        let Some(active) = &self.active else {
            log::debug!("No engine to set punctuation mode on");
            return false;
        };
        let level = punctuation_level(mode);
        if active.handle.set_punctuation(level) {
            log::debug!("Punctuation level set to {}", level);
            self.applied.punctuation = Some(mode);
            true
        } else {
            log::warn!("Unable to set punctuation level {} on {}", level, active.name);
            false
        }
    }

    /// Release the engine and all per-engine state. Idempotent.
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            log::info!("Stopping engine {}", active.name);
            active.handle.stop();
            self.applied = AppliedParams::default();
        }
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::VoiceEntry;
    use crate::testing::{FakeEngineLibrary, FakeEngineSpec};

    fn noop_callback() -> AudioCallback {
        Arc::new(|_samples: &[i16], _cancelled: bool| false)
    }

    fn two_engine_session(library: &FakeEngineLibrary, preferred: &str) -> EngineSession {
        let catalog = VoiceCatalog::new(
            vec!["espeak".into(), "festival".into()],
            vec![
                VoiceEntry::new("espeak", "English (America)", "en-us"),
                VoiceEntry::new("espeak", "German", "de"),
                VoiceEntry::new("festival", "kal", "en"),
            ],
        );
        EngineSession::new(
            Arc::new(library.clone()),
            "/tmp",
            Arc::new(catalog),
            preferred,
            noop_callback(),
            CancellationFlag::new(),
        )
    }

    fn library() -> FakeEngineLibrary {
        FakeEngineLibrary::new(vec![
            FakeEngineSpec::new("espeak", vec!["English (America),en-us", "German,de"])
                .with_sample_rate(22_050),
            FakeEngineSpec::new("festival", vec!["kal,en"]).with_sample_rate(16_000),
        ])
    }

    #[test]
    fn test_select_voice_starts_engine_and_sets_voice() {
        let library = library();
        let mut session = two_engine_session(&library, "espeak");

        session.select_voice("espeak English (America)").unwrap();
        assert_eq!(session.engine_name(), Some("espeak"));
        assert_eq!(session.selected_voice(), Some("English (America),en-US"));
        assert_eq!(session.sample_rate(), 22_050);

        let stats = library.stats("espeak");
        assert_eq!(stats.starts, 1);
        assert!(stats.started_with_callback);
        assert_eq!(stats.voices_set, vec!["English (America),en-US".to_string()]);
    }

    #[test]
    fn test_select_same_voice_twice_is_noop() {
        let library = library();
        let mut session = two_engine_session(&library, "espeak");

        session.select_voice("espeak German").unwrap();
        session.select_voice("espeak German").unwrap();

        let stats = library.stats("espeak");
        assert_eq!(stats.starts, 1);
        assert_eq!(stats.voices_set.len(), 1);
    }

    #[test]
    fn test_switching_voice_on_same_engine_keeps_engine() {
        let library = library();
        let mut session = two_engine_session(&library, "espeak");

        session.select_voice("espeak German").unwrap();
        session.select_voice("espeak English (America)").unwrap();

        let stats = library.stats("espeak");
        assert_eq!(stats.starts, 1);
        assert_eq!(stats.stops, 0);
        assert_eq!(stats.voices_set.len(), 2);
    }

    #[test]
    fn test_switching_engine_stops_previous() {
        let library = library();
        let mut session = two_engine_session(&library, "espeak");

        session.select_voice("espeak German").unwrap();
        session.select_voice("festival kal").unwrap();

        assert_eq!(library.stats("espeak").stops, 1);
        assert_eq!(library.stats("festival").starts, 1);
        assert_eq!(session.engine_name(), Some("festival"));
        assert_eq!(session.sample_rate(), 16_000);
    }

    #[test]
    fn test_unknown_voice_leaves_selection_unchanged() {
        let library = library();
        let mut session = two_engine_session(&library, "espeak");
        session.select_voice("festival kal").unwrap();

        let err = session.select_voice("espeak Klingon").unwrap_err();
        assert!(matches!(err, SpeechSwitchError::UnknownVoice(name) if name == "espeak Klingon"));
        assert_eq!(session.engine_name(), Some("festival"));
        assert_eq!(session.selected_voice(), Some("kal,en"));
        assert_eq!(library.stats("festival").stops, 0);
    }

    #[test]
    fn test_default_engine_prefers_configured_name() {
        let library = library();
        let mut session = two_engine_session(&library, "festival");
        session.select_default_engine().unwrap();
        assert_eq!(session.engine_name(), Some("festival"));
        assert_eq!(library.stats("espeak").starts, 0);
    }

    #[test]
    fn test_default_engine_falls_back_in_discovery_order() {
        let library = FakeEngineLibrary::new(vec![
            FakeEngineSpec::new("espeak", vec!["a,en"]).failing_start(),
            FakeEngineSpec::new("festival", vec!["kal,en"]),
        ]);
        let mut session = two_engine_session(&library, "espeak");
        session.select_default_engine().unwrap();
        assert_eq!(session.engine_name(), Some("festival"));
    }

    #[test]
    fn test_default_engine_exhausted() {
        let library = FakeEngineLibrary::new(vec![
            FakeEngineSpec::new("espeak", vec![]).failing_start(),
            FakeEngineSpec::new("festival", vec![]).failing_start(),
        ]);
        let mut session = two_engine_session(&library, "espeak");
        let err = session.select_default_engine().unwrap_err();
        assert!(matches!(err, SpeechSwitchError::NoEngineAvailable(_)));
        assert!(!session.is_live());
    }

    #[test]
    fn test_parameters_are_noops_without_engine() {
        let library = library();
        let mut session = two_engine_session(&library, "espeak");
        assert!(!session.apply_rate(20));
        assert!(!session.apply_pitch(50));
        assert!(!session.apply_punctuation(PunctuationMode::All));
    }

    #[test]
    fn test_apply_params_forwards_only_changes() {
        let library = library();
        let mut session = two_engine_session(&library, "espeak");
        session.select_default_engine().unwrap();

        let params = VoiceParams::default().with_rate(20).with_pitch(50);
        session.apply_params(&params);
        session.apply_params(&params);
        session.apply_params(&params.clone().with_rate(-20));

        let stats = library.stats("espeak");
        assert_eq!(stats.speeds, vec![2.0, 0.5]);
        assert_eq!(stats.pitches, vec![2.0]);
        assert_eq!(stats.punctuation.len(), 1);
    }

    #[test]
    fn test_rejected_parameter_is_retried() {
        let library = FakeEngineLibrary::new(vec![
            FakeEngineSpec::new("espeak", vec!["a,en"]).rejecting_params(),
        ]);
        let mut session = two_engine_session(&library, "espeak");
        session.select_default_engine().unwrap();

        let params = VoiceParams::default().with_rate(40);
        session.apply_params(&params);
        session.apply_params(&params);
        assert_eq!(library.stats("espeak").speeds.len(), 2);
    }

    #[test]
    fn test_engine_restart_reapplies_params() {
        let library = library();
        let mut session = two_engine_session(&library, "espeak");
        let params = VoiceParams::default().with_rate(20);

        session.select_voice("espeak German").unwrap();
        session.apply_params(&params);
        session.select_voice("festival kal").unwrap();
        session.apply_params(&params);

        assert_eq!(library.stats("espeak").speeds, vec![2.0]);
        assert_eq!(library.stats("festival").speeds, vec![2.0]);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let library = library();
        let mut session = two_engine_session(&library, "espeak");
        session.select_voice("espeak German").unwrap();

        session.stop();
        session.stop();
        assert!(!session.is_live());
        assert_eq!(session.sample_rate(), 0);
        assert_eq!(session.selected_voice(), None);
        assert_eq!(library.stats("espeak").stops, 1);
    }

    #[test]
    fn test_cancellation_flag_is_shared() {
        let flag = CancellationFlag::new();
        let other = flag.clone();
        other.cancel();
        assert!(flag.is_cancelled());
        flag.clear();
        assert!(!other.is_cancelled());
    }
}
