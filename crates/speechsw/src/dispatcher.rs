//! Runs one utterance at a time against the live engine

use crate::catalog::VoiceCatalog;
use crate::config::SpeechSwitchConfig;
use crate::engine::{EngineLibrary, SynthesisEngine};
use crate::error::{SpeechSwitchError, SpeechSwitchResult};
use crate::host::AudioQueue;
use crate::markup::strip_markup;
use crate::pipeline::{AudioPipeline, DeliveryStats};
use crate::session::{CancellationFlag, EngineSession};
use crate::types::{MessageKind, SpeechRequest};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Token the host sends for the space character
const SPACE_TOKEN: &str = "space";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Idle,
    VoiceResolving,
    Synthesizing,
}

/// How an accepted utterance ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceOutcome {
    Completed(DeliveryStats),
    Cancelled(DeliveryStats),
    Failed(String),
    /// Message kind has no synthesis path; no audio was produced
    Skipped(MessageKind),
}

enum Synthesis {
    Spoke(bool),
    Skipped,
}

fn synthesize(engine: &dyn SynthesisEngine, request: &SpeechRequest) -> Synthesis {
    let text = request.text_lossy();
    match request.kind {
        MessageKind::Text => {
            let text = strip_markup(&text);
            log::debug!("SPEAK {}", text);
            Synthesis::Spoke(engine.speak(&text, true))
        }
        MessageKind::Char => {
            let ch = if text == SPACE_TOKEN { " " } else { text.as_str() };
            log::debug!("Speaking char {:?}", ch);
            Synthesis::Spoke(engine.speak_char(ch))
        }
        MessageKind::Key => {
            // TODO: map key names like "kp-enter" to speakable words
            log::debug!("Speaking key {}", text);
            Synthesis::Spoke(engine.speak(&text, true))
        }
        MessageKind::SoundIcon => {
            log::debug!("Ignoring sound icon");
            Synthesis::Skipped
        }
        MessageKind::Spell => {
            log::debug!("Ignoring spell message");
            Synthesis::Skipped
        }
    }
}

/// Clears the pipeline route when the synthesis worker exits, even on panic
struct UtteranceGuard(Arc<AudioPipeline>);

impl Drop for UtteranceGuard {
    fn drop(&mut self) {
        self.0.end_utterance();
    }
}

pub struct SpeechDispatcher {
    session: EngineSession,
    pipeline: Arc<AudioPipeline>,
    worker: Option<JoinHandle<UtteranceOutcome>>,
    state: DispatcherState,
    last_outcome: Option<UtteranceOutcome>,
}

impl SpeechDispatcher {
    pub fn new(
        library: Arc<dyn EngineLibrary>,
        lib_dir: impl Into<PathBuf>,
        catalog: Arc<VoiceCatalog>,
        host: Arc<dyn AudioQueue>,
        config: &SpeechSwitchConfig,
    ) -> Self {
        let cancel = CancellationFlag::new();
        let pipeline = Arc::new(AudioPipeline::new(
            host,
            cancel.clone(),
            config.audio_chunk_size,
            config.frame_channel_capacity,
        ));
        let session = EngineSession::new(
            library,
            lib_dir,
            catalog,
            config.preferred_engine.clone(),
            pipeline.producer_callback(),
            cancel,
        );
        Self {
            session,
            pipeline,
            worker: None,
            state: DispatcherState::Idle,
            last_outcome: None,
        }
    }

    pub fn session(&self) -> &EngineSession {
        &self.session
    }

    /// Switch to `display_name` once the in-flight utterance has finished
    pub async fn select_voice(&mut self, display_name: &str) -> SpeechSwitchResult<()> {
        self.wait_idle().await;
        self.state = DispatcherState::VoiceResolving;
        let result = self.session.select_voice(display_name);
        self.state = DispatcherState::Idle;
        result
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.session.cancellation()
    }

    pub fn state(&self) -> DispatcherState {
        match self.state {
            DispatcherState::Synthesizing
                if self.worker.as_ref().is_none_or(|w| w.is_finished()) =>
            {
                DispatcherState::Idle
            }
            state => state,
        }
    }

    pub fn last_outcome(&self) -> Option<&UtteranceOutcome> {
        self.last_outcome.as_ref()
    }

    /// Accept a request and start synthesizing it in the background.
    ///
    /// Waits for the previous utterance first. Returns the accepted payload length.
    pub async fn speak(&mut self, request: SpeechRequest) -> SpeechSwitchResult<usize> {
        self.wait_idle().await;

        self.state = DispatcherState::VoiceResolving;
        if let Some(voice) = request.params.voice_name.as_deref() {
            if let Err(e) = self.session.select_voice(voice) {
                log::warn!("{}", e);
            }
        }
        if !self.session.is_live() {
            if let Err(e) = self.session.select_default_engine() {
                self.state = DispatcherState::Idle;
                return Err(SpeechSwitchError::NotReady(e.to_string()));
            }
        }
        self.session.apply_params(&request.params);

        let Some(engine) = self.session.handle() else {
            self.state = DispatcherState::Idle;
            return Err(SpeechSwitchError::NotReady("no engine set".to_string()));
        };

        let accepted = request.text.len();
        let kind = request.kind;
        self.session.cancellation().clear();

        let receiver = self.pipeline.begin_utterance(self.session.sample_rate());
        let guard = UtteranceGuard(self.pipeline.clone());
        let synthesis = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            synthesize(engine.as_ref(), &request)
        });
        let pipeline = self.pipeline.clone();
        let delivery = tokio::task::spawn_blocking(move || pipeline.deliver(receiver));

        self.worker = Some(tokio::spawn(async move {
            let stats = match delivery.await {
                Ok(stats) => stats,
                Err(e) => {
                    log::error!("Audio delivery task failed: {}", e);
                    DeliveryStats::default()
                }
            };
            match synthesis.await {
                Ok(Synthesis::Skipped) => UtteranceOutcome::Skipped(kind),
                Ok(Synthesis::Spoke(_)) if stats.aborted => {
                    UtteranceOutcome::Cancelled(stats)
                }
                Ok(Synthesis::Spoke(true)) => UtteranceOutcome::Completed(stats),
                Ok(Synthesis::Spoke(false)) => {
                    log::warn!("Engine reported failure for {:?} message", kind);
                    UtteranceOutcome::Failed("engine reported failure".to_string())
                }
                Err(e) => {
                    log::error!("Synthesis task failed: {}", e);
                    UtteranceOutcome::Failed(e.to_string())
                }
            }
        }));
        self.state = DispatcherState::Synthesizing;
        log::debug!("Accepted {} byte {:?} message", accepted, kind);
        Ok(accepted)
    }

    /// Wait for the in-flight utterance, if any, and return how it ended
    pub async fn wait_idle(&mut self) -> Option<UtteranceOutcome> {
        let worker = self.worker.take()?;
        self.state = DispatcherState::Idle;
        match worker.await {
            Ok(outcome) => {
                log::debug!("Utterance finished: {:?}", outcome);
                self.last_outcome = Some(outcome.clone());
                Some(outcome)
            }
            Err(e) => {
                log::error!("Utterance worker failed: {}", e);
                None
            }
        }
    }

    /// Finish the in-flight utterance and release the engine
    pub async fn close(&mut self) {
        self.wait_idle().await;
        self.session.stop();
    }
}
