//! Host-facing module: load, init, speak, stop, pause, close

use crate::catalog::{VoiceCatalog, VoiceEntry};
use crate::config::SpeechSwitchConfig;
use crate::dispatcher::{SpeechDispatcher, UtteranceOutcome};
use crate::engine::EngineLibrary;
use crate::error::{SpeechSwitchError, SpeechSwitchResult};
use crate::host::AudioQueue;
use crate::session::CancellationFlag;
use crate::types::{MessageKind, SpeechRequest, VoiceParams};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const MODULE_NAME: &str = "speechsw";
pub const MODULE_VERSION: &str = "0.1";
const STATUS_PREFIX: &str = "SpeechSwitch:";

pub struct SpeechSwitchModule {
    config: SpeechSwitchConfig,
    lib_dir: PathBuf,
    catalog: Arc<VoiceCatalog>,
    host: Arc<dyn AudioQueue>,
    cancel: CancellationFlag,
    dispatcher: Mutex<SpeechDispatcher>,
}

impl SpeechSwitchModule {
    /// Discover engines and voices. Fails when no engine yields a voice.
    pub fn load(
        config: SpeechSwitchConfig,
        library: Arc<dyn EngineLibrary>,
        host: Arc<dyn AudioQueue>,
    ) -> SpeechSwitchResult<Self> {
        log::info!("Loading {} module version {}", MODULE_NAME, MODULE_VERSION);
        config.validate()?;
        let lib_dir = config.resolve_library_dir()?;
        log::debug!("lib dir: {}", lib_dir.display());

        let catalog = Arc::new(VoiceCatalog::discover(library.as_ref(), &lib_dir)?);
        let dispatcher =
            SpeechDispatcher::new(library, lib_dir.clone(), catalog.clone(), host.clone(), &config);
        let cancel = dispatcher.cancellation();

        Ok(Self {
            config,
            lib_dir,
            catalog,
            host,
            cancel,
            dispatcher: Mutex::new(dispatcher),
        })
    }

    /// Prepare the host queue. Returns the status line reported to the host.
    pub fn init(&self) -> SpeechSwitchResult<String> {
        if self.catalog.is_empty() {
            return Err(SpeechSwitchError::Discovery(
                "no usable engines".to_string(),
                self.lib_dir.clone(),
            ));
        }
        if !self.host.init(self.config.audio_queue_max_size) {
            return Err(SpeechSwitchError::NotReady(
                "audio queue failed to initialize".to_string(),
            ));
        }
        Ok(format!("{STATUS_PREFIX} Initialized successfully."))
    }

    pub fn config(&self) -> &SpeechSwitchConfig {
        &self.config
    }

    pub fn lib_dir(&self) -> &Path {
        &self.lib_dir
    }

    pub fn catalog(&self) -> &VoiceCatalog {
        &self.catalog
    }

    /// Voices terminated by a `None` sentinel
    pub fn list_voices(&self) -> Vec<Option<VoiceEntry>> {
        self.catalog.to_host_list()
    }

    /// Queue `payload` for synthesis. Returns before any audio is produced.
    pub async fn speak(
        &self,
        payload: &[u8],
        kind: MessageKind,
        params: VoiceParams,
    ) -> SpeechSwitchResult<usize> {
        self.host.before_synth();
        let request = SpeechRequest::new(payload.to_vec(), kind).with_params(params);
        self.dispatcher.lock().await.speak(request).await
    }

    /// Select a voice outside of a speak request. Waits for the in-flight utterance.
    pub async fn select_voice(&self, display_name: &str) -> SpeechSwitchResult<()> {
        self.dispatcher.lock().await.select_voice(display_name).await
    }

    pub async fn current_engine(&self) -> Option<String> {
        self.dispatcher
            .lock()
            .await
            .session()
            .engine_name()
            .map(String::from)
    }

    /// Halt synthesis and drop pending playback
    pub fn stop(&self) {
        log::debug!("Stop requested");
        self.cancel.cancel();
        self.host.stop();
    }

    pub fn pause(&self) {
        log::debug!("Pause requested");
        self.host.pause();
    }

    /// Make the producer callback abort the current utterance
    pub fn cancel_current_utterance(&self) {
        log::debug!("Cancel requested");
        self.cancel.cancel();
    }

    /// Wait for the in-flight utterance, if any
    pub async fn wait_idle(&self) -> Option<UtteranceOutcome> {
        self.dispatcher.lock().await.wait_idle().await
    }

    pub async fn close(self) {
        log::info!("Closing {} module", MODULE_NAME);
        self.dispatcher.lock().await.close().await;
        self.host.terminate();
    }
}
