//! # SpeechSwitch
//!
//! Speech output backend that puts a family of interchangeable synthesis engines behind one
//! host interface.
//!
//! ## Architecture
//!
//! - `catalog`: discovers every engine in the library directory once and builds a flat,
//!   ordered list of voices named `"<engine> <voice>"`.
//! - `session`: owns the single live engine, switches engines when the requested voice
//!   belongs to another one, and maps host rate/pitch/punctuation onto engine parameters.
//! - `dispatcher`: accepts one speak request at a time and runs it on a blocking worker.
//!   The next request waits for the previous worker before it starts.
//! - `pipeline`: the producer callback bound to each engine. It copies engine buffers into a
//!   bounded channel that a delivery worker drains into the host's playback queue, and it
//!   turns cancellation into an abort signal for the engine.
//! - `module`: the lifecycle the host drives (`load`, `init`, `speak`, `stop`, `pause`,
//!   `close`).
//!
//! Engines are reached through the [`EngineLibrary`] and [`SynthesisEngine`] traits; the host
//! queue through [`AudioQueue`].
//!
//! ## Example
//!
//! ```no_run
//! use speechsw::{AudioQueue, EngineLibrary, MessageKind, SpeechSwitchConfig, SpeechSwitchModule, VoiceParams};
//! use std::sync::Arc;
//!
//! async fn say_hello(library: Arc<dyn EngineLibrary>, host: Arc<dyn AudioQueue>) {
//!     let module = SpeechSwitchModule::load(SpeechSwitchConfig::default(), library, host).unwrap();
//!     module.init().unwrap();
//!
//!     let params = VoiceParams::default().with_voice("espeak English (America)");
//!     module.speak(b"hello", MessageKind::Text, params).await.unwrap();
//!     module.wait_idle().await;
//!     module.close().await;
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod host;
pub mod markup;
pub mod module;
pub mod params;
pub mod pipeline;
pub mod session;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

#[cfg(test)]
mod tests;

pub use catalog::{VoiceCatalog, VoiceEntry};
pub use config::SpeechSwitchConfig;
pub use dispatcher::{DispatcherState, SpeechDispatcher, UtteranceOutcome};
pub use engine::{AudioCallback, EngineHandle, EngineLibrary, PunctuationLevel, SynthesisEngine};
pub use error::{
    ConfigError, EngineError, EngineResult, SpeechSwitchError, SpeechSwitchResult,
};
pub use host::AudioQueue;
pub use module::SpeechSwitchModule;
pub use pipeline::{AudioPipeline, DeliveryStats};
pub use session::{CancellationFlag, EngineSession};
pub use types::{
    AudioFrame, ByteOrder, CapitalLettersMode, MessageKind, PunctuationMode, SpeechRequest,
    VoiceParams,
};
