//! Scriptable engines and a recording host queue for tests

use crate::engine::{AudioCallback, EngineHandle, EngineLibrary, PunctuationLevel, SynthesisEngine};
use crate::error::{EngineError, EngineResult};
use crate::host::AudioQueue;
use crate::types::{AudioFrame, ByteOrder};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// One-shot latch used to hold a fake engine mid-synthesis
#[derive(Clone, Default)]
pub struct Gate {
    inner: Arc<GateInner>,
}

#[derive(Default)]
struct GateInner {
    state: Mutex<GateState>,
    cond: Condvar,
}

#[derive(Default)]
struct GateState {
    reached: bool,
    open: bool,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.open = true;
        self.inner.cond.notify_all();
    }

    /// Block until some thread is parked in [`Gate::pass`]
    pub fn wait_reached(&self, timeout: Duration) -> bool {
        let state = self.inner.state.lock().unwrap();
        let (state, _) = self
            .inner
            .cond
            .wait_timeout_while(state, timeout, |s| !s.reached)
            .unwrap();
        state.reached
    }

    fn pass(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.reached = true;
        self.inner.cond.notify_all();
        while !state.open {
            state = self.inner.cond.wait(state).unwrap();
        }
    }
}

/// Behaviour of one fake engine
#[derive(Clone)]
pub struct FakeEngineSpec {
    pub name: String,
    pub voices: Vec<String>,
    pub sample_rate: u32,
    pub frames: Vec<Vec<i16>>,
    pub fail_start: bool,
    pub speak_result: bool,
    pub accept_params: bool,
    pub hold_after_first_frame: Option<Gate>,
}

impl FakeEngineSpec {
    pub fn new(name: &str, voices: Vec<&str>) -> Self {
        Self {
            name: name.to_string(),
            voices: voices.into_iter().map(String::from).collect(),
            sample_rate: 22_050,
            frames: vec![vec![100; 64], vec![-100; 64], vec![7; 32]],
            fail_start: false,
            speak_result: true,
            accept_params: true,
            hold_after_first_frame: None,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_frames(mut self, frames: Vec<Vec<i16>>) -> Self {
        self.frames = frames;
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn failing_speak(mut self) -> Self {
        self.speak_result = false;
        self
    }

    pub fn rejecting_params(mut self) -> Self {
        self.accept_params = false;
        self
    }

    pub fn holding_after_first_frame(mut self, gate: Gate) -> Self {
        self.hold_after_first_frame = Some(gate);
        self
    }
}

/// Calls observed on one engine name, accumulated across instances
#[derive(Clone, Debug, Default)]
pub struct EngineStats {
    pub starts: usize,
    pub stops: usize,
    pub started_with_callback: bool,
    pub voices_set: Vec<String>,
    pub speeds: Vec<f32>,
    pub pitches: Vec<f32>,
    pub punctuation: Vec<PunctuationLevel>,
    pub spoken: Vec<String>,
    pub chars: Vec<String>,
    /// Return value of every producer callback invocation
    pub callback_results: Vec<bool>,
}

#[derive(Default)]
struct Shared {
    stats: Mutex<HashMap<String, EngineStats>>,
    active_speaks: AtomicUsize,
    max_active_speaks: AtomicUsize,
}

impl Shared {
    fn record(&self, engine: &str, f: impl FnOnce(&mut EngineStats)) {
        let mut stats = self.stats.lock().unwrap();
        f(stats.entry(engine.to_string()).or_default());
    }
}

/// Engine library backed by [`FakeEngineSpec`]s
#[derive(Clone)]
pub struct FakeEngineLibrary {
    specs: Arc<Vec<FakeEngineSpec>>,
    shared: Arc<Shared>,
}

impl FakeEngineLibrary {
    pub fn new(specs: Vec<FakeEngineSpec>) -> Self {
        Self {
            specs: Arc::new(specs),
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn stats(&self, engine: &str) -> EngineStats {
        self.shared
            .stats
            .lock()
            .unwrap()
            .get(engine)
            .cloned()
            .unwrap_or_default()
    }

    /// Highest number of `speak`/`speak_char` calls that ever overlapped
    pub fn max_concurrent_speaks(&self) -> usize {
        self.shared.max_active_speaks.load(Ordering::SeqCst)
    }
}

impl EngineLibrary for FakeEngineLibrary {
    fn list_engines(&self, _lib_dir: &Path) -> Vec<String> {
        self.specs.iter().map(|s| s.name.clone()).collect()
    }

    fn start(
        &self,
        lib_dir: &Path,
        engine_name: &str,
        callback: Option<AudioCallback>,
    ) -> EngineResult<EngineHandle> {
        let spec = self
            .specs
            .iter()
            .find(|s| s.name == engine_name)
            .ok_or_else(|| EngineError::NotFound(engine_name.to_string(), lib_dir.to_path_buf()))?;
        if spec.fail_start {
            return Err(EngineError::StartRefused(
                engine_name.to_string(),
                "scripted failure".to_string(),
            ));
        }
        let with_callback = callback.is_some();
        self.shared.record(engine_name, |s| {
            s.starts += 1;
            s.started_with_callback |= with_callback;
        });
        Ok(Arc::new(FakeEngine {
            spec: spec.clone(),
            callback,
            shared: self.shared.clone(),
            stopped: AtomicBool::new(false),
        }))
    }
}

struct FakeEngine {
    spec: FakeEngineSpec,
    callback: Option<AudioCallback>,
    shared: Arc<Shared>,
    stopped: AtomicBool,
}

impl FakeEngine {
    fn synthesize(&self) -> bool {
        let active = self.shared.active_speaks.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared
            .max_active_speaks
            .fetch_max(active, Ordering::SeqCst);

        if let Some(callback) = &self.callback {
            let mut aborted = false;
            for (idx, frame) in self.spec.frames.iter().enumerate() {
                let abort = callback(frame, false);
                self.shared
                    .record(&self.spec.name, |s| s.callback_results.push(abort));
                if abort {
                    aborted = true;
                    break;
                }
                if idx == 0 {
                    if let Some(gate) = &self.spec.hold_after_first_frame {
                        gate.pass();
                    }
                }
            }
            if !aborted {
                let abort = callback(&[], false);
                self.shared
                    .record(&self.spec.name, |s| s.callback_results.push(abort));
            }
        }

        self.shared.active_speaks.fetch_sub(1, Ordering::SeqCst);
        self.spec.speak_result
    }
}

impl SynthesisEngine for FakeEngine {
    fn list_voices(&self) -> Vec<String> {
        self.spec.voices.clone()
    }

    fn set_voice(&self, voice: &str) -> bool {
        self.shared
            .record(&self.spec.name, |s| s.voices_set.push(voice.to_string()));
        true
    }

    fn set_speed(&self, speed: f32) -> bool {
        self.shared.record(&self.spec.name, |s| s.speeds.push(speed));
        self.spec.accept_params
    }

    fn set_pitch(&self, pitch: f32) -> bool {
        self.shared.record(&self.spec.name, |s| s.pitches.push(pitch));
        self.spec.accept_params
    }

    fn set_punctuation(&self, level: PunctuationLevel) -> bool {
        self.shared
            .record(&self.spec.name, |s| s.punctuation.push(level));
        self.spec.accept_params
    }

    fn speak(&self, text: &str, _is_utf8: bool) -> bool {
        self.shared
            .record(&self.spec.name, |s| s.spoken.push(text.to_string()));
        self.synthesize()
    }

    fn speak_char(&self, ch: &str) -> bool {
        self.shared
            .record(&self.spec.name, |s| s.chars.push(ch.to_string()));
        self.synthesize()
    }

    fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.shared.record(&self.spec.name, |s| s.stops += 1);
        }
    }
}

/// Everything the module did to the host queue, in order
#[derive(Clone, Debug, PartialEq)]
pub enum QueueEvent {
    Init(usize),
    BeforeSynth,
    BeforePlay,
    Push(AudioFrame),
    End,
    Stop,
    Pause,
    Terminate,
}

/// Host queue that records calls instead of playing audio
#[derive(Default)]
pub struct RecordingQueue {
    events: Mutex<Vec<QueueEvent>>,
    stop_requested: AtomicBool,
    reject_pushes: AtomicBool,
    push_gate: Mutex<Option<Gate>>,
}

impl RecordingQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<QueueEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn frames(&self) -> Vec<AudioFrame> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                QueueEvent::Push(frame) => Some(frame),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, event: &QueueEvent) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn request_stop(&self, requested: bool) {
        self.stop_requested.store(requested, Ordering::SeqCst);
    }

    pub fn reject_pushes(&self, reject: bool) {
        self.reject_pushes.store(reject, Ordering::SeqCst);
    }

    /// Park every `push_audio` call at `gate` until it is opened
    pub fn hold_pushes(&self, gate: Gate) {
        *self.push_gate.lock().unwrap() = Some(gate);
    }

    fn push_event(&self, event: QueueEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl AudioQueue for RecordingQueue {
    fn init(&self, max_queue_size: usize) -> bool {
        self.push_event(QueueEvent::Init(max_queue_size));
        true
    }

    fn before_synth(&self) {
        self.push_event(QueueEvent::BeforeSynth);
    }

    fn before_play(&self) {
        self.push_event(QueueEvent::BeforePlay);
    }

    fn push_audio(&self, frame: &AudioFrame, order: ByteOrder) -> bool {
        assert_eq!(order, ByteOrder::LittleEndian);
        if self.reject_pushes.load(Ordering::SeqCst) {
            return false;
        }
        let gate = self.push_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.pass();
        }
        self.push_event(QueueEvent::Push(frame.clone()));
        true
    }

    fn notify_end(&self) {
        self.push_event(QueueEvent::End);
    }

    fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.push_event(QueueEvent::Stop);
    }

    fn pause(&self) {
        self.push_event(QueueEvent::Pause);
    }

    fn terminate(&self) {
        self.push_event(QueueEvent::Terminate);
    }
}
