//! Audio delivery from engine callback to host queue
//!
//! The producer callback runs on the synthesis worker and copies each engine buffer into a
//! bounded channel. A delivery worker drains the channel in order and feeds the host queue,
//! so host backpressure is felt by the engine through the channel without the engine ever
//! calling into the host for audio.

use crate::engine::AudioCallback;
use crate::host::AudioQueue;
use crate::session::CancellationFlag;
use crate::types::{AudioFrame, ByteOrder};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

#[derive(Debug)]
pub(crate) enum FrameEvent {
    Audio(AudioFrame),
    End,
}

struct Route {
    sender: mpsc::Sender<FrameEvent>,
    sample_rate: u32,
}

/// What one delivery pass handed to the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Chunks pushed to the host queue
    pub frames: usize,
    pub samples: usize,
    /// Engine buffers discarded after cancellation
    pub dropped: usize,
    /// End of utterance was signalled to the host
    pub ended: bool,
    /// The utterance was cut short by a stop, cancel or rejected push
    pub aborted: bool,
}

pub struct AudioPipeline {
    host: Arc<dyn AudioQueue>,
    cancel: CancellationFlag,
    route: Mutex<Option<Route>>,
    aborted: AtomicBool,
    chunk_size: usize,
    channel_capacity: usize,
}

impl AudioPipeline {
    pub fn new(
        host: Arc<dyn AudioQueue>,
        cancel: CancellationFlag,
        chunk_size: usize,
        channel_capacity: usize,
    ) -> Self {
        Self {
            host,
            cancel,
            route: Mutex::new(None),
            aborted: AtomicBool::new(false),
            chunk_size: chunk_size.max(1),
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Callback to bind when starting an engine
    pub fn producer_callback(self: &Arc<Self>) -> AudioCallback {
        let pipeline = Arc::clone(self);
        Arc::new(move |samples: &[i16], cancelled: bool| pipeline.on_samples(samples, cancelled))
    }

    fn route(&self) -> MutexGuard<'_, Option<Route>> {
        self.route.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open the channel for one utterance produced at `sample_rate`
    pub(crate) fn begin_utterance(&self, sample_rate: u32) -> mpsc::Receiver<FrameEvent> {
        let (sender, receiver) = mpsc::channel(self.channel_capacity);
        self.aborted.store(false, Ordering::SeqCst);
        *self.route() = Some(Route {
            sender,
            sample_rate,
        });
        receiver
    }

    /// Close the channel; delivery finishes once queued frames are drained
    pub(crate) fn end_utterance(&self) {
        self.route().take();
    }

    fn halt(&self, reason: &str) -> bool {
        log::debug!("Canceling: {}", reason);
        self.aborted.store(true, Ordering::SeqCst);
        self.host.stop();
        true
    }

    /// Handle one engine buffer. Returns `true` to make the engine abort.
    pub fn on_samples(&self, samples: &[i16], engine_cancelled: bool) -> bool {
        if engine_cancelled {
            return self.halt("engine cancelled");
        }
        if self.cancel.is_cancelled() {
            return self.halt("cancellation requested");
        }
        if self.host.is_stop_requested() {
            self.cancel.cancel();
            return self.halt("host requested stop");
        }

        let (sender, sample_rate) = match self.route().as_ref() {
            Some(route) => (route.sender.clone(), route.sample_rate),
            None => {
                log::warn!("Engine produced audio outside of an utterance");
                return true;
            }
        };

        let event = if samples.is_empty() {
            log::debug!("End of speech samples");
            FrameEvent::End
        } else {
            FrameEvent::Audio(AudioFrame::new(sample_rate, samples.to_vec()))
        };
        if sender.blocking_send(event).is_err() {
            log::warn!("Audio delivery stopped, aborting synthesis");
            return true;
        }

        self.cancel.is_cancelled()
    }

    /// Drain `receiver` into the host queue. Blocks; run on a blocking worker.
    pub(crate) fn deliver(&self, mut receiver: mpsc::Receiver<FrameEvent>) -> DeliveryStats {
        let mut stats = DeliveryStats::default();
        while let Some(event) = receiver.blocking_recv() {
            if self.cancel.is_cancelled() {
                self.aborted.store(true, Ordering::SeqCst);
                stats.dropped += 1;
                continue;
            }
            match event {
                FrameEvent::Audio(frame) => self.push_chunks(frame, &mut stats),
                FrameEvent::End => {
                    self.host.before_play();
                    self.host.notify_end();
                    stats.ended = true;
                }
            }
        }
        stats.aborted = self.aborted.load(Ordering::SeqCst);
        stats
    }

    fn push_chunks(&self, frame: AudioFrame, stats: &mut DeliveryStats) {
        for chunk in frame.samples.chunks(self.chunk_size) {
            let chunk = AudioFrame::new(frame.sample_rate, chunk.to_vec());
            self.host.before_play();
            log::trace!(
                "Sending {} samples ({} ms) to audio player",
                chunk.sample_count(),
                chunk.duration_ms()
            );
            if !self.host.push_audio(&chunk, ByteOrder::LittleEndian) {
                log::warn!("Host queue rejected audio, ending synthesis");
                self.aborted.store(true, Ordering::SeqCst);
                self.cancel.cancel();
                return;
            }
            stats.frames += 1;
            stats.samples += chunk.sample_count();
        }
    }
}
