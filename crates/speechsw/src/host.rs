//! Host-facing playback queue
//!
//! The host owns the audio device and a thread-safe queue in front of it. The module never
//! locks the queue itself; it only calls the operations below, from both the control thread
//! (stop/pause) and the delivery worker (push/notify).

use crate::types::{AudioFrame, ByteOrder};

pub trait AudioQueue: Send + Sync {
    /// Prepare the queue, bounding it to `max_queue_size` samples
    fn init(&self, max_queue_size: usize) -> bool;

    /// Called once per speak request before any synthesis starts
    fn before_synth(&self);

    /// Signal that queued audio may start playing
    fn before_play(&self);

    /// Enqueue a frame. May block on the queue's own backpressure.
    /// Returns `false` if the queue rejected the frame.
    fn push_audio(&self, frame: &AudioFrame, order: ByteOrder) -> bool;

    /// No more audio follows for the current utterance
    fn notify_end(&self);

    /// Whether the host asked playback to stop
    fn is_stop_requested(&self) -> bool;

    /// Drop pending playback immediately
    fn stop(&self);

    fn pause(&self);

    /// Shut the queue down at module close
    fn terminate(&self);
}
