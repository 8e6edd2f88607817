//! Speech engine seam.
//!
//! An engine queues text and, when asked to play, synthesizes everything it
//! has queued, pushing raw 16-bit mono PCM to a [`PlaybackEvents`] sink as it
//! goes. Nothing is rendered to a local audio device: the sink is the only
//! output.

pub mod piper;
pub mod tone;

use serde::Serialize;

pub use piper::PiperEngine;
pub use tone::ToneEngine;

/// Native output format of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamFormat {
    pub channels: u16,
    pub sample_rate: u32,
}

impl StreamFormat {
    pub fn mono(sample_rate: u32) -> Self {
        Self {
            channels: 1,
            sample_rate,
        }
    }
}

/// Receiver of everything an engine produces during one playback.
pub trait PlaybackEvents {
    /// A slice of raw PCM bytes.
    fn on_chunk(&self, pcm: &[u8]);
    /// One sentence has been fully synthesized.
    fn on_sentence_boundary(&self);
    /// The queued text is exhausted, or the engine was shut down.
    fn on_stream_stopped(&self);
}

pub trait SpeechEngine: Send + Sync {
    /// Queue text for the next (or current) playback.
    fn feed(&self, text: &str);

    /// Whether text is queued and not yet synthesized.
    fn has_pending(&self) -> bool;

    /// Synthesize all queued text, blocking the calling thread.
    ///
    /// `on_stream_stopped` is called once the queue is drained. When this
    /// returns an error it is not called.
    fn play(&self, events: &dyn PlaybackEvents) -> anyhow::Result<()>;

    fn stream_format(&self) -> StreamFormat;

    /// Stop any running playback and drop queued text.
    fn shutdown(&self);
}
