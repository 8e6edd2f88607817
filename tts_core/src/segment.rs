//! Accumulates engine PCM into segments and turns finished segments into clips.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::clip::FinishedClip;
use crate::delivery::{ClipNotifier, ClipQueue};
use crate::engine::{PlaybackEvents, SpeechEngine};
use crate::stats::RelayStats;

/// Segments shorter than this are treated as silence and dropped.
pub const DEFAULT_MIN_SEGMENT_BYTES: usize = 1024;

#[derive(Debug, Default)]
struct SegmentBuffer {
    pcm: Vec<u8>,
    chunks: usize,
}

impl SegmentBuffer {
    /// Take the buffered PCM, leaving the buffer empty and the counter at zero.
    fn take(&mut self) -> Vec<u8> {
        self.chunks = 0;
        std::mem::take(&mut self.pcm)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    Emitted { payload_len: usize },
    Discarded { payload_len: usize },
}

pub struct SegmentAccumulator {
    segment: Mutex<SegmentBuffer>,
    min_segment_bytes: usize,
    engine: Arc<dyn SpeechEngine>,
    queue: Arc<ClipQueue>,
    notifier: Arc<dyn ClipNotifier>,
    stats: Arc<RelayStats>,
}

impl SegmentAccumulator {
    pub fn new(
        engine: Arc<dyn SpeechEngine>,
        queue: Arc<ClipQueue>,
        notifier: Arc<dyn ClipNotifier>,
        stats: Arc<RelayStats>,
        min_segment_bytes: usize,
    ) -> Self {
        Self {
            segment: Mutex::new(SegmentBuffer::default()),
            min_segment_bytes,
            engine,
            queue,
            notifier,
            stats,
        }
    }

    pub fn feed_chunk(&self, pcm: &[u8]) {
        let mut segment = self.segment.lock();
        segment.pcm.extend_from_slice(pcm);
        segment.chunks += 1;
    }

    pub fn on_sentence_boundary(&self) {
        self.finalize_logged("sentence boundary");
    }

    pub fn on_stream_stopped(&self) {
        self.finalize_logged("stream stopped");
    }

    /// Close the current segment.
    ///
    /// Segments under the size threshold are discarded. Otherwise the segment
    /// is framed with the engine's current sample rate, queued, and one
    /// listener is notified. The buffer is empty afterwards either way.
    pub fn finalize(&self) -> anyhow::Result<FinalizeOutcome> {
        let outcome = {
            let mut segment = self.segment.lock();
            let chunks = segment.chunks;
            let pcm = segment.take();
            let payload_len = pcm.len();

            if payload_len < self.min_segment_bytes {
                self.stats.record_discard();
                debug!(payload_len, chunks, "Discarding undersized segment");
                return Ok(FinalizeOutcome::Discarded { payload_len });
            }

            let format = self.engine.stream_format();
            let clip = FinishedClip::from_pcm(&pcm, format.sample_rate)?;
            debug!(
                clip = %clip.id(),
                payload_len,
                chunks,
                sample_rate = format.sample_rate,
                "Segment finalized"
            );
            self.queue.enqueue(clip);
            self.stats.record_clip(payload_len);
            FinalizeOutcome::Emitted { payload_len }
        };

        self.notifier.notify_one();
        Ok(outcome)
    }

    /// Drop the pending segment without emitting it.
    pub fn discard(&self) -> usize {
        let dropped = self.segment.lock().take().len();
        if dropped > 0 {
            self.stats.record_discard();
        }
        dropped
    }

    pub fn pending_bytes(&self) -> usize {
        self.segment.lock().pcm.len()
    }

    pub fn pending_chunks(&self) -> usize {
        self.segment.lock().chunks
    }

    fn finalize_logged(&self, trigger: &str) {
        if let Err(e) = self.finalize() {
            error!("Failed to finalize segment on {trigger}: {e:#}");
        }
    }
}

impl PlaybackEvents for SegmentAccumulator {
    fn on_chunk(&self, pcm: &[u8]) {
        self.feed_chunk(pcm);
    }

    fn on_sentence_boundary(&self) {
        SegmentAccumulator::on_sentence_boundary(self);
    }

    fn on_stream_stopped(&self) {
        SegmentAccumulator::on_stream_stopped(self);
    }
}
