use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::clip::FinishedClip;
use crate::controller::{PlaybackState, StreamController};
use crate::delivery::{ClipNotifier, ClipQueue, ClipReady, ListenerId, ListenerRegistry};
use crate::engine::{SpeechEngine, StreamFormat};
use crate::segment::{SegmentAccumulator, DEFAULT_MIN_SEGMENT_BYTES};
use crate::stats::{RelayStats, StatsSnapshot};

/// Default bound on undelivered clips.
pub const DEFAULT_MAX_PENDING_CLIPS: usize = 256;

#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Segments shorter than this many PCM bytes are dropped as silence.
    pub min_segment_bytes: usize,
    /// Oldest clips are evicted past this many; 0 disables the bound.
    pub max_pending_clips: usize,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            min_segment_bytes: DEFAULT_MIN_SEGMENT_BYTES,
            max_pending_clips: DEFAULT_MAX_PENDING_CLIPS,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RelaySnapshot {
    pub playback_state: PlaybackState,
    pub stream_format: StreamFormat,
    pub pending_clips: usize,
    pub listeners: usize,
    pub pending_segment_bytes: usize,
    #[serde(flatten)]
    pub counters: StatsSnapshot,
}

/// Text in, WAV clips out.
///
/// Owns the engine and every piece of shared state between it and the
/// transport: the segment accumulator, the stream controller, the clip
/// queue and the listener registry.
pub struct SpeechRelay {
    engine: Arc<dyn SpeechEngine>,
    accumulator: Arc<SegmentAccumulator>,
    controller: Arc<StreamController>,
    queue: Arc<ClipQueue>,
    listeners: Arc<ListenerRegistry>,
    stats: Arc<RelayStats>,
}

impl SpeechRelay {
    pub fn new(engine: Arc<dyn SpeechEngine>, options: RelayOptions) -> Self {
        let stats = Arc::new(RelayStats::new());
        let queue = Arc::new(ClipQueue::new(
            NonZeroUsize::new(options.max_pending_clips),
            stats.clone(),
        ));
        let listeners = Arc::new(ListenerRegistry::new(stats.clone()));
        let accumulator = Arc::new(SegmentAccumulator::new(
            engine.clone(),
            queue.clone(),
            listeners.clone(),
            stats.clone(),
            options.min_segment_bytes,
        ));
        let controller = Arc::new(StreamController::new(
            engine.clone(),
            accumulator.clone(),
            stats.clone(),
        ));

        Self {
            engine,
            accumulator,
            controller,
            queue,
            listeners,
            stats,
        }
    }

    /// Queue text for synthesis and start playback if idle.
    ///
    /// Returns `true` if this call launched a new playback session.
    pub fn speak(&self, text: &str) -> bool {
        self.stats.record_text();
        self.controller.feed_text(text);
        self.controller.start_if_idle()
    }

    pub fn pull_oldest(&self) -> Option<FinishedClip> {
        self.queue.pull_oldest()
    }

    pub async fn pull_oldest_within(&self, timeout: Duration) -> Option<FinishedClip> {
        self.queue.pull_oldest_within(timeout).await
    }

    pub fn register_listener(&self) -> (ListenerId, mpsc::UnboundedReceiver<ClipReady>) {
        self.listeners.register()
    }

    pub fn unregister_listener(&self, id: ListenerId) -> bool {
        self.listeners.unregister(id)
    }

    /// Unregister a listener and pass on every notification it never delivered.
    ///
    /// `undelivered` counts signals already taken from `ready` that could not
    /// be sent to the client. Signals still buffered in `ready` are added to
    /// it. Each one goes to the earliest remaining listener. Returns how many
    /// were passed on.
    pub fn release_listener(
        &self,
        id: ListenerId,
        mut ready: mpsc::UnboundedReceiver<ClipReady>,
        undelivered: usize,
    ) -> usize {
        self.listeners.unregister(id);
        ready.close();

        let mut pending = undelivered;
        while ready.try_recv().is_ok() {
            pending += 1;
        }

        let passed_on = (0..pending)
            .filter(|_| self.listeners.notify_one())
            .count();
        if pending > 0 {
            debug!(listener = %id, pending, passed_on, "Passed on undelivered notifications");
        }
        passed_on
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn pending_clips(&self) -> usize {
        self.queue.len()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.controller.state()
    }

    pub fn subscribe_playback(&self) -> watch::Receiver<PlaybackState> {
        self.controller.subscribe()
    }

    pub fn stream_format(&self) -> StreamFormat {
        self.engine.stream_format()
    }

    pub fn snapshot(&self) -> RelaySnapshot {
        RelaySnapshot {
            playback_state: self.controller.state(),
            stream_format: self.engine.stream_format(),
            pending_clips: self.queue.len(),
            listeners: self.listeners.len(),
            pending_segment_bytes: self.accumulator.pending_bytes(),
            counters: self.stats.snapshot(),
        }
    }

    pub fn shutdown(&self) {
        self.controller.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ToneEngine;
    use crate::wav;
    use std::io::Cursor;

    async fn wait_idle(relay: &SpeechRelay) {
        let mut rx = relay.subscribe_playback();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == PlaybackState::Idle))
            .await
            .expect("relay did not return to idle")
            .unwrap();
    }

    #[tokio::test]
    async fn test_speak_to_pull_round_trip() {
        let relay = SpeechRelay::new(Arc::new(ToneEngine::new(24_000)), RelayOptions::default());
        let (_id, mut ready) = relay.register_listener();

        assert!(relay.speak("Hello from the relay."));
        wait_idle(&relay).await;

        assert_eq!(ready.recv().await, Some(ClipReady));
        let clip = relay.pull_oldest().expect("clip ready");
        let reader = hound::WavReader::new(Cursor::new(clip.bytes().to_vec())).unwrap();
        assert_eq!(reader.spec().sample_rate, 24_000);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.len() as usize * 2, clip.len() - wav::WAV_HEADER_LEN);

        assert!(relay.pull_oldest().is_none());
        let snap = relay.snapshot();
        assert_eq!(snap.counters.texts_received, 1);
        assert_eq!(snap.counters.clips_emitted, 1);
        assert_eq!(snap.counters.clips_delivered, 1);
        assert_eq!(snap.counters.empty_pulls, 1);
        assert_eq!(snap.counters.notifications_sent, 1);
        assert_eq!(snap.playback_state, PlaybackState::Idle);
    }

    #[tokio::test]
    async fn test_bounded_pending_clips() {
        let options = RelayOptions {
            max_pending_clips: 2,
            ..RelayOptions::default()
        };
        let relay = SpeechRelay::new(Arc::new(ToneEngine::new(16_000)), options);
        relay.speak("One. Two. Three. Four.");
        wait_idle(&relay).await;

        assert_eq!(relay.pending_clips(), 2);
        assert_eq!(relay.snapshot().counters.clips_evicted, 2);
    }

    #[tokio::test]
    async fn test_released_listener_passes_on_notifications() {
        let relay = SpeechRelay::new(Arc::new(ToneEngine::new(16_000)), RelayOptions::default());
        let (first, first_ready) = relay.register_listener();
        let (_second, mut second_ready) = relay.register_listener();

        relay.speak("Nobody read this one.");
        wait_idle(&relay).await;
        assert!(second_ready.try_recv().is_err());

        // One signal still buffered, one taken but never sent.
        assert_eq!(relay.release_listener(first, first_ready, 1), 2);
        assert_eq!(relay.listener_count(), 1);
        assert_eq!(second_ready.try_recv(), Ok(ClipReady));
        assert_eq!(second_ready.try_recv(), Ok(ClipReady));
        assert!(second_ready.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_release_last_listener_drops_notifications() {
        let relay = SpeechRelay::new(Arc::new(ToneEngine::new(16_000)), RelayOptions::default());
        let (id, ready) = relay.register_listener();
        relay.speak("Short.");
        wait_idle(&relay).await;

        assert_eq!(relay.release_listener(id, ready, 0), 0);
        assert_eq!(relay.pending_clips(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_accepting_text() {
        let relay = SpeechRelay::new(Arc::new(ToneEngine::new(16_000)), RelayOptions::default());
        relay.shutdown();
        relay.speak("Nobody hears this.");
        wait_idle(&relay).await;
        assert_eq!(relay.pending_clips(), 0);
    }
}
