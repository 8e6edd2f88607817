//! Playback session control: at most one engine session at a time.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::engine::{PlaybackEvents, SpeechEngine};
use crate::segment::SegmentAccumulator;
use crate::stats::RelayStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Idle,
    Starting,
    Playing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    Failed(String),
}

pub struct StreamController {
    engine: Arc<dyn SpeechEngine>,
    accumulator: Arc<SegmentAccumulator>,
    state: watch::Sender<PlaybackState>,
    stats: Arc<RelayStats>,
}

impl StreamController {
    pub fn new(
        engine: Arc<dyn SpeechEngine>,
        accumulator: Arc<SegmentAccumulator>,
        stats: Arc<RelayStats>,
    ) -> Self {
        let (state, _) = watch::channel(PlaybackState::Idle);
        Self {
            engine,
            accumulator,
            state,
            stats,
        }
    }

    /// Hand text to the engine, whatever the current state.
    pub fn feed_text(&self, text: &str) {
        self.engine.feed(text);
    }

    /// Launch a playback session unless one is already starting or playing.
    ///
    /// Returns `true` when a new session was launched. Must be called from
    /// within a Tokio runtime; the session runs on the blocking pool.
    pub fn start_if_idle(self: &Arc<Self>) -> bool {
        let claimed = self.state.send_if_modified(|state| {
            if *state == PlaybackState::Idle {
                *state = PlaybackState::Starting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return false;
        }

        self.stats.record_session();
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let worker = Arc::clone(&controller);
            let outcome = match tokio::task::spawn_blocking(move || worker.run_session()).await {
                Ok(outcome) => outcome,
                Err(e) => PlaybackOutcome::Failed(format!("playback worker panicked: {e}")),
            };
            controller.finish_session(outcome);
        });
        true
    }

    pub fn state(&self) -> PlaybackState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state.subscribe()
    }

    /// Engine callback: the stream ended, flush what is buffered.
    pub fn on_engine_stream_stopped(&self) {
        self.accumulator.on_stream_stopped();
    }

    pub fn shutdown(&self) {
        info!("Shutting down speech engine");
        self.engine.shutdown();
    }

    fn run_session(&self) -> PlaybackOutcome {
        self.state.send_replace(PlaybackState::Playing);
        debug!("Playback session started");

        loop {
            if let Err(e) = self.engine.play(self) {
                return PlaybackOutcome::Failed(format!("{e:#}"));
            }

            // Text fed while the engine was draining must not be stranded:
            // only go idle if the engine has nothing queued.
            let drained = self.state.send_if_modified(|state| {
                if self.engine.has_pending() {
                    false
                } else {
                    *state = PlaybackState::Idle;
                    true
                }
            });
            if drained {
                return PlaybackOutcome::Completed;
            }
            debug!("Text arrived during playback, continuing session");
        }
    }

    fn finish_session(&self, outcome: PlaybackOutcome) {
        match outcome {
            PlaybackOutcome::Completed => debug!("Playback session completed"),
            PlaybackOutcome::Failed(reason) => {
                error!("Playback failed: {reason}");
                self.stats.record_failure();
                let dropped = self.accumulator.discard();
                if dropped > 0 {
                    warn!(dropped, "Discarded partial segment of failed session");
                }
                self.state.send_replace(PlaybackState::Idle);
            }
        }
    }
}

impl PlaybackEvents for StreamController {
    fn on_chunk(&self, pcm: &[u8]) {
        self.accumulator.feed_chunk(pcm);
    }

    fn on_sentence_boundary(&self) {
        self.accumulator.on_sentence_boundary();
    }

    fn on_stream_stopped(&self) {
        self.on_engine_stream_stopped();
    }
}
