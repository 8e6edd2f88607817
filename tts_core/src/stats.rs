// Relay counters, shared by every component of a `SpeechRelay`.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct RelayStats {
    texts_received: AtomicU64,
    sessions_started: AtomicU64,
    playback_failures: AtomicU64,
    clips_emitted: AtomicU64,
    segments_discarded: AtomicU64,
    clips_evicted: AtomicU64,
    clips_delivered: AtomicU64,
    empty_pulls: AtomicU64,
    notifications_sent: AtomicU64,
    payload_bytes_emitted: AtomicU64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_text(&self) {
        self.texts_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.playback_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_clip(&self, payload_len: usize) {
        self.clips_emitted.fetch_add(1, Ordering::Relaxed);
        self.payload_bytes_emitted
            .fetch_add(payload_len as u64, Ordering::Relaxed);
    }

    pub fn record_discard(&self) {
        self.segments_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.clips_evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pull(&self, delivered: bool) {
        if delivered {
            self.clips_delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.empty_pulls.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_notification(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            texts_received: self.texts_received.load(Ordering::Relaxed),
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            playback_failures: self.playback_failures.load(Ordering::Relaxed),
            clips_emitted: self.clips_emitted.load(Ordering::Relaxed),
            segments_discarded: self.segments_discarded.load(Ordering::Relaxed),
            clips_evicted: self.clips_evicted.load(Ordering::Relaxed),
            clips_delivered: self.clips_delivered.load(Ordering::Relaxed),
            empty_pulls: self.empty_pulls.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            payload_bytes_emitted: self.payload_bytes_emitted.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub texts_received: u64,
    pub sessions_started: u64,
    pub playback_failures: u64,
    pub clips_emitted: u64,
    pub segments_discarded: u64,
    pub clips_evicted: u64,
    pub clips_delivered: u64,
    pub empty_pulls: u64,
    pub notifications_sent: u64,
    pub payload_bytes_emitted: u64,
}
