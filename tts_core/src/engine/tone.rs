use std::collections::VecDeque;
use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::{PlaybackEvents, SpeechEngine, StreamFormat};
use crate::segmenter::split_sentences;
use crate::wav::samples_to_pcm16;

/// Model-free engine that renders every sentence as a sine tone whose
/// length follows the sentence length. Useful for wiring up clients and
/// for tests when no piper voice is installed.
pub struct ToneEngine {
    sample_rate: u32,
    ms_per_char: u32,
    chunk_samples: usize,
    frequency_hz: f32,
    pending: Mutex<VecDeque<String>>,
    shut_down: AtomicBool,
}

impl ToneEngine {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ms_per_char: 60,
            chunk_samples: 1024,
            frequency_hz: 440.0,
            pending: Mutex::new(VecDeque::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn with_ms_per_char(mut self, ms_per_char: u32) -> Self {
        self.ms_per_char = ms_per_char;
        self
    }

    pub fn with_chunk_samples(mut self, chunk_samples: usize) -> Self {
        self.chunk_samples = chunk_samples.max(1);
        self
    }

    fn next_text(&self) -> Option<String> {
        self.pending.lock().pop_front()
    }

    fn render(&self, sentence: &str) -> Vec<f32> {
        let chars = sentence.chars().filter(|c| !c.is_whitespace()).count() as u64;
        let len = (chars * self.ms_per_char as u64 * self.sample_rate as u64 / 1000) as usize;
        let step = TAU * self.frequency_hz / self.sample_rate as f32;
        (0..len).map(|n| 0.3 * (step * n as f32).sin()).collect()
    }
}

impl SpeechEngine for ToneEngine {
    fn feed(&self, text: &str) {
        if self.shut_down.load(Ordering::Acquire) {
            return;
        }
        self.pending.lock().push_back(text.to_string());
    }

    fn has_pending(&self) -> bool {
        !self.pending.lock().is_empty()
    }

    fn play(&self, events: &dyn PlaybackEvents) -> anyhow::Result<()> {
        'queue: while let Some(text) = self.next_text() {
            for sentence in split_sentences(&text) {
                if self.shut_down.load(Ordering::Acquire) {
                    break 'queue;
                }
                for chunk in self.render(&sentence).chunks(self.chunk_samples) {
                    events.on_chunk(&samples_to_pcm16(chunk));
                }
                events.on_sentence_boundary();
            }
        }
        events.on_stream_stopped();
        Ok(())
    }

    fn stream_format(&self) -> StreamFormat {
        StreamFormat::mono(self.sample_rate)
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
        self.pending.lock().clear();
    }
}
