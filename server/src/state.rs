use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Instant;

use tts_core::SpeechRelay;

use crate::config::ServerConfig;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<SpeechRelay>,
    pub request_count: Arc<AtomicU64>,
    pub config: ServerConfig,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(relay: Arc<SpeechRelay>, config: ServerConfig) -> Self {
        Self {
            relay,
            request_count: Arc::new(AtomicU64::new(0)),
            config,
            started_at: Instant::now(),
        }
    }
}
