//! Common utilities for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use speech_relay::{
    config::{EngineKind, ServerConfig},
    router,
    state::AppState,
};
use tts_core::{PlaybackState, SpeechRelay, ToneEngine};

pub const TEST_SAMPLE_RATE: u32 = 16_000;

pub fn test_config() -> ServerConfig {
    ServerConfig {
        engine: EngineKind::Tone,
        tone_sample_rate: TEST_SAMPLE_RATE,
        max_pull_wait_ms: 2_000,
        ..ServerConfig::default()
    }
}

/// Create a test app backed by the tone engine, plus a handle on its relay.
pub fn create_test_app() -> (Router, Arc<SpeechRelay>) {
    let config = test_config();
    let relay = Arc::new(SpeechRelay::new(
        Arc::new(ToneEngine::new(config.tone_sample_rate)),
        config.relay_options(),
    ));
    let app = router(AppState::new(relay.clone(), config));
    (app, relay)
}

/// Wait until the relay has finished every queued text.
pub async fn wait_idle(relay: &SpeechRelay) {
    let mut rx = relay.subscribe_playback();
    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| *s == PlaybackState::Idle),
    )
    .await
    .expect("relay did not return to idle")
    .expect("playback state channel closed");
}

/// Poll until the relay has `count` listeners registered.
pub async fn wait_for_listeners(relay: &SpeechRelay, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while relay.listener_count() != count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("listeners never registered");
}
