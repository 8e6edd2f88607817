pub mod clips;
pub mod config;
pub mod error;
pub mod metrics;
pub mod state;
pub mod validation;
pub mod ws;

use std::sync::Arc;

use axum::{
    extract::Request,
    http::{HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};
use anyhow::Context;
use tts_core::{wav, PiperEngine, SpeechEngine, SpeechRelay, ToneEngine};

use crate::config::{EngineKind, ServerConfig};
use crate::error::ApiError;
use crate::state::AppState;

/// Build the engine selected by the configuration and the relay around it.
pub fn build_relay(config: &ServerConfig) -> anyhow::Result<SpeechRelay> {
    let engine: Arc<dyn SpeechEngine> = match config.engine {
        EngineKind::Piper => {
            info!(voice = %config.voice, map = %config.model_map.display(), "Loading piper voice");
            Arc::new(PiperEngine::from_map_file(&config.model_map, &config.voice)?)
        }
        EngineKind::Tone => {
            let sample_rate = wav::check_sample_rate(config.tone_sample_rate.into())
                .context("Bad TONE_SAMPLE_RATE")?;
            info!(sample_rate, "Using tone engine");
            Arc::new(ToneEngine::new(sample_rate))
        }
    };
    Ok(SpeechRelay::new(engine, config.relay_options()))
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let methods = [Method::GET, Method::OPTIONS];

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .flatten()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    if origins.is_empty() {
        if config.cors_allowed_origins.is_some() {
            warn!("CORS_ALLOWED_ORIGINS has no valid origin, falling back to permissive CORS");
        }
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    } else {
        info!("CORS configured for {} origin(s)", origins.len());
        CorsLayer::new()
            .allow_origin(tower_http::cors::AllowOrigin::list(origins))
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    }
}

/// Request ID middleware for tracing
async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = HeaderValue::from_str(&uuid::Uuid::new_v4().to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
    request
        .headers_mut()
        .insert("x-request-id", request_id.clone());
    let mut response = next.run(request).await;
    response.headers_mut().insert("x-request-id", request_id);
    response
}

pub async fn health_check() -> &'static str {
    "ok"
}

async fn not_found() -> ApiError {
    ApiError::NotFound("No such route".to_string())
}

/// Assemble the full application router.
pub fn router(state: AppState) -> Router {
    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(cors_layer(&state.config))
        .into_inner();

    let api = Router::new()
        .route("/", get(clips::pull_clip))
        .route("/clip", get(clips::pull_clip))
        .route("/ws", get(ws::socket_endpoint))
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .route("/metrics", get(metrics::metrics_endpoint));

    Router::new()
        .merge(api.clone()) // root paths
        .nest("/api", api) // /api prefix
        .fallback(not_found)
        .layer(axum::middleware::from_fn(add_request_id))
        .layer(middleware_stack)
        .with_state(state)
}
