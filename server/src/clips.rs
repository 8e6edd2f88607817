//! Pull endpoint: hands out finished clips, oldest first.

use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::info;
use tts_core::FinishedClip;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PullParams {
    /// Wait up to this long for a clip if none is ready (capped by config).
    pub wait_ms: Option<u64>,
}

/// `GET /`: the oldest finished clip as a WAV attachment, or 204 when
/// nothing is ready. Clients are expected to poll.
pub async fn pull_clip(
    State(state): State<AppState>,
    Query(params): Query<PullParams>,
) -> Result<Response, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);

    let wait = params
        .wait_ms
        .map(Duration::from_millis)
        .unwrap_or_default()
        .min(state.config.max_pull_wait());

    let clip = if wait.is_zero() {
        state.relay.pull_oldest()
    } else {
        state.relay.pull_oldest_within(wait).await
    };

    match clip {
        Some(clip) => {
            info!(
                clip = %clip.id(),
                bytes = clip.len(),
                duration_ms = clip.duration_ms(),
                "Audio requested"
            );
            clip_response(clip)
        }
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

fn clip_response(clip: FinishedClip) -> Result<Response, ApiError> {
    let disposition = HeaderValue::from_str(&format!("attachment; filename={}", clip.filename()))
        .map_err(|e| ApiError::InternalError(format!("Invalid Content-Disposition: {e}")))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("audio/wav")),
            (header::CONTENT_DISPOSITION, disposition),
            (
                header::ACCESS_CONTROL_EXPOSE_HEADERS,
                HeaderValue::from_static("Content-Disposition"),
            ),
        ],
        clip.into_bytes(),
    )
        .into_response())
}
