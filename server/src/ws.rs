//! Socket endpoint: text in, "clip ready" notifications out.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use tts_core::ClipReady;

use crate::state::AppState;
use crate::validation::validate_text;

pub async fn socket_endpoint(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (listener_id, mut ready_rx) = state.relay.register_listener();
    info!(listener = %listener_id, "Client connected");

    let (mut sender, mut receiver) = socket.split();
    let notification = state.config.notification_message.clone();
    let mut undelivered = 0;

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => handle_text(&state, text.as_str()),
                Some(Ok(Message::Binary(_))) => debug!(listener = %listener_id, "Ignoring binary frame"),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(listener = %listener_id, "Socket error: {e}");
                    break;
                }
            },
            Some(ClipReady) = ready_rx.recv() => {
                if let Err(e) = sender.send(Message::Text(notification.clone().into())).await {
                    warn!(listener = %listener_id, "Failed to send notification: {e}");
                    undelivered += 1;
                    break;
                }
            }
        }
    }

    let passed_on = state.relay.release_listener(listener_id, ready_rx, undelivered);
    info!(listener = %listener_id, passed_on, "Client disconnected");
}

fn handle_text(state: &AppState, text: &str) {
    if let Err(e) = validate_text(text) {
        warn!("Ignoring text message: {e}");
        return;
    }
    let started = state.relay.speak(text);
    debug!(chars = text.chars().count(), started, "Text queued for synthesis");
}
