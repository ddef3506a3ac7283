//! Manages the WebSocket connection lifecycle for a recognition session.
//!
//! One task runs per connection. It reads frames in arrival order, hands each
//! to the blocking classifier pool and waits for the result before reading the
//! next one, so a session never has more than one inference in flight and
//! predictions go out in the order their frames came in.

use super::protocol::{
    INVALID_SESSION_CLOSE_CODE, INVALID_SESSION_REASON, Inbound, ProtocolError, ServerMessage,
    SessionId, parse_inbound,
};
use crate::state::AppState;
use anyhow::{Context, Result};
use axum::{
    extract::{
        Path, State,
        rejection::PathRejection,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    response::Response,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use meetsl_core::{Prediction, latency::SessionMetrics};
use std::{sync::Arc, time::Instant};
use tracing::{debug, error, info, instrument, warn};

/// Axum handler to upgrade an HTTP connection to a recognition session.
///
/// The upgrade is completed even for a rejected session id so the client
/// receives a coded close instead of a failed handshake.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    path: Result<Path<String>, PathRejection>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let session_id = match path {
        Ok(Path(raw_id)) => SessionId::parse(&raw_id).map_err(|e| e.to_string()),
        // An id that does not percent-decode to UTF-8 is rejected like any other bad id.
        Err(rejection) => Err(rejection.body_text()),
    };
    match session_id {
        Ok(session_id) => ws.on_upgrade(move |socket| handle_socket(socket, session_id, state)),
        Err(reason) => {
            warn!(%reason, "Rejecting WebSocket session");
            ws.on_upgrade(reject_socket)
        }
    }
}

async fn reject_socket(mut socket: WebSocket) {
    let frame = CloseFrame {
        code: INVALID_SESSION_CLOSE_CODE,
        reason: Utf8Bytes::from_static(INVALID_SESSION_REASON),
    };
    if let Err(e) = socket.send(Message::Close(Some(frame))).await {
        debug!(error = %e, "Client left before the rejection was delivered");
    }
}

/// Runs one accepted session from connect to close.
#[instrument(name = "ws_session", skip_all, fields(session_id = %session_id))]
async fn handle_socket(socket: WebSocket, session_id: SessionId, state: Arc<AppState>) {
    info!("WS connected");
    let (mut sink, mut stream) = socket.split();
    let mut metrics = SessionMetrics::new(state.config.stats_interval);

    match run_session(&state, &mut sink, &mut stream, &mut metrics).await {
        Ok(()) => info!(frames = metrics.frames(), "WS disconnected"),
        Err(e) => {
            error!(error = ?e, frames = metrics.frames(), "WS session failed");
            // Best-effort close: an error sending it is ignored on purpose.
            let _ = sink
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::ERROR,
                    reason: Utf8Bytes::from_static(""),
                })))
                .await;
        }
    }
}

/// The receive -> recognize -> reply loop.
///
/// Returns `Ok` when the client goes away, and `Err` for anything that should
/// end the session with an internal-error close.
async fn run_session(
    state: &AppState,
    sink: &mut SplitSink<WebSocket, Message>,
    stream: &mut SplitStream<WebSocket>,
    metrics: &mut SessionMetrics,
) -> Result<()> {
    while let Some(received) = stream.next().await {
        let text = match received {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(_)) => return Err(ProtocolError::Binary.into()),
            // Keep polling so the close reply is flushed; the stream then ends.
            Ok(Message::Close(_)) => continue,
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Err(e) => {
                debug!(error = %e, "WebSocket receive failed");
                return Ok(());
            }
        };

        let frame = match parse_inbound(text.as_str())? {
            Inbound::Frame(frame) => frame,
            Inbound::Ignored => continue,
        };

        let started = Instant::now();
        let prediction = recognize(state, frame.jpg_base64).await?;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        let summary = metrics.record_frame(latency_ms);

        match prediction {
            Some(prediction) => {
                debug!(
                    token = %prediction.token,
                    confidence = prediction.confidence,
                    latency_ms,
                    "Sign predicted"
                );
                let reply = ServerMessage::sign_prediction(prediction, frame.ts);
                let reply = Message::Text(serde_json::to_string(&reply)?.into());
                if let Err(e) = sink.send(reply).await {
                    debug!(error = %e, "Client left before the prediction was delivered");
                    return Ok(());
                }
            }
            None => debug!(latency_ms, "No gesture"),
        }

        if let Some(summary) = summary {
            info!(
                frames = metrics.frames(),
                avg_latency_ms = summary.avg_ms,
                max_latency_ms = summary.max_ms,
                "Frame latency"
            );
        }
    }
    Ok(())
}

/// Decodes and classifies one frame on the blocking pool.
async fn recognize(state: &AppState, jpg_base64: String) -> Result<Option<Prediction>> {
    let classifier = state.classifier.clone();
    let prediction = tokio::task::spawn_blocking(move || classifier.recognize_frame(&jpg_base64))
        .await
        .context("Recognition worker did not complete")??;
    Ok(prediction)
}
