//! # Stream Handler
//!
//! The bidirectional protocol loop at `/ws/sessions/{session_id}`: ATTACHING → ACTIVE →
//! FINALIZING → END. One `tokio::spawn`ed task per connection; everything that could block the
//! runtime (JPEG decode, signal processing) is off this task by the time it reaches us.

use std::time::Instant;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::AppError;
use crate::finalize::finalize;
use crate::ingest::ingest_chunk_in_registry;
use crate::protocol::{InboundMessage, OutboundMessage};
use crate::session::SessionId;
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, session_id, state))
}

async fn handle_socket(mut socket: WebSocket, raw_session_id: String, state: AppState) {
    let Ok(id) = raw_session_id.parse::<SessionId>() else {
        close_with(&mut socket, &AppError::SessionNotFoundOrExpired).await;
        return;
    };

    match state.registry.attach(id) {
        Ok(true) => {}
        Ok(false) => {
            close_with(&mut socket, &AppError::SessionNotFoundOrExpired).await;
            return;
        }
        Err(err) => {
            close_with(&mut socket, &err).await;
            return;
        }
    }
    info!(session_id = %id, "stream attached");

    loop {
        let message = match socket.recv().await {
            Some(Ok(msg)) => msg,
            Some(Err(err)) => {
                warn!(session_id = %id, error = %err, "stream receive error");
                cleanup_without_result(&state, id).await;
                return;
            }
            None => {
                cleanup_without_result(&state, id).await;
                return;
            }
        };

        let text = match message {
            Message::Text(t) => t,
            Message::Close(_) => {
                cleanup_without_result(&state, id).await;
                return;
            }
            _ => continue,
        };

        match InboundMessage::parse(&text) {
            InboundMessage::Unknown => {
                send_json(&mut socket, &OutboundMessage::Error {
                    message: AppError::InvalidJson.to_string(),
                })
                .await;
            }
            InboundMessage::End => {
                finalize_and_close(&mut socket, &state, id).await;
                return;
            }
            InboundMessage::Chunk(chunk) => {
                let is_integer = chunk
                    .chunk_seq
                    .as_ref()
                    .is_some_and(|v| v.is_i64() || v.is_u64());
                let Some(chunk_seq) = is_integer.then(|| chunk.chunk_seq.clone().unwrap()) else {
                    send_json(&mut socket, &OutboundMessage::Error {
                        message: AppError::MissingChunkSeq.to_string(),
                    })
                    .await;
                    continue;
                };

                let Some(frames) = chunk.frames.as_ref().and_then(Value::as_array).map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect::<Vec<String>>()
                }) else {
                    send_json(&mut socket, &OutboundMessage::Error {
                        message: AppError::MissingFrames.to_string(),
                    })
                    .await;
                    continue;
                };

                match ingest_chunk_in_registry(state.registry.clone(), id, frames).await {
                    None => {
                        close_with(&mut socket, &AppError::SessionNotFoundOrExpired).await;
                        return;
                    }
                    Some(Err(err)) => {
                        let close_code = err.close_code();
                        send_json(&mut socket, &OutboundMessage::Error {
                            message: err.to_string(),
                        })
                        .await;
                        if err.closes_stream() {
                            close_socket(&mut socket, close_code).await;
                            return;
                        }
                    }
                    Some(Ok(outcome)) => {
                        let declared_n = chunk.n.as_ref().and_then(Value::as_u64);
                        let received = declared_n.map(|v| v as u32).unwrap_or(outcome.n_frames);

                        send_json(&mut socket, &OutboundMessage::Ack { chunk_seq, received }).await;

                        if should_finalize(&state, id) {
                            finalize_and_close(&mut socket, &state, id).await;
                            return;
                        }
                    }
                }
            }
        }
    }
}

fn should_finalize(state: &AppState, id: SessionId) -> bool {
    state
        .registry
        .mutate(id, |s| s.should_finalize_by_elapsed(Instant::now()))
        .unwrap_or(false)
}

async fn finalize_and_close(socket: &mut WebSocket, state: &AppState, id: SessionId) {
    send_json(socket, &OutboundMessage::progress_processing()).await;

    let processor = state.processor.clone();
    let registry = state.registry.clone();
    let snapshot_task = tokio::task::spawn_blocking(move || {
        registry.mutate(id, |s| {
            if s.finished {
                Err(AppError::SessionAlreadyFinished)
            } else {
                s.finished = true;
                Ok(s.clone())
            }
        })
    })
    .await;

    let mut snapshot = match snapshot_task {
        Err(_) => {
            warn!(session_id = %id, "finalize snapshot task panicked");
            state.registry.end(id);
            close_with(socket, &AppError::ServerError).await;
            return;
        }
        Ok(None) => {
            close_with(socket, &AppError::SessionNotFoundOrExpired).await;
            return;
        }
        Ok(Some(Err(err))) => {
            close_with(socket, &err).await;
            return;
        }
        Ok(Some(Ok(s))) => s,
    };

    let session_result = finalize(&mut snapshot, processor).await;
    state.registry.end(id);

    let payload = serde_json::to_value(&session_result).unwrap_or_else(|_| json!({"type": "result"}));
    send_raw_json(socket, &payload).await;
    close_socket(socket, 1000).await;
}

async fn cleanup_without_result(state: &AppState, id: SessionId) {
    // Client disconnected mid-session: release the entry, send nothing (the peer is gone).
    state.registry.end(id);
}

async fn send_json(socket: &mut WebSocket, msg: &OutboundMessage) {
    if let Ok(text) = serde_json::to_string(msg) {
        let _ = socket.send(Message::Text(text)).await;
    }
}

async fn send_raw_json(socket: &mut WebSocket, value: &Value) {
    if let Ok(text) = serde_json::to_string(value) {
        let _ = socket.send(Message::Text(text)).await;
    }
}

async fn close_with(socket: &mut WebSocket, err: &AppError) {
    send_json(socket, &OutboundMessage::Error {
        message: err.to_string(),
    })
    .await;
    close_socket(socket, err.close_code()).await;
}

async fn close_socket(socket: &mut WebSocket, code: u16) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: std::borrow::Cow::Borrowed(""),
        })))
        .await;
}
