//! # REST Adapter
//!
//! Non-streaming mirror of the stream handler: a client that cannot hold a WebSocket open
//! drives the same session through plain HTTP calls. Same guardrail/ingestor/finalizer code
//! paths; only the transport differs.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::finalize::finalize;
use crate::ingest::ingest_chunk_in_registry;
use crate::session::{SessionId, SessionParams};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub consent: bool,
}

pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> Result<Json<SessionParams>, AppError> {
    if !req.consent {
        return Err(AppError::ConsentRequired);
    }
    // The REST adapter does not carry a real client address extractor in this subsystem's
    // scope; admission control is still exercised through the registry's rate limiter keyed
    // on the literal loopback address for non-streaming callers.
    let session = state.registry.create("rest", &state.config)?;
    Ok(Json(SessionParams::from(&session)))
}

#[derive(Debug, Deserialize)]
pub struct ChunkRequest {
    pub chunk_seq: serde_json::Value,
    #[serde(default)]
    pub n: Option<serde_json::Value>,
    pub frames: Vec<String>,
}

pub async fn post_chunk(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChunkRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id: SessionId = id.parse().map_err(|_| AppError::SessionNotFoundOrExpired)?;
    state.registry.touch_started(id);

    let outcome = ingest_chunk_in_registry(state.registry.clone(), id, req.frames)
        .await
        .ok_or(AppError::SessionNotFoundOrExpired)??;

    let declared_n = req.n.as_ref().and_then(serde_json::Value::as_u64);
    let received = declared_n.map(|v| v as u32).unwrap_or(outcome.n_frames);

    Ok(Json(json!({
        "type": "ack",
        "chunk_seq": req.chunk_seq,
        "received": received,
    })))
}

pub async fn end_session_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id: SessionId = id.parse().map_err(|_| AppError::SessionNotFoundOrExpired)?;
    finalize_and_remove(&state, id).await
}

#[derive(Debug, Deserialize)]
pub struct EndRequest {
    pub session_id: String,
}

/// `POST /sessions/end`: idempotent, returns `{ok:true}` whether or not the session existed.
pub async fn end_session(State(state): State<AppState>, Json(req): Json<EndRequest>) -> impl IntoResponse {
    if let Ok(id) = req.session_id.parse::<SessionId>() {
        state.registry.end(id);
    }
    Json(json!({ "ok": true }))
}

async fn finalize_and_remove(state: &AppState, id: SessionId) -> Result<Json<serde_json::Value>, AppError> {
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
            state.registry.end(id);
            return Err(AppError::ServerError);
        }
        Ok(inner) => inner.ok_or(AppError::SessionNotFoundOrExpired)??,
    };

    let result = finalize(&mut snapshot, state.processor.clone()).await;
    state.registry.end(id);

    Ok(Json(serde_json::to_value(result).unwrap_or_else(|_| json!({"type": "result"}))))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}
