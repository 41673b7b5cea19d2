//! # HTTP & WebSocket Routes
//!
//! Route handlers only; all business logic lives in [`crate::guardrail`], [`crate::ingest`],
//! and [`crate::finalize`] so the stream handler and REST adapter stay thin, identical
//! mirrors of each other.

pub mod mayla;
pub mod sessions;
pub mod ws;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(sessions::health))
        .route("/sessions/start", post(sessions::start_session))
        .route("/sessions/:id/chunk", post(sessions::post_chunk))
        .route("/sessions/:id/end", post(sessions::end_session_by_id))
        .route("/sessions/end", post(sessions::end_session))
        .route("/ws/sessions/:id", get(ws::ws_handler))
        .route("/mayla/auth/patient/login", post(mayla::login))
        .route("/mayla/vital-signs", post(mayla::vital_signs))
        .with_state(state)
}
