//! # Error Kinds
//!
//! A single closed enum for every error the ingest subsystem can surface, whether over
//! the REST adapter (as an HTTP status + JSON body) or over the WebSocket stream (as an
//! `{type: "error", message: <kind>}` frame). `Display` on each variant yields exactly the
//! `<kind>` string the wire contract promises, so the two surfaces never drift apart.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Wire-level error kind, shared by the REST adapter and the stream handler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppError {
    /// `start` was called without `consent: true`.
    #[error("consent_required")]
    ConsentRequired,

    /// The per-IP session-create quota (10 / 60s) was exceeded.
    #[error("rate_limited")]
    RateLimited,

    /// The session id is unknown to the registry, or has been TTL-swept.
    #[error("session_not_found_or_expired")]
    SessionNotFoundOrExpired,

    /// A chunk arrived after the session already finalized.
    #[error("session_already_finished")]
    SessionAlreadyFinished,

    /// A second stream tried to attach to a session that already has one attached
    /// (invariant: at most one active stream per session).
    #[error("stream_already_attached")]
    StreamAlreadyAttached,

    /// A stream text frame was not parseable JSON.
    #[error("invalid_json")]
    InvalidJson,

    /// A chunk message was missing an integer `chunk_seq`.
    #[error("missing_chunk_seq")]
    MissingChunkSeq,

    /// A chunk message was missing a `frames` array.
    #[error("missing_frames")]
    MissingFrames,

    /// `n_frames` was `<= 0` or exceeded `max_chunk_size`.
    #[error("chunk_size_exceeded")]
    ChunkSizeExceeded,

    /// A single decoded frame exceeded `max_frame_bytes`.
    #[error("frame_too_large")]
    FrameTooLarge,

    /// Cumulative `frames_received` would exceed `max_frames`.
    #[error("max_frames_exceeded")]
    MaxFramesExceeded,

    /// Cumulative `bytes_received` would exceed `max_bytes_mb * 1MiB`.
    #[error("max_bytes_exceeded")]
    MaxBytesExceeded,

    /// The Mayla proxy endpoint required a bearer token that was absent or malformed.
    #[error("missing_bearer_token")]
    MissingBearerToken,

    /// The upstream Mayla API returned a non-2xx response or could not be reached.
    #[error("upstream_failure")]
    UpstreamFailure {
        upstream: &'static str,
        status: Option<u16>,
        body: String,
    },

    /// An unexpected internal failure occurred while handling the stream (a blocking task
    /// panicked, or the registry lock was found poisoned). The session is released.
    #[error("server_error")]
    ServerError,
}

impl AppError {
    /// Whether this is the class of error that, when raised mid-stream, should also
    /// terminate the WebSocket connection (vs. just sending an error frame and
    /// staying `ACTIVE`).
    pub fn closes_stream(&self) -> bool {
        matches!(
            self,
            AppError::SessionAlreadyFinished
                | AppError::StreamAlreadyAttached
                | AppError::ChunkSizeExceeded
                | AppError::FrameTooLarge
                | AppError::MaxFramesExceeded
                | AppError::MaxBytesExceeded
                | AppError::ServerError
        )
    }

    /// Application-level WebSocket close code for this error, per §6.
    pub fn close_code(&self) -> u16 {
        match self {
            AppError::SessionNotFoundOrExpired => 4404,
            AppError::SessionAlreadyFinished
            | AppError::StreamAlreadyAttached
            | AppError::ChunkSizeExceeded
            | AppError::FrameTooLarge
            | AppError::MaxFramesExceeded
            | AppError::MaxBytesExceeded => 4400,
            _ => 1011,
        }
    }

    /// `{type: "error", message: <kind>}`, the stream-protocol error frame.
    pub fn to_ws_error_frame(&self) -> serde_json::Value {
        json!({ "type": "error", "message": self.to_string() })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::ConsentRequired
            | AppError::InvalidJson
            | AppError::MissingChunkSeq
            | AppError::MissingFrames
            | AppError::ChunkSizeExceeded
            | AppError::FrameTooLarge
            | AppError::MaxFramesExceeded
            | AppError::MaxBytesExceeded
            | AppError::SessionNotFoundOrExpired
            | AppError::SessionAlreadyFinished
            | AppError::StreamAlreadyAttached => StatusCode::BAD_REQUEST,
            AppError::MissingBearerToken => StatusCode::UNAUTHORIZED,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::UpstreamFailure { .. } => StatusCode::BAD_GATEWAY,
            AppError::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            AppError::UpstreamFailure {
                upstream,
                status,
                body,
            } => json!({ "upstream": upstream, "status": status, "body": body }),
            other => json!(other.to_string()),
        };

        (status, axum::Json(json!({ "detail": body }))).into_response()
    }
}
