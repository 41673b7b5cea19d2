//! # Session Management
//!
//! A session is the unit of measurement: it is born from `POST /sessions/start`, accumulates
//! frames through either the WebSocket stream or the REST chunk endpoint, and dies at exactly
//! one terminal transition (finalize) or is reaped by TTL if nobody ever attached.
//!
//! This module owns the [`SessionState`] record and [`SessionId`]. The registry
//! ([`registry`]) owns the map of live sessions; the guardrail ([`crate::guardrail`]) and
//! ingestor ([`crate::ingest`]) are the only code paths allowed to mutate a session's
//! counters and frame buffer.

pub mod registry;

use std::time::{Duration, Instant};

use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;

/// Opaque 128-bit session identifier, unique per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A single decoded, downscaled frame: 256x144 RGB8, row-major.
pub const FRAME_WIDTH: u32 = 256;
pub const FRAME_HEIGHT: u32 = 144;

#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub rgb: Vec<u8>,
}

/// Per-session record. Parameters are an immutable snapshot of [`Config`] taken at
/// creation time; counters and the frame buffer are the only mutable parts, and the
/// guardrail evaluator is their sole writer (see invariant 4 in SPEC_FULL.md §3).
#[derive(Debug, Clone)]
pub struct SessionState {
    pub id: SessionId,

    // Parameters, immutable after creation.
    pub capture_seconds: u32,
    pub target_fps: u32,
    pub resolution: String,
    pub jpeg_quality: f32,
    pub roi_refresh_interval: u32,
    pub ttl_sec: u64,
    pub max_frames: u32,
    pub max_bytes_mb: u32,
    pub max_chunk_size: u32,
    pub max_frame_bytes: u32,
    pub mock_mode: bool,

    // Timing.
    pub created_at: Instant,
    pub expires_at: Instant,
    pub started_at: Option<Instant>,
    pub finished: bool,

    // Counters, written only by the guardrail evaluator.
    pub frames_received: u32,
    pub bytes_received: u64,
    pub chunks_received: u32,
    pub decode_ms_total: u64,

    // Buffer, cleared on terminal transition.
    pub frames: Vec<DecodedFrame>,

    /// Whether a stream has ever attached to this session (invariant 6).
    pub stream_attached: bool,
}

impl SessionState {
    pub fn new(id: SessionId, cfg: &Config) -> Self {
        let now = Instant::now();
        Self {
            id,
            capture_seconds: cfg.capture_seconds,
            target_fps: cfg.target_fps,
            resolution: cfg.resolution.clone(),
            jpeg_quality: cfg.jpeg_quality,
            roi_refresh_interval: cfg.roi_refresh_interval,
            ttl_sec: cfg.ttl_sec,
            max_frames: cfg.max_frames,
            max_bytes_mb: cfg.max_bytes_mb,
            max_chunk_size: cfg.max_chunk_size,
            max_frame_bytes: cfg.max_frame_bytes,
            mock_mode: cfg.mock_mode,

            created_at: now,
            expires_at: now + Duration::from_secs(cfg.ttl_sec),
            started_at: None,
            finished: false,

            frames_received: 0,
            bytes_received: 0,
            chunks_received: 0,
            decode_ms_total: 0,

            frames: Vec::new(),
            stream_attached: false,
        }
    }

    pub fn max_bytes(&self) -> u64 {
        u64::from(self.max_bytes_mb) * 1_048_576
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Wall-clock time since first attach, or `Duration::ZERO` if never started.
    pub fn elapsed_since_start(&self, now: Instant) -> Duration {
        self.started_at
            .map(|s| now.saturating_duration_since(s))
            .unwrap_or(Duration::ZERO)
    }

    pub fn should_finalize_by_elapsed(&self, now: Instant) -> bool {
        match self.started_at {
            Some(_) => self.elapsed_since_start(now) >= Duration::from_secs(u64::from(self.capture_seconds)),
            None => false,
        }
    }

    /// Releases the frame buffer. Called on every finalize exit path.
    pub fn clear_buffer(&mut self) {
        self.frames.clear();
        self.frames.shrink_to_fit();
    }
}

/// Wire-visible session parameters returned by `POST /sessions/start`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionParams {
    pub session_id: SessionId,
    pub capture_seconds: u32,
    pub target_fps: u32,
    pub resolution: String,
    pub jpeg_quality: f32,
    pub roi_refresh_interval: u32,
    pub ttl_sec: u64,
    pub max_frames: u32,
    pub max_bytes_mb: u32,
    pub max_chunk_size: u32,
    pub mock_mode: bool,
}

impl From<&SessionState> for SessionParams {
    fn from(s: &SessionState) -> Self {
        Self {
            session_id: s.id,
            capture_seconds: s.capture_seconds,
            target_fps: s.target_fps,
            resolution: s.resolution.clone(),
            jpeg_quality: s.jpeg_quality,
            roi_refresh_interval: s.roi_refresh_interval,
            ttl_sec: s.ttl_sec,
            max_frames: s.max_frames,
            max_bytes_mb: s.max_bytes_mb,
            max_chunk_size: s.max_chunk_size,
            mock_mode: s.mock_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_round_trips_through_display_and_parse() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn new_session_snapshots_config_and_is_not_expired() {
        let cfg = Config::default();
        let s = SessionState::new(SessionId::new(), &cfg);
        assert_eq!(s.max_frames, cfg.max_frames);
        assert!(!s.finished);
        assert!(s.started_at.is_none());
        assert!(!s.is_expired(Instant::now()));
    }

    #[test]
    fn elapsed_since_start_is_zero_before_attach() {
        let cfg = Config::default();
        let s = SessionState::new(SessionId::new(), &cfg);
        assert_eq!(s.elapsed_since_start(Instant::now()), Duration::ZERO);
        assert!(!s.should_finalize_by_elapsed(Instant::now()));
    }
}
