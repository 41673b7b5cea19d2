//! # Finalizer
//!
//! The one-shot transition from ACTIVE to terminal. Runs either the deterministic mock branch
//! or the real [`SignalProcessor`] branch, shapes either outcome into a [`SessionResult`], and
//! unconditionally releases the frame buffer — success, processor error, or timeout all exit
//! through the same cleanup.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use crate::processor::SignalProcessor;
use crate::result::{Quality, SessionResult, TIMEOUT_MESSAGE};
use crate::session::SessionState;

/// Hard deadline for a single finalize call, per the protocol's timeout guarantee.
pub const FINALIZE_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs finalization for `state` (already marked `finished` by the caller under the registry
/// lock) against `processor`, with a 10-second hard timeout. Always returns a result; always
/// clears `state.frames` before returning.
pub async fn finalize(state: &mut SessionState, processor: Arc<dyn SignalProcessor>) -> SessionResult {
    let now = std::time::Instant::now();
    let duration_s = state.elapsed_since_start(now).as_secs_f64();
    let frames_received = state.frames_received;

    let result = if state.mock_mode {
        mock_result(state, duration_s, frames_received)
    } else {
        let frames = std::mem::take(&mut state.frames);
        let target_fps = state.target_fps;
        let roi_refresh_interval = state.roi_refresh_interval;

        match timeout(
            FINALIZE_TIMEOUT,
            processor.process(&frames, target_fps, 5, roi_refresh_interval.max(1)),
        )
        .await
        {
            Ok(Ok(estimate)) => shape_estimate(estimate, duration_s, frames_received),
            Ok(Err(err)) => {
                warn!(error = %err, "signal processor failed");
                SessionResult::poor_quality_fallback(
                    duration_s,
                    frames_received,
                    format!("Falha no processamento: {err}"),
                )
            }
            Err(_) => SessionResult::poor_quality_fallback(duration_s, frames_received, TIMEOUT_MESSAGE),
        }
    };

    state.clear_buffer();
    result
}

fn mock_result(state: &SessionState, duration_s: f64, frames_received: u32) -> SessionResult {
    let mut hasher = DefaultHasher::new();
    state.id.as_bytes().hash(&mut hasher);
    let hash = hasher.finish();
    let bpm = 68.0 + (hash % 18) as f64;

    let expected_min = (f64::from(state.capture_seconds) * f64::from(state.target_fps) * 0.6).floor() as u32;
    let threshold = expected_min.max(10);
    let confidence = if frames_received >= threshold { 0.6 } else { 0.35 };
    let quality = if confidence >= 0.6 { Quality::Good } else { Quality::Medium };
    let snr_db = if matches!(quality, Quality::Good) { 12.0 } else { 6.0 };

    SessionResult {
        kind: "result",
        bpm: Some(bpm),
        confidence,
        quality,
        message: None,
        duration_s: round2(duration_s),
        frames_received,
        face_detect_rate: 1.0,
        snr_db: Some(snr_db),
        bpm_series: None,
    }
}

fn shape_estimate(
    estimate: crate::processor::Estimate,
    duration_s: f64,
    frames_received: u32,
) -> SessionResult {
    let snr_db = estimate
        .snr_db
        .or_else(|| estimate.snr_score.map(|s| s * 20.0 - 5.0));

    let quality = if estimate.confidence >= 0.6 && estimate.mad <= 5.0 {
        Quality::Good
    } else if estimate.confidence >= 0.3 && estimate.mad <= 10.0 {
        Quality::Medium
    } else {
        Quality::Poor
    };

    SessionResult {
        kind: "result",
        bpm: Some(estimate.bpm),
        confidence: estimate.confidence,
        quality,
        message: None,
        duration_s: round2(duration_s),
        frames_received,
        face_detect_rate: estimate.face_detect_rate,
        snr_db,
        bpm_series: if estimate.bpm_series.is_empty() {
            None
        } else {
            Some(estimate.bpm_series)
        },
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
