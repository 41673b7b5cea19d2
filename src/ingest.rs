//! # Frame Ingestor
//!
//! Turns a chunk of base64-encoded JPEG strings into guardrail-checked counters and, outside
//! mock mode, decoded+downscaled frames appended to the session buffer. Base64 decode failures
//! are silently dropped before the guardrail ever sees them; JPEG decode failures are silently
//! dropped *after* the guardrail has already charged them for bytes and count, since the byte
//! budget was already spent receiving them over the wire.

use std::sync::Arc;
use std::time::Instant;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::imageops::FilterType;
use image::ImageFormat;

use crate::error::AppError;
use crate::guardrail;
use crate::session::registry::SessionRegistry;
use crate::session::{DecodedFrame, SessionId, SessionState, FRAME_HEIGHT, FRAME_WIDTH};

/// Outcome of ingesting one chunk: the count and byte total the guardrail charged.
pub struct IngestOutcome {
    pub n_frames: u32,
    pub total_bytes: u64,
}

/// Decodes `frames` (base64 strings), runs them through the guardrail, and — unless
/// `state.mock_mode` — decodes and downscales each JPEG into the session buffer.
pub fn ingest_chunk(state: &mut SessionState, frames: &[String]) -> Result<IngestOutcome, AppError> {
    let decoded: Vec<Vec<u8>> = frames
        .iter()
        .filter_map(|s| STANDARD.decode(s).ok())
        .collect();

    let n_frames = decoded.len() as u32;
    let sizes: Vec<usize> = decoded.iter().map(|b| b.len()).collect();
    let total_bytes: u64 = sizes.iter().map(|&l| l as u64).sum();

    guardrail::evaluate(state, n_frames, total_bytes, &sizes)?;

    if state.mock_mode {
        return Ok(IngestOutcome {
            n_frames,
            total_bytes,
        });
    }

    let started = Instant::now();
    for jpeg_bytes in &decoded {
        if let Some(frame) = decode_and_resize(jpeg_bytes) {
            state.frames.push(frame);
        }
    }
    state.decode_ms_total += started.elapsed().as_millis() as u64;

    Ok(IngestOutcome {
        n_frames,
        total_bytes,
    })
}

/// Runs [`ingest_chunk`] against the live session under the registry lock, off the async
/// runtime's I/O-driving threads: JPEG decode is CPU work and must not stall other streams'
/// receive/send progress. Returns `None` if the session is unknown or already swept.
pub async fn ingest_chunk_in_registry(
    registry: Arc<SessionRegistry>,
    id: SessionId,
    frames: Vec<String>,
) -> Option<Result<IngestOutcome, AppError>> {
    tokio::task::spawn_blocking(move || registry.mutate(id, |state| ingest_chunk(state, &frames)))
        .await
        .expect("ingest blocking task panicked")
}

/// Decodes a single JPEG and resamples it to the fixed target resolution with triangle
/// (bilinear) filtering. Returns `None` on any decode failure rather than propagating: a
/// corrupt frame in a chunk should not fail the whole chunk, since the guardrail already
/// accounted for its bytes.
fn decode_and_resize(jpeg_bytes: &[u8]) -> Option<DecodedFrame> {
    let img = image::load_from_memory_with_format(jpeg_bytes, ImageFormat::Jpeg).ok()?;
    let resized = img.resize_exact(FRAME_WIDTH, FRAME_HEIGHT, FilterType::Triangle);
    let rgb = resized.to_rgb8().into_raw();
    Some(DecodedFrame { rgb })
}
