//! # Result Shaping
//!
//! The wire-visible terminal object emitted exactly once per session, whether over the stream
//! or from the REST adapter's `end` endpoints. Both transports send the identical JSON shape.

use serde::Serialize;

/// Localized message sent when the finalizer's 10-second deadline is exceeded.
pub const TIMEOUT_MESSAGE: &str = "Processamento excedeu o tempo limite.";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionResult {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub bpm: Option<f64>,
    pub confidence: f64,
    pub quality: Quality,
    pub message: Option<String>,
    pub duration_s: f64,
    pub frames_received: u32,
    pub face_detect_rate: f64,
    pub snr_db: Option<f64>,
    pub bpm_series: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Good,
    Medium,
    Poor,
}

impl SessionResult {
    /// The result sent when the finalizer errors, times out, or the processor throws. Never
    /// propagates the underlying failure to the client beyond a fixed, localized message.
    pub fn poor_quality_fallback(duration_s: f64, frames_received: u32, message: impl Into<String>) -> Self {
        Self {
            kind: "result",
            bpm: None,
            confidence: 0.0,
            quality: Quality::Poor,
            message: Some(message.into()),
            duration_s,
            frames_received,
            face_detect_rate: 0.0,
            snr_db: None,
            bpm_series: None,
        }
    }
}
