//! # Signal Processor
//!
//! The actual rPPG signal-processing pipeline — face/ROI detection, color-signal extraction,
//! spectral estimation — is an external collaborator. This module defines the seam
//! ([`SignalProcessor`]) and ships [`HeuristicProcessor`], a deliberately simple stand-in so
//! that `mock_mode = false` has something real to call end to end. It is not clinically
//! meaningful; it exists to exercise the finalizer's timeout and error-catching paths.

use async_trait::async_trait;
use thiserror::Error;

use crate::session::DecodedFrame;

/// Estimate produced by a [`SignalProcessor`] run.
#[derive(Debug, Clone)]
pub struct Estimate {
    pub bpm: f64,
    pub confidence: f64,
    pub face_detect_rate: f64,
    /// Direct SNR in dB, if the processor computes one.
    pub snr_db: Option<f64>,
    /// Normalized SNR score in `[0, 1]`, used to derive `snr_db` when `snr_db` is absent
    /// (`snr_db = snr_score * 20 - 5`).
    pub snr_score: Option<f64>,
    pub mad: f64,
    pub bpm_series: Vec<f64>,
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("not enough frames to estimate a signal")]
    InsufficientFrames,
    #[error("processing failed: {0}")]
    Failed(String),
}

/// External rPPG estimation pipeline, out of scope for this subsystem beyond its interface.
#[async_trait]
pub trait SignalProcessor: Send + Sync {
    async fn process(
        &self,
        frames: &[DecodedFrame],
        fps: u32,
        winsize: u32,
        stride: u32,
    ) -> Result<Estimate, ProcessorError>;
}

/// Non-clinical placeholder: derives a pseudo-heart-rate from frame count and per-frame
/// luminance variance. Exists only so the real (non-mock) code path is exercisable; it makes
/// no claim to measure an actual pulse.
pub struct HeuristicProcessor;

#[async_trait]
impl SignalProcessor for HeuristicProcessor {
    async fn process(
        &self,
        frames: &[DecodedFrame],
        _fps: u32,
        winsize: u32,
        _stride: u32,
    ) -> Result<Estimate, ProcessorError> {
        let min_frames = (winsize.max(1) * 2) as usize;
        if frames.len() < min_frames {
            return Err(ProcessorError::InsufficientFrames);
        }

        let means: Vec<f64> = frames.iter().map(mean_luminance).collect();
        let overall_mean = means.iter().sum::<f64>() / means.len() as f64;
        let variance = means.iter().map(|m| (m - overall_mean).powi(2)).sum::<f64>()
            / means.len() as f64;
        let std_dev = variance.sqrt();

        // Fold luminance variability into a plausible BPM range; purely illustrative.
        let bpm = 60.0 + (std_dev * 37.0).min(50.0);
        let confidence = (frames.len() as f64 / (min_frames as f64 * 4.0)).min(0.9);
        let snr_score = (std_dev / 10.0).min(1.0);
        let mad = (1.0 - confidence) * 10.0;

        let bpm_series: Vec<f64> = means
            .chunks(winsize.max(1) as usize)
            .map(|w| 60.0 + (w.iter().sum::<f64>() / w.len() as f64).rem_euclid(40.0))
            .collect();

        Ok(Estimate {
            bpm,
            confidence,
            face_detect_rate: 1.0,
            snr_db: None,
            snr_score: Some(snr_score),
            mad,
            bpm_series,
        })
    }
}

fn mean_luminance(frame: &DecodedFrame) -> f64 {
    if frame.rgb.is_empty() {
        return 0.0;
    }
    let sum: u64 = frame
        .rgb
        .chunks_exact(3)
        .map(|px| u64::from(px[0]) + u64::from(px[1]) + u64::from(px[2]))
        .sum();
    let n_pixels = frame.rgb.len() / 3;
    sum as f64 / (n_pixels.max(1) as f64 * 3.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{FRAME_HEIGHT, FRAME_WIDTH};

    fn frame(shade: u8) -> DecodedFrame {
        DecodedFrame {
            rgb: vec![shade; (FRAME_WIDTH * FRAME_HEIGHT * 3) as usize],
        }
    }

    #[tokio::test]
    async fn insufficient_frames_errors() {
        let proc = HeuristicProcessor;
        let frames = vec![frame(10)];
        let result = proc.process(&frames, 8, 5, 1).await;
        assert!(matches!(result, Err(ProcessorError::InsufficientFrames)));
    }

    #[tokio::test]
    async fn enough_frames_produces_estimate() {
        let proc = HeuristicProcessor;
        let frames: Vec<DecodedFrame> = (0..20).map(|i| frame((i * 10) as u8)).collect();
        let estimate = proc.process(&frames, 8, 5, 1).await.unwrap();
        assert!(estimate.bpm >= 60.0);
        assert!(estimate.confidence > 0.0);
        assert!(!estimate.bpm_series.is_empty());
    }
}
