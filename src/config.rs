//! # Configuration Module
//!
//! Immutable defaults for a measurement session, plus the per-process knobs
//! (upstream proxy origin, listen port) that come from the environment. This
//! mirrors the teacher's `CaptureConfig`: a plain data struct, a `Default`,
//! and an explicit constructor used by `main`.
//!
//! ## Configuration Parameters
//!
//! | Parameter | Effect |
//! |-----------|--------|
//! | `capture_seconds` | Wall-clock duration after first attach after which auto-finalization fires |
//! | `target_fps` | Nominal sampling rate reported to client and passed to the processor |
//! | `resolution`, `jpeg_quality`, `roi_refresh_interval` | Advisory to client |
//! | `ttl_sec` | Max lifetime of an unfinished session |
//! | `max_frames`, `max_bytes_mb`, `max_chunk_size`, `max_frame_bytes` | Hard caps |
//! | `mock_mode` | If true, finalize returns a synthetic result without invoking the processor |

use std::env;

/// Frozen set of session defaults, snapshotted into every new `SessionState`.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
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
}

impl Default for Config {
    /// Matches the original service's defaults.
    fn default() -> Self {
        Self {
            capture_seconds: 25,
            target_fps: 8,
            resolution: "640x360".to_string(),
            jpeg_quality: 0.5,
            roi_refresh_interval: 3,

            ttl_sec: 180,
            max_frames: 400,
            max_bytes_mb: 20,
            max_chunk_size: 10,
            max_frame_bytes: 300_000,

            mock_mode: true,
        }
    }
}

impl Config {
    /// Maximum number of accepted bytes across the whole session.
    pub fn max_bytes(&self) -> u64 {
        u64::from(self.max_bytes_mb) * 1_048_576
    }

    /// Build a `Config` from defaults overridden by `RPPG_*` environment variables.
    ///
    /// Recognized overrides: `RPPG_CAPTURE_SECONDS`, `RPPG_TARGET_FPS`, `RPPG_TTL_SEC`,
    /// `RPPG_MAX_FRAMES`, `RPPG_MAX_BYTES_MB`, `RPPG_MAX_CHUNK_SIZE`, `RPPG_MAX_FRAME_BYTES`,
    /// `RPPG_MOCK_MODE`. Unset or unparsable variables fall back to the default silently.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_parse::<u32>("RPPG_CAPTURE_SECONDS") {
            cfg.capture_seconds = v;
        }
        if let Some(v) = env_parse::<u32>("RPPG_TARGET_FPS") {
            cfg.target_fps = v;
        }
        if let Some(v) = env_parse::<u64>("RPPG_TTL_SEC") {
            cfg.ttl_sec = v;
        }
        if let Some(v) = env_parse::<u32>("RPPG_MAX_FRAMES") {
            cfg.max_frames = v;
        }
        if let Some(v) = env_parse::<u32>("RPPG_MAX_BYTES_MB") {
            cfg.max_bytes_mb = v;
        }
        if let Some(v) = env_parse::<u32>("RPPG_MAX_CHUNK_SIZE") {
            cfg.max_chunk_size = v;
        }
        if let Some(v) = env_parse::<u32>("RPPG_MAX_FRAME_BYTES") {
            cfg.max_frame_bytes = v;
        }
        if let Some(v) = env_parse::<bool>("RPPG_MOCK_MODE") {
            cfg.mock_mode = v;
        }

        cfg
    }

    /// Validates invariants a `Config` must uphold regardless of where it came from.
    pub fn validate(&self) -> Result<(), String> {
        if self.target_fps == 0 {
            return Err("target_fps must be greater than 0".to_string());
        }
        if self.capture_seconds == 0 {
            return Err("capture_seconds must be greater than 0".to_string());
        }
        if self.max_chunk_size == 0 {
            return Err("max_chunk_size must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Upstream clinical-API proxy origin, defaulting to the dev environment.
pub fn mayla_api_base() -> String {
    env::var("MAYLA_API_BASE")
        .unwrap_or_else(|_| "https://dev.saudecomvc.com.br".to_string())
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.capture_seconds, 25);
        assert_eq!(config.target_fps, 8);
        assert_eq!(config.ttl_sec, 180);
        assert_eq!(config.max_frames, 400);
        assert!(config.mock_mode);
        assert_eq!(config.max_bytes(), 20 * 1_048_576);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.target_fps = 0;
        assert!(config.validate().is_err());
        config.target_fps = 8;

        config.capture_seconds = 0;
        assert!(config.validate().is_err());
        config.capture_seconds = 25;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mayla_api_base_strips_trailing_slash() {
        // Can't safely mutate process env in parallel tests; just exercise the
        // trimming logic directly via the default path.
        assert!(!mayla_api_base().ends_with('/'));
    }
}
