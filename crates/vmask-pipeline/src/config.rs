//! Pipeline configuration.

use std::path::PathBuf;

use vmask_media::sampler::SamplerConfig;
use vmask_media::transform::{TransformConfig, TransformKind, DEFAULT_STRENGTH};

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Baseline keyframe sampling interval in frames
    pub sample_rate: u32,
    /// Hard cap on keyframes per request
    pub max_frames_per_request: usize,
    /// Motion delta (mean gray difference, 0..255) that triggers a keyframe
    pub motion_threshold: f64,
    /// Minimum frame gap between selected keyframes
    pub min_motion_gap: u64,
    /// Transform applied to matched regions
    pub transform_kind: TransformKind,
    /// Transform strength, validated to 5..=50 at use
    pub strength: u32,
    /// Timeout for decode passes (sampling, frame extraction)
    pub decode_timeout_secs: u64,
    /// Timeout for the compositing re-encode
    pub encode_timeout_secs: u64,
    /// Where rendered videos are published
    pub output_dir: PathBuf,
    /// Scratch space for per-run intermediates
    pub work_dir: PathBuf,
    /// Root of the session store
    pub sessions_dir: PathBuf,
    /// Leak per-run intermediates for debugging
    pub keep_intermediates: bool,
    /// Threads for the frame transform pass (0 = one per core)
    pub worker_threads: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 30,
            max_frames_per_request: 20,
            motion_threshold: 8.0,
            min_motion_gap: 5,
            transform_kind: TransformKind::Mosaic,
            strength: DEFAULT_STRENGTH,
            decode_timeout_secs: 300,
            encode_timeout_secs: 600,
            output_dir: PathBuf::from("./output"),
            work_dir: std::env::temp_dir().join("vmask"),
            sessions_dir: PathBuf::from("./sessions"),
            keep_intermediates: false,
            worker_threads: 0,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sample_rate: env_parse("VMASK_SAMPLE_RATE", defaults.sample_rate),
            max_frames_per_request: env_parse("VMASK_MAX_FRAMES", defaults.max_frames_per_request),
            motion_threshold: env_parse("VMASK_MOTION_THRESHOLD", defaults.motion_threshold),
            min_motion_gap: env_parse("VMASK_MIN_MOTION_GAP", defaults.min_motion_gap),
            transform_kind: match std::env::var("VMASK_TRANSFORM").as_deref() {
                Ok("blur") => TransformKind::Blur,
                _ => TransformKind::Mosaic,
            },
            strength: env_parse("VMASK_STRENGTH", defaults.strength),
            decode_timeout_secs: env_parse("VMASK_DECODE_TIMEOUT_SECS", defaults.decode_timeout_secs),
            encode_timeout_secs: env_parse("VMASK_ENCODE_TIMEOUT_SECS", defaults.encode_timeout_secs),
            output_dir: env_path("VMASK_OUTPUT_DIR", defaults.output_dir),
            work_dir: env_path("VMASK_WORK_DIR", defaults.work_dir),
            sessions_dir: env_path("VMASK_SESSIONS_DIR", defaults.sessions_dir),
            keep_intermediates: std::env::var("VMASK_KEEP_INTERMEDIATES")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            worker_threads: env_parse("VMASK_WORKER_THREADS", defaults.worker_threads),
        }
    }

    /// Sampler view of this configuration.
    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            sample_rate: self.sample_rate,
            max_frames: self.max_frames_per_request,
            motion_threshold: self.motion_threshold,
            min_motion_gap: self.min_motion_gap,
            decode_timeout_secs: self.decode_timeout_secs,
        }
    }

    /// Transform view of this configuration.
    pub fn transform_config(&self) -> TransformConfig {
        TransformConfig {
            kind: self.transform_kind,
            strength: self.strength,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.sample_rate, 30);
        assert_eq!(config.max_frames_per_request, 20);
        assert_eq!(config.strength, 15);
        assert_eq!(config.transform_kind, TransformKind::Mosaic);

        assert!(config.sampler_config().validate().is_ok());
        assert!(config.transform_config().validate().is_ok());
    }
}
