//! Error types for video processing.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, VideoProcessingError>;

/// Decode/encode/codec/IO failures. Fatal to the current run; never retried
/// automatically, and never leaves a partial output file behind.
#[derive(Debug, Error)]
pub enum VideoProcessingError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Video contains no decodable frames: {0}")]
    EmptyVideo(PathBuf),

    #[error("Invalid transform configuration: {0}")]
    InvalidTransform(String),

    #[error("Invalid sampler configuration: {0}")]
    InvalidSampler(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VideoProcessingError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an invalid-video error.
    pub fn invalid_video(message: impl Into<String>) -> Self {
        Self::InvalidVideo(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Human-readable corrective action, where one exists.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::FfmpegNotFound | Self::FfprobeNotFound => {
                Some("install ffmpeg and make sure it is on PATH")
            }
            Self::EmptyVideo(_) | Self::InvalidVideo(_) => {
                Some("check that the file is a playable video (mp4/mov/mkv...)")
            }
            Self::InvalidTransform(_) => Some("use a mosaic strength between 5 and 50"),
            Self::Timeout(_) => {
                Some("raise VMASK_DECODE_TIMEOUT_SECS / VMASK_ENCODE_TIMEOUT_SECS for long videos")
            }
            _ => None,
        }
    }
}
