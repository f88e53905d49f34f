#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for the videomask pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with timeout and cancellation
//! - Progress parsing from `-progress pipe:2`
//! - Motion-aware keyframe sampling (the FrameSampler)
//! - Sparse-to-dense region expansion (the RegionTracker)
//! - Mosaic/blur compositing with atomic output publication

pub mod command;
pub mod compositor;
pub mod decode;
pub mod error;
pub mod fs_utils;
pub mod probe;
pub mod progress;
pub mod sampler;
pub mod tracker;
pub mod transform;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compositor::Compositor;
pub use error::{MediaResult, VideoProcessingError};
pub use probe::{probe_video, VideoInfo};
pub use progress::{FfmpegProgress, ProgressCallback};
pub use sampler::{FrameSampler, KeyframeSelector, SamplerConfig};
pub use tracker::expand;
pub use transform::{TransformConfig, TransformKind};
