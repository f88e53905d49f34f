//! Frame-accurate compositing of region transforms.
//!
//! Decodes the source into a numbered PNG sequence, rewrites only the frames
//! whose timeline entry produces at least one in-bounds region, then
//! re-encodes at the source frame rate with the original audio copied over.
//! The rendered file is written to scratch space and atomically moved into
//! place, so a failed run never leaves a partial output behind.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::decode::{extract_frame_sequence, sequence_frame_path};
use crate::error::{MediaResult, VideoProcessingError};
use crate::fs_utils::move_file;
use crate::probe::probe_video;
use crate::transform::TransformConfig;
use vmask_models::DenseRegionTimeline;

/// Frames processed between cancellation checks.
const BATCH_SIZE: u64 = 32;

/// Applies a region transform across a whole video.
#[derive(Debug, Clone)]
pub struct Compositor {
    transform: TransformConfig,
    encode_timeout_secs: u64,
    cancel_rx: Option<watch::Receiver<bool>>,
    /// Leak the scratch directory instead of removing it, for debugging
    keep_intermediates: bool,
}

impl Compositor {
    pub fn new(transform: TransformConfig, encode_timeout_secs: u64) -> MediaResult<Self> {
        transform.validate()?;
        Ok(Self {
            transform,
            encode_timeout_secs,
            cancel_rx: None,
            keep_intermediates: false,
        })
    }

    /// Set cancellation signal, checked between frame batches.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn with_keep_intermediates(mut self, keep: bool) -> Self {
        self.keep_intermediates = keep;
        self
    }

    /// Render `video` with the timeline's regions obfuscated into
    /// `output_path`. The output has exactly the input's frame count and
    /// frame rate; the source file is never touched.
    pub async fn apply(
        &self,
        video: impl AsRef<Path>,
        timeline: &DenseRegionTimeline,
        output_path: impl AsRef<Path>,
    ) -> MediaResult<PathBuf> {
        let video = video.as_ref();
        let output_path = output_path.as_ref();

        let info = probe_video(video).await?;

        let scratch = tempfile::TempDir::new()?;
        let (scratch_path, scratch_guard) = if self.keep_intermediates {
            let path = scratch.keep();
            info!(scratch = %path.display(), "Keeping intermediate frames");
            (path, None)
        } else {
            (scratch.path().to_path_buf(), Some(scratch))
        };
        let frames_dir = scratch_path.join("frames");

        let frame_count =
            extract_frame_sequence(video, &frames_dir, self.encode_timeout_secs).await?;
        debug!(
            video = %video.display(),
            frame_count,
            "Extracted frame sequence"
        );

        if timeline.frame_count() < frame_count {
            warn!(
                timeline_frames = timeline.frame_count(),
                video_frames = frame_count,
                "Timeline shorter than decoded sequence; trailing frames pass through"
            );
        }

        self.transform_frames(
            frames_dir.clone(),
            Arc::new(timeline.clone()),
            frame_count,
            info.width,
            info.height,
        )
        .await?;

        let rendered = scratch_path.join("render.mp4");
        self.encode(
            video,
            &frames_dir,
            &rendered,
            info.fps,
            info.has_audio,
            info.duration,
        )
        .await?;

        move_file(&rendered, output_path).await?;
        info!(output = %output_path.display(), frame_count, "Composite complete");

        // Keep the guard alive until the render is published.
        drop(scratch_guard);
        Ok(output_path.to_path_buf())
    }

    /// Rewrite the PNGs whose timeline entries produce in-bounds regions.
    /// Batches run on the blocking pool in parallel; cancellation is
    /// checked between batches so annotation state is never corrupted
    /// mid-run.
    async fn transform_frames(
        &self,
        frames_dir: PathBuf,
        timeline: Arc<DenseRegionTimeline>,
        frame_count: u64,
        frame_width: u32,
        frame_height: u32,
    ) -> MediaResult<()> {
        let transform = self.transform;
        let cancel_rx = self.cancel_rx.clone();

        tokio::task::spawn_blocking(move || -> MediaResult<()> {
            let mut batch_start = 0u64;
            while batch_start < frame_count {
                if let Some(rx) = &cancel_rx {
                    if *rx.borrow() {
                        return Err(VideoProcessingError::Cancelled);
                    }
                }

                let batch_end = (batch_start + BATCH_SIZE).min(frame_count);
                (batch_start..batch_end)
                    .into_par_iter()
                    .try_for_each(|frame_index| {
                        transform_one_frame(
                            &frames_dir,
                            &timeline,
                            frame_index,
                            frame_width,
                            frame_height,
                            &transform,
                        )
                    })?;
                batch_start = batch_end;
            }
            Ok(())
        })
        .await
        .map_err(|e| VideoProcessingError::internal(format!("transform task panicked: {e}")))?
    }

    /// Re-encode the frame sequence at the source frame rate, copying the
    /// original audio stream when one exists.
    async fn encode(
        &self,
        source_video: &Path,
        frames_dir: &Path,
        rendered: &Path,
        fps: f64,
        has_audio: bool,
        duration: f64,
    ) -> MediaResult<()> {
        let cmd = encode_command(source_video, frames_dir, rendered, fps, has_audio, duration);

        let mut runner = FfmpegRunner::new().with_timeout(self.encode_timeout_secs);
        if let Some(rx) = &self.cancel_rx {
            runner = runner.with_cancel(rx.clone());
        }
        runner
            .run_with_progress(&cmd, |p| {
                debug!(
                    frame = p.frame,
                    secs = p.out_time_secs(),
                    speed = p.speed,
                    "Encoding"
                );
            })
            .await
    }
}

/// Build the re-encode command. The output is bounded to the probed video
/// duration, so an audio stream shorter than the video can never truncate
/// the render below the source frame count.
fn encode_command(
    source_video: &Path,
    frames_dir: &Path,
    rendered: &Path,
    fps: f64,
    has_audio: bool,
    duration: f64,
) -> FfmpegCommand {
    let pattern = frames_dir.join("%06d.png");
    let mut cmd = FfmpegCommand::new(&pattern, rendered)
        .input_framerate(fps)
        .output_arg("-i")
        .output_arg(source_video.to_string_lossy().to_string())
        .video_codec("libx264")
        .pixel_format("yuv420p")
        .output_args(["-map", "0:v:0"])
        .passthrough_sync();

    if has_audio {
        cmd = cmd
            .output_args(["-map", "1:a?"])
            .output_args(["-c:a", "copy"])
            .output_arg("-t")
            .output_arg(format!("{duration:.6}"));
    }

    cmd
}

/// Transform one extracted frame in place. Frames with no in-bounds region
/// are left untouched on disk.
fn transform_one_frame(
    frames_dir: &Path,
    timeline: &DenseRegionTimeline,
    frame_index: u64,
    frame_width: u32,
    frame_height: u32,
    transform: &TransformConfig,
) -> MediaResult<()> {
    let regions = timeline.regions_at(frame_index);

    // Out-of-bounds and degenerate regions are skipped per frame, never fatal.
    let rects: Vec<_> = regions
        .iter()
        .filter(|r| r.is_valid())
        .filter_map(|r| r.clamped(frame_width, frame_height))
        .collect();
    if rects.is_empty() {
        return Ok(());
    }

    // Sequence files are 1-based.
    let path = sequence_frame_path(frames_dir, frame_index + 1);
    let mut frame = image::open(&path)?.to_rgb8();
    for rect in &rects {
        transform.apply(&mut frame, rect);
    }
    frame.save(&path)?;
    Ok(())
}
