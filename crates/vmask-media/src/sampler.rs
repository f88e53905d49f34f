//! Motion-aware keyframe sampling.
//!
//! Selection policy is split from I/O: [`KeyframeSelector`] consumes coarse
//! grayscale buffers one frame at a time and decides which frames to keep,
//! while [`FrameSampler`] drives the decode pipe and the full-resolution
//! extraction around it.

use std::path::Path;
use tracing::{debug, info};

use crate::decode::{decode_gray_frames, extract_frames_by_index};
use crate::error::{MediaResult, VideoProcessingError};
use crate::probe::probe_video;
use vmask_models::{KeyFrame, SelectionReason};

/// Width of the coarse analysis frames fed to motion scoring.
const ANALYSIS_WIDTH: u32 = 160;

/// Configuration for keyframe sampling.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Baseline sampling interval in frames
    pub sample_rate: u32,
    /// Hard cap on selected keyframes per video
    pub max_frames: usize,
    /// Mean absolute gray delta (0..255) above which motion triggers a keyframe
    pub motion_threshold: f64,
    /// Minimum gap in frames between consecutive selections
    pub min_motion_gap: u64,
    /// Timeout for the analysis decode
    pub decode_timeout_secs: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 30,
            max_frames: 20,
            motion_threshold: 8.0,
            min_motion_gap: 5,
            decode_timeout_secs: 300,
        }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> MediaResult<()> {
        if self.sample_rate == 0 {
            return Err(VideoProcessingError::InvalidSampler(
                "sample_rate must be at least 1".to_string(),
            ));
        }
        if self.max_frames < 2 {
            return Err(VideoProcessingError::InvalidSampler(
                "max_frames must be at least 2 (first and last frame are always kept)".to_string(),
            ));
        }
        if self.motion_threshold < 0.0 {
            return Err(VideoProcessingError::InvalidSampler(
                "motion_threshold must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// One selected frame, before full-resolution extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFrame {
    pub frame_index: u64,
    pub motion_score: f64,
    pub reason: SelectionReason,
}

/// Streaming keyframe selection over coarse grayscale buffers.
///
/// Motion is scored against the buffer of the previously *accepted* frame,
/// so a burst of change keeps scoring high until a frame from the burst is
/// actually kept. Frame 0 and the final frame are anchors: always in the
/// result, never evicted by the cap.
#[derive(Debug)]
pub struct KeyframeSelector {
    config: SamplerConfig,
    selections: Vec<SelectedFrame>,
    last_accepted_buf: Option<Vec<u8>>,
    last_observed: Option<(u64, f64)>,
}

impl KeyframeSelector {
    pub fn new(config: SamplerConfig) -> Self {
        Self {
            config,
            selections: Vec::new(),
            last_accepted_buf: None,
            last_observed: None,
        }
    }

    /// Feed the next frame's coarse grayscale buffer. Frames must arrive in
    /// index order.
    pub fn observe(&mut self, frame_index: u64, buf: &[u8]) {
        let score = match &self.last_accepted_buf {
            Some(prev) => mean_abs_diff(prev, buf),
            None => 0.0,
        };
        self.last_observed = Some((frame_index, score));

        let reason = if frame_index == 0 {
            SelectionReason::FixedInterval
        } else if score > self.config.motion_threshold && self.gap_ok(frame_index) {
            SelectionReason::MotionTriggered
        } else if frame_index % self.config.sample_rate as u64 == 0 {
            SelectionReason::FixedInterval
        } else {
            return;
        };

        let accepted = self.try_accept(SelectedFrame {
            frame_index,
            motion_score: score,
            reason,
        });
        if accepted {
            self.last_accepted_buf = Some(buf.to_vec());
        }
    }

    /// Close the stream and return the selections in frame order.
    /// The last observed frame is forced into the set if absent.
    pub fn finish(mut self) -> Vec<SelectedFrame> {
        if let Some((last_index, last_score)) = self.last_observed {
            let already = self
                .selections
                .last()
                .is_some_and(|s| s.frame_index == last_index);
            if !already {
                if self.selections.len() >= self.config.max_frames {
                    // Anchor must enter; drop the weakest interior selection.
                    if let Some(pos) = self.lowest_evictable() {
                        self.selections.remove(pos);
                    }
                }
                self.selections.push(SelectedFrame {
                    frame_index: last_index,
                    motion_score: last_score,
                    reason: SelectionReason::FixedInterval,
                });
            }
        }
        self.selections
    }

    fn gap_ok(&self, frame_index: u64) -> bool {
        match self.selections.last() {
            Some(last) => frame_index - last.frame_index >= self.config.min_motion_gap,
            None => true,
        }
    }

    fn try_accept(&mut self, candidate: SelectedFrame) -> bool {
        if self.selections.len() < self.config.max_frames {
            self.selections.push(candidate);
            return true;
        }
        match self.lowest_evictable() {
            Some(pos) if self.selections[pos].motion_score < candidate.motion_score => {
                self.selections.remove(pos);
                self.selections.push(candidate);
                true
            }
            _ => false,
        }
    }

    /// Index of the lowest-scoring selection that is not the frame-0 anchor.
    fn lowest_evictable(&self) -> Option<usize> {
        self.selections
            .iter()
            .enumerate()
            .filter(|(_, s)| s.frame_index != 0)
            .min_by(|(_, a), (_, b)| a.motion_score.total_cmp(&b.motion_score))
            .map(|(pos, _)| pos)
    }
}

fn mean_abs_diff(a: &[u8], b: &[u8]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    if a.is_empty() {
        return 0.0;
    }
    let sum: u64 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| x.abs_diff(y) as u64)
        .sum();
    sum as f64 / a.len() as f64
}

/// Samples representative keyframes from a video.
#[derive(Debug, Clone)]
pub struct FrameSampler {
    config: SamplerConfig,
}

impl FrameSampler {
    pub fn new(config: SamplerConfig) -> MediaResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Sample keyframes from `video`, writing `kf_<index>.png` files into
    /// `frames_dir`. Returns the selected keyframes in frame order.
    pub async fn sample(
        &self,
        video: impl AsRef<Path>,
        frames_dir: impl AsRef<Path>,
    ) -> MediaResult<Vec<KeyFrame>> {
        let video = video.as_ref();
        let frames_dir = frames_dir.as_ref();

        let info = probe_video(video).await?;

        let analysis_h = ((ANALYSIS_WIDTH as u64 * info.height as u64) / info.width as u64)
            .max(1) as u32;
        debug!(
            video = %video.display(),
            analysis_width = ANALYSIS_WIDTH,
            analysis_height = analysis_h,
            "Scoring motion on coarse grayscale stream"
        );

        let mut selector = KeyframeSelector::new(self.config.clone());
        let decoded = decode_gray_frames(
            video,
            ANALYSIS_WIDTH,
            analysis_h,
            self.config.decode_timeout_secs,
            |frame_index, buf| selector.observe(frame_index, buf),
        )
        .await?;

        let selections = selector.finish();
        let indices: Vec<u64> = selections.iter().map(|s| s.frame_index).collect();

        info!(
            video = %video.display(),
            decoded_frames = decoded,
            selected = indices.len(),
            "Keyframe selection complete"
        );

        let paths = extract_frames_by_index(
            video,
            &indices,
            frames_dir,
            self.config.decode_timeout_secs,
        )
        .await?;

        Ok(selections
            .into_iter()
            .zip(paths)
            .map(|(sel, image_path)| KeyFrame {
                frame_index: sel.frame_index,
                timestamp: info.timestamp_of(sel.frame_index),
                width: info.width,
                height: info.height,
                motion_score: sel.motion_score,
                selection_reason: sel.reason,
                image_path,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(value: u8) -> Vec<u8> {
        vec![value; 64]
    }

    fn run(config: SamplerConfig, frames: &[u8]) -> Vec<SelectedFrame> {
        let mut selector = KeyframeSelector::new(config);
        for (i, &value) in frames.iter().enumerate() {
            selector.observe(i as u64, &flat(value));
        }
        selector.finish()
    }

    #[test]
    fn test_baseline_sampling_static_video() {
        let config = SamplerConfig {
            sample_rate: 10,
            ..Default::default()
        };
        let frames = vec![0u8; 35];
        let selected = run(config, &frames);

        let indices: Vec<u64> = selected.iter().map(|s| s.frame_index).collect();
        assert_eq!(indices, vec![0, 10, 20, 30, 34]);
        assert!(selected
            .iter()
            .all(|s| s.reason == SelectionReason::FixedInterval));
    }

    #[test]
    fn test_motion_triggers_between_ticks() {
        let config = SamplerConfig {
            sample_rate: 30,
            motion_threshold: 8.0,
            min_motion_gap: 5,
            ..Default::default()
        };
        // Static, then a scene change at frame 15 that persists
        let mut frames = vec![10u8; 15];
        frames.extend(vec![200u8; 15]);
        let selected = run(config, &frames);

        let motion: Vec<&SelectedFrame> = selected
            .iter()
            .filter(|s| s.reason == SelectionReason::MotionTriggered)
            .collect();
        assert_eq!(motion.len(), 1);
        assert_eq!(motion[0].frame_index, 15);
        assert!((motion[0].motion_score - 190.0).abs() < 1e-9);
    }

    #[test]
    fn test_min_gap_suppresses_burst() {
        let config = SamplerConfig {
            sample_rate: 100,
            motion_threshold: 8.0,
            min_motion_gap: 5,
            ..Default::default()
        };
        // Every frame differs wildly from the last accepted one
        let frames: Vec<u8> = (0..21).map(|i| if i % 2 == 0 { 0 } else { 255 }).collect();
        let selected = run(config, &frames);

        for pair in selected.windows(2) {
            assert!(pair[1].frame_index - pair[0].frame_index >= 5);
        }
    }

    #[test]
    fn test_cap_keeps_first_and_last() {
        let config = SamplerConfig {
            sample_rate: 5,
            max_frames: 4,
            motion_threshold: 1000.0,
            ..Default::default()
        };
        let frames = vec![0u8; 51];
        let selected = run(config, &frames);

        assert!(selected.len() <= 4);
        assert_eq!(selected.first().unwrap().frame_index, 0);
        assert_eq!(selected.last().unwrap().frame_index, 50);
    }

    #[test]
    fn test_cap_evicts_for_stronger_motion() {
        let config = SamplerConfig {
            sample_rate: 2,
            max_frames: 3,
            motion_threshold: 50.0,
            min_motion_gap: 1,
            ..Default::default()
        };
        // Ticks at 0, 2 fill the budget early with zero-score frames, then
        // a big change at frame 5 must displace one of them.
        let frames = vec![0, 0, 0, 0, 0, 200, 200];
        let selected = run(config, &frames);

        let indices: Vec<u64> = selected.iter().map(|s| s.frame_index).collect();
        assert!(indices.contains(&0));
        assert!(indices.contains(&5));
        assert_eq!(*indices.last().unwrap(), 6);
        assert!(indices.len() <= 3);
    }

    #[test]
    fn test_single_frame_video() {
        let selected = run(SamplerConfig::default(), &[42]);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].frame_index, 0);
    }

    #[test]
    fn test_selections_sorted_by_frame() {
        let config = SamplerConfig {
            sample_rate: 3,
            max_frames: 5,
            motion_threshold: 30.0,
            min_motion_gap: 2,
            ..Default::default()
        };
        let frames: Vec<u8> = (0..40).map(|i| (i * 7 % 256) as u8).collect();
        let selected = run(config, &frames);

        assert!(selected
            .windows(2)
            .all(|w| w[0].frame_index < w[1].frame_index));
    }

    #[test]
    fn test_config_validation() {
        assert!(SamplerConfig::default().validate().is_ok());
        assert!(SamplerConfig {
            sample_rate: 0,
            ..Default::default()
        }
        .validate()
        .is_err());
        assert!(SamplerConfig {
            max_frames: 1,
            ..Default::default()
        }
        .validate()
        .is_err());
        assert!(SamplerConfig {
            motion_threshold: -1.0,
            ..Default::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_mean_abs_diff() {
        assert_eq!(mean_abs_diff(&[0, 0], &[10, 20]), 15.0);
        assert_eq!(mean_abs_diff(&[], &[]), 0.0);
        assert_eq!(mean_abs_diff(&[255], &[0]), 255.0);
    }
}
