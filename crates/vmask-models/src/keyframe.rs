//! Keyframes selected for annotation.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Why a frame was selected as a keyframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    /// Landed on the baseline sampling interval
    FixedInterval,
    /// Motion delta exceeded the trigger threshold between ticks
    MotionTriggered,
}

/// A frame selected for human/model annotation.
///
/// Invariant: within one sampling run, `frame_index` values are strictly
/// increasing and the first and last decodable frames are always present,
/// since they anchor interpolation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFrame {
    /// Index into the decoded frame sequence (0-based)
    pub frame_index: u64,
    /// Presentation time in seconds
    pub timestamp: f64,
    /// Source frame width in pixels
    pub width: u32,
    /// Source frame height in pixels
    pub height: u32,
    /// Magnitude of change vs the previously accepted frame (0 for the first)
    pub motion_score: f64,
    /// Selection policy that accepted this frame
    pub selection_reason: SelectionReason,
    /// Full-resolution still written for the annotation surface
    pub image_path: PathBuf,
}

impl KeyFrame {
    /// Manifest row for session persistence (drops the absolute image path).
    pub fn meta(&self) -> KeyFrameMeta {
        KeyFrameMeta {
            frame_index: self.frame_index,
            timestamp: self.timestamp,
            image_file: self
                .image_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }
}

/// Manifest entry describing one exported keyframe inside a session directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyFrameMeta {
    pub frame_index: u64,
    pub timestamp: f64,
    /// Image filename relative to the session directory
    pub image_file: String,
}
