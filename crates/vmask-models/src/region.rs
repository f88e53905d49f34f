//! Annotation regions in source-frame pixel space.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box marking a target object's extent on one frame.
///
/// Coordinates are in source-frame pixel space and may legally fall outside
/// the frame bounds. Clamping happens at compositing time only, so the raw
/// annotation survives round-trips for debugging and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Region {
    /// Frame the region was annotated on
    pub frame_index: u64,
    /// Left edge x-coordinate
    pub x: f64,
    /// Top edge y-coordinate
    pub y: f64,
    /// Box width
    pub width: f64,
    /// Box height
    pub height: f64,
    /// Target identity; regions without a label never correspond across frames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Annotation confidence in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Region {
    /// Create a new unlabeled region.
    pub fn new(frame_index: u64, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            frame_index,
            x,
            y,
            width,
            height,
            label: None,
            confidence: None,
        }
    }

    /// Attach a label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Check structural validity: positive extent, confidence in range.
    pub fn is_valid(&self) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && self
                .confidence
                .map_or(true, |c| (0.0..=1.0).contains(&c))
    }

    /// Right edge x-coordinate.
    #[inline]
    pub fn x2(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge y-coordinate.
    #[inline]
    pub fn y2(&self) -> f64 {
        self.y + self.height
    }

    /// Box area in pixels.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Compute Intersection over Union with another box.
    pub fn iou(&self, other: &Region) -> f64 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.x2().min(other.x2());
        let y2 = self.y2().min(other.y2());

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Linear interpolation between two boxes at fractional position `t`.
    ///
    /// The result carries `a`'s label and confidence and the caller-supplied
    /// frame index; `t = 0` reproduces `a`'s box, `t = 1` reproduces `b`'s.
    pub fn lerp(a: &Region, b: &Region, t: f64, frame_index: u64) -> Region {
        Region {
            frame_index,
            x: a.x + t * (b.x - a.x),
            y: a.y + t * (b.y - a.y),
            width: a.width + t * (b.width - a.width),
            height: a.height + t * (b.height - a.height),
            label: a.label.clone(),
            confidence: a.confidence,
        }
    }

    /// Copy this box onto another frame index.
    pub fn held_at(&self, frame_index: u64) -> Region {
        Region {
            frame_index,
            ..self.clone()
        }
    }

    /// Intersect with `[0, frame_width) x [0, frame_height)`.
    ///
    /// Returns `None` when the intersection is empty (degenerate after
    /// clamping); such regions are skipped by the compositor.
    pub fn clamped(&self, frame_width: u32, frame_height: u32) -> Option<PixelRect> {
        let x1 = self.x.max(0.0);
        let y1 = self.y.max(0.0);
        let x2 = self.x2().min(frame_width as f64);
        let y2 = self.y2().min(frame_height as f64);

        let width = (x2 - x1).floor() as i64;
        let height = (y2 - y1).floor() as i64;
        if width < 1 || height < 1 {
            return None;
        }

        Some(PixelRect {
            x: x1.floor() as u32,
            y: y1.floor() as u32,
            width: width as u32,
            height: height as u32,
        })
    }
}

/// An integer rectangle fully inside a frame, ready for pixel transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}
