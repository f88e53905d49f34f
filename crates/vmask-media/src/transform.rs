//! Region-local pixel transforms.

use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::{MediaResult, VideoProcessingError};
use vmask_models::PixelRect;

/// Minimum allowed transform strength.
pub const MIN_STRENGTH: u32 = 5;
/// Maximum allowed transform strength.
pub const MAX_STRENGTH: u32 = 50;
/// Default transform strength.
pub const DEFAULT_STRENGTH: u32 = 15;

/// Kind of obfuscating transform applied to matched regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    /// Blocky pixelation
    Mosaic,
    /// Gaussian blur
    Blur,
}

/// Configuration for region transforms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TransformConfig {
    pub kind: TransformKind,
    /// Block size (mosaic) or blur intensity; valid range 5..=50
    pub strength: u32,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            kind: TransformKind::Mosaic,
            strength: DEFAULT_STRENGTH,
        }
    }
}

impl TransformConfig {
    pub fn new(kind: TransformKind, strength: u32) -> MediaResult<Self> {
        let config = Self { kind, strength };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MediaResult<()> {
        if !(MIN_STRENGTH..=MAX_STRENGTH).contains(&self.strength) {
            return Err(VideoProcessingError::InvalidTransform(format!(
                "strength {} out of range {}..={}",
                self.strength, MIN_STRENGTH, MAX_STRENGTH
            )));
        }
        Ok(())
    }

    /// Apply the configured transform to one region of a frame in place.
    pub fn apply(&self, frame: &mut RgbImage, rect: &PixelRect) {
        match self.kind {
            TransformKind::Mosaic => pixelate_region(frame, rect, self.strength),
            TransformKind::Blur => blur_region(frame, rect, self.strength),
        }
    }
}

/// Pixelate a rectangular region: downscale so each mosaic cell is
/// `strength` pixels wide, then upscale with nearest-neighbour so the
/// cells come back as solid blocks.
pub fn pixelate_region(frame: &mut RgbImage, rect: &PixelRect, strength: u32) {
    let Some(region) = crop_region(frame, rect) else {
        return;
    };

    let (w, h) = region.dimensions();
    let small_w = (w / strength).max(1);
    let small_h = (h / strength).max(1);

    let small = imageops::resize(&region, small_w, small_h, FilterType::Triangle);
    let blocky = imageops::resize(&small, w, h, FilterType::Nearest);

    imageops::replace(frame, &blocky, rect.x as i64, rect.y as i64);
}

/// Gaussian-blur a rectangular region in place.
pub fn blur_region(frame: &mut RgbImage, rect: &PixelRect, strength: u32) {
    let Some(region) = crop_region(frame, rect) else {
        return;
    };

    let sigma = strength as f32 / 2.0;
    let blurred = imageops::blur(&region, sigma);

    imageops::replace(frame, &blurred, rect.x as i64, rect.y as i64);
}

/// Copy out the part of `rect` that lies inside the frame.
/// Returns None when the rectangle has no overlap worth transforming.
fn crop_region(frame: &RgbImage, rect: &PixelRect) -> Option<RgbImage> {
    let (fw, fh) = frame.dimensions();
    if rect.x >= fw || rect.y >= fh || rect.width == 0 || rect.height == 0 {
        return None;
    }
    let w = rect.width.min(fw - rect.x);
    let h = rect.height.min(fh - rect.y);
    Some(imageops::crop_imm(frame, rect.x, rect.y, w, h).to_image())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient_frame(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]))
    }

    #[test]
    fn test_strength_validation() {
        assert!(TransformConfig::new(TransformKind::Mosaic, 15).is_ok());
        assert!(TransformConfig::new(TransformKind::Mosaic, 5).is_ok());
        assert!(TransformConfig::new(TransformKind::Blur, 50).is_ok());
        assert!(TransformConfig::new(TransformKind::Mosaic, 4).is_err());
        assert!(TransformConfig::new(TransformKind::Blur, 51).is_err());
    }

    #[test]
    fn test_pixelate_changes_only_region() {
        let mut frame = gradient_frame(100, 100);
        let original = frame.clone();
        let rect = PixelRect {
            x: 10,
            y: 10,
            width: 40,
            height: 40,
        };

        pixelate_region(&mut frame, &rect, 10);

        // Inside the region cells become uniform
        assert_ne!(frame.get_pixel(15, 15), original.get_pixel(15, 15));
        // Outside is untouched
        assert_eq!(frame.get_pixel(60, 60), original.get_pixel(60, 60));
        assert_eq!(frame.get_pixel(5, 5), original.get_pixel(5, 5));
    }

    #[test]
    fn test_pixelate_produces_blocks() {
        let mut frame = gradient_frame(100, 100);
        let rect = PixelRect {
            x: 0,
            y: 0,
            width: 40,
            height: 40,
        };

        pixelate_region(&mut frame, &rect, 10);

        // Pixels within one mosaic cell are identical
        assert_eq!(frame.get_pixel(1, 1), frame.get_pixel(8, 8));
    }

    #[test]
    fn test_blur_changes_region() {
        let mut frame = gradient_frame(100, 100);
        let original = frame.clone();
        let rect = PixelRect {
            x: 20,
            y: 20,
            width: 30,
            height: 30,
        };

        blur_region(&mut frame, &rect, 20);

        assert_eq!(frame.get_pixel(0, 0), original.get_pixel(0, 0));
        assert_eq!(frame.get_pixel(70, 70), original.get_pixel(70, 70));
    }

    #[test]
    fn test_degenerate_rects_are_noops() {
        let mut frame = gradient_frame(50, 50);
        let original = frame.clone();

        pixelate_region(
            &mut frame,
            &PixelRect {
                x: 60,
                y: 60,
                width: 10,
                height: 10,
            },
            10,
        );
        blur_region(
            &mut frame,
            &PixelRect {
                x: 0,
                y: 0,
                width: 0,
                height: 10,
            },
            10,
        );

        assert_eq!(frame, original);
    }

    #[test]
    fn test_region_overhanging_edge_is_clipped() {
        let mut frame = gradient_frame(50, 50);
        let rect = PixelRect {
            x: 40,
            y: 40,
            width: 30,
            height: 30,
        };

        // Must not panic; only the in-frame part is transformed
        pixelate_region(&mut frame, &rect, 10);
    }
}
