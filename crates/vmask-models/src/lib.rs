//! Shared data models for the videomask pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Keyframes selected for annotation
//! - Annotation regions and clamped pixel rectangles
//! - Annotation sessions and their lifecycle
//! - The dense per-frame region timeline
//! - The region export wire contract (JSON document + manual shorthand)

pub mod export;
pub mod keyframe;
pub mod region;
pub mod session;
pub mod timeline;

// Re-export common types
pub use export::{ExportRegion, RegionExport, ShorthandError};
pub use keyframe::{KeyFrame, KeyFrameMeta, SelectionReason};
pub use region::{PixelRect, Region};
pub use session::{AnnotationSession, SessionStatus};
pub use timeline::DenseRegionTimeline;
