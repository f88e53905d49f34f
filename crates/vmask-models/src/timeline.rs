//! Dense per-frame region timeline.

use serde::{Deserialize, Serialize};

use crate::region::Region;

/// The fully expanded, per-frame region mapping that drives compositing.
///
/// Invariant: spans exactly the decoded frame count of the source video,
/// every frame index present, each mapped to a (possibly empty) ordered
/// region list. Built fresh per compositor run and never persisted; it is
/// regenerable from the session plus video metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DenseRegionTimeline {
    frames: Vec<Vec<Region>>,
}

impl DenseRegionTimeline {
    /// Create an all-empty timeline spanning `frame_count` frames.
    pub fn new(frame_count: u64) -> Self {
        Self {
            frames: vec![Vec::new(); frame_count as usize],
        }
    }

    /// Number of frames spanned.
    pub fn frame_count(&self) -> u64 {
        self.frames.len() as u64
    }

    /// Regions for one frame; empty slice past the end.
    pub fn regions_at(&self, frame_index: u64) -> &[Region] {
        self.frames
            .get(frame_index as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Append regions to a frame, ignoring out-of-range indices.
    pub fn push_regions(&mut self, frame_index: u64, regions: impl IntoIterator<Item = Region>) {
        if let Some(slot) = self.frames.get_mut(frame_index as usize) {
            slot.extend(regions);
        }
    }

    /// True when no frame carries any region (compositing is a pass-through).
    pub fn is_empty(&self) -> bool {
        self.frames.iter().all(Vec::is_empty)
    }

    /// Iterate `(frame_index, regions)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &[Region])> {
        self.frames
            .iter()
            .enumerate()
            .map(|(i, r)| (i as u64, r.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_and_emptiness() {
        let mut t = DenseRegionTimeline::new(90);
        assert_eq!(t.frame_count(), 90);
        assert!(t.is_empty());

        t.push_regions(10, [Region::new(10, 0.0, 0.0, 5.0, 5.0)]);
        assert!(!t.is_empty());
        assert_eq!(t.regions_at(10).len(), 1);
        assert!(t.regions_at(11).is_empty());
        assert!(t.regions_at(500).is_empty());
    }

    #[test]
    fn test_out_of_range_push_ignored() {
        let mut t = DenseRegionTimeline::new(2);
        t.push_regions(5, [Region::new(5, 0.0, 0.0, 1.0, 1.0)]);
        assert!(t.is_empty());
    }
}
