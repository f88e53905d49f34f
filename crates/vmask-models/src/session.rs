//! Annotation session lifecycle and persisted document.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::keyframe::KeyFrameMeta;
use crate::region::Region;

/// Labeling progress for a session.
///
/// Transitions only move forward: `Pending -> Partial -> Complete`. A session
/// may stay `Partial` indefinitely; partial sessions are valid tracker input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No annotations received yet
    Pending,
    /// At least one keyframe annotated
    Partial,
    /// Every produced keyframe explicitly annotated (possibly with zero targets)
    Complete,
}

impl SessionStatus {
    fn rank(self) -> u8 {
        match self {
            SessionStatus::Pending => 0,
            SessionStatus::Partial => 1,
            SessionStatus::Complete => 2,
        }
    }

    /// Forward-only transition: returns the more advanced of the two states.
    pub fn promote_to(self, next: SessionStatus) -> SessionStatus {
        if next.rank() > self.rank() {
            next
        } else {
            self
        }
    }
}

/// The persisted, resumable unit of labeling work for one video.
///
/// Mutated only by region imports and explicit merges; destroyed only by
/// explicit cleanup so the annotation surface can always resume it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationSession {
    /// Opaque unique identifier (directory name in the session store)
    pub session_id: String,
    /// Source video this session annotates
    pub video_path: PathBuf,
    /// What the annotator is looking for, verbatim from the user request
    pub target_description: String,
    pub created_at: DateTime<Utc>,
    pub status: SessionStatus,
    /// Keyframes produced by the sampler, in frame order
    pub keyframes: Vec<KeyFrameMeta>,
    /// Annotations per keyframe index. An entry with an empty list means
    /// "annotated, zero targets", which is distinct from a missing entry.
    pub regions_by_keyframe: BTreeMap<u64, Vec<Region>>,
}

impl AnnotationSession {
    /// Fresh session with no keyframes or annotations yet.
    pub fn new(
        session_id: impl Into<String>,
        video_path: impl Into<PathBuf>,
        target_description: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            video_path: video_path.into(),
            target_description: target_description.into(),
            created_at: Utc::now(),
            status: SessionStatus::Pending,
            keyframes: Vec::new(),
            regions_by_keyframe: BTreeMap::new(),
        }
    }

    /// Keyframe indices produced by the sampler.
    pub fn keyframe_indices(&self) -> Vec<u64> {
        self.keyframes.iter().map(|k| k.frame_index).collect()
    }

    /// Whether the sampler produced a keyframe at `frame_index`.
    pub fn has_keyframe(&self, frame_index: u64) -> bool {
        self.keyframes.iter().any(|k| k.frame_index == frame_index)
    }

    /// Total number of regions across all annotated keyframes.
    pub fn region_count(&self) -> usize {
        self.regions_by_keyframe.values().map(Vec::len).sum()
    }

    /// Recompute status from annotation coverage, never regressing.
    pub fn refresh_status(&mut self) {
        let computed = if self.regions_by_keyframe.is_empty() {
            SessionStatus::Pending
        } else if self
            .keyframes
            .iter()
            .all(|k| self.regions_by_keyframe.contains_key(&k.frame_index))
        {
            SessionStatus::Complete
        } else {
            SessionStatus::Partial
        };
        self.status = self.status.promote_to(computed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_keyframes(indices: &[u64]) -> AnnotationSession {
        AnnotationSession {
            session_id: "abc12345".to_string(),
            video_path: PathBuf::from("video.mp4"),
            target_description: "phone".to_string(),
            created_at: Utc::now(),
            status: SessionStatus::Pending,
            keyframes: indices
                .iter()
                .map(|&i| KeyFrameMeta {
                    frame_index: i,
                    timestamp: i as f64 / 30.0,
                    image_file: format!("kf_{i:06}.png"),
                })
                .collect(),
            regions_by_keyframe: BTreeMap::new(),
        }
    }

    #[test]
    fn test_status_progression() {
        let mut session = session_with_keyframes(&[0, 30, 89]);
        session.refresh_status();
        assert_eq!(session.status, SessionStatus::Pending);

        session
            .regions_by_keyframe
            .insert(0, vec![Region::new(0, 1.0, 1.0, 5.0, 5.0)]);
        session.refresh_status();
        assert_eq!(session.status, SessionStatus::Partial);

        // Explicit empty lists count as annotated.
        session.regions_by_keyframe.insert(30, Vec::new());
        session.regions_by_keyframe.insert(89, Vec::new());
        session.refresh_status();
        assert_eq!(session.status, SessionStatus::Complete);
    }

    #[test]
    fn test_status_never_regresses() {
        let mut session = session_with_keyframes(&[0, 89]);
        session.status = SessionStatus::Partial;
        session.refresh_status();
        assert_eq!(session.status, SessionStatus::Partial);
    }

    #[test]
    fn test_promote_to() {
        assert_eq!(
            SessionStatus::Partial.promote_to(SessionStatus::Pending),
            SessionStatus::Partial
        );
        assert_eq!(
            SessionStatus::Partial.promote_to(SessionStatus::Complete),
            SessionStatus::Complete
        );
    }
}
