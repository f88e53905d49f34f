//! Sparse-to-dense region expansion.
//!
//! Turns the per-keyframe annotations of a session into a region list for
//! every frame of the video. Labeled regions interpolate linearly between
//! keyframes that both carry the label; an annotated keyframe without the
//! label is an absence boundary, so the last present box is held up to it
//! and nothing is emitted past it. Unlabeled regions have no cross-frame
//! identity and only ever hold from the nearest annotated keyframe.

use tracing::debug;

use vmask_models::{AnnotationSession, DenseRegionTimeline, Region};

/// Expand a session's sparse annotations into a dense timeline covering
/// exactly `total_frames` frames. Pure and deterministic; a session with
/// zero annotated keyframes expands to an all-empty timeline.
pub fn expand(session: &AnnotationSession, total_frames: u64) -> DenseRegionTimeline {
    let mut timeline = DenseRegionTimeline::new(total_frames);

    let annotated: Vec<u64> = session.regions_by_keyframe.keys().copied().collect();
    if annotated.is_empty() || total_frames == 0 {
        return timeline;
    }

    // First-appearance label order keeps per-frame union ordering stable.
    let mut labels: Vec<&str> = Vec::new();
    for regions in session.regions_by_keyframe.values() {
        for region in regions {
            if let Some(label) = region.label.as_deref() {
                if !labels.contains(&label) {
                    labels.push(label);
                }
            }
        }
    }

    debug!(
        session_id = %session.session_id,
        annotated_keyframes = annotated.len(),
        labels = labels.len(),
        total_frames,
        "Expanding sparse annotations"
    );

    for label in &labels {
        expand_label(session, &annotated, label, total_frames, &mut timeline);
    }
    expand_unlabeled(session, &annotated, total_frames, &mut timeline);

    timeline
}

/// Per-label expansion. Every annotated keyframe is a boundary: present if
/// it carries at least one box with this label, absent otherwise.
fn expand_label(
    session: &AnnotationSession,
    annotated: &[u64],
    label: &str,
    total_frames: u64,
    timeline: &mut DenseRegionTimeline,
) {
    let boundaries: Vec<(u64, Vec<&Region>)> = annotated
        .iter()
        .map(|&kf| {
            let boxes = session.regions_by_keyframe[&kf]
                .iter()
                .filter(|r| r.label.as_deref() == Some(label))
                .collect();
            (kf, boxes)
        })
        .collect();

    // Boundary frames carry their own annotations verbatim.
    for (kf, boxes) in &boundaries {
        timeline.push_regions(*kf, boxes.iter().map(|r| r.held_at(*kf)));
    }

    // Leading hold up to the first boundary, if it is present.
    if let Some((first_kf, first_boxes)) = boundaries.first() {
        if !first_boxes.is_empty() {
            for frame in 0..(*first_kf).min(total_frames) {
                timeline.push_regions(frame, first_boxes.iter().map(|r| r.held_at(frame)));
            }
        }
    }

    for pair in boundaries.windows(2) {
        let (a_kf, a_boxes) = &pair[0];
        let (b_kf, b_boxes) = &pair[1];

        if a_boxes.is_empty() {
            // Absent start: nothing strictly between, regardless of the end.
            continue;
        }

        let end = (*b_kf).min(total_frames);
        if b_boxes.is_empty() {
            // Present -> absent: hold the present boxes up to the absence.
            for frame in (a_kf + 1)..end {
                timeline.push_regions(frame, a_boxes.iter().map(|r| r.held_at(frame)));
            }
        } else {
            // Present -> present: pairwise interpolation over the shared count.
            let span = (b_kf - a_kf) as f64;
            let n = a_boxes.len().min(b_boxes.len());
            for frame in (a_kf + 1)..end {
                let t = (frame - a_kf) as f64 / span;
                timeline.push_regions(
                    frame,
                    (0..n).map(|i| Region::lerp(a_boxes[i], b_boxes[i], t, frame)),
                );
            }
        }
    }

    // Trailing hold after the last boundary, if it is present.
    if let Some((last_kf, last_boxes)) = boundaries.last() {
        if !last_boxes.is_empty() {
            for frame in (last_kf + 1)..total_frames {
                timeline.push_regions(frame, last_boxes.iter().map(|r| r.held_at(frame)));
            }
        }
    }
}

/// Unlabeled regions hold from the nearest annotated keyframe only.
/// Distance ties resolve toward the earlier keyframe.
fn expand_unlabeled(
    session: &AnnotationSession,
    annotated: &[u64],
    total_frames: u64,
    timeline: &mut DenseRegionTimeline,
) {
    let unlabeled: Vec<(u64, Vec<&Region>)> = annotated
        .iter()
        .map(|&kf| {
            let boxes = session.regions_by_keyframe[&kf]
                .iter()
                .filter(|r| r.label.is_none())
                .collect();
            (kf, boxes)
        })
        .collect();

    if unlabeled.iter().all(|(_, boxes)| boxes.is_empty()) {
        return;
    }

    for frame in 0..total_frames {
        let nearest = nearest_keyframe(annotated, frame);
        let (_, boxes) = &unlabeled[nearest];
        if !boxes.is_empty() {
            timeline.push_regions(frame, boxes.iter().map(|r| r.held_at(frame)));
        }
    }
}

/// Position within `annotated` of the keyframe nearest to `frame`.
fn nearest_keyframe(annotated: &[u64], frame: u64) -> usize {
    let pos = annotated.partition_point(|&kf| kf <= frame);
    if pos == 0 {
        return 0;
    }
    if pos == annotated.len() {
        return pos - 1;
    }
    let before = annotated[pos - 1];
    let after = annotated[pos];
    if frame - before <= after - frame {
        pos - 1
    } else {
        pos
    }
}
