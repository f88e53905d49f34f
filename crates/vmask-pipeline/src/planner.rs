//! Request-to-plan mapping.
//!
//! Planning is a pure function boundary: a request plus the inspectable
//! tool schemas in, an ordered list of tool calls out. An LLM-backed
//! planner is an external collaborator behind the same trait; the crate
//! ships a deterministic heuristic so the pipeline's correctness never
//! depends on planner non-determinism.

use serde_json::{json, Value};

use crate::registry::ToolSchema;

/// Placeholder in planned arguments for a session id that only exists
/// once `create_annotation_session` has run.
pub const SESSION_PLACEHOLDER: &str = "$session";

/// What the user asked for, normalized by the CLI.
#[derive(Debug, Clone, Default)]
pub struct PlanRequest {
    /// Source video; required unless resuming a session
    pub video_path: Option<std::path::PathBuf>,
    /// Free-form description of what to obfuscate
    pub request_text: String,
    /// Inline shorthand annotations, when the caller already knows the boxes
    pub regions: Option<String>,
    /// Resume an existing session instead of sampling a new one
    pub session_id: Option<String>,
}

/// An ordered plan of tool calls.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCall {
    pub tool: String,
    pub args: Value,
}

impl PlannedCall {
    pub fn new(tool: impl Into<String>, args: Value) -> Self {
        Self {
            tool: tool.into(),
            args,
        }
    }
}

/// Maps a request to an ordered sequence of tool calls.
pub trait Planner: Send + Sync {
    fn plan(&self, request: &PlanRequest, tools: &[ToolSchema]) -> Vec<PlannedCall>;
}

/// Deterministic fallback planner.
///
/// Produces the standard sample -> annotate -> import -> render sequence,
/// stopping after session creation when no annotations are available yet
/// (the orchestrator then reports the session as awaiting annotation).
#[derive(Debug, Default)]
pub struct HeuristicPlanner;

impl Planner for HeuristicPlanner {
    fn plan(&self, request: &PlanRequest, _tools: &[ToolSchema]) -> Vec<PlannedCall> {
        let wants_blur = request.request_text.to_lowercase().contains("blur");
        let render_args = |session: &str| {
            if wants_blur {
                json!({ "session_id": session, "blur": true })
            } else {
                json!({ "session_id": session })
            }
        };

        match (&request.session_id, &request.regions) {
            // Resume: annotate further and/or render what is there.
            (Some(session_id), Some(regions)) => vec![
                PlannedCall::new(
                    "import_regions",
                    json!({ "session_id": session_id, "regions": regions }),
                ),
                PlannedCall::new("apply_mosaic", render_args(session_id)),
            ],
            (Some(session_id), None) => {
                vec![PlannedCall::new("apply_mosaic", render_args(session_id))]
            }
            // Fresh video with known boxes: full run in one shot.
            (None, Some(regions)) => vec![
                PlannedCall::new(
                    "create_annotation_session",
                    json!({
                        "video_path": request.video_path,
                        "target_description": request.request_text,
                    }),
                ),
                PlannedCall::new(
                    "import_regions",
                    json!({ "session_id": SESSION_PLACEHOLDER, "regions": regions }),
                ),
                PlannedCall::new("apply_mosaic", render_args(SESSION_PLACEHOLDER)),
            ],
            // Fresh video, no annotations: stop after keyframe export.
            (None, None) => vec![PlannedCall::new(
                "create_annotation_session",
                json!({
                    "video_path": request.video_path,
                    "target_description": request.request_text,
                }),
            )],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(plan: &[PlannedCall]) -> Vec<&str> {
        plan.iter().map(|c| c.tool.as_str()).collect()
    }

    #[test]
    fn test_fresh_video_stops_at_session() {
        let request = PlanRequest {
            video_path: Some("clip.mp4".into()),
            request_text: "mask the phone screen".to_string(),
            ..Default::default()
        };
        let plan = HeuristicPlanner.plan(&request, &[]);
        assert_eq!(names(&plan), vec!["create_annotation_session"]);
        assert_eq!(plan[0].args["target_description"], "mask the phone screen");
    }

    #[test]
    fn test_shorthand_runs_full_pipeline() {
        let request = PlanRequest {
            video_path: Some("clip.mp4".into()),
            request_text: "mask the phone".to_string(),
            regions: Some("0:1,1,5,5".to_string()),
            ..Default::default()
        };
        let plan = HeuristicPlanner.plan(&request, &[]);
        assert_eq!(
            names(&plan),
            vec!["create_annotation_session", "import_regions", "apply_mosaic"]
        );
        assert_eq!(plan[1].args["session_id"], SESSION_PLACEHOLDER);
        assert_eq!(plan[2].args["session_id"], SESSION_PLACEHOLDER);
    }

    #[test]
    fn test_resume_session() {
        let request = PlanRequest {
            request_text: String::new(),
            session_id: Some("abc12345".to_string()),
            ..Default::default()
        };
        let plan = HeuristicPlanner.plan(&request, &[]);
        assert_eq!(names(&plan), vec!["apply_mosaic"]);
        assert_eq!(plan[0].args["session_id"], "abc12345");
    }

    #[test]
    fn test_blur_request_sets_blur() {
        let request = PlanRequest {
            request_text: "please BLUR the face".to_string(),
            session_id: Some("abc12345".to_string()),
            ..Default::default()
        };
        let plan = HeuristicPlanner.plan(&request, &[]);
        assert_eq!(plan[0].args["blur"], true);
    }
}
