//! Pipeline orchestration.
//!
//! Executes a planned sequence of tool calls, threading the session id
//! created mid-run into later steps. A run that ends without rendering is
//! not a failure: it parked at the annotation boundary and reports how to
//! resume.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::error::{PipelineResult, ToolExecutionError};
use crate::planner::{PlanRequest, Planner, SESSION_PLACEHOLDER};
use crate::registry::{ToolContext, ToolRegistry};

/// Terminal state of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Keyframes are exported and waiting for the annotation surface.
    AwaitingAnnotation {
        session_id: String,
        session_dir: PathBuf,
        instructions: String,
    },
    /// The obfuscated video was rendered.
    Completed {
        session_id: Option<String>,
        output_path: PathBuf,
    },
}

/// Sequences planner output over the tool registry.
pub struct PipelineOrchestrator {
    registry: Arc<ToolRegistry>,
    planner: Box<dyn Planner>,
    ctx: Arc<ToolContext>,
}

impl PipelineOrchestrator {
    pub fn new(
        registry: Arc<ToolRegistry>,
        planner: Box<dyn Planner>,
        ctx: Arc<ToolContext>,
    ) -> Self {
        Self {
            registry,
            planner,
            ctx,
        }
    }

    /// Run one request to its terminal state.
    ///
    /// Stage failures abort the run; durable session state written by
    /// earlier steps survives, so a failed or cancelled render never loses
    /// annotation progress.
    pub async fn run(&self, request: PlanRequest) -> PipelineResult<PipelineOutcome> {
        let plan = self.planner.plan(&request, &self.registry.schemas());
        if plan.is_empty() {
            return Err(ToolExecutionError::Internal(
                "planner produced an empty plan".to_string(),
            ));
        }
        info!(steps = plan.len(), "Planned pipeline run");

        let mut session_id = request.session_id.clone();
        let mut session_dir: Option<PathBuf> = None;
        let mut output_path: Option<PathBuf> = None;

        for call in plan {
            if *self.ctx.cancel_rx.borrow() {
                return Err(ToolExecutionError::Cancelled);
            }

            let args = resolve_session(call.args, session_id.as_deref())?;
            info!(tool = %call.tool, "Running pipeline step");
            let result = self.registry.execute(self.ctx.clone(), &call.tool, args).await?;

            if let Some(id) = result.get("session_id").and_then(Value::as_str) {
                session_id = Some(id.to_string());
            }
            if let Some(dir) = result.get("session_dir").and_then(Value::as_str) {
                session_dir = Some(PathBuf::from(dir));
            }
            if let Some(path) = result.get("output_path").and_then(Value::as_str) {
                output_path = Some(PathBuf::from(path));
            }
        }

        match (output_path, session_id) {
            (Some(output_path), session_id) => Ok(PipelineOutcome::Completed {
                session_id,
                output_path,
            }),
            (None, Some(session_id)) => {
                let session_dir = session_dir
                    .unwrap_or_else(|| self.ctx.sessions.store().session_dir(&session_id));
                let instructions = format!(
                    "Annotate the keyframe images in {} (or use the shorthand grammar), then \
                     re-run with --session {} --regions '<kf:x,y,w,h; ...>' to render.",
                    session_dir.display(),
                    session_id
                );
                Ok(PipelineOutcome::AwaitingAnnotation {
                    session_id,
                    session_dir,
                    instructions,
                })
            }
            (None, None) => Err(ToolExecutionError::Internal(
                "plan finished without a session or an output".to_string(),
            )),
        }
    }
}

/// Replace the session placeholder in planned arguments with the id of the
/// session created earlier in the run.
fn resolve_session(args: Value, session_id: Option<&str>) -> PipelineResult<Value> {
    match args {
        Value::String(s) if s == SESSION_PLACEHOLDER => match session_id {
            Some(id) => Ok(Value::String(id.to_string())),
            None => Err(ToolExecutionError::Internal(
                "plan references a session before one was created".to_string(),
            )),
        },
        Value::Object(map) => {
            let mut resolved = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                resolved.insert(key, resolve_session(value, session_id)?);
            }
            Ok(Value::Object(resolved))
        }
        Value::Array(items) => items
            .into_iter()
            .map(|v| resolve_session(v, session_id))
            .collect::<PipelineResult<Vec<_>>>()
            .map(Value::Array),
        other => Ok(other),
    }
}
