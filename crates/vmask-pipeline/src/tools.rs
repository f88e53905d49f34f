//! Built-in pipeline tools.
//!
//! Each tool validates its own arguments and returns a JSON result; none
//! of them assume upstream validation or retry on failure.

use std::path::PathBuf;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::error::{PipelineResult, ToolExecutionError};
use crate::registry::{tool, ToolContext, ToolRegistry};
use vmask_media::transform::{TransformConfig, TransformKind};
use vmask_media::{probe_video, Compositor, FrameSampler};
use vmask_models::RegionExport;
use vmask_session::AnnotationError;

/// The standard tool set, built once at startup.
pub fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(tool::<ProbeVideoParams, _, _>(
        "probe_video",
        "Inspect a video file: dimensions, duration, frame rate, frame count, codec, audio",
        probe_video_tool,
    ));
    registry.register(tool::<ExtractKeyframesParams, _, _>(
        "extract_keyframes",
        "Sample motion-aware keyframes from a video and write them as PNG files",
        extract_keyframes_tool,
    ));
    registry.register(tool::<CreateSessionParams, _, _>(
        "create_annotation_session",
        "Sample keyframes and open a resumable annotation session for them",
        create_session_tool,
    ));
    registry.register(tool::<ListSessionsParams, _, _>(
        "list_annotation_sessions",
        "List stored annotation sessions, newest first",
        list_sessions_tool,
    ));
    registry.register(tool::<LoadSessionParams, _, _>(
        "load_annotation_session",
        "Load a stored annotation session by id",
        load_session_tool,
    ));
    registry.register(tool::<ImportRegionsParams, _, _>(
        "import_regions",
        "Merge a region export (JSON file or kf:x,y,w,h shorthand) into a session",
        import_regions_tool,
    ));
    registry.register(tool::<ApplyMosaicParams, _, _>(
        "apply_mosaic",
        "Expand a session's annotations to every frame and render the obfuscated video",
        apply_mosaic_tool,
    ));
    registry
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ProbeVideoParams {
    /// Path to the source video
    pub video_path: PathBuf,
}

async fn probe_video_tool(_ctx: Arc<ToolContext>, params: ProbeVideoParams) -> PipelineResult<Value> {
    let info = probe_video(&params.video_path).await?;
    to_json(&info)
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExtractKeyframesParams {
    /// Path to the source video
    pub video_path: PathBuf,
    /// Directory for the keyframe images; defaults to
    /// `<output_dir>/keyframes/<video_stem>`
    pub frames_dir: Option<PathBuf>,
}

async fn extract_keyframes_tool(
    ctx: Arc<ToolContext>,
    params: ExtractKeyframesParams,
) -> PipelineResult<Value> {
    let frames_dir = params.frames_dir.unwrap_or_else(|| {
        ctx.config
            .output_dir
            .join("keyframes")
            .join(file_stem(&params.video_path))
    });

    let sampler = FrameSampler::new(ctx.config.sampler_config())?;
    let keyframes = sampler.sample(&params.video_path, &frames_dir).await?;

    Ok(json!({
        "frames_dir": frames_dir,
        "keyframes": serde_json::to_value(&keyframes).map_err(internal)?,
    }))
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateSessionParams {
    /// Path to the source video
    pub video_path: PathBuf,
    /// What the annotator should look for, verbatim from the user request
    pub target_description: String,
}

async fn create_session_tool(
    ctx: Arc<ToolContext>,
    params: CreateSessionParams,
) -> PipelineResult<Value> {
    tokio::fs::create_dir_all(&ctx.config.work_dir).await?;
    let scratch = tempfile::Builder::new()
        .prefix("vmask-kf-")
        .tempdir_in(&ctx.config.work_dir)?;

    let sampler = FrameSampler::new(ctx.config.sampler_config())?;
    let keyframes = sampler.sample(&params.video_path, scratch.path()).await?;

    let session = ctx
        .sessions
        .create(&params.video_path, &params.target_description, &keyframes)
        .await?;

    Ok(json!({
        "session_id": session.session_id,
        "session_dir": ctx.sessions.store().session_dir(&session.session_id),
        "status": session.status,
        "keyframes": session.keyframes,
    }))
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ListSessionsParams {}

async fn list_sessions_tool(
    ctx: Arc<ToolContext>,
    _params: ListSessionsParams,
) -> PipelineResult<Value> {
    let sessions = ctx.sessions.list().await?;
    let rows: Vec<Value> = sessions
        .iter()
        .map(|s| {
            json!({
                "session_id": s.session_id,
                "video_path": s.video_path,
                "target_description": s.target_description,
                "created_at": s.created_at,
                "status": s.status,
                "keyframes": s.keyframes.len(),
                "annotated_keyframes": s.regions_by_keyframe.len(),
            })
        })
        .collect();
    Ok(json!({ "sessions": rows }))
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LoadSessionParams {
    pub session_id: String,
}

async fn load_session_tool(
    ctx: Arc<ToolContext>,
    params: LoadSessionParams,
) -> PipelineResult<Value> {
    let session = ctx.sessions.load(&params.session_id).await?;
    to_json(&session)
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ImportRegionsParams {
    pub session_id: String,
    /// JSON region export file written by the annotation surface
    pub regions_file: Option<PathBuf>,
    /// Inline shorthand: `kf:x,y,w,h; kf:x,y,w,h@label; ...`
    pub regions: Option<String>,
}

async fn import_regions_tool(
    ctx: Arc<ToolContext>,
    params: ImportRegionsParams,
) -> PipelineResult<Value> {
    let export = match (&params.regions_file, &params.regions) {
        (Some(path), None) => {
            let json = tokio::fs::read_to_string(path).await?;
            RegionExport::from_json(&json)
                .map_err(|e| AnnotationError::MalformedExport(e.to_string()))?
        }
        (None, Some(shorthand)) => RegionExport::parse_shorthand(shorthand)
            .map_err(AnnotationError::from)?,
        _ => {
            return Err(ToolExecutionError::invalid_arguments(
                "import_regions",
                "exactly one of regions_file or regions is required",
            ))
        }
    };

    let summary = ctx.sessions.import_regions(&params.session_id, &export).await?;
    let session = ctx.sessions.load(&params.session_id).await?;

    Ok(json!({
        "session_id": params.session_id,
        "summary": summary,
        "status": session.status,
    }))
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ApplyMosaicParams {
    pub session_id: String,
    /// Rendered video path; defaults to `<output_dir>/<video_stem>_masked.mp4`
    pub output_path: Option<PathBuf>,
    /// Transform strength override (5..=50)
    pub strength: Option<u32>,
    /// Use gaussian blur instead of mosaic
    pub blur: Option<bool>,
}

async fn apply_mosaic_tool(
    ctx: Arc<ToolContext>,
    params: ApplyMosaicParams,
) -> PipelineResult<Value> {
    let session = ctx.sessions.load(&params.session_id).await?;
    let info = probe_video(&session.video_path).await?;

    let timeline = vmask_media::tracker::expand(&session, info.frame_count);
    if timeline.is_empty() {
        info!(
            session_id = %session.session_id,
            "Session has no annotations; rendering a pass-through copy"
        );
    }

    let kind = match params.blur {
        Some(true) => TransformKind::Blur,
        Some(false) => TransformKind::Mosaic,
        None => ctx.config.transform_kind,
    };
    let transform = TransformConfig {
        kind,
        strength: params.strength.unwrap_or(ctx.config.strength),
    };

    let output_path = params.output_path.unwrap_or_else(|| {
        ctx.config
            .output_dir
            .join(format!("{}_masked.mp4", file_stem(&session.video_path)))
    });

    let compositor = Compositor::new(transform, ctx.config.encode_timeout_secs)?
        .with_cancel(ctx.cancel_rx.clone())
        .with_keep_intermediates(ctx.config.keep_intermediates);
    let rendered = compositor
        .apply(&session.video_path, &timeline, &output_path)
        .await?;

    Ok(json!({
        "session_id": session.session_id,
        "output_path": rendered,
        "frame_count": info.frame_count,
        "annotated_keyframes": session.regions_by_keyframe.len(),
        "transform": transform,
    }))
}

fn file_stem(path: &std::path::Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

fn to_json<T: Serialize>(value: &T) -> PipelineResult<Value> {
    serde_json::to_value(value).map_err(internal)
}

fn internal(e: serde_json::Error) -> ToolExecutionError {
    ToolExecutionError::Internal(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use tokio::sync::watch;

    fn ctx_in(dir: &tempfile::TempDir) -> (Arc<ToolContext>, watch::Sender<bool>) {
        let config = PipelineConfig {
            sessions_dir: dir.path().join("sessions"),
            output_dir: dir.path().join("output"),
            work_dir: dir.path().join("work"),
            ..Default::default()
        };
        let (tx, rx) = watch::channel(false);
        (Arc::new(ToolContext::new(config, rx)), tx)
    }

    #[test]
    fn test_builtin_registry_names() {
        let registry = builtin_registry();
        assert_eq!(
            registry.names(),
            vec![
                "apply_mosaic",
                "create_annotation_session",
                "extract_keyframes",
                "import_regions",
                "list_annotation_sessions",
                "load_annotation_session",
                "probe_video",
            ]
        );
    }

    #[test]
    fn test_schemas_render() {
        let registry = builtin_registry();
        for schema in registry.schemas() {
            let rendered = serde_json::to_value(&schema.parameters).unwrap();
            assert!(rendered.is_object(), "schema for {} not an object", schema.name);
        }
    }

    #[tokio::test]
    async fn test_import_regions_requires_one_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let (ctx, _cancel) = ctx_in(&dir);
        let registry = builtin_registry();

        let err = registry
            .execute(
                ctx.clone(),
                "import_regions",
                json!({ "session_id": "abc12345" }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolExecutionError::InvalidArguments { .. }));

        let err = registry
            .execute(
                ctx,
                "import_regions",
                json!({
                    "session_id": "abc12345",
                    "regions": "0:1,1,5,5",
                    "regions_file": "/tmp/r.json",
                }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolExecutionError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_import_regions_unknown_session() {
        let dir = tempfile::TempDir::new().unwrap();
        let (ctx, _cancel) = ctx_in(&dir);
        let registry = builtin_registry();

        let err = registry
            .execute(
                ctx,
                "import_regions",
                json!({ "session_id": "deadbeef", "regions": "0:1,1,5,5" }),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ToolExecutionError::Annotation(AnnotationError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_sessions_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let (ctx, _cancel) = ctx_in(&dir);
        let registry = builtin_registry();

        let result = registry
            .execute(ctx, "list_annotation_sessions", json!({}))
            .await
            .unwrap();
        assert_eq!(result["sessions"], json!([]));
    }
}
