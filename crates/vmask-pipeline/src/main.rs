//! Video object-masking pipeline binary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vmask_media::transform::TransformKind;
use vmask_pipeline::{
    builtin_registry, HeuristicPlanner, PipelineConfig, PipelineOrchestrator, PipelineOutcome,
    PlanRequest, ToolContext,
};

/// Mask or blur objects in a video from sparse keyframe annotations.
#[derive(Debug, Parser)]
#[command(name = "vmask", version, about)]
struct Cli {
    /// Source video to process
    #[arg(long)]
    video: Option<PathBuf>,

    /// What to obfuscate, in plain language (stored with the session)
    #[arg(long, default_value = "the target object")]
    request: String,

    /// Inline annotations: "kf:x,y,w,h; kf:x,y,w,h@label; ..."
    #[arg(long)]
    regions: Option<String>,

    /// Resume an existing annotation session by id
    #[arg(long)]
    session: Option<String>,

    /// Print the tool capability table as JSON and exit
    #[arg(long)]
    list_tools: bool,

    /// List stored annotation sessions and exit
    #[arg(long)]
    list_sessions: bool,

    /// Keep per-run intermediate files for debugging
    #[arg(long)]
    keep_intermediates: bool,

    /// Transform strength (5..=50)
    #[arg(long)]
    strength: Option<u32>,

    /// Use gaussian blur instead of mosaic
    #[arg(long)]
    blur: bool,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let mut config = PipelineConfig::from_env();
    if let Some(strength) = cli.strength {
        config.strength = strength;
    }
    if cli.blur {
        config.transform_kind = TransformKind::Blur;
    }
    if cli.keep_intermediates {
        config.keep_intermediates = true;
    }

    if config.worker_threads > 0 {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .build_global()
        {
            error!("Failed to size the transform thread pool: {}", e);
        }
    }

    let registry = Arc::new(builtin_registry());

    if cli.list_tools {
        match serde_json::to_string_pretty(&registry.schemas()) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                error!("Failed to render tool schemas: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let ctx = Arc::new(ToolContext::new(config, cancel_rx));

    // Ctrl-C flips the cancellation watch; stages abort at their next check.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal, cancelling run");
        let _ = cancel_tx.send(true);
    });

    if cli.list_sessions {
        list_sessions(&ctx, &registry).await;
        return;
    }

    if cli.video.is_none() && cli.session.is_none() {
        error!("Nothing to do: pass --video to start or --session to resume");
        std::process::exit(2);
    }

    let request = PlanRequest {
        video_path: cli.video,
        request_text: cli.request,
        regions: cli.regions,
        session_id: cli.session,
    };

    let orchestrator =
        PipelineOrchestrator::new(registry, Box::new(HeuristicPlanner), ctx);

    match orchestrator.run(request).await {
        Ok(PipelineOutcome::Completed {
            output_path,
            session_id,
        }) => {
            if let Some(session_id) = session_id {
                info!(%session_id, "Render complete");
            }
            println!("{}", output_path.display());
        }
        Ok(PipelineOutcome::AwaitingAnnotation {
            session_id,
            session_dir,
            instructions,
        }) => {
            info!(%session_id, session_dir = %session_dir.display(), "Awaiting annotation");
            println!("{instructions}");
        }
        Err(e) => {
            error!("Pipeline run failed: {}", e);
            if let Some(suggestion) = e.suggestion() {
                eprintln!("hint: {suggestion}");
            }
            std::process::exit(1);
        }
    }
}

async fn list_sessions(ctx: &Arc<ToolContext>, registry: &Arc<vmask_pipeline::ToolRegistry>) {
    match registry
        .execute(
            ctx.clone(),
            "list_annotation_sessions",
            serde_json::json!({}),
        )
        .await
    {
        Ok(result) => match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                error!("Failed to render session list: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!("Failed to list sessions: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vmask=info,warn"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}
