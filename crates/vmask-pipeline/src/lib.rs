//! Tool registry, planning and orchestration for the videomask pipeline.
//!
//! The pipeline's stages (probe, sample, annotate, import, render) are
//! exposed as typed tools in an explicit capability table; a planner maps
//! the user's request to an ordered sequence of tool calls; the
//! orchestrator executes the sequence with a resumable stop at the
//! annotation boundary.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod planner;
pub mod registry;
pub mod tools;

pub use config::PipelineConfig;
pub use error::{PipelineResult, ToolExecutionError};
pub use orchestrator::{PipelineOrchestrator, PipelineOutcome};
pub use planner::{HeuristicPlanner, PlanRequest, PlannedCall, Planner};
pub use registry::{ToolContext, ToolRegistry, ToolSchema};
pub use tools::builtin_registry;
