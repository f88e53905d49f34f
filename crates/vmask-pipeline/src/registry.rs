//! Explicit tool capability table.
//!
//! Every pipeline stage is exposed as a named tool with a typed parameter
//! schema and an async handler. The table is built once at startup and
//! passed by reference, so the available tool set is statically
//! inspectable and there is no hidden global registration.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use schemars::gen::SchemaGenerator;
use schemars::schema::RootSchema;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::{PipelineResult, ToolExecutionError};
use vmask_session::{FsSessionStore, SessionManager};

/// Shared state handed to every tool invocation.
pub struct ToolContext {
    pub config: PipelineConfig,
    pub sessions: SessionManager,
    pub cancel_rx: watch::Receiver<bool>,
}

impl ToolContext {
    pub fn new(config: PipelineConfig, cancel_rx: watch::Receiver<bool>) -> Self {
        let store = FsSessionStore::new(&config.sessions_dir);
        Self {
            config,
            sessions: SessionManager::new(Arc::new(store)),
            cancel_rx,
        }
    }
}

/// Inspectable description of one tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: RootSchema,
}

type ToolFuture = Pin<Box<dyn Future<Output = PipelineResult<Value>> + Send>>;
type ToolHandler = Arc<dyn Fn(Arc<ToolContext>, Value) -> ToolFuture + Send + Sync>;

/// One named capability: schema plus handler.
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: RootSchema,
    handler: ToolHandler,
}

/// Build a descriptor from a typed async handler. Argument deserialization
/// into `P` happens before the handler runs; a mismatch is
/// `ToolExecutionError::InvalidArguments`, never a handler panic.
pub fn tool<P, H, Fut>(name: &'static str, description: &'static str, handler: H) -> ToolDescriptor
where
    P: JsonSchema + DeserializeOwned + Send + 'static,
    H: Fn(Arc<ToolContext>, P) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = PipelineResult<Value>> + Send + 'static,
{
    let parameters = SchemaGenerator::default().into_root_schema_for::<P>();
    ToolDescriptor {
        name,
        description,
        parameters,
        handler: Arc::new(move |ctx, args| {
            let handler = handler.clone();
            Box::pin(async move {
                let params: P = parse_args(name, args)?;
                handler(ctx, params).await
            })
        }),
    }
}

/// Deserialize tool arguments into their typed parameter struct.
pub fn parse_args<T: DeserializeOwned>(name: &str, args: Value) -> PipelineResult<T> {
    serde_json::from_value(args)
        .map_err(|e| ToolExecutionError::invalid_arguments(name, e.to_string()))
}

/// The capability table.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: ToolDescriptor) {
        debug_assert!(
            !self.tools.contains_key(descriptor.name),
            "duplicate tool name {}",
            descriptor.name
        );
        self.tools.insert(descriptor.name, descriptor);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.keys().copied().collect()
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .values()
            .map(|t| ToolSchema {
                name: t.name,
                description: t.description,
                parameters: t.parameters.clone(),
            })
            .collect()
    }

    /// Dispatch one tool call.
    pub async fn execute(
        &self,
        ctx: Arc<ToolContext>,
        name: &str,
        args: Value,
    ) -> PipelineResult<Value> {
        let descriptor = self
            .tools
            .get(name)
            .ok_or_else(|| ToolExecutionError::UnknownTool(name.to_string()))?;

        debug!(tool = name, "Executing tool");
        (descriptor.handler)(ctx, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct EchoParams {
        message: String,
    }

    fn echo_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(tool::<EchoParams, _, _>(
            "echo",
            "Returns its message argument",
            |_ctx, params: EchoParams| async move { Ok(json!({ "message": params.message })) },
        ));
        registry
    }

    fn test_ctx() -> (Arc<ToolContext>, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let ctx = ToolContext::new(PipelineConfig::default(), rx);
        (Arc::new(ctx), tx)
    }

    #[tokio::test]
    async fn test_execute_known_tool() {
        let registry = echo_registry();
        let (ctx, _cancel) = test_ctx();
        let result = registry
            .execute(ctx, "echo", json!({ "message": "hi" }))
            .await
            .unwrap();
        assert_eq!(result["message"], "hi");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = echo_registry();
        let (ctx, _cancel) = test_ctx();
        let err = registry
            .execute(ctx, "nonexistent", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolExecutionError::UnknownTool(_)));
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let registry = echo_registry();
        let (ctx, _cancel) = test_ctx();
        let err = registry
            .execute(ctx, "echo", json!({ "wrong": 1 }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolExecutionError::InvalidArguments { .. }));
    }

    #[test]
    fn test_schemas_are_inspectable() {
        let registry = echo_registry();
        let schemas = registry.schemas();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "echo");
        let rendered = serde_json::to_value(&schemas[0].parameters).unwrap();
        assert!(rendered["properties"]["message"].is_object());
    }
}
