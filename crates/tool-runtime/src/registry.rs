use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use indexmap::IndexMap;
use serde_json::Value;

use crate::tool::{FnTool, Tool, ToolContext, ToolDefinition, ToolError, ToolResult};

/// Manages available tools, their schemas, and lookup.
///
/// Built once at server startup and owned by the server; tools are listed in
/// registration order. Thread-safe via Arc wrapping of individual tools.
pub struct ToolRegistry {
    tools: IndexMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: IndexMap::new(),
        }
    }

    /// Register a tool. Returns error if name already registered.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), RegistryError> {
        let def = tool.definition();
        if self.tools.contains_key(&def.name) {
            return Err(RegistryError::DuplicateName(def.name));
        }
        tracing::debug!(tool = %def.name, "registered tool");
        self.tools.insert(def.name, Arc::new(tool));
        Ok(())
    }

    /// Register an async closure as a tool.
    pub fn register_fn<F, Fut>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        self.register(FnTool::new(name, description, input_schema, handler))
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// List all registered tool definitions, in registration order.
    pub fn list(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Run a tool by name.
    ///
    /// Only a lookup miss is an `Err`. Handler failures, including panics,
    /// come back as a `ToolResult` with `is_error` set.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: Value,
        context: &ToolContext,
    ) -> Result<ToolResult, RegistryError> {
        let tool = self
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        let outcome = AssertUnwindSafe(tool.execute(arguments, context))
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::warn!(tool = %name, request = %context.request_id, error = %e, "tool failed");
                ToolResult::error(e.to_string())
            }
            Err(_) => {
                tracing::error!(tool = %name, request = %context.request_id, "tool panicked");
                ToolResult::error(format!("Tool '{name}' panicked"))
            }
        };
        Ok(result)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Tool with name '{0}' is already registered")]
    DuplicateName(String),
    #[error("Tool not found: {0}")]
    NotFound(String),
}
