//! Tool registry for NPC tool calls
//!
//! Tools run synchronously against the simulation context. The adapter turns
//! any error into tool-result text so the model can react to it.

use anyhow::{anyhow, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::ai::types::ToolSchema;

/// Tool execution result as appended to the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub output: String,
    pub is_error: bool,
}

impl ToolResult {
    /// Create a success result
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
        }
    }

    /// Create an error result with JSON-formatted error message
    pub fn error(msg: impl std::fmt::Display) -> Self {
        Self {
            output: serde_json::json!({"error": msg.to_string()}).to_string(),
            is_error: true,
        }
    }
}

/// Parse tool parameters into a typed struct
pub fn parse_params<T: serde::de::DeserializeOwned>(params: &Value) -> Result<T> {
    serde_json::from_value(params.clone()).map_err(|e| anyhow!("Invalid parameters: {}", e))
}

/// Executes one named tool call against an agent's context
pub trait ToolExecutor: Send + Sync {
    fn execute(&self, name: &str, args: &Value) -> Result<String>;
}

/// Trait for tool implementations
pub trait Tool: Send + Sync {
    /// Tool name (id)
    fn name(&self) -> &str;

    /// Tool description for the model
    fn description(&self) -> &str;

    /// JSON schema for parameters
    fn parameters_schema(&self) -> Value;

    fn execute(&self, params: &Value) -> Result<String>;
}

type ToolFn = dyn Fn(&Value) -> Result<String> + Send + Sync;

/// Closure-backed tool
pub struct FnTool {
    name: String,
    description: String,
    schema: Value,
    handler: Box<ToolFn>,
}

impl FnTool {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(&Value) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            handler: Box::new(handler),
        }
    }
}

impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    fn execute(&self, params: &Value) -> Result<String> {
        (self.handler)(params)
    }
}

/// Registry for managing tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.write().insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }

    /// Schemas for every registered tool, sorted by name
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let tools = self.tools.read();
        let mut schemas: Vec<ToolSchema> = tools
            .values()
            .map(|t| ToolSchema::new(t.name(), t.description(), t.parameters_schema()))
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Unregister all tools with names starting with the given prefix
    pub fn unregister_by_prefix(&self, prefix: &str) {
        let mut tools = self.tools.write();
        tools.retain(|name, _| {
            let keep = !name.starts_with(prefix);
            if !keep {
                tracing::debug!("Unregistered tool: {}", name);
            }
            keep
        });
    }
}

impl ToolExecutor for ToolRegistry {
    fn execute(&self, name: &str, args: &Value) -> Result<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| anyhow!("Unknown tool: {}", name))?;
        tracing::debug!(tool = name, "Executing tool");
        tool.execute(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Walk {
        place: String,
    }

    fn registry() -> ToolRegistry {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(FnTool::new(
            "walk_to",
            "Walk somewhere",
            json!({"type": "object", "properties": {"place": {"type": "string"}}}),
            |args| {
                let walk: Walk = parse_params(args)?;
                Ok(format!("arrived at {}", walk.place))
            },
        )));
        registry
    }

    #[test]
    fn test_execute_by_name() {
        let out = registry()
            .execute("walk_to", &json!({"place": "park"}))
            .unwrap();
        assert_eq!(out, "arrived at park");
    }

    #[test]
    fn test_bad_params_and_unknown_tool_are_errors() {
        let registry = registry();
        let err = registry.execute("walk_to", &json!({"where": 1})).unwrap_err();
        assert!(err.to_string().starts_with("Invalid parameters"));
        assert!(registry.execute("fly", &json!({})).is_err());
    }

    #[test]
    fn test_error_result_is_json() {
        let result = ToolResult::error("door locked");
        assert!(result.is_error);
        assert_eq!(result.output, r#"{"error":"door locked"}"#);
    }

    #[test]
    fn test_schemas_and_prefix_removal() {
        let registry = registry();
        registry.register(Arc::new(FnTool::new("walk_fast", "", json!({}), |_| {
            Ok(String::new())
        })));
        assert_eq!(
            registry
                .schemas()
                .iter()
                .map(|s| s.name.as_str())
                .collect::<Vec<_>>(),
            vec!["walk_fast", "walk_to"]
        );
        registry.unregister_by_prefix("walk_");
        assert!(registry.is_empty());
    }
}
