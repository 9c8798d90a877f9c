//! Tool execution for NPC agents
//!
//! Provides the executor seam the tool loop calls and a registry implementation.

pub mod registry;

pub use registry::{parse_params, FnTool, Tool, ToolExecutor, ToolRegistry, ToolResult};
