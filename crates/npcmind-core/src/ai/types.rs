//! Provider-neutral conversation types
//!
//! Adapters own a `Vec<Message>` in this shape and each format handler
//! serializes it to its backend's native representation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "System"),
            Role::User => write!(f, "User"),
            Role::Assistant => write!(f, "Assistant"),
            Role::Tool => write!(f, "Tool"),
        }
    }
}

/// One block of message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        name: String,
        output: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl Content {
    /// Result block answering `call`
    pub fn tool_result(call: &ToolCall, output: impl Into<String>, is_error: bool) -> Self {
        Content::ToolResult {
            tool_use_id: call.id.clone(),
            name: call.name.clone(),
            output: output.into(),
            is_error,
        }
    }
}

/// A single conversation entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<Content>,
}

impl Message {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![Content::Text { text: text.into() }],
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::text(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(Role::Assistant, text)
    }

    /// Assistant turn that requested tools, with any text it produced alongside
    pub fn assistant_tool_calls(text: &str, calls: &[ToolCall]) -> Self {
        let mut content = Vec::with_capacity(calls.len() + 1);
        if !text.is_empty() {
            content.push(Content::Text {
                text: text.to_string(),
            });
        }
        content.extend(calls.iter().map(|c| Content::ToolUse {
            id: c.id.clone(),
            name: c.name.clone(),
            input: c.input.clone(),
        }));
        Self {
            role: Role::Assistant,
            content,
        }
    }

    pub fn tool_result(call: &ToolCall, output: impl Into<String>, is_error: bool) -> Self {
        Self::tool_results(vec![Content::tool_result(call, output, is_error)])
    }

    /// Every result of one tool round, in call order
    pub fn tool_results(results: Vec<Content>) -> Self {
        Self {
            role: Role::Tool,
            content: results,
        }
    }

    /// Concatenated text blocks
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                Content::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Plain rendering used by conversation logs
    pub fn render(&self) -> String {
        self.content
            .iter()
            .map(|c| match c {
                Content::Text { text } => text.clone(),
                Content::ToolUse { name, input, .. } => format!("[tool call] {}({})", name, input),
                Content::ToolResult {
                    name,
                    output,
                    is_error,
                    ..
                } => {
                    if *is_error {
                        format!("[tool error] {}: {}", name, output)
                    } else {
                        format!("[tool result] {}: {}", name, output)
                    }
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A function the model may call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object
    pub input_schema: Value,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// One executed tool call, kept for replay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocationRecord {
    pub name: String,
    pub args_json: String,
}

/// Structured-output shape requested from the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema of the expected reply
    pub schema: Value,
}

impl ResponseSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
        }
    }
}

/// Why the model stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    ToolUse,
    Length,
    ContentFilter,
    Unknown(String),
}

/// Token accounting for one dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
}

/// One backend reply normalized across providers
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub finish: FinishReason,
    pub usage: Usage,
}

impl ModelResponse {
    /// Well-formed reply that carries neither text nor tool calls
    pub fn is_empty(&self) -> bool {
        self.tool_calls.is_empty() && self.text.trim().is_empty()
    }
}
