//! OpenAI API format handler
//!
//! Handles conversion to the OpenAI chat/completions format.

use serde_json::Value;

use super::{system_prompt, FormatHandler, RequestOptions};
use crate::ai::format::response::parse_openai_response;
use crate::ai::providers::ProviderId;
use crate::ai::types::{Content, Message, ModelResponse, Role, ToolSchema};

/// OpenAI format handler
pub struct OpenAIFormat {
    endpoint: String,
}

impl OpenAIFormat {
    pub fn new() -> Self {
        Self {
            endpoint: "/v1/chat/completions".to_string(),
        }
    }
}

impl Default for OpenAIFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatHandler for OpenAIFormat {
    fn provider(&self) -> ProviderId {
        ProviderId::OpenAi
    }

    /// Convert domain messages to OpenAI chat/completions format
    ///
    /// Tool results become one `role: "tool"` message per result.
    fn convert_messages(&self, messages: &[Message], _options: &RequestOptions) -> Vec<Value> {
        let mut result: Vec<Value> = Vec::new();

        for msg in messages.iter().filter(|m| m.role != Role::System) {
            if msg.role == Role::Tool {
                for content in &msg.content {
                    if let Content::ToolResult {
                        tool_use_id,
                        output,
                        ..
                    } = content
                    {
                        result.push(serde_json::json!({
                            "role": "tool",
                            "tool_call_id": tool_use_id,
                            "content": output
                        }));
                    }
                }
                continue;
            }

            let role = if msg.role == Role::Assistant {
                "assistant"
            } else {
                "user"
            };

            let tool_calls: Vec<Value> = msg
                .content
                .iter()
                .filter_map(|c| match c {
                    Content::ToolUse { id, name, input } => Some(serde_json::json!({
                        "id": id,
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": input.to_string()
                        }
                    })),
                    _ => None,
                })
                .collect();

            let text = msg.text_content();

            if !tool_calls.is_empty() && msg.role == Role::Assistant {
                let mut msg_obj = serde_json::json!({
                    "role": "assistant",
                    "tool_calls": tool_calls
                });
                if !text.is_empty() {
                    msg_obj["content"] = serde_json::json!(text);
                }
                result.push(msg_obj);
                continue;
            }

            if !text.is_empty() {
                result.push(serde_json::json!({
                    "role": role,
                    "content": text
                }));
            }
        }

        result
    }

    fn convert_tools(&self, tools: &[ToolSchema], _options: &RequestOptions) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.input_schema
                    }
                })
            })
            .collect()
    }

    fn build_request_body(
        &self,
        model: &str,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Value {
        let mut converted = self.convert_messages(messages, options);
        if let Some(system) = system_prompt(messages) {
            converted.insert(
                0,
                serde_json::json!({
                    "role": "system",
                    "content": system
                }),
            );
        }

        let mut body = serde_json::json!({
            "model": model,
            "messages": converted,
            "max_completion_tokens": options.max_tokens,
        });

        if let Some(temp) = options.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        if !options.tools.is_empty() {
            body["tools"] = serde_json::json!(self.convert_tools(options.tools, options));
        }

        if let Some(schema) = options.response_schema {
            body["response_format"] = serde_json::json!({
                "type": "json_schema",
                "json_schema": {
                    "name": schema_name(&schema.name),
                    "description": schema.description,
                    "schema": schema.schema,
                    "strict": false
                }
            });
        }

        // Caching is automatic on OpenAI; the key only improves cache routing
        if options.prompt_caching {
            if let Some(key) = options.cache_key {
                body["prompt_cache_key"] = serde_json::json!(key);
            }
        }

        body
    }

    fn endpoint_path(&self, _model: &str) -> String {
        self.endpoint.clone()
    }

    fn parse_response(&self, body: &Value) -> ModelResponse {
        parse_openai_response(body)
    }
}

/// OpenAI only accepts `[a-zA-Z0-9_-]` in schema names
fn schema_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "response".to_string()
    } else {
        cleaned
    }
}
