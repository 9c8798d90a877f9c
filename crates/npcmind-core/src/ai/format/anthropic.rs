//! Anthropic API format handler
//!
//! Handles message alternation, prompt caching, and tool conversion
//! for the Anthropic Messages API.

use serde_json::Value;
use tracing::debug;

use super::{schema_instruction, system_prompt, FormatHandler, RequestOptions};
use crate::ai::format::response::parse_anthropic_response;
use crate::ai::providers::ProviderId;
use crate::ai::types::{Content, Message, ModelResponse, Role, ToolSchema};

/// Anthropic format handler
pub struct AnthropicFormat {
    endpoint: String,
}

impl AnthropicFormat {
    pub fn new() -> Self {
        Self {
            endpoint: "/v1/messages".to_string(),
        }
    }
}

impl Default for AnthropicFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatHandler for AnthropicFormat {
    fn provider(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    /// Convert domain messages to Anthropic format
    ///
    /// The API requires user/assistant messages to strictly alternate, so
    /// consecutive same-role turns are merged into one message. This keeps all
    /// of a round's `tool_result` blocks in the user turn right after the
    /// `tool_use` turn. When the request declares no tools, earlier tool blocks
    /// are rendered as plain text because the API rejects tool blocks without
    /// tool definitions.
    fn convert_messages(&self, messages: &[Message], options: &RequestOptions) -> Vec<Value> {
        let mut result: Vec<Value> = Vec::new();
        let flatten_tools = options.tools.is_empty();

        for msg in messages.iter().filter(|m| m.role != Role::System) {
            let role = match msg.role {
                Role::Assistant => "assistant",
                // Tool results come as user messages
                Role::User | Role::Tool | Role::System => "user",
            };

            let content: Vec<Value> = msg
                .content
                .iter()
                .map(|c| convert_content(c, flatten_tools))
                .collect();

            match result.last_mut() {
                Some(prev) if prev["role"] == role => {
                    debug!(role, "Merging consecutive turns to maintain alternation");
                    if let Some(blocks) = prev["content"].as_array_mut() {
                        blocks.extend(content);
                    }
                }
                _ => result.push(serde_json::json!({
                    "role": role,
                    "content": content
                })),
            }
        }

        result
    }

    fn convert_tools(&self, tools: &[ToolSchema], options: &RequestOptions) -> Vec<Value> {
        let mut converted: Vec<Value> = tools
            .iter()
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.input_schema,
                })
            })
            .collect();

        // A breakpoint on the last tool caches the whole tool block
        if options.prompt_caching {
            if let Some(last) = converted.last_mut() {
                last["cache_control"] = serde_json::json!({"type": "ephemeral"});
            }
        }

        converted
    }

    fn build_request_body(
        &self,
        model: &str,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Value {
        let mut body = serde_json::json!({
            "model": model,
            "messages": self.convert_messages(messages, options),
            "max_tokens": options.max_tokens,
        });

        // No native structured output here: the schema rides in the system prompt
        let mut system = system_prompt(messages);
        if let Some(schema) = options.response_schema {
            let instruction = schema_instruction(schema);
            system = Some(match system {
                Some(existing) => format!("{}\n\n{}", existing, instruction),
                None => instruction,
            });
        }

        if let Some(system) = system {
            let mut block = serde_json::json!({
                "type": "text",
                "text": system
            });
            if options.prompt_caching {
                block["cache_control"] = serde_json::json!({"type": "ephemeral"});
            }
            body["system"] = serde_json::json!([block]);
        }

        if let Some(temp) = options.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        if !options.tools.is_empty() {
            body["tools"] = serde_json::json!(self.convert_tools(options.tools, options));
        }

        body
    }

    fn endpoint_path(&self, _model: &str) -> String {
        self.endpoint.clone()
    }

    fn parse_response(&self, body: &Value) -> ModelResponse {
        parse_anthropic_response(body)
    }
}

/// Convert a single content block to Anthropic JSON format
fn convert_content(content: &Content, flatten_tools: bool) -> Value {
    match content {
        Content::Text { text } => serde_json::json!({
            "type": "text",
            "text": text
        }),
        Content::ToolUse { name, input, .. } if flatten_tools => serde_json::json!({
            "type": "text",
            "text": format!("[called {} with {}]", name, input)
        }),
        Content::ToolUse { id, name, input } => serde_json::json!({
            "type": "tool_use",
            "id": id,
            "name": name,
            "input": input
        }),
        Content::ToolResult { name, output, .. } if flatten_tools => serde_json::json!({
            "type": "text",
            "text": format!("[{} returned] {}", name, output)
        }),
        Content::ToolResult {
            tool_use_id,
            output,
            is_error,
            ..
        } => serde_json::json!({
            "type": "tool_result",
            "tool_use_id": tool_use_id,
            "content": output,
            "is_error": is_error
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::{ResponseSchema, ToolCall};
    use serde_json::json;

    fn tool() -> ToolSchema {
        ToolSchema::new("look", "Look around", json!({"type": "object"}))
    }

    #[test]
    fn test_consecutive_user_turns_merged() {
        let messages = vec![Message::user("a"), Message::user("b")];
        let result = AnthropicFormat::new().convert_messages(&messages, &RequestOptions::default());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["role"], "user");
        assert_eq!(result[0]["content"][1]["text"], "b");
    }

    #[test]
    fn test_parallel_tool_results_follow_their_tool_use() {
        let calls = [
            ToolCall {
                id: "toolu_a".to_string(),
                name: "look".to_string(),
                input: json!({}),
            },
            ToolCall {
                id: "toolu_b".to_string(),
                name: "look".to_string(),
                input: json!({"far": true}),
            },
        ];
        let messages = vec![
            Message::user("what do you see"),
            Message::assistant_tool_calls("", &calls),
            Message::tool_results(vec![
                Content::tool_result(&calls[0], "a cat", false),
                Content::tool_result(&calls[1], "a hill", false),
            ]),
            Message::user("Answer now."),
        ];
        let tools = [tool()];
        let options = RequestOptions {
            tools: &tools,
            ..Default::default()
        };

        let native = AnthropicFormat::new().convert_messages(&messages, &options);
        let roles: Vec<&str> = native.iter().map(|m| m["role"].as_str().unwrap()).collect();
        assert_eq!(roles, vec!["user", "assistant", "user"]);
        assert_eq!(native[2]["content"][0]["tool_use_id"], "toolu_a");
        assert_eq!(native[2]["content"][1]["tool_use_id"], "toolu_b");
        assert_eq!(native[2]["content"][2]["text"], "Answer now.");
    }

    #[test]
    fn test_schema_appended_to_system_with_cache_control() {
        let schema = ResponseSchema::new("Plan", "next action", json!({"type": "object"}));
        let tools = [tool()];
        let options = RequestOptions {
            tools: &tools,
            response_schema: Some(&schema),
            prompt_caching: true,
            ..Default::default()
        };
        let messages = vec![Message::system("You are Mina."), Message::user("go")];
        let body = AnthropicFormat::new().build_request_body("claude-test", &messages, &options);
        let system = body["system"][0]["text"].as_str().unwrap();
        assert!(system.starts_with("You are Mina."));
        assert!(system.contains("\"Plan\""));
        assert_eq!(body["system"][0]["cache_control"]["type"], "ephemeral");
        assert_eq!(body["tools"][0]["cache_control"]["type"], "ephemeral");
    }

    #[test]
    fn test_tool_blocks_flattened_without_tools() {
        let call = ToolCall {
            id: "toolu_1".to_string(),
            name: "look".to_string(),
            input: json!({}),
        };
        let messages = vec![
            Message::user("what do you see"),
            Message::assistant_tool_calls("", std::slice::from_ref(&call)),
            Message::tool_result(&call, "a cat", false),
        ];

        let tools = [tool()];
        let with_tools = RequestOptions {
            tools: &tools,
            ..Default::default()
        };
        let native = AnthropicFormat::new().convert_messages(&messages, &with_tools);
        assert_eq!(native[1]["content"][0]["type"], "tool_use");
        assert_eq!(native[2]["content"][0]["type"], "tool_result");

        let flat = AnthropicFormat::new().convert_messages(&messages, &RequestOptions::default());
        assert_eq!(flat[1]["content"][0]["type"], "text");
        assert_eq!(flat[2]["content"][0]["text"], "[look returned] a cat");
    }
}
