//! Google/Gemini API format handler
//!
//! Handles conversion to Google AI API format (contents, parts, functionDeclarations),
//! response schema sanitization, and explicit cached-content requests.

use std::time::Duration;

use serde_json::Value;

use super::{system_prompt, FormatHandler, RequestOptions};
use crate::ai::format::response::parse_google_response;
use crate::ai::providers::ProviderId;
use crate::ai::types::{Content, Message, ModelResponse, Role, ToolSchema};

/// Google format handler
pub struct GoogleFormat;

impl GoogleFormat {
    pub fn new() -> Self {
        Self
    }

    /// Body for `POST /v1beta/cachedContents` holding the stable prompt prefix
    pub fn build_cached_content_body(
        &self,
        model: &str,
        system: Option<&str>,
        tools: &[ToolSchema],
        ttl: Duration,
    ) -> Value {
        let mut body = serde_json::json!({
            "model": format!("models/{}", model),
            "ttl": format!("{}s", ttl.as_secs()),
        });
        if let Some(system) = system {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{"text": system}]
            });
        }
        if !tools.is_empty() {
            body["tools"] = serde_json::json!([{
                "functionDeclarations": self.convert_tools(tools, &RequestOptions::default())
            }]);
        }
        body
    }

    pub fn cached_contents_path(&self) -> &'static str {
        "/v1beta/cachedContents"
    }
}

impl Default for GoogleFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatHandler for GoogleFormat {
    fn provider(&self) -> ProviderId {
        ProviderId::Gemini
    }

    /// Convert messages to Google contents format
    ///
    /// Every `functionResponse` answering one model turn must arrive in the
    /// single user turn that follows it, so adjacent tool-result messages are
    /// merged.
    fn convert_messages(&self, messages: &[Message], _options: &RequestOptions) -> Vec<Value> {
        let mut contents: Vec<Value> = Vec::new();
        let mut last_was_tool = false;

        for m in messages.iter().filter(|m| m.role != Role::System) {
            let role = match m.role {
                Role::Assistant => "model",
                // Tool results are user role in Google format
                Role::User | Role::Tool | Role::System => "user",
            };
            let parts: Vec<Value> = m.content.iter().map(convert_content_to_part).collect();
            let is_tool = m.role == Role::Tool;

            match contents.last_mut() {
                Some(prev) if is_tool && last_was_tool => {
                    if let Some(existing) = prev["parts"].as_array_mut() {
                        existing.extend(parts);
                    }
                }
                _ => contents.push(serde_json::json!({
                    "role": role,
                    "parts": parts
                })),
            }
            last_was_tool = is_tool;
        }

        contents
    }

    /// Convert tools to Google function declarations format
    fn convert_tools(&self, tools: &[ToolSchema], _options: &RequestOptions) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": sanitize_schema(&tool.input_schema)
                })
            })
            .collect()
    }

    fn build_request_body(
        &self,
        _model: &str,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Value {
        let mut body = serde_json::json!({
            "contents": self.convert_messages(messages, options),
            "generationConfig": {
                "maxOutputTokens": options.max_tokens,
            }
        });

        if let Some(temp) = options.temperature {
            body["generationConfig"]["temperature"] = serde_json::json!(temp);
        }

        if let Some(schema) = options.response_schema {
            body["generationConfig"]["responseMimeType"] = serde_json::json!("application/json");
            body["generationConfig"]["responseSchema"] = sanitize_schema(&schema.schema);
        }

        // A cached-content handle already carries the system prompt and tools
        if let Some(handle) = options.cached_content {
            body["cachedContent"] = serde_json::json!(handle);
            return body;
        }

        if let Some(system) = system_prompt(messages) {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{"text": system}]
            });
        }

        if !options.tools.is_empty() {
            body["tools"] = serde_json::json!([{
                "functionDeclarations": self.convert_tools(options.tools, options)
            }]);
        }

        body
    }

    fn endpoint_path(&self, model: &str) -> String {
        format!("/v1beta/models/{}:generateContent", model)
    }

    fn parse_response(&self, body: &Value) -> ModelResponse {
        parse_google_response(body)
    }
}

/// Convert a single content block to Google parts format
fn convert_content_to_part(content: &Content) -> Value {
    match content {
        Content::Text { text } => serde_json::json!({"text": text}),
        Content::ToolUse { id, name, input } => serde_json::json!({
            "functionCall": {
                "id": id,
                "name": name,
                "args": input
            }
        }),
        Content::ToolResult {
            tool_use_id,
            name,
            output,
            ..
        } => serde_json::json!({
            "functionResponse": {
                "id": tool_use_id,
                "name": name,
                "response": {
                    "result": output
                }
            }
        }),
    }
}

/// Strip schema keywords Gemini rejects.
///
/// Removes `additionalProperties` everywhere and rounds numeric
/// `minimum`/`maximum` bounds to integers.
pub fn sanitize_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                match key.as_str() {
                    "additionalProperties" => {}
                    "minimum" | "maximum" => {
                        let rounded = value
                            .as_f64()
                            .map(|n| serde_json::json!(n.round() as i64))
                            .unwrap_or_else(|| value.clone());
                        out.insert(key.clone(), rounded);
                    }
                    _ => {
                        out.insert(key.clone(), sanitize_schema(value));
                    }
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize_schema).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::{ResponseSchema, ToolCall};
    use serde_json::json;

    #[test]
    fn test_sanitize_schema_nested() {
        let schema = json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "mood": {"type": "number", "minimum": 0.4, "maximum": 9.6},
                "steps": {
                    "type": "array",
                    "items": {"type": "object", "additionalProperties": false}
                }
            }
        });
        let clean = sanitize_schema(&schema);
        assert!(clean.get("additionalProperties").is_none());
        assert_eq!(clean["properties"]["mood"]["minimum"], 0);
        assert_eq!(clean["properties"]["mood"]["maximum"], 10);
        assert!(clean["properties"]["steps"]["items"]
            .get("additionalProperties")
            .is_none());
    }

    #[test]
    fn test_function_response_carries_name() {
        let call = ToolCall {
            id: "fc_1".to_string(),
            name: "check_fridge".to_string(),
            input: json!({}),
        };
        let messages = vec![
            Message::system("You are Mina."),
            Message::user("hungry?"),
            Message::assistant_tool_calls("", std::slice::from_ref(&call)),
            Message::tool_result(&call, "milk, eggs", false),
        ];
        let body =
            GoogleFormat::new().build_request_body("gemini-test", &messages, &Default::default());
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(
            contents[2]["parts"][0]["functionResponse"]["name"],
            "check_fridge"
        );
        assert_eq!(
            contents[2]["parts"][0]["functionResponse"]["response"]["result"],
            "milk, eggs"
        );
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "You are Mina.");
    }

    #[test]
    fn test_parallel_function_responses_share_one_turn() {
        let calls = [
            ToolCall {
                id: "fc_a".to_string(),
                name: "check_fridge".to_string(),
                input: json!({}),
            },
            ToolCall {
                id: "fc_b".to_string(),
                name: "check_wallet".to_string(),
                input: json!({}),
            },
        ];
        let messages = vec![
            Message::user("hungry?"),
            Message::assistant_tool_calls("", &calls),
            Message::tool_results(vec![
                Content::tool_result(&calls[0], "milk", false),
                Content::tool_result(&calls[1], "3 coins", false),
            ]),
            // a split result list still lands in one turn
            Message::tool_result(&calls[1], "and a button", false),
        ];

        let contents = GoogleFormat::new().convert_messages(&messages, &Default::default());
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["parts"].as_array().unwrap().len(), 2);
        let parts = contents[2]["parts"].as_array().unwrap();
        assert_eq!(contents[2]["role"], "user");
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["functionResponse"]["name"], "check_fridge");
        assert_eq!(parts[1]["functionResponse"]["name"], "check_wallet");
    }

    #[test]
    fn test_cached_content_replaces_prefix() {
        let schema = ResponseSchema::new("Plan", "", json!({"type": "object"}));
        let tools = [ToolSchema::new("look", "", json!({"type": "object"}))];
        let options = RequestOptions {
            tools: &tools,
            response_schema: Some(&schema),
            cached_content: Some("cachedContents/abc"),
            ..Default::default()
        };
        let messages = vec![Message::system("sys"), Message::user("go")];
        let body = GoogleFormat::new().build_request_body("gemini-test", &messages, &options);
        assert_eq!(body["cachedContent"], "cachedContents/abc");
        assert!(body.get("systemInstruction").is_none());
        assert!(body.get("tools").is_none());
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn test_cached_content_body() {
        let tools = [ToolSchema::new("look", "", json!({"type": "object"}))];
        let body = GoogleFormat::new().build_cached_content_body(
            "gemini-2.5-flash",
            Some("sys"),
            &tools,
            Duration::from_secs(300),
        );
        assert_eq!(body["model"], "models/gemini-2.5-flash");
        assert_eq!(body["ttl"], "300s");
        assert_eq!(body["tools"][0]["functionDeclarations"][0]["name"], "look");
    }
}
