//! Response normalization
//!
//! Converts responses from each API format into one `ModelResponse` for the tool loop.

use serde_json::Value;

use crate::ai::types::{FinishReason, ModelResponse, ToolCall, Usage};

fn u64_at(value: &Value, pointer: &str) -> u64 {
    value.pointer(pointer).and_then(|v| v.as_u64()).unwrap_or(0)
}

/// Synthesized id for backends that omit one
fn generated_call_id() -> String {
    format!(
        "call_{}",
        &uuid::Uuid::new_v4().simple().to_string()[..24]
    )
}

/// Normalize an OpenAI chat/completions response
pub fn parse_openai_response(response: &Value) -> ModelResponse {
    let mut text = String::new();
    let mut tool_calls = Vec::new();
    let mut finish = FinishReason::Stop;

    if let Some(choice) = response
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
    {
        if let Some(reason) = choice.get("finish_reason").and_then(|r| r.as_str()) {
            finish = match reason {
                "stop" => FinishReason::Stop,
                "tool_calls" => FinishReason::ToolUse,
                "length" => FinishReason::Length,
                "content_filter" => FinishReason::ContentFilter,
                other => FinishReason::Unknown(other.to_string()),
            };
        }

        if let Some(message) = choice.get("message") {
            if let Some(content) = message.get("content").and_then(|c| c.as_str()) {
                text.push_str(content);
            }

            if let Some(calls) = message.get("tool_calls").and_then(|t| t.as_array()) {
                for tc in calls {
                    let Some(function) = tc.get("function") else {
                        continue;
                    };
                    let id = tc
                        .get("id")
                        .and_then(|i| i.as_str())
                        .map(String::from)
                        .unwrap_or_else(generated_call_id);
                    let name = function.get("name").and_then(|n| n.as_str()).unwrap_or("");
                    let args_str = function
                        .get("arguments")
                        .and_then(|a| a.as_str())
                        .unwrap_or("{}");
                    // Malformed arguments reach the executor as a raw string it can report on
                    let input: Value = serde_json::from_str(args_str)
                        .unwrap_or_else(|_| Value::String(args_str.to_string()));

                    tool_calls.push(ToolCall {
                        id,
                        name: name.to_string(),
                        input,
                    });
                }
            }
        }
    }

    ModelResponse {
        text,
        tool_calls,
        finish,
        usage: Usage {
            input_tokens: u64_at(response, "/usage/prompt_tokens"),
            output_tokens: u64_at(response, "/usage/completion_tokens"),
            cache_creation_tokens: 0,
            cache_read_tokens: u64_at(response, "/usage/prompt_tokens_details/cached_tokens"),
        },
    }
}

/// Normalize an Anthropic messages response
pub fn parse_anthropic_response(response: &Value) -> ModelResponse {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    if let Some(blocks) = response.get("content").and_then(|c| c.as_array()) {
        for block in blocks {
            match block.get("type").and_then(|t| t.as_str()) {
                Some("text") => {
                    if let Some(t) = block.get("text").and_then(|t| t.as_str()) {
                        text.push_str(t);
                    }
                }
                Some("tool_use") => {
                    tool_calls.push(ToolCall {
                        id: block
                            .get("id")
                            .and_then(|i| i.as_str())
                            .map(String::from)
                            .unwrap_or_else(generated_call_id),
                        name: block
                            .get("name")
                            .and_then(|n| n.as_str())
                            .unwrap_or("")
                            .to_string(),
                        input: block.get("input").cloned().unwrap_or(Value::Null),
                    });
                }
                _ => {}
            }
        }
    }

    let finish = match response.get("stop_reason").and_then(|r| r.as_str()) {
        None | Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
        Some("tool_use") => FinishReason::ToolUse,
        Some("max_tokens") => FinishReason::Length,
        Some("refusal") => FinishReason::ContentFilter,
        Some(other) => FinishReason::Unknown(other.to_string()),
    };

    ModelResponse {
        text,
        tool_calls,
        finish,
        usage: Usage {
            input_tokens: u64_at(response, "/usage/input_tokens"),
            output_tokens: u64_at(response, "/usage/output_tokens"),
            cache_creation_tokens: u64_at(response, "/usage/cache_creation_input_tokens"),
            cache_read_tokens: u64_at(response, "/usage/cache_read_input_tokens"),
        },
    }
}

/// Normalize a Google generateContent response
pub fn parse_google_response(response: &Value) -> ModelResponse {
    let mut text = String::new();
    let mut tool_calls = Vec::new();
    let mut finish = FinishReason::Stop;

    let candidate = response
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first());

    match candidate {
        Some(candidate) => {
            if let Some(reason) = candidate.get("finishReason").and_then(|r| r.as_str()) {
                finish = match reason {
                    "STOP" | "FINISH_REASON_UNSPECIFIED" => FinishReason::Stop,
                    "MAX_TOKENS" => FinishReason::Length,
                    "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => {
                        FinishReason::ContentFilter
                    }
                    other => FinishReason::Unknown(other.to_string()),
                };
            }

            if let Some(parts) = candidate.pointer("/content/parts").and_then(|p| p.as_array()) {
                for part in parts {
                    let is_thought = part.get("thought").and_then(|t| t.as_bool()) == Some(true);
                    if let Some(t) = part.get("text").and_then(|t| t.as_str()) {
                        if !is_thought {
                            text.push_str(t);
                        }
                    }

                    if let Some(fc) = part.get("functionCall") {
                        tool_calls.push(ToolCall {
                            id: fc
                                .get("id")
                                .and_then(|i| i.as_str())
                                .map(String::from)
                                .unwrap_or_else(generated_call_id),
                            name: fc
                                .get("name")
                                .and_then(|n| n.as_str())
                                .unwrap_or("")
                                .to_string(),
                            input: fc.get("args").cloned().unwrap_or(Value::Null),
                        });
                    }
                }
            }

            if !tool_calls.is_empty() && finish == FinishReason::Stop {
                finish = FinishReason::ToolUse;
            }
        }
        None => {
            // Prompt rejected before any candidate was produced
            if response.pointer("/promptFeedback/blockReason").is_some() {
                finish = FinishReason::ContentFilter;
            }
        }
    }

    ModelResponse {
        text,
        tool_calls,
        finish,
        usage: Usage {
            input_tokens: u64_at(response, "/usageMetadata/promptTokenCount"),
            output_tokens: u64_at(response, "/usageMetadata/candidatesTokenCount"),
            cache_creation_tokens: 0,
            cache_read_tokens: u64_at(response, "/usageMetadata/cachedContentTokenCount"),
        },
    }
}
