//! API Format handling
//!
//! Abstracts the differences between the OpenAI, Anthropic, and Google wire formats.
//! Each format handler knows how to convert messages and tools, attach the
//! structured-output hint and caching knob, and read the backend's reply.

pub mod anthropic;
pub mod google;
pub mod openai;
pub mod response;

use serde_json::Value;

use crate::ai::providers::ProviderId;
use crate::ai::types::{Message, ModelResponse, ResponseSchema, Role, ToolSchema};

/// Trait for handling different API formats
///
/// Implementations convert between our provider-neutral types and a backend's
/// native representation. They own every provider quirk the tool loop must
/// not know about.
pub trait FormatHandler: Send + Sync {
    /// Backend this handler speaks to
    fn provider(&self) -> ProviderId;

    /// Convert non-system messages to the API-specific format
    fn convert_messages(&self, messages: &[Message], options: &RequestOptions) -> Vec<Value>;

    /// Convert tools to the API-specific format
    fn convert_tools(&self, tools: &[ToolSchema], options: &RequestOptions) -> Vec<Value>;

    /// Build the complete request body
    fn build_request_body(&self, model: &str, messages: &[Message], options: &RequestOptions)
        -> Value;

    /// API endpoint path for this format
    fn endpoint_path(&self, model: &str) -> String;

    /// Normalize a successful response body
    fn parse_response(&self, body: &Value) -> ModelResponse;
}

/// Per-dispatch options for building API requests
pub struct RequestOptions<'a> {
    pub max_tokens: usize,
    pub tools: &'a [ToolSchema],
    pub response_schema: Option<&'a ResponseSchema>,
    pub temperature: Option<f32>,
    /// Attach provider prompt-caching hints
    pub prompt_caching: bool,
    /// Server-side cached-content handle that replaces system prompt and tools
    pub cached_content: Option<&'a str>,
    /// Stable key that lets the backend route repeat prompts to a warm cache
    pub cache_key: Option<&'a str>,
}

impl<'a> Default for RequestOptions<'a> {
    fn default() -> Self {
        Self {
            max_tokens: crate::constants::ai::MAX_OUTPUT_TOKENS,
            tools: &[],
            response_schema: None,
            temperature: None,
            prompt_caching: false,
            cached_content: None,
            cache_key: None,
        }
    }
}

/// Select the format handler for a provider
pub fn get_format_handler(provider: ProviderId) -> Box<dyn FormatHandler> {
    match provider {
        ProviderId::OpenAi => Box::new(openai::OpenAIFormat::new()),
        ProviderId::Anthropic => Box::new(anthropic::AnthropicFormat::new()),
        ProviderId::Gemini => Box::new(google::GoogleFormat::new()),
    }
}

/// All system messages joined in order, or `None` when there are none
pub fn system_prompt(messages: &[Message]) -> Option<String> {
    let parts: Vec<String> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.text_content())
        .filter(|t| !t.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Instruction text describing the expected JSON reply
pub fn schema_instruction(schema: &ResponseSchema) -> String {
    let pretty = serde_json::to_string_pretty(&schema.schema).unwrap_or_default();
    format!(
        "Respond only with a single JSON object named \"{}\" ({}). It must match this JSON schema:\n{}",
        schema.name, schema.description, pretty
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_joins_in_order() {
        let messages = vec![
            Message::system("You are Mina."),
            Message::user("hi"),
            Message::system("Be brief."),
        ];
        assert_eq!(
            system_prompt(&messages).as_deref(),
            Some("You are Mina.\n\nBe brief.")
        );
        assert_eq!(system_prompt(&[Message::user("x")]), None);
    }

    #[test]
    fn test_handler_matches_provider() {
        for provider in ProviderId::all() {
            assert_eq!(get_format_handler(*provider).provider(), *provider);
        }
    }
}
