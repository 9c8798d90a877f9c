//! Agent client configuration
//!
//! Per-conversation settings for one provider adapter.

use std::time::Duration;

use crate::ai::providers::ProviderId;
use crate::constants;

/// Configuration for a provider adapter
#[derive(Debug, Clone)]
pub struct AgentClientConfig {
    pub provider: ProviderId,
    /// Model ID to use for API calls
    pub model: String,
    /// Maximum output tokens
    pub max_tokens: usize,
    /// Tool rounds before the final answer is forced (at least 1)
    pub max_tool_rounds: usize,
    /// Attach provider prompt/context caching hints
    pub prompt_caching: bool,
    /// Lifetime of an explicit cached-content handle
    pub context_cache_ttl: Duration,
    /// Smallest estimated prompt prefix worth an explicit cache
    pub context_cache_min_tokens: usize,
    /// Log request bodies and raw replies
    pub enable_outgoing_logs: bool,
}

impl AgentClientConfig {
    pub fn for_provider(provider: ProviderId) -> Self {
        Self {
            provider,
            model: provider.default_model().to_string(),
            max_tokens: constants::ai::MAX_OUTPUT_TOKENS,
            max_tool_rounds: constants::ai::MAX_TOOL_CALL_ROUNDS,
            prompt_caching: true,
            context_cache_ttl: constants::cache::GEMINI_CACHE_TTL,
            context_cache_min_tokens: constants::cache::GEMINI_MIN_CACHE_TOKENS,
            enable_outgoing_logs: false,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    /// Whether this adapter manages an explicit server-side context cache
    pub fn uses_context_cache(&self) -> bool {
        self.prompt_caching && self.provider == ProviderId::Gemini
    }
}

impl Default for AgentClientConfig {
    fn default() -> Self {
        Self::for_provider(ProviderId::default())
    }
}
