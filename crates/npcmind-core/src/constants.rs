//! Application constants and configuration defaults
//!
//! Centralized location for magic numbers and default values

use std::time::Duration;

/// HTTP client configuration
pub mod http {
    use super::*;

    /// Connection timeout for HTTP requests
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Whole-request timeout. Long tool-heavy completions can take minutes.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
}

/// Tool loop and model call defaults
pub mod ai {
    /// Tool rounds before the loop forces a final answer
    pub const MAX_TOOL_CALL_ROUNDS: usize = 3;

    /// Default maximum output tokens
    pub const MAX_OUTPUT_TOKENS: usize = 4096;

    /// Corrective instruction appended after an empty response
    pub const EMPTY_RESPONSE_NOTICE: &str = "The previous response was empty. Do not call any tools. \
         Reply only with the final answer in the required format.";

    /// Instruction appended when the tool round budget is spent
    pub const FORCE_FINAL_NOTICE: &str = "Tool call limit reached. Do not call any more tools. \
         Answer now with the final response only.";
}

/// Retry and backoff defaults
pub mod retry {
    use super::*;

    /// Retries after the first attempt, for both empty responses and transient faults
    pub const MAX_API_RETRIES: u32 = 3;

    /// Base delay for exponential backoff
    pub const BASE_DELAY: Duration = Duration::from_millis(3000);

    /// Upper bound (exclusive) of random jitter added to backoff delays
    pub const JITTER_MS: u64 = 250;

    /// Fixed wait after an overloaded signature
    pub const OVERLOADED_DELAY: Duration = Duration::from_secs(300);

    /// Fixed wait after a rate-limit signature, per provider
    pub const OPENAI_RATE_LIMIT_DELAY: Duration = Duration::from_secs(70);
    pub const ANTHROPIC_RATE_LIMIT_DELAY: Duration = Duration::from_secs(100);
    pub const GEMINI_RATE_LIMIT_DELAY: Duration = Duration::from_secs(70);
}

/// Prompt / context caching
pub mod cache {
    use super::*;

    /// Lifetime requested for a Gemini cached-content handle
    pub const GEMINI_CACHE_TTL: Duration = Duration::from_secs(300);

    /// Gemini refuses cached content below this many tokens
    pub const GEMINI_MIN_CACHE_TOKENS: usize = 1024;

    /// Rough chars-per-token ratio used to estimate prompt size
    pub const CHARS_PER_TOKEN: usize = 4;
}

/// Simulation clock defaults
pub mod clock {
    /// Game seconds per real second
    pub const DEFAULT_TIME_SCALE: f32 = 60.0;

    /// Lowest time scale a caller may set
    pub const MIN_TIME_SCALE: f32 = 0.1;

    /// Divisor applied to the time scale while a slowdown is held
    pub const DEFAULT_SLOWDOWN_FACTOR: f32 = 4.0;

    /// Scaled seconds per game minute
    pub const SECONDS_PER_GAME_MINUTE: f64 = 60.0;
}

/// Directory and file names
pub mod paths {
    /// Config directory name under the home directory
    pub const CONFIG_DIR_NAME: &str = ".npcmind";

    /// Environment variable overriding the config root
    pub const HOME_ENV: &str = "NPCMIND_HOME";

    pub const CONVERSATION_LOGS_DIR: &str = "ConversationLogs";
    pub const RESPONSE_DB_NAME: &str = "responses.db";
}
