//! Provider identity and endpoint defaults

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::retry::{
    ANTHROPIC_RATE_LIMIT_DELAY, GEMINI_RATE_LIMIT_DELAY, OPENAI_RATE_LIMIT_DELAY,
};

/// Supported LLM backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    #[default]
    #[serde(rename = "openai", alias = "gpt")]
    OpenAi,
    #[serde(alias = "claude")]
    Anthropic,
    #[serde(alias = "google")]
    Gemini,
}

impl ProviderId {
    pub fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenAi, ProviderId::Anthropic, ProviderId::Gemini]
    }

    /// Key used in `auth.json`
    pub fn storage_key(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "gpt_api_key",
            ProviderId::Anthropic => "claude_api_key",
            ProviderId::Gemini => "gemini_api_key",
        }
    }

    /// Environment variable that overrides the stored key
    pub fn env_var(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "OPENAI_API_KEY",
            ProviderId::Anthropic => "ANTHROPIC_API_KEY",
            ProviderId::Gemini => "GEMINI_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "gpt-4.1-mini",
            ProviderId::Anthropic => "claude-sonnet-4-5",
            ProviderId::Gemini => "gemini-2.5-flash",
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "https://api.openai.com",
            ProviderId::Anthropic => "https://api.anthropic.com",
            ProviderId::Gemini => "https://generativelanguage.googleapis.com",
        }
    }

    pub fn auth_header(&self) -> AuthHeader {
        match self {
            ProviderId::OpenAi => AuthHeader::Bearer,
            ProviderId::Anthropic => AuthHeader::XApiKey,
            ProviderId::Gemini => AuthHeader::XGoogApiKey,
        }
    }

    /// Fixed wait after a rate-limit signature
    pub fn rate_limit_delay(&self) -> Duration {
        match self {
            ProviderId::OpenAi => OPENAI_RATE_LIMIT_DELAY,
            ProviderId::Anthropic => ANTHROPIC_RATE_LIMIT_DELAY,
            ProviderId::Gemini => GEMINI_RATE_LIMIT_DELAY,
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderId::OpenAi => write!(f, "GPT"),
            ProviderId::Anthropic => write!(f, "Claude"),
            ProviderId::Gemini => write!(f, "Gemini"),
        }
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" | "open_ai" | "gpt" => Ok(ProviderId::OpenAi),
            "anthropic" | "claude" => Ok(ProviderId::Anthropic),
            "gemini" | "google" => Ok(ProviderId::Gemini),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

/// How to send the API key in requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthHeader {
    /// `x-api-key: <key>` (Anthropic)
    XApiKey,
    /// `Authorization: Bearer <key>` (OpenAI)
    Bearer,
    /// `x-goog-api-key: <key>` (Gemini)
    XGoogApiKey,
}
