//! User configuration
//!
//! Loaded from `<config dir>/config.toml`. Every field has a default, so a
//! missing file or a partial file is fine.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::agent::GateMode;
use crate::ai::client::{AgentClientConfig, HttpBackend};
use crate::ai::providers::ProviderId;
use crate::ai::retry::RetryPolicy;
use crate::clock::{GameTime, TimeService};
use crate::constants;
use crate::error::{LlmError, LlmResult};
use crate::paths;
use crate::storage::CredentialStore;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NpcMindConfig {
    pub agent: AgentSettings,
    pub retry: RetrySettings,
    pub approval: ApprovalSettings,
    pub clock: ClockSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub provider: ProviderId,
    /// Provider default when unset
    pub model: Option<String>,
    /// Proxy or compatible server instead of the provider endpoint
    pub base_url: Option<String>,
    /// Applied by callers through `AgentClient::set_temperature`
    pub temperature: Option<f32>,
    pub max_tokens: usize,
    pub max_tool_rounds: usize,
    pub enable_outgoing_logs: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            provider: ProviderId::default(),
            model: None,
            base_url: None,
            temperature: None,
            max_tokens: constants::ai::MAX_OUTPUT_TOKENS,
            max_tool_rounds: constants::ai::MAX_TOOL_CALL_ROUNDS,
            enable_outgoing_logs: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_api_retries: u32,
    pub base_delay_ms: u64,
    pub jitter_ms: u64,
    /// Provider default when unset
    pub rate_limit_delay_secs: Option<u64>,
    pub overloaded_delay_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_api_retries: constants::retry::MAX_API_RETRIES,
            base_delay_ms: constants::retry::BASE_DELAY.as_millis() as u64,
            jitter_ms: constants::retry::JITTER_MS,
            rate_limit_delay_secs: None,
            overloaded_delay_secs: constants::retry::OVERLOADED_DELAY.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalSettings {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSettings {
    pub time_scale: f32,
    pub slowdown_factor: f32,
    /// `YYYY-MM-DD HH:MM`
    pub start: String,
    /// Gate held while an NPC waits on the model
    pub think_gate: GateMode,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            time_scale: constants::clock::DEFAULT_TIME_SCALE,
            slowdown_factor: constants::clock::DEFAULT_SLOWDOWN_FACTOR,
            start: GameTime::default().to_string(),
            think_gate: GateMode::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub prompt_caching: bool,
    pub gemini_cache_ttl_secs: u64,
    pub gemini_min_cache_tokens: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            prompt_caching: true,
            gemini_cache_ttl_secs: constants::cache::GEMINI_CACHE_TTL.as_secs(),
            gemini_min_cache_tokens: constants::cache::GEMINI_MIN_CACHE_TOKENS,
        }
    }
}

impl NpcMindConfig {
    /// Load from the default path; defaults when the file does not exist
    pub fn load() -> Result<Self> {
        Self::load_from_path(&paths::config_file())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: NpcMindConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.start_time()?;
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let mut policy = RetryPolicy::for_provider(self.agent.provider);
        policy.max_api_retries = self.retry.max_api_retries;
        policy.base_delay = Duration::from_millis(self.retry.base_delay_ms);
        policy.jitter_ms = self.retry.jitter_ms;
        policy.overloaded_delay = Duration::from_secs(self.retry.overloaded_delay_secs);
        if let Some(secs) = self.retry.rate_limit_delay_secs {
            policy.rate_limit_delay = Duration::from_secs(secs);
        }
        policy
    }

    pub fn client_config(&self) -> AgentClientConfig {
        let mut config = AgentClientConfig::for_provider(self.agent.provider)
            .with_max_tool_rounds(self.agent.max_tool_rounds);
        if let Some(model) = &self.agent.model {
            config = config.with_model(model.clone());
        }
        config.max_tokens = self.agent.max_tokens;
        config.enable_outgoing_logs = self.agent.enable_outgoing_logs;
        config.prompt_caching = self.cache.prompt_caching;
        config.context_cache_ttl = Duration::from_secs(self.cache.gemini_cache_ttl_secs);
        config.context_cache_min_tokens = self.cache.gemini_min_cache_tokens;
        config
    }

    pub fn start_time(&self) -> Result<GameTime> {
        self.clock
            .start
            .parse()
            .with_context(|| format!("Invalid [clock] start '{}'", self.clock.start))
    }

    /// Stopped clock at the configured start time
    pub fn time_service(&self) -> Result<Arc<TimeService>> {
        Ok(TimeService::with_settings(
            self.start_time()?,
            self.clock.time_scale,
            self.clock.slowdown_factor,
        ))
    }

    /// HTTP transport for the configured provider
    pub fn backend(&self, credentials: &CredentialStore) -> LlmResult<HttpBackend> {
        let backend = HttpBackend::new(self.agent.provider, self.api_key(credentials)?);
        Ok(match &self.agent.base_url {
            Some(url) => backend.with_base_url(url.clone()),
            None => backend,
        })
    }

    /// API key for the configured provider
    pub fn api_key(&self, credentials: &CredentialStore) -> LlmResult<String> {
        let provider = self.agent.provider;
        credentials.resolve(&provider).ok_or_else(|| {
            LlmError::Config(format!(
                "no API key for {}: set {} or add {} to {}",
                provider,
                provider.env_var(),
                provider.storage_key(),
                CredentialStore::path().display()
            ))
        })
    }
}
