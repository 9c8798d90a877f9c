//! Multi-provider credential storage
//!
//! Stores API keys for each provider in `auth.json`. Environment variables
//! (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, `GEMINI_API_KEY`) win over the file.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ai::providers::ProviderId;
use crate::paths;

/// Storage for API keys indexed by provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialStore {
    /// API keys by provider storage key
    #[serde(flatten)]
    keys: HashMap<String, String>,
}

impl CredentialStore {
    /// Get the credentials file path
    pub fn path() -> PathBuf {
        paths::config_dir().join("auth.json")
    }

    /// Load credentials from disk
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load credentials from a specific path; a missing file is an empty store
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        let store: CredentialStore = serde_json::from_str(&contents)?;
        Ok(store)
    }

    /// Save credentials to disk
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::path())
    }

    /// Save credentials to a specific path
    ///
    /// Writes a temp file and renames it over the original. On Unix the file
    /// gets 0600 permissions before the rename.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(&temp_path, contents)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = fs::metadata(&temp_path) {
                let mut permissions = metadata.permissions();
                permissions.set_mode(0o600);
                fs::set_permissions(&temp_path, permissions)
                    .map_err(|e| anyhow::anyhow!("Failed to set secure file permissions: {}", e))?;
            } else {
                tracing::warn!(
                    "Could not get metadata for credentials temp file, permissions not set"
                );
            }
        }

        fs::rename(&temp_path, path)?;

        tracing::debug!("Credentials saved atomically to {:?}", path);
        Ok(())
    }

    /// Stored API key for a provider
    pub fn get(&self, provider: &ProviderId) -> Option<&String> {
        self.keys.get(provider.storage_key())
    }

    pub fn set(&mut self, provider: ProviderId, key: String) {
        self.keys.insert(provider.storage_key().to_string(), key);
    }

    pub fn remove(&mut self, provider: &ProviderId) {
        self.keys.remove(provider.storage_key());
    }

    /// API key to use: environment variable first, then the stored key
    pub fn resolve(&self, provider: &ProviderId) -> Option<String> {
        Self::resolve_with(self, provider, |var| std::env::var(var).ok())
    }

    fn resolve_with(
        &self,
        provider: &ProviderId,
        env: impl Fn(&str) -> Option<String>,
    ) -> Option<String> {
        env(provider.env_var())
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.get(provider).cloned())
    }

    /// Providers with a key from either source
    pub fn configured_providers(&self) -> Vec<ProviderId> {
        ProviderId::all()
            .iter()
            .filter(|p| self.resolve(p).is_some())
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("auth.json");
        let mut store = CredentialStore::default();
        store.set(ProviderId::Anthropic, "sk-ant".to_string());
        store.save_to_path(&path).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"claude_api_key\": \"sk-ant\""));

        let loaded = CredentialStore::load_from_path(&path).unwrap();
        assert_eq!(loaded.get(&ProviderId::Anthropic).map(String::as_str), Some("sk-ant"));
        assert!(loaded.get(&ProviderId::Gemini).is_none());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = CredentialStore::load_from_path(&temp.path().join("nope.json")).unwrap();
        assert!(store.get(&ProviderId::OpenAi).is_none());
    }

    #[test]
    fn test_environment_wins_over_file() {
        let mut store = CredentialStore::default();
        store.set(ProviderId::OpenAi, "from-file".to_string());

        let with_env = store.resolve_with(&ProviderId::OpenAi, |var| {
            (var == "OPENAI_API_KEY").then(|| "from-env".to_string())
        });
        assert_eq!(with_env.as_deref(), Some("from-env"));

        let blank_env = store.resolve_with(&ProviderId::OpenAi, |_| Some("  ".to_string()));
        assert_eq!(blank_env.as_deref(), Some("from-file"));

        assert!(store.resolve_with(&ProviderId::Gemini, |_| None).is_none());
    }
}
