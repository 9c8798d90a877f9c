//! Explicit server-side context cache
//!
//! Gemini can hold the stable prompt prefix (system prompt and tools) behind
//! a named handle. The adapter checks the handle before every dispatch and
//! replaces it when the prefix changed or the TTL is about to run out.

use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use crate::ai::types::ToolSchema;
use crate::constants::cache::CHARS_PER_TOKEN;

/// Handles closer than this to expiry are treated as stale
const EXPIRY_MARGIN: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
struct Handle {
    name: String,
    fingerprint: String,
    expires_at: Instant,
}

#[derive(Debug, Clone)]
pub struct ContextCache {
    ttl: Duration,
    min_tokens: usize,
    handle: Option<Handle>,
}

impl ContextCache {
    pub fn new(ttl: Duration, min_tokens: usize) -> Self {
        Self {
            ttl,
            min_tokens,
            handle: None,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Rough token estimate of the cacheable prefix
    pub fn estimate_tokens(system: Option<&str>, tools: &[ToolSchema]) -> usize {
        let tool_chars: usize = tools
            .iter()
            .map(|t| t.name.len() + t.description.len() + t.input_schema.to_string().len())
            .sum();
        (system.map_or(0, str::len) + tool_chars) / CHARS_PER_TOKEN
    }

    /// Whether the prefix is large enough for the backend to accept a cache
    pub fn is_eligible(&self, system: Option<&str>, tools: &[ToolSchema]) -> bool {
        Self::estimate_tokens(system, tools) >= self.min_tokens
    }

    pub fn fingerprint(model: &str, system: Option<&str>, tools: &[ToolSchema]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update([0]);
        hasher.update(system.unwrap_or("").as_bytes());
        for tool in tools {
            hasher.update([0]);
            hasher.update(tool.name.as_bytes());
            hasher.update(tool.description.as_bytes());
            hasher.update(tool.input_schema.to_string().as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Live handle for `fingerprint`, if any
    pub fn lookup(&self, fingerprint: &str) -> Option<&str> {
        self.handle
            .as_ref()
            .filter(|h| h.fingerprint == fingerprint)
            .filter(|h| h.expires_at > Instant::now() + EXPIRY_MARGIN)
            .map(|h| h.name.as_str())
    }

    pub fn store(&mut self, name: String, fingerprint: String) {
        self.handle = Some(Handle {
            name,
            fingerprint,
            expires_at: Instant::now() + self.ttl,
        });
    }

    pub fn invalidate(&mut self) {
        self.handle = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_requires_same_prefix() {
        let mut cache = ContextCache::new(Duration::from_secs(300), 0);
        let tools = [ToolSchema::new("look", "Look", json!({"type": "object"}))];
        let fp = ContextCache::fingerprint("m", Some("sys"), &tools);
        cache.store("cachedContents/1".to_string(), fp.clone());
        assert_eq!(cache.lookup(&fp), Some("cachedContents/1"));

        let other = ContextCache::fingerprint("m", Some("sys"), &[]);
        assert_ne!(fp, other);
        assert_eq!(cache.lookup(&other), None);
    }

    #[test]
    fn test_short_ttl_is_stale() {
        let mut cache = ContextCache::new(Duration::from_secs(1), 0);
        cache.store("cachedContents/2".to_string(), "fp".to_string());
        assert_eq!(cache.lookup("fp"), None);
    }

    #[test]
    fn test_eligibility_threshold() {
        let cache = ContextCache::new(Duration::from_secs(300), 10);
        assert!(!cache.is_eligible(Some("short"), &[]));
        assert!(cache.is_eligible(Some(&"x".repeat(40)), &[]));
    }
}
