//! Persistence layer
//!
//! - SQLite response cache: replay envelopes keyed per actor, agent type and session
//! - File-based conversation logs
//! - API credentials

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ai::types::ToolInvocationRecord;

mod cache;
mod conversation_log;
pub mod credentials;
mod database;

#[cfg(test)]
mod database_tests;

pub use cache::{CachedResponse, ResponseCacheStore};
pub use conversation_log::ConversationLog;
pub use credentials::CredentialStore;
pub use database::{Database, SharedDatabase};

/// Persisted unit for deterministic replay: the decoded reply plus the tool
/// calls that led to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseCacheEnvelope<T> {
    pub payload: T,
    #[serde(default)]
    pub tools: Vec<ToolInvocationRecord>,
}

impl<T> ResponseCacheEnvelope<T> {
    pub fn new(payload: T, tools: Vec<ToolInvocationRecord>) -> Self {
        Self { payload, tools }
    }
}

impl ResponseCacheEnvelope<Value> {
    /// Re-type a stored payload
    pub fn decode<T: DeserializeOwned>(self) -> serde_json::Result<ResponseCacheEnvelope<T>> {
        Ok(ResponseCacheEnvelope {
            payload: serde_json::from_value(self.payload)?,
            tools: self.tools,
        })
    }
}
