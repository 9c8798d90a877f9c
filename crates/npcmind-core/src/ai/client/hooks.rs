//! Persistence hooks shared by all adapters
//!
//! Adapters report finished calls here; storage decides where they land.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ai::providers::ProviderId;
use crate::ai::types::Message;
use crate::storage::ResponseCacheEnvelope;

/// Who is talking and why
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallIdentity {
    /// NPC name
    pub actor: String,
    /// Role of the agent within the NPC (planner, reactor, ...)
    pub agent_type: String,
    /// Simulation run the call belongs to
    pub session: String,
}

impl CallIdentity {
    pub fn new(
        actor: impl Into<String>,
        agent_type: impl Into<String>,
        session: impl Into<String>,
    ) -> Self {
        Self {
            actor: actor.into(),
            agent_type: agent_type.into(),
            session: session.into(),
        }
    }
}

impl Default for CallIdentity {
    fn default() -> Self {
        Self::new("unknown", "default", "default")
    }
}

/// How a conversation ended
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptOutcome {
    Final(String),
    /// `kind` is `API` for transport/output failures and `PARSE` for decode failures
    Error { kind: &'static str, message: String },
}

/// Finished conversation handed to a sink
pub struct Transcript<'a> {
    pub identity: &'a CallIdentity,
    pub provider: ProviderId,
    pub model: &'a str,
    pub messages: &'a [Message],
    pub outcome: TranscriptOutcome,
}

/// Replay store for successful calls
pub trait ResponseCache: Send + Sync {
    fn save(
        &self,
        identity: &CallIdentity,
        provider: ProviderId,
        envelope: &ResponseCacheEnvelope<Value>,
    ) -> Result<()>;
}

/// Human-readable record of conversations
pub trait ConversationSink: Send + Sync {
    fn record(&self, transcript: &Transcript<'_>) -> Result<()>;

    /// Serialized request, written only when outgoing logs are enabled
    fn log_request(&self, _identity: &CallIdentity, _provider: ProviderId, _body: &Value) {}

    /// Response text before any parsing, written only when outgoing logs are enabled
    fn log_raw_response(&self, _identity: &CallIdentity, _provider: ProviderId, _raw: &Value) {}
}
