//! Agent client module
//!
//! Provider-agnostic conversation client supporting:
//! - OpenAI chat/completions
//! - Anthropic messages
//! - Google/Gemini generateContent
//!
//! `ProviderAdapter` implements the `AgentClient` contract for all three; the
//! provider-specific wire format is chosen by its format handler.

pub mod adapter;
pub mod backend;
pub mod config;
pub mod context_cache;
pub mod contract;
pub mod core;
pub mod hooks;
pub mod policy;
pub mod reply;


pub use adapter::ProviderAdapter;
pub use backend::{Backend, BackendError, DispatchRequest};
pub use config::AgentClientConfig;
pub use contract::AgentClient;
pub use core::HttpBackend;
pub use hooks::{CallIdentity, ConversationSink, ResponseCache, Transcript, TranscriptOutcome};
pub use policy::ResponsePolicy;
pub use reply::{Json, Reply};
