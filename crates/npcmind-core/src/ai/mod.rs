//! Model provider layer
//!
//! Talks to OpenAI, Anthropic, and Gemini through one tool-calling loop.

pub mod client;
pub mod format;
pub mod parsers;
pub mod providers;
pub mod retry;
pub mod types;

pub use client::{AgentClient, AgentClientConfig, Json, ProviderAdapter, Reply, ResponsePolicy};
pub use providers::ProviderId;
