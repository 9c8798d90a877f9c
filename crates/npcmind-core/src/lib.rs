//! NPC Mind Core - LLM orchestration for simulated characters
//!
//! - Provider-agnostic conversation clients with a bounded tool loop
//! - Retry, decode, and caching policy shared by every adapter
//! - Simulation clock with stacked pause / slowdown gates
//! - Human approval queue for outbound model calls
//! - Response cache and conversation log storage

pub mod agent;
pub mod ai;
pub mod approval;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod paths;
pub mod storage;
pub mod tools;

// Re-exports for convenience
pub use agent::{GateMode, ThinkCycle};
pub use ai::client::{AgentClient, AgentClientConfig, CallIdentity, HttpBackend, ProviderAdapter};
pub use ai::types::{Message, Role};
pub use ai::{Json, ProviderId, Reply, ResponsePolicy};
pub use approval::{ApprovalPresenter, ApprovalQueue, ApprovalRequest};
pub use clock::{GameTime, TimeService};
pub use config::NpcMindConfig;
pub use error::{LlmError, LlmResult};
pub use storage::{ConversationLog, CredentialStore, ResponseCacheStore};
pub use tools::{ToolExecutor, ToolRegistry};
