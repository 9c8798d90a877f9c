//! Human approval gate for outbound model calls
//!
//! Requests queue strictly FIFO and exactly one is presented at a time. The
//! simulation clock stays hard-paused while a request is on screen.

mod queue;

pub use queue::ApprovalQueue;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One pending decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub request_id: Uuid,
    pub actor: String,
    pub agent_type: String,
    /// Messages in the conversation about to be sent
    pub message_count: usize,
    pub requested_at: DateTime<Local>,
}

impl ApprovalRequest {
    pub fn new(actor: impl Into<String>, agent_type: impl Into<String>, message_count: usize) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            actor: actor.into(),
            agent_type: agent_type.into(),
            message_count,
            requested_at: Local::now(),
        }
    }
}

/// UI surface that shows approval prompts
pub trait ApprovalPresenter: Send + Sync {
    /// Show `request`. Returning `false` means no surface is available and the
    /// request is rejected.
    fn present(&self, request: &ApprovalRequest) -> bool;

    /// Nothing left to show
    fn dismiss(&self) {}
}
