//! Error types for model calls
//!
//! Every failure of a `send` call surfaces as one of these variants; a
//! successful call never carries a placeholder payload.

use thiserror::Error;

use crate::ai::client::backend::BackendError;
use crate::ai::parsers::ParseFailure;

/// Result alias for model calls
pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// Typed failure of a conversation turn
#[derive(Debug, Error)]
pub enum LlmError {
    /// Model kept answering with no text and no tool calls
    #[error("empty response after {attempts} attempts")]
    EmptyResponse { attempts: u32 },

    /// Backend fault that is fatal or exhausted its retry budget
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Text present but not decodable into the requested type
    #[error("parse error: {0}")]
    Parse(#[from] ParseFailure),

    /// Output cut off by the token limit
    #[error("response truncated by token limit")]
    Truncated,

    /// Provider withheld the output
    #[error("response blocked by content filter")]
    ContentFiltered,

    /// Provider reported a finish reason we cannot act on
    #[error("unknown finish reason: {0}")]
    UnknownFinish(String),

    /// The forced final round produced no text
    #[error("forced final round returned no text")]
    ForcedFinalEmpty,

    /// A human rejected the outbound call
    #[error("call rejected for {actor} ({agent_type})")]
    ApprovalRejected { actor: String, agent_type: String },

    /// The call was cancelled before it finished
    #[error("call cancelled")]
    Cancelled,

    /// Missing credentials or invalid settings
    #[error("configuration error: {0}")]
    Config(String),
}

impl LlmError {
    /// Short stable code for log lines
    pub fn code(&self) -> &'static str {
        match self {
            LlmError::EmptyResponse { .. } => "empty_response",
            LlmError::Backend(_) => "backend",
            LlmError::Parse(_) => "parse",
            LlmError::Truncated => "truncated",
            LlmError::ContentFiltered => "content_filter",
            LlmError::UnknownFinish(_) => "unknown_finish",
            LlmError::ForcedFinalEmpty => "forced_final_empty",
            LlmError::ApprovalRejected { .. } => "approval_rejected",
            LlmError::Cancelled => "cancelled",
            LlmError::Config(_) => "config",
        }
    }

    /// Whether the failure came from the model's output rather than transport or local state
    pub fn is_model_output(&self) -> bool {
        matches!(
            self,
            LlmError::EmptyResponse { .. }
                | LlmError::Parse(_)
                | LlmError::Truncated
                | LlmError::ContentFiltered
                | LlmError::UnknownFinish(_)
                | LlmError::ForcedFinalEmpty
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct_for_output_failures() {
        assert_eq!(LlmError::Truncated.code(), "truncated");
        assert_eq!(LlmError::ForcedFinalEmpty.code(), "forced_final_empty");
        assert!(LlmError::ContentFiltered.is_model_output());
        assert!(!LlmError::Cancelled.is_model_output());
    }

    #[test]
    fn test_rejection_message_names_actor() {
        let err = LlmError::ApprovalRejected {
            actor: "Hana".to_string(),
            agent_type: "planner".to_string(),
        };
        assert_eq!(err.to_string(), "call rejected for Hana (planner)");
    }
}
