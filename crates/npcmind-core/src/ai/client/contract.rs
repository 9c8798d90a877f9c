//! The agent client contract
//!
//! Every provider adapter exposes the same surface: local message and tool
//! mutation, plus `send`, the only method that touches the network.

use async_trait::async_trait;

use crate::ai::client::hooks::CallIdentity;
use crate::ai::client::reply::Reply;
use crate::ai::providers::ProviderId;
use crate::ai::types::{Message, ResponseSchema, Role, ToolInvocationRecord, ToolSchema};
use crate::error::LlmResult;

#[async_trait]
pub trait AgentClient: Send {
    fn provider(&self) -> ProviderId;

    /// Actor, agent type and session used for approval, caching and logs
    fn identity(&self) -> &CallIdentity;

    fn messages(&self) -> &[Message];

    fn message_count(&self) -> usize {
        self.messages().len()
    }

    fn add_message(&mut self, message: Message);

    fn add_system_message(&mut self, text: &str) {
        self.add_message(Message::system(text));
    }

    fn add_user_message(&mut self, text: &str) {
        self.add_message(Message::user(text));
    }

    fn add_assistant_message(&mut self, text: &str) {
        self.add_message(Message::assistant(text));
    }

    /// Remove the message at `index`, if it exists
    fn remove_at(&mut self, index: usize) -> Option<Message>;

    /// Drop the history, optionally keeping system messages
    fn clear_messages(&mut self, keep_system: bool);

    fn register_tools(&mut self, tools: Vec<ToolSchema>);

    fn clear_tools(&mut self);

    fn set_response_format(&mut self, schema: Option<ResponseSchema>);

    fn set_temperature(&mut self, temperature: Option<f32>);

    /// Tools executed during the most recent `send`
    fn executed_tools(&self) -> &[ToolInvocationRecord];

    /// Run the conversation to a terminal response.
    ///
    /// `String` returns the text verbatim; `Json<T>` decodes it. Never yields a
    /// placeholder value: every failure is an error.
    async fn send<R: Reply>(&mut self) -> LlmResult<R>;

    /// Append `messages`, set the response schema, then `send`
    async fn send_messages<R: Reply>(
        &mut self,
        messages: Vec<Message>,
        schema: Option<ResponseSchema>,
    ) -> LlmResult<R> {
        for message in messages {
            self.add_message(message);
        }
        self.set_response_format(schema);
        self.send::<R>().await
    }
}

/// Shared `clear_messages` behavior for adapters keeping a `Vec<Message>`
pub(crate) fn retain_system(messages: &mut Vec<Message>, keep_system: bool) {
    if keep_system {
        messages.retain(|m| m.role == Role::System);
    } else {
        messages.clear();
    }
}
