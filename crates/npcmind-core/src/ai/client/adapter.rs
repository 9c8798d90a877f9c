//! Provider adapter and tool-calling loop
//!
//! One `ProviderAdapter` owns a single conversation. Provider differences live
//! in its `FormatHandler`; everything else (the loop, recovery, persistence)
//! is shared.
//!
//! Loop states:
//! - Dispatch: serialize history, tools and schema hint; call the backend
//! - AwaitResponse: terminal text finalizes, tool calls execute, an empty
//!   reply appends a corrective notice and dispatches again
//! - ExecuteTools: run each call in order, append results, count the round
//! - ForceFinal: after `max_tool_rounds`, clear tools and demand an answer once

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::backend::{Backend, DispatchRequest};
use super::config::AgentClientConfig;
use super::context_cache::ContextCache;
use super::contract::{retain_system, AgentClient};
use super::hooks::{CallIdentity, ConversationSink, ResponseCache, Transcript, TranscriptOutcome};
use super::policy::ResponsePolicy;
use super::reply::Reply;
use crate::ai::format::google::GoogleFormat;
use crate::ai::format::{get_format_handler, system_prompt, FormatHandler, RequestOptions};
use crate::ai::providers::ProviderId;
use crate::ai::retry::with_retry;
use crate::ai::types::{
    Content, FinishReason, Message, ModelResponse, ResponseSchema, ToolCall, ToolInvocationRecord,
    ToolSchema, Usage,
};
use crate::constants::ai::{EMPTY_RESPONSE_NOTICE, FORCE_FINAL_NOTICE};
use crate::error::{LlmError, LlmResult};
use crate::storage::ResponseCacheEnvelope;
use crate::tools::{ToolExecutor, ToolResult};

/// Result of one backend round trip
enum DispatchOutcome {
    Reply(ModelResponse),
    /// Well-formed reply with neither text nor tool calls
    Empty,
}

/// Conversation bound to one provider
pub struct ProviderAdapter {
    config: AgentClientConfig,
    format: Box<dyn FormatHandler>,
    backend: Arc<dyn Backend>,
    policy: Arc<ResponsePolicy>,
    executor: Option<Arc<dyn ToolExecutor>>,
    cache: Option<Arc<dyn ResponseCache>>,
    sink: Option<Arc<dyn ConversationSink>>,
    identity: CallIdentity,
    messages: Vec<Message>,
    tools: Vec<ToolSchema>,
    response_schema: Option<ResponseSchema>,
    temperature: Option<f32>,
    executed: Vec<ToolInvocationRecord>,
    context_cache: ContextCache,
}

impl ProviderAdapter {
    pub fn new(
        config: AgentClientConfig,
        backend: Arc<dyn Backend>,
        policy: Arc<ResponsePolicy>,
    ) -> Self {
        let context_cache =
            ContextCache::new(config.context_cache_ttl, config.context_cache_min_tokens);
        Self {
            format: get_format_handler(config.provider),
            config,
            backend,
            policy,
            executor: None,
            cache: None,
            sink: None,
            identity: CallIdentity::default(),
            messages: Vec::new(),
            tools: Vec::new(),
            response_schema: None,
            temperature: None,
            executed: Vec::new(),
            context_cache,
        }
    }

    pub fn with_executor(mut self, executor: Arc<dyn ToolExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_response_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_conversation_sink(mut self, sink: Arc<dyn ConversationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_identity(mut self, identity: CallIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn config(&self) -> &AgentClientConfig {
        &self.config
    }

    pub fn tools(&self) -> &[ToolSchema] {
        &self.tools
    }

    /// Run tool rounds until a terminal text arrives
    async fn run_tool_loop(&mut self) -> LlmResult<String> {
        let mut tool_rounds = 0usize;
        let mut forced = false;

        loop {
            let response = self.dispatch_round(forced).await?;
            check_finish(&response.finish)?;

            if forced {
                if !response.tool_calls.is_empty() {
                    warn!(
                        actor = %self.identity.actor,
                        calls = response.tool_calls.len(),
                        "Ignoring tool calls in forced final round"
                    );
                }
                if response.text.trim().is_empty() {
                    error!(actor = %self.identity.actor, "Forced final round returned no text");
                    return Err(LlmError::ForcedFinalEmpty);
                }
                self.messages.push(Message::assistant(response.text.clone()));
                return Ok(response.text);
            }

            if response.tool_calls.is_empty() {
                self.messages.push(Message::assistant(response.text.clone()));
                return Ok(response.text);
            }

            self.messages.push(Message::assistant_tool_calls(
                &response.text,
                &response.tool_calls,
            ));
            let results = response
                .tool_calls
                .iter()
                .map(|call| self.execute_tool_call(call))
                .collect();
            self.messages.push(Message::tool_results(results));
            tool_rounds += 1;

            if tool_rounds >= self.config.max_tool_rounds {
                warn!(
                    actor = %self.identity.actor,
                    rounds = tool_rounds,
                    "Tool round limit reached, forcing final answer"
                );
                self.messages.push(Message::user(FORCE_FINAL_NOTICE));
                self.tools.clear();
                forced = true;
            }
        }
    }

    /// Dispatch until the backend returns something other than an empty reply.
    ///
    /// The forced final round is never retried for emptiness.
    async fn dispatch_round(&mut self, forced: bool) -> LlmResult<ModelResponse> {
        let mut empty_retries = 0u32;

        loop {
            match self.dispatch_once().await? {
                DispatchOutcome::Reply(response) => return Ok(response),
                DispatchOutcome::Empty if forced => {
                    return Err(LlmError::ForcedFinalEmpty);
                }
                DispatchOutcome::Empty => {
                    if empty_retries >= self.policy.max_empty_retries() {
                        error!(
                            actor = %self.identity.actor,
                            attempts = empty_retries + 1,
                            "Backend kept returning empty responses"
                        );
                        return Err(LlmError::EmptyResponse {
                            attempts: empty_retries + 1,
                        });
                    }
                    let delay = self.policy.empty_retry_delay(empty_retries);
                    warn!(
                        actor = %self.identity.actor,
                        attempt = empty_retries + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Empty response, retrying with corrective instruction"
                    );
                    self.messages.push(Message::user(EMPTY_RESPONSE_NOTICE));
                    tokio::time::sleep(delay).await;
                    empty_retries += 1;
                }
            }
        }
    }

    /// One request with transient-fault retries
    async fn dispatch_once(&mut self) -> LlmResult<DispatchOutcome> {
        let cached_content = self.prepare_context_cache().await;

        let request = {
            let options = RequestOptions {
                max_tokens: self.config.max_tokens,
                tools: &self.tools,
                response_schema: self.response_schema.as_ref(),
                temperature: self.temperature,
                prompt_caching: self.config.prompt_caching,
                cached_content: cached_content.as_deref(),
                cache_key: Some(self.identity.agent_type.as_str()),
            };
            DispatchRequest {
                path: self.format.endpoint_path(&self.config.model),
                body: self
                    .format
                    .build_request_body(&self.config.model, &self.messages, &options),
            }
        };

        if self.config.enable_outgoing_logs {
            if let Some(sink) = &self.sink {
                sink.log_request(&self.identity, self.config.provider, &request.body);
            }
        }

        let backend = Arc::clone(&self.backend);
        let raw = with_retry(&self.policy.retry, || backend.dispatch(&request)).await?;

        if self.config.enable_outgoing_logs {
            if let Some(sink) = &self.sink {
                sink.log_raw_response(&self.identity, self.config.provider, &raw);
            }
        }

        let response = self.format.parse_response(&raw);
        self.log_usage(&response.usage);

        let empty = response.is_empty()
            && matches!(response.finish, FinishReason::Stop | FinishReason::ToolUse);
        Ok(if empty {
            DispatchOutcome::Empty
        } else {
            DispatchOutcome::Reply(response)
        })
    }

    /// Probe or create the explicit context cache; `None` sends the full prompt
    async fn prepare_context_cache(&mut self) -> Option<String> {
        if !self.config.uses_context_cache() {
            return None;
        }

        let system = system_prompt(&self.messages);
        if !self.context_cache.is_eligible(system.as_deref(), &self.tools) {
            return None;
        }

        let fingerprint =
            ContextCache::fingerprint(&self.config.model, system.as_deref(), &self.tools);
        if let Some(name) = self.context_cache.lookup(&fingerprint) {
            debug!(handle = %name, "Reusing cached context");
            return Some(name.to_string());
        }

        let google = GoogleFormat::new();
        let request = DispatchRequest {
            path: google.cached_contents_path().to_string(),
            body: google.build_cached_content_body(
                &self.config.model,
                system.as_deref(),
                &self.tools,
                self.context_cache.ttl(),
            ),
        };

        match self.backend.dispatch(&request).await {
            Ok(reply) => match reply.get("name").and_then(Value::as_str) {
                Some(name) => {
                    info!(handle = %name, "Created cached context");
                    self.context_cache
                        .store(name.to_string(), fingerprint);
                    Some(name.to_string())
                }
                None => {
                    warn!("Cached context reply carried no name, sending full prompt");
                    self.context_cache.invalidate();
                    None
                }
            },
            Err(e) => {
                warn!("Failed to create cached context, sending full prompt: {}", e);
                self.context_cache.invalidate();
                None
            }
        }
    }

    fn execute_tool_call(&mut self, call: &ToolCall) -> Content {
        let result = match &self.executor {
            Some(executor) => match executor.execute(&call.name, &call.input) {
                Ok(output) => ToolResult::success(output),
                Err(e) => ToolResult::error(e.to_string()),
            },
            None => ToolResult::error(format!("No tool executor available for {}", call.name)),
        };

        info!(
            actor = %self.identity.actor,
            tool = %call.name,
            is_error = result.is_error,
            "Executed tool call"
        );

        self.executed.push(ToolInvocationRecord {
            name: call.name.clone(),
            args_json: call.input.to_string(),
        });
        Content::tool_result(call, result.output, result.is_error)
    }

    fn log_usage(&self, usage: &Usage) {
        if usage.cache_read_tokens > 0 {
            debug!(
                provider = %self.config.provider,
                read_in = usage.cache_read_tokens,
                "Prompt cache hit"
            );
        } else if usage.cache_creation_tokens > 0 {
            debug!(
                provider = %self.config.provider,
                creation_in = usage.cache_creation_tokens,
                "Prompt cache written"
            );
        }
        debug!(
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Token usage"
        );
    }

    fn persist<R: Reply>(&self, reply: &R) {
        let Some(cache) = &self.cache else {
            return;
        };
        let envelope = ResponseCacheEnvelope {
            payload: reply.cache_payload(),
            tools: self.executed.clone(),
        };
        if let Err(e) = cache.save(&self.identity, self.config.provider, &envelope) {
            warn!(actor = %self.identity.actor, "Failed to save cached response: {}", e);
        }
    }

    fn record_transcript(&self, outcome: TranscriptOutcome) {
        let Some(sink) = &self.sink else {
            return;
        };
        let transcript = Transcript {
            identity: &self.identity,
            provider: self.config.provider,
            model: &self.config.model,
            messages: &self.messages,
            outcome,
        };
        if let Err(e) = sink.record(&transcript) {
            warn!(actor = %self.identity.actor, "Failed to write conversation log: {}", e);
        }
    }
}

/// Provider signals that the output is unusable; retrying would not help
fn check_finish(finish: &FinishReason) -> LlmResult<()> {
    match finish {
        FinishReason::Stop | FinishReason::ToolUse => Ok(()),
        FinishReason::Length => {
            error!("Response truncated by token limit");
            Err(LlmError::Truncated)
        }
        FinishReason::ContentFilter => {
            error!("Response blocked by content filter");
            Err(LlmError::ContentFiltered)
        }
        FinishReason::Unknown(reason) => {
            error!(reason = %reason, "Unexpected finish reason");
            Err(LlmError::UnknownFinish(reason.clone()))
        }
    }
}

#[async_trait]
impl AgentClient for ProviderAdapter {
    fn provider(&self) -> ProviderId {
        self.config.provider
    }

    fn identity(&self) -> &CallIdentity {
        &self.identity
    }

    fn messages(&self) -> &[Message] {
        &self.messages
    }

    fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    fn remove_at(&mut self, index: usize) -> Option<Message> {
        if index < self.messages.len() {
            Some(self.messages.remove(index))
        } else {
            None
        }
    }

    fn clear_messages(&mut self, keep_system: bool) {
        retain_system(&mut self.messages, keep_system);
    }

    fn register_tools(&mut self, tools: Vec<ToolSchema>) {
        for tool in tools {
            match self.tools.iter_mut().find(|t| t.name == tool.name) {
                Some(existing) => *existing = tool,
                None => self.tools.push(tool),
            }
        }
    }

    fn clear_tools(&mut self) {
        self.tools.clear();
    }

    fn set_response_format(&mut self, schema: Option<ResponseSchema>) {
        self.response_schema = schema;
    }

    fn set_temperature(&mut self, temperature: Option<f32>) {
        self.temperature = temperature;
    }

    fn executed_tools(&self) -> &[ToolInvocationRecord] {
        &self.executed
    }

    async fn send<R: Reply>(&mut self) -> LlmResult<R> {
        self.executed.clear();
        info!(
            provider = %self.config.provider,
            actor = %self.identity.actor,
            agent_type = %self.identity.agent_type,
            messages = self.messages.len(),
            "Sending conversation"
        );

        let text = match self.run_tool_loop().await {
            Ok(text) => text,
            Err(e) => {
                error!(actor = %self.identity.actor, code = e.code(), "Conversation failed: {}", e);
                self.record_transcript(TranscriptOutcome::Error {
                    kind: "API",
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        match self.policy.decode::<R>(&text) {
            Ok(reply) => {
                self.persist(&reply);
                self.record_transcript(TranscriptOutcome::Final(text));
                Ok(reply)
            }
            Err(failure) => {
                self.record_transcript(TranscriptOutcome::Error {
                    kind: "PARSE",
                    message: failure.to_string(),
                });
                Err(LlmError::Parse(failure))
            }
        }
    }
}
