//! Shared recovery policy
//!
//! One `ResponsePolicy` is built per process and handed to every adapter, so
//! retry budgets, backoff, and decoding behave identically across providers.

use std::time::Duration;

use crate::ai::client::reply::Reply;
use crate::ai::parsers::ParseFailure;
use crate::ai::providers::ProviderId;
use crate::ai::retry::RetryPolicy;

#[derive(Debug, Clone, Default)]
pub struct ResponsePolicy {
    pub retry: RetryPolicy,
}

impl ResponsePolicy {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    pub fn for_provider(provider: ProviderId) -> Self {
        Self::new(RetryPolicy::for_provider(provider))
    }

    /// Budget for corrective retries after empty replies
    pub fn max_empty_retries(&self) -> u32 {
        self.retry.max_api_retries
    }

    /// Wait before the `attempt`-th corrective retry
    pub fn empty_retry_delay(&self, attempt: u32) -> Duration {
        self.retry.backoff_delay(attempt)
    }

    /// Turn terminal model text into the requested reply type
    pub fn decode<R: Reply>(&self, raw: &str) -> Result<R, ParseFailure> {
        R::from_model_text(raw)
    }
}
