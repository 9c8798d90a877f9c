//! Exponential backoff with jitter
//!
//! Backend faults are classified by matching their message text, falling back
//! to the HTTP status when the text carries no known signature. Rate limits
//! and overloads wait a long fixed delay; other transient faults back off
//! exponentially.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::ai::providers::ProviderId;
use crate::constants::retry::{BASE_DELAY, JITTER_MS, MAX_API_RETRIES, OVERLOADED_DELAY};

/// Recovery class of a backend fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    RateLimited,
    Overloaded,
    Transient,
    Fatal,
}

impl ErrorClass {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorClass::Fatal)
    }
}

const RATE_LIMIT_SIGNATURES: &[&str] = &[
    "rate_limit",
    "rate limited",
    "rate limit",
    "exceed the rate limit",
    "too many requests",
    "resource_exhausted",
];

const OVERLOADED_SIGNATURES: &[&str] = &["overloaded_error", "overloaded"];

const TRANSIENT_SIGNATURES: &[&str] = &[
    "timeout",
    "timed out",
    "temporarily",
    "again later",
    "unavailable",
    "connection reset",
];

/// HTTP status codes that are worth retrying when the body says nothing useful
pub const RETRYABLE_STATUS_CODES: &[u16] = &[
    429, // Too Many Requests
    500, // Internal Server Error
    502, // Bad Gateway
    503, // Service Unavailable
    504, // Gateway Timeout
    529, // Overloaded (Anthropic)
];

pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUS_CODES.contains(&status)
}

/// Classify a fault from its message text, then its status code
pub fn classify_message(message: &str, status: Option<u16>) -> ErrorClass {
    let lower = message.to_lowercase();
    if RATE_LIMIT_SIGNATURES.iter().any(|s| lower.contains(s)) {
        return ErrorClass::RateLimited;
    }
    if OVERLOADED_SIGNATURES.iter().any(|s| lower.contains(s)) {
        return ErrorClass::Overloaded;
    }
    if TRANSIENT_SIGNATURES.iter().any(|s| lower.contains(s)) {
        return ErrorClass::Transient;
    }
    match status {
        Some(429) => ErrorClass::RateLimited,
        Some(529) => ErrorClass::Overloaded,
        Some(code) if is_retryable_status(code) => ErrorClass::Transient,
        _ => ErrorClass::Fatal,
    }
}

/// Errors that know their recovery class
pub trait IsRetryable {
    fn error_class(&self) -> ErrorClass;

    /// Server-provided wait, if any
    fn retry_after(&self) -> Option<Duration>;
}

/// Retry knobs shared by empty-response recovery and fault recovery
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_api_retries: u32,
    /// Base of `base * 2^attempt`
    pub base_delay: Duration,
    /// Upper bound (exclusive) of random jitter in milliseconds, 0 disables it
    pub jitter_ms: u64,
    pub rate_limit_delay: Duration,
    pub overloaded_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::for_provider(ProviderId::default())
    }
}

impl RetryPolicy {
    pub fn for_provider(provider: ProviderId) -> Self {
        Self {
            max_api_retries: MAX_API_RETRIES,
            base_delay: BASE_DELAY,
            jitter_ms: JITTER_MS,
            rate_limit_delay: provider.rate_limit_delay(),
            overloaded_delay: OVERLOADED_DELAY,
        }
    }

    /// Same budget, no waiting
    pub fn immediate(max_api_retries: u32) -> Self {
        Self {
            max_api_retries,
            base_delay: Duration::ZERO,
            jitter_ms: 0,
            rate_limit_delay: Duration::ZERO,
            overloaded_delay: Duration::ZERO,
        }
    }

    /// `base * 2^attempt + jitter`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor) + self.jitter()
    }

    /// Wait before retrying a fault of `class`; `None` when it must not be retried
    pub fn delay_for(
        &self,
        class: ErrorClass,
        attempt: u32,
        retry_after: Option<Duration>,
    ) -> Option<Duration> {
        let delay = match class {
            ErrorClass::RateLimited => self.rate_limit_delay,
            ErrorClass::Overloaded => self.overloaded_delay,
            ErrorClass::Transient => self.backoff_delay(attempt),
            ErrorClass::Fatal => return None,
        };
        Some(match retry_after {
            Some(server) if server > delay => server,
            _ => delay,
        })
    }

    fn jitter(&self) -> Duration {
        if self.jitter_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..self.jitter_ms))
    }
}

/// Run `operation` until it succeeds, fails fatally, or the retry budget is spent.
///
/// Makes at most `max_api_retries + 1` attempts.
pub async fn with_retry<F, Fut, T, E>(policy: &RetryPolicy, operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let class = e.error_class();
                let delay = if attempt < policy.max_api_retries {
                    policy.delay_for(class, attempt, e.retry_after())
                } else {
                    None
                };
                let Some(delay) = delay else {
                    return Err(e);
                };

                warn!(
                    attempt = attempt + 1,
                    max_retries = policy.max_api_retries,
                    class = ?class,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after error: {}",
                    e
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Parse Retry-After header value
///
/// The header can be either:
/// - A number of seconds (e.g., "120")
/// - An HTTP date (e.g., "Wed, 21 Oct 2015 07:28:00 GMT")
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    if let Ok(seconds) = header_value.trim().parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    if let Ok(date) = httpdate::parse_http_date(header_value) {
        let now = std::time::SystemTime::now();
        if let Ok(duration) = date.duration_since(now) {
            return Some(duration);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct FakeError(&'static str);

    impl std::fmt::Display for FakeError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl IsRetryable for FakeError {
        fn error_class(&self) -> ErrorClass {
            classify_message(self.0, None)
        }

        fn retry_after(&self) -> Option<Duration> {
            None
        }
    }

    #[test]
    fn test_classify_signatures() {
        assert_eq!(
            classify_message("Error: rate_limit_error", None),
            ErrorClass::RateLimited
        );
        assert_eq!(
            classify_message("You exceed the rate limit", None),
            ErrorClass::RateLimited
        );
        assert_eq!(
            classify_message("{\"type\":\"overloaded_error\"}", None),
            ErrorClass::Overloaded
        );
        assert_eq!(
            classify_message("Request TIMEOUT", None),
            ErrorClass::Transient
        );
        assert_eq!(
            classify_message("please try again later", None),
            ErrorClass::Transient
        );
        assert_eq!(classify_message("invalid api key", Some(401)), ErrorClass::Fatal);
    }

    #[test]
    fn test_classify_falls_back_to_status() {
        assert_eq!(classify_message("", Some(429)), ErrorClass::RateLimited);
        assert_eq!(classify_message("", Some(529)), ErrorClass::Overloaded);
        assert_eq!(classify_message("bad gateway", Some(502)), ErrorClass::Transient);
        assert_eq!(classify_message("bad request", Some(400)), ErrorClass::Fatal);
        assert!(ErrorClass::Overloaded.is_retryable());
        assert!(!ErrorClass::Fatal.is_retryable());
    }

    #[test]
    fn test_backoff_doubles_without_jitter() {
        let policy = RetryPolicy {
            jitter_ms: 0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(3000));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(12000));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let d = policy.backoff_delay(0);
            assert!(d >= Duration::from_millis(3000));
            assert!(d < Duration::from_millis(3250));
        }
    }

    #[test]
    fn test_fixed_delays_per_class() {
        let policy = RetryPolicy::for_provider(ProviderId::Anthropic);
        assert_eq!(
            policy.delay_for(ErrorClass::RateLimited, 0, None),
            Some(Duration::from_secs(100))
        );
        assert_eq!(
            policy.delay_for(ErrorClass::Overloaded, 1, None),
            Some(Duration::from_secs(300))
        );
        assert_eq!(policy.delay_for(ErrorClass::Fatal, 0, None), None);
        assert_eq!(
            policy.delay_for(ErrorClass::RateLimited, 0, Some(Duration::from_secs(500))),
            Some(Duration::from_secs(500))
        );
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after("0"), Some(Duration::from_secs(0)));
        assert_eq!(parse_retry_after("soon"), None);
    }

    #[tokio::test]
    async fn test_rate_limit_exhausts_after_budget() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);
        let result: Result<(), FakeError> = with_retry(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FakeError("rate_limit_error")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_fatal_is_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);
        let result: Result<(), FakeError> = with_retry(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FakeError("invalid_request_error")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);
        let result: Result<u32, FakeError> = with_retry(&policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(FakeError("service temporarily unavailable"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.ok(), Some(2));
    }
}
