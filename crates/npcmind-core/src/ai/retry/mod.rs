//! Retry policy for backend calls
//!
//! - Classification of backend error text into rate-limit / overload / transient / fatal
//! - Per-class delays (fixed waits, exponential backoff with jitter)
//! - `with_retry` driver shared by every provider adapter

mod backoff;

pub use backoff::{
    classify_message, is_retryable_status, parse_retry_after, with_retry, ErrorClass, IsRetryable,
    RetryPolicy, RETRYABLE_STATUS_CODES,
};
