//! Backend transport seam
//!
//! The tool loop only ever talks to a `Backend`. Production code uses the
//! reqwest-based `HttpBackend`; tests script replies in process.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::ai::retry::{classify_message, ErrorClass, IsRetryable};

/// One HTTP POST against a provider API
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// Path below the provider base URL
    pub path: String,
    pub body: Value,
}

/// Transport or API failure reported by a backend
#[derive(Debug, Clone)]
pub struct BackendError {
    pub status: Option<u16>,
    pub message: String,
    pub retry_after: Option<Duration>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn class(&self) -> ErrorClass {
        classify_message(&self.message, self.status)
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(code) => write!(f, "HTTP {}: {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for BackendError {}

impl IsRetryable for BackendError {
    fn error_class(&self) -> ErrorClass {
        self.class()
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

/// Something that can execute provider requests
#[async_trait]
pub trait Backend: Send + Sync {
    /// POST `request.body` to `request.path` and return the JSON reply
    async fn dispatch(&self, request: &DispatchRequest) -> Result<Value, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_status() {
        let err = BackendError::with_status(529, "overloaded_error");
        assert_eq!(err.to_string(), "HTTP 529: overloaded_error");
        assert_eq!(err.class(), ErrorClass::Overloaded);
        assert_eq!(BackendError::new("socket closed").to_string(), "socket closed");
    }
}
