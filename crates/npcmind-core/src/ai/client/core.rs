//! HTTP backend
//!
//! Sends provider requests with reqwest and turns non-2xx replies into
//! `BackendError`s that carry the status, body text, and any `Retry-After`.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error};

use super::backend::{Backend, BackendError, DispatchRequest};
use crate::ai::providers::{AuthHeader, ProviderId};
use crate::ai::retry::parse_retry_after;
use crate::constants;

/// API version header for Anthropic
const ANTHROPIC_API_VERSION: &str = "2023-06-01";

/// reqwest-backed provider transport
pub struct HttpBackend {
    http: Client,
    provider: ProviderId,
    base_url: String,
    api_key: String,
}

impl HttpBackend {
    fn create_http_client() -> Client {
        Client::builder()
            .user_agent(concat!("npcmind/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(constants::http::CONNECT_TIMEOUT)
            .timeout(constants::http::REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                error!("Failed to build HTTP client: {}. Using default client.", e);
                Client::new()
            })
    }

    pub fn new(provider: ProviderId, api_key: String) -> Self {
        Self {
            http: Self::create_http_client(),
            provider,
            base_url: provider.base_url().to_string(),
            api_key,
        }
    }

    /// Point at a proxy or compatible server instead of the provider default
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    /// Build a request with proper authentication headers
    fn build_request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut request = self.http.post(url);

        request = match self.provider.auth_header() {
            AuthHeader::Bearer => {
                request.header("authorization", format!("Bearer {}", self.api_key))
            }
            AuthHeader::XApiKey => request.header("x-api-key", &self.api_key),
            AuthHeader::XGoogApiKey => request.header("x-goog-api-key", &self.api_key),
        };

        if self.provider == ProviderId::Anthropic {
            request = request.header("anthropic-version", ANTHROPIC_API_VERSION);
        }

        request.header("content-type", "application/json")
    }

    /// Handle an error response and return a typed error
    async fn handle_error_response(response: reqwest::Response) -> BackendError {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let error_text = response.text().await.unwrap_or_default();
        error!("API error response: {} - {}", status, error_text);
        BackendError {
            status: Some(status),
            message: error_text,
            retry_after,
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<Value, BackendError> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!(provider = %self.provider, url = %url, "Dispatching request");

        let response = self
            .build_request(&url)
            .json(&request.body)
            .send()
            .await
            .map_err(|e| {
                // reqwest phrases timeouts differently across versions; make the signature explicit
                let message = if e.is_timeout() {
                    format!("timeout: {}", e)
                } else if e.is_connect() {
                    format!("connection temporarily unavailable: {}", e)
                } else {
                    e.to_string()
                };
                BackendError::new(message)
            })?;

        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| BackendError::new(format!("invalid response body: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::retry::ErrorClass;

    #[tokio::test]
    async fn test_connect_failure_is_transient() {
        // nothing listens on port 1
        let backend = HttpBackend::new(ProviderId::OpenAi, "key".to_string())
            .with_base_url("http://127.0.0.1:1");
        let request = DispatchRequest {
            path: "/v1/chat/completions".to_string(),
            body: serde_json::json!({}),
        };

        let err = backend.dispatch(&request).await.unwrap_err();
        assert_eq!(err.status, None);
        assert_eq!(err.class(), ErrorClass::Transient);
    }
}
