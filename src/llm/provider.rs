//! Provider trait for completion transports

use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{errors::LlmResult, types::ChatRequest};

/// Trait for completion transports
///
/// Implementations perform exactly one API call per invocation. The retry
/// policy lives in [`crate::llm::client::CompletionClient`].
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Send a chat completion request, returning the requested number of
    /// completion texts in API order.
    async fn complete(&self, request: &ChatRequest) -> LlmResult<Vec<String>>;

    /// Get the provider name
    fn name(&self) -> &str;

    /// Get the model name
    fn model(&self) -> &str;
}

/// Transport tunables shared by provider implementations
#[derive(Debug, Clone)]
pub struct ProviderClientOptions {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ProviderClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            user_agent: format!("genie/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Utility functions for provider implementations
pub mod utils {
    /// Pull a human-readable message out of an error response body.
    pub async fn extract_error_message(response: reqwest::Response) -> String {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let api_message = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|json| {
                json.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            });
        match api_message {
            Some(message) => format!("{}: {}", status, message),
            None => format!("{}: {}", status, text),
        }
    }
}
