//! OpenAI chat completions transport

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde::Deserialize;
use serde_json::json;

use crate::llm::{
    errors::{LlmError, LlmResult},
    provider::{utils, CompletionProvider, ProviderClientOptions},
    types::{ChatRequest, ProviderConfig},
};

/// OpenAI API provider
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    config: ProviderConfig,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider
    pub fn new(config: ProviderConfig) -> LlmResult<Self> {
        let mut headers = HeaderMap::new();

        if let Some(api_key) = &config.api_key {
            let auth_value = HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| LlmError::ConfigError(format!("Invalid API key: {}", e)))?;
            headers.insert(AUTHORIZATION, auth_value);
        } else {
            return Err(LlmError::ConfigError("API key is required".to_string()));
        }

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let options = ProviderClientOptions::default();
        let client = Client::builder()
            .default_headers(headers)
            .timeout(options.timeout)
            .user_agent(&options.user_agent)
            .build()
            .map_err(|e| LlmError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Get the API endpoint URL
    fn get_endpoint(&self) -> String {
        let base_url = self.config.base_url.as_deref().unwrap_or("https://api.openai.com");
        format!("{}/v1/chat/completions", base_url)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(&self, request: &ChatRequest) -> LlmResult<Vec<String>> {
        // Message derives serde with lowercase roles, which is exactly the
        // chat completions wire shape.
        let mut request_body = json!({
            "model": self.config.model,
            "messages": request.messages,
            "n": request.outputs,
            "temperature": request.temperature,
        });

        if let Some(max_tokens) = request.max_tokens.or(self.config.max_tokens) {
            request_body["max_tokens"] = json!(max_tokens);
        }

        let response = self
            .client
            .post(self.get_endpoint())
            .json(&request_body)
            .send()
            .await
            .map_err(LlmError::HttpError)?;

        let status = response.status();
        if !status.is_success() {
            let error_msg = utils::extract_error_message(response).await;
            return Err(match status.as_u16() {
                429 => LlmError::RateLimitError(error_msg),
                401 | 403 => LlmError::AuthError(error_msg),
                400..=499 => LlmError::InvalidRequestError(error_msg),
                _ => LlmError::ServerError(error_msg),
            });
        }

        let body: ApiResponse = response.json().await.map_err(LlmError::HttpError)?;
        let texts: Vec<String> = body
            .choices
            .into_iter()
            .map(|choice| choice.message.content.unwrap_or_default())
            .collect();

        if texts.is_empty() {
            return Err(LlmError::EmptyResponseError);
        }

        Ok(texts)
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

// OpenAI API types
#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::Message;

    #[test]
    fn test_requires_api_key() {
        let config = ProviderConfig {
            model: "gpt-4-0613".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            OpenAiProvider::new(config),
            Err(LlmError::ConfigError(_))
        ));
    }

    #[test]
    fn test_endpoint_uses_base_url_override() {
        let config = ProviderConfig {
            api_key: Some("test-key".to_string()),
            base_url: Some("http://localhost:8080".to_string()),
            model: "gpt-4-0613".to_string(),
            max_tokens: None,
        };
        let provider = OpenAiProvider::new(config).unwrap();
        assert_eq!(provider.get_endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_messages_serialize_to_the_wire_shape() {
        let messages = vec![Message::system("be terse"), Message::user("hi")];
        let body = json!({ "messages": messages });
        assert_eq!(
            body["messages"],
            json!([
                {"role": "system", "content": "be terse"},
                {"role": "user", "content": "hi"},
            ])
        );
    }

    #[test]
    fn test_parses_multiple_choices_in_order() {
        let raw = json!({
            "choices": [
                {"message": {"role": "assistant", "content": "one"}},
                {"message": {"role": "assistant", "content": "two"}},
            ]
        });
        let body: ApiResponse = serde_json::from_value(raw).unwrap();
        let texts: Vec<String> = body
            .choices
            .into_iter()
            .map(|c| c.message.content.unwrap_or_default())
            .collect();
        assert_eq!(texts, vec!["one".to_string(), "two".to_string()]);
    }
}
