//! Completion client with retry and follow-up handling
//!
//! Wraps a transport provider with the policy the conversation layer relies
//! on: a fixed pause between attempts on transient failures, and a best
//! effort secondary call that collects suggested next queries.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::llm::{
    errors::{LlmError, LlmResult},
    provider::CompletionProvider,
    types::{ChatRequest, CompletionOutcome, Message},
};

/// Question appended after the primary answer to collect follow-up ideas.
const FOLLOW_UP_PROMPT: &str = "What are some follow-up queries I might run, which would use \
    python gget? Please provide answers in natural language. Keep answer brief and limit to 3 max";

/// Pause before re-attempting a failed completion call.
const RETRY_BACKOFF: Duration = Duration::from_secs(10);

/// Client over a completion transport
pub struct CompletionClient {
    provider: Arc<dyn CompletionProvider>,
    backoff: Duration,
}

impl CompletionClient {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            backoff: RETRY_BACKOFF,
        }
    }

    /// Override the pause between attempts.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Request `outputs` completions for `messages`, retrying transient
    /// failures up to `attempts` times total. When `want_follow_up` is set,
    /// one extra call collects suggested next queries; its failure never
    /// fails the primary answer.
    pub async fn complete(
        &self,
        messages: &[Message],
        outputs: u32,
        temperature: f32,
        attempts: u32,
        want_follow_up: bool,
    ) -> LlmResult<CompletionOutcome> {
        let mut request = ChatRequest::new(messages.to_vec());
        request.outputs = outputs;
        request.temperature = temperature;

        let texts = self.try_complete(&request, attempts).await?;

        let mut follow_up = None;
        if want_follow_up {
            match self.request_follow_up(messages, texts.first(), temperature).await {
                Ok(text) => follow_up = Some(text),
                Err(e) => warn!("Follow-up completion failed: {}", e),
            }
        }

        Ok(CompletionOutcome { texts, follow_up })
    }

    /// Run the attempt loop for one request.
    async fn try_complete(&self, request: &ChatRequest, attempts: u32) -> LlmResult<Vec<String>> {
        let attempts = attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                sleep(self.backoff).await;
            }

            match self.provider.complete(request).await {
                Ok(texts) => return Ok(texts),
                Err(e) if e.is_transient() => {
                    debug!(attempt, "Transient completion failure: {}", e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(LlmError::UnavailableError(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempts made".to_string()),
        ))
    }

    /// Ask for follow-up suggestions on top of the answered conversation.
    async fn request_follow_up(
        &self,
        messages: &[Message],
        primary: Option<&String>,
        temperature: f32,
    ) -> LlmResult<String> {
        let mut follow_messages = messages.to_vec();
        if let Some(primary) = primary {
            follow_messages.push(Message::assistant(primary.clone()));
        }
        follow_messages.push(Message::user(FOLLOW_UP_PROMPT));

        let mut request = ChatRequest::new(follow_messages);
        request.temperature = temperature;

        let texts = self.provider.complete(&request).await?;
        texts.into_iter().next().ok_or(LlmError::EmptyResponseError)
    }
}
