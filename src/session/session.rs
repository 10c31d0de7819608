//! A single chat session and its question pipeline

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::{
    exec::{
        extract::extract_code_blocks,
        namespace::ExecNamespace,
        runner::{CodeCorrector, CodeRunner, ExecError},
    },
    llm::{client::CompletionClient, errors::LlmError},
    session::{
        conversation::{ConversationState, SessionStatus, StateInconsistency},
        prompt::PromptBuilder,
    },
};

/// Tunables copied into each session at creation time
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Context budget for the conversation, in approximate tokens
    pub max_context_tokens: usize,
    /// Attempt budget per completion call
    pub completion_attempts: u32,
    /// Sampling temperature for completions
    pub temperature: f32,
    /// Wall clock budget for one code run, corrections included
    pub exec_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_context_tokens: 8192,
            completion_attempts: 3,
            temperature: 0.75,
            exec_timeout: Duration::from_secs(120),
        }
    }
}

/// Payload returned for an answered question
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub follow_up_suggestions: String,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    State(#[from] StateInconsistency),

    #[error("Completion failed: {0}")]
    Completion(#[from] LlmError),

    #[error("Execution failed: {0}")]
    Execution(#[from] ExecError),
}

/// One user's conversation and execution context
pub struct ChatSession {
    id: String,
    created_at: DateTime<Utc>,
    last_used: DateTime<Utc>,
    prompt: String,
    conversation: ConversationState,
    namespace: ExecNamespace,
    settings: SessionSettings,
}

impl ChatSession {
    /// Create a session with a fresh namespace seeded from `init_script`.
    pub fn new(
        id: impl Into<String>,
        settings: SessionSettings,
        init_script: &str,
    ) -> std::io::Result<Self> {
        let now = Utc::now();
        Ok(Self {
            id: id.into(),
            created_at: now,
            last_used: now,
            prompt: String::new(),
            conversation: ConversationState::new(settings.max_context_tokens),
            namespace: ExecNamespace::new(init_script)?,
            settings,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_used(&self) -> DateTime<Utc> {
        self.last_used
    }

    pub fn status(&self) -> SessionStatus {
        self.conversation.status()
    }

    pub fn tokens_left(&self) -> i64 {
        self.conversation.tokens_left()
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    pub fn namespace(&self) -> &ExecNamespace {
        &self.namespace
    }

    /// Answer one question.
    ///
    /// Rebuilds the prompt for the given database and verbosity, requests a
    /// completion, and, when the reply carries code, executes it in the
    /// session namespace. The answer is the captured output in that case
    /// and the raw reply otherwise.
    pub async fn ask_question(
        &mut self,
        client: &CompletionClient,
        runner: &CodeRunner,
        question: &str,
        database: &str,
        wordiness: &str,
    ) -> Result<Answer, SessionError> {
        self.prompt = PromptBuilder::new(database, wordiness).render();
        self.conversation.push_question(question);
        let messages = self.conversation.build(&self.prompt)?;

        let outcome = client
            .complete(
                &messages,
                1,
                self.settings.temperature,
                self.settings.completion_attempts,
                true,
            )
            .await?;
        let response = outcome.primary().to_string();
        self.conversation.push_response(response.clone());

        let code = extract_code_blocks(&response);
        let answer = if code.trim().is_empty() {
            response
        } else {
            let mut corrector = ModelCorrector {
                client,
                conversation: &mut self.conversation,
                prompt: &self.prompt,
                settings: &self.settings,
                failure: None,
            };
            match runner
                .run(&code, &mut self.namespace, &mut corrector, self.settings.exec_timeout)
                .await
            {
                Ok(result) => {
                    info!(
                        session_id = %self.id,
                        attempts = result.attempts,
                        success = result.success,
                        "Code execution finished"
                    );
                    result.output
                }
                Err(e) => {
                    if let Some(llm) = corrector.failure.take() {
                        return Err(SessionError::Completion(llm));
                    }
                    return Err(SessionError::Execution(e));
                }
            }
        };

        self.last_used = Utc::now();
        Ok(Answer {
            answer,
            follow_up_suggestions: outcome.follow_up.unwrap_or_default(),
        })
    }
}

/// Corrector that asks the model for replacement code through the session's
/// own conversation, so the exchange stays in history.
struct ModelCorrector<'a> {
    client: &'a CompletionClient,
    conversation: &'a mut ConversationState,
    prompt: &'a str,
    settings: &'a SessionSettings,
    /// Completion failure stashed so the caller can surface it verbatim.
    failure: Option<LlmError>,
}

fn correction_question(error: &str) -> String {
    format!(
        "an error occurred: `{}`; provide an alternative executable example, \
         avoid creating subdirectories",
        error
    )
}

#[async_trait]
impl CodeCorrector for ModelCorrector<'_> {
    async fn correct(&mut self, error: &str) -> Result<Option<String>, ExecError> {
        self.conversation.push_question(correction_question(error));
        let messages = self
            .conversation
            .build(self.prompt)
            .map_err(|e| ExecError::CorrectionError(e.to_string()))?;

        let outcome = match self
            .client
            .complete(
                &messages,
                1,
                self.settings.temperature,
                self.settings.completion_attempts,
                false,
            )
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                let message = e.to_string();
                self.failure = Some(e);
                return Err(ExecError::CorrectionError(message));
            }
        };

        let reply = outcome.primary().to_string();
        self.conversation.push_response(reply.clone());

        let code = extract_code_blocks(&reply);
        Ok((!code.trim().is_empty()).then_some(code))
    }
}
