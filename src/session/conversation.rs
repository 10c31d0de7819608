//! Conversation state and message assembly

use thiserror::Error;

use crate::llm::types::Message;

/// Session readiness derived from the last message build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Ready,
    /// The history outgrew the context budget; the client should start a
    /// fresh session.
    Restart,
}

/// The question/response ledgers diverged by more than one entry.
#[derive(Error, Debug)]
#[error("Conversation out of step: {users} questions against {responses} responses")]
pub struct StateInconsistency {
    pub users: usize,
    pub responses: usize,
}

/// Ordered question/response history and the message list builder
///
/// Token accounting uses a character count as a cheap stand-in for real
/// tokenization; the budget is configured in the same units.
#[derive(Debug)]
pub struct ConversationState {
    user_messages: Vec<String>,
    responses: Vec<String>,
    max_context_tokens: usize,
    status: SessionStatus,
    tokens_left: i64,
}

impl ConversationState {
    pub fn new(max_context_tokens: usize) -> Self {
        Self {
            user_messages: Vec::new(),
            responses: Vec::new(),
            max_context_tokens,
            status: SessionStatus::Ready,
            tokens_left: max_context_tokens as i64,
        }
    }

    pub fn push_question(&mut self, question: impl Into<String>) {
        self.user_messages.push(question.into());
    }

    pub fn push_response(&mut self, response: impl Into<String>) {
        self.responses.push(response.into());
    }

    pub fn user_messages(&self) -> &[String] {
        &self.user_messages
    }

    pub fn responses(&self) -> &[String] {
        &self.responses
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Budget remaining after the last build; negative when over.
    pub fn tokens_left(&self) -> i64 {
        self.tokens_left
    }

    /// Build the message list for the next completion: the system prompt,
    /// then each question followed by its response where one exists.
    ///
    /// When the rendered text exceeds the budget, the list is cut down to
    /// the system prompt plus the most recent exchange and the status flips
    /// to [`SessionStatus::Restart`]. The stored history stays intact.
    pub fn build(&mut self, system_prompt: &str) -> Result<Vec<Message>, StateInconsistency> {
        let users = self.user_messages.len();
        let responses = self.responses.len();
        if users.abs_diff(responses) > 1 {
            return Err(StateInconsistency { users, responses });
        }

        let mut messages = vec![Message::system(system_prompt)];
        for (i, question) in self.user_messages.iter().enumerate() {
            messages.push(Message::user(question.clone()));
            if let Some(response) = self.responses.get(i) {
                messages.push(Message::assistant(response.clone()));
            }
        }

        if approx_tokens(&messages) > self.max_context_tokens {
            if messages.len() > 3 {
                let tail = messages.split_off(messages.len() - 2);
                messages.truncate(1);
                messages.extend(tail);
            }
            self.status = SessionStatus::Restart;
        }
        self.tokens_left = self.max_context_tokens as i64 - approx_tokens(&messages) as i64;

        Ok(messages)
    }
}

/// Character count stand-in for token usage.
fn approx_tokens(messages: &[Message]) -> usize {
    messages.iter().map(|m| m.content.chars().count()).sum()
}
