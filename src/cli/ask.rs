use anyhow::{anyhow, Result};
use clap::Args;
use std::io::{self, Read};
use tracing::debug;
use uuid::Uuid;

use crate::config::Config;
use crate::server::{ChatService, Request};

/// Ask a single question in a throwaway session
#[derive(Args)]
pub struct AskCommand {
    /// The question to ask. If not provided, will read from stdin
    pub question: Vec<String>,

    /// Database the question is about
    #[arg(short = 'b', long = "database")]
    pub database: String,

    /// Verbosity of the model's answers
    #[arg(long = "wordiness", default_value = "concise")]
    pub wordiness: String,
}

impl AskCommand {
    pub async fn execute(&self, config: &Config) -> Result<()> {
        debug!("Executing ask command");

        let question = self.get_question()?;
        if question.trim().is_empty() {
            return Err(anyhow!(
                "No question provided. Use arguments or pipe input via stdin."
            ));
        }

        config.validate()?;

        let service = ChatService::new(config)?;
        let session_id = Uuid::new_v4().to_string();

        let created = service
            .dispatch(Request::CreateSession {
                session_id: session_id.clone(),
            })
            .await;
        if created.status != 200 {
            return Err(anyhow!("Failed to create session: {}", created.body));
        }

        let response = service
            .dispatch(Request::AskQuestion {
                session_id: session_id.clone(),
                question: Some(question),
                database: Some(self.database.clone()),
                role: None,
                language: None,
                packages: None,
                wordiness: Some(self.wordiness.clone()),
            })
            .await;

        // The session was ours alone, drop it no matter how the ask went.
        let removed = service.dispatch(Request::RemoveSession { session_id }).await;
        debug!("Session removal finished with status {}", removed.status);

        if response.status != 200 {
            return Err(anyhow!("{}", response.body));
        }

        if let Some(answer) = response.body.get("answer").and_then(|v| v.as_str()) {
            println!("{}", answer);
        }
        let follow_up = response
            .body
            .get("follow_up_suggestions")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        if !follow_up.trim().is_empty() {
            println!();
            println!("Follow-up suggestions:");
            println!("{}", follow_up);
        }

        Ok(())
    }

    fn get_question(&self) -> Result<String> {
        if !self.question.is_empty() {
            // Join all arguments into a single question
            Ok(self.question.join(" "))
        } else {
            // Read from stdin
            debug!("Reading question from stdin");
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| anyhow!("Failed to read from stdin: {}", e))?;
            Ok(buffer)
        }
    }
}
