//! Request dispatch and status mapping

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error};

use crate::{
    config::Config,
    exec::runner::CodeRunner,
    llm::{
        client::CompletionClient, errors::LlmError, openai::OpenAiProvider,
        provider::CompletionProvider, types::ProviderConfig,
    },
    server::protocol::{Request, Response},
    session::{
        registry::{RegistryError, SessionRegistry},
        session::{SessionError, SessionSettings},
    },
};

/// Wordiness applied when the request leaves it out.
const DEFAULT_WORDINESS: &str = "concise";

/// Shared state behind the socket front end
pub struct ChatService {
    pub registry: SessionRegistry,
    pub client: CompletionClient,
    pub runner: CodeRunner,
}

impl ChatService {
    /// Assemble the service from configuration, wiring the OpenAI transport.
    pub fn new(config: &Config) -> Result<Self, LlmError> {
        let provider = OpenAiProvider::new(ProviderConfig {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            max_tokens: config.max_output_tokens,
        })?;
        Ok(Self::with_provider(config, Arc::new(provider)))
    }

    /// Assemble the service over an arbitrary transport.
    pub fn with_provider(config: &Config, provider: Arc<dyn CompletionProvider>) -> Self {
        debug!(
            "Completion transport: {} ({})",
            provider.name(),
            provider.model()
        );

        let settings = SessionSettings {
            max_context_tokens: config.max_context_tokens,
            completion_attempts: config.completion_attempts,
            temperature: config.temperature,
            exec_timeout: config.exec_timeout(),
        };

        let mut runner = CodeRunner::new(&config.interpreter);
        if let Some(value) = &config.sensitive_value {
            runner = runner.with_sensitive_value(value);
        }

        Self {
            registry: SessionRegistry::new(settings, config.init_script.clone())
                .with_ttl(config.session_ttl()),
            client: CompletionClient::new(provider).with_backoff(config.retry_backoff()),
            runner,
        }
    }

    /// Dispatch one request to the matching handler.
    pub async fn dispatch(&self, request: Request) -> Response {
        match request {
            Request::Ping => Response::ok(json!({ "status": "ok" })),
            Request::CreateSession { session_id } => self.create_session(&session_id).await,
            Request::RemoveSession { session_id } => self.remove_session(&session_id).await,
            Request::AskQuestion {
                session_id,
                question,
                database,
                wordiness,
                ..
            } => self.ask_question(&session_id, question, database, wordiness).await,
        }
    }

    async fn create_session(&self, session_id: &str) -> Response {
        if session_id.trim().is_empty() {
            return Response::error(400, "session_id is required.");
        }
        match self.registry.create(session_id).await {
            Ok(()) => Response::ok(json!({
                "message": format!("Session {} created successfully.", session_id)
            })),
            Err(e) => {
                error!("Session creation failed: {}", e);
                Response::error(500, e.to_string())
            }
        }
    }

    async fn remove_session(&self, session_id: &str) -> Response {
        match self.registry.remove(session_id).await {
            Ok(()) => Response::ok(json!({
                "message": format!("Session {} removed successfully.", session_id)
            })),
            Err(RegistryError::NotFound(_)) => {
                Response::error(500, format!("Session {} not found.", session_id))
            }
            Err(e) => Response::error(500, e.to_string()),
        }
    }

    async fn ask_question(
        &self,
        session_id: &str,
        question: Option<String>,
        database: Option<String>,
        wordiness: Option<String>,
    ) -> Response {
        let question = match question {
            Some(q) if !q.trim().is_empty() => q,
            _ => return Response::error(400, "Question is required."),
        };
        let database = match database {
            Some(d) if !d.trim().is_empty() => d,
            _ => return Response::error(400, "Database is required."),
        };
        let wordiness = match wordiness {
            Some(w) if !w.trim().is_empty() => w,
            _ => DEFAULT_WORDINESS.to_string(),
        };

        let session = match self.registry.get(session_id).await {
            Some(session) => session,
            None => return Response::error(404, format!("Session {} not found.", session_id)),
        };

        let mut session = session.lock().await;
        match session
            .ask_question(&self.client, &self.runner, &question, &database, &wordiness)
            .await
        {
            Ok(answer) => {
                debug!(
                    session_id,
                    status = ?session.status(),
                    tokens_left = session.tokens_left(),
                    "Question answered"
                );
                Response::ok(json!(answer))
            }
            Err(e) => {
                error!(session_id, "ask_question failed: {}", e);
                Response::error(status_for(&e), e.to_string())
            }
        }
    }
}

/// Map a session failure onto the response status.
fn status_for(error: &SessionError) -> u16 {
    match error {
        SessionError::Completion(LlmError::InvalidRequestError(_)) => 502,
        SessionError::Completion(LlmError::UnavailableError(_)) => 503,
        _ => 500,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedProvider;
    use crate::llm::LlmResult;

    fn test_config() -> Config {
        Config {
            api_key: Some("test-key".to_string()),
            interpreter: "sh".to_string(),
            retry_backoff_secs: 0,
            exec_timeout_secs: 5,
            init_script: String::new(),
            ..Config::default()
        }
    }

    fn service(results: Vec<LlmResult<Vec<String>>>) -> (ChatService, Arc<ScriptedProvider>) {
        let provider = Arc::new(ScriptedProvider::new(results));
        let service = ChatService::with_provider(&test_config(), provider.clone());
        (service, provider)
    }

    fn ask(session_id: &str, question: Option<&str>, database: Option<&str>) -> Request {
        Request::AskQuestion {
            session_id: session_id.to_string(),
            question: question.map(str::to_string),
            database: database.map(str::to_string),
            role: None,
            language: None,
            packages: None,
            wordiness: None,
        }
    }

    #[tokio::test]
    async fn test_ping_answers_ok() {
        let (service, _) = service(Vec::new());
        let response = service.dispatch(Request::Ping).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_then_ask_end_to_end() {
        let (service, _) = service(vec![
            Ok(vec!["BRCA1 encodes a DNA repair protein.".to_string()]),
            Ok(vec!["try gget seq".to_string()]),
        ]);

        let created = service
            .dispatch(Request::CreateSession {
                session_id: "abc".to_string(),
            })
            .await;
        assert_eq!(created.status, 200);
        assert_eq!(created.body["message"], "Session abc created successfully.");

        let answered = service
            .dispatch(ask("abc", Some("list genes for BRCA1"), Some("ensembl")))
            .await;
        assert_eq!(answered.status, 200);
        assert_eq!(answered.body["answer"], "BRCA1 encodes a DNA repair protein.");
        assert_eq!(answered.body["follow_up_suggestions"], "try gget seq");
    }

    #[tokio::test]
    async fn test_code_in_the_reply_is_executed() {
        let (service, _) = service(vec![
            Ok(vec!["Run:\n```\necho hi\n```".to_string()]),
            Ok(vec!["f".to_string()]),
        ]);
        service.registry.create("abc").await.unwrap();

        let response = service
            .dispatch(ask("abc", Some("say hi"), Some("ensembl")))
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body["answer"], "hi\n");
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let (service, _) = service(Vec::new());
        let response = service
            .dispatch(ask("ghost", Some("q"), Some("ensembl")))
            .await;
        assert_eq!(response.status, 404);
        assert_eq!(response.body["error"], "Session ghost not found.");
    }

    #[tokio::test]
    async fn test_missing_question_is_400() {
        let (service, provider) = service(Vec::new());
        service.registry.create("abc").await.unwrap();

        let response = service.dispatch(ask("abc", None, Some("ensembl"))).await;
        assert_eq!(response.status, 400);
        assert_eq!(response.body["error"], "Question is required.");
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_database_is_400() {
        let (service, _) = service(Vec::new());
        service.registry.create("abc").await.unwrap();

        let response = service.dispatch(ask("abc", Some("q"), None)).await;
        assert_eq!(response.status, 400);
        assert_eq!(response.body["error"], "Database is required.");
    }

    #[tokio::test]
    async fn test_wordiness_defaults_into_the_prompt() {
        let (service, provider) = service(vec![
            Ok(vec!["plain".to_string()]),
            Ok(vec!["f".to_string()]),
        ]);
        service.registry.create("abc").await.unwrap();

        service.dispatch(ask("abc", Some("q"), Some("ensembl"))).await;

        let first = &provider.requests()[0].messages[0];
        assert!(first.content.contains("concise"));
        assert!(first.content.contains("ensembl"));
    }

    #[tokio::test]
    async fn test_remove_session_round_trip() {
        let (service, _) = service(Vec::new());
        service.registry.create("abc").await.unwrap();

        let removed = service
            .dispatch(Request::RemoveSession {
                session_id: "abc".to_string(),
            })
            .await;
        assert_eq!(removed.status, 200);
        assert_eq!(removed.body["message"], "Session abc removed successfully.");
        assert!(!service.registry.contains("abc").await);
    }

    #[tokio::test]
    async fn test_remove_unknown_session_is_500() {
        let (service, _) = service(Vec::new());
        let response = service
            .dispatch(Request::RemoveSession {
                session_id: "ghost".to_string(),
            })
            .await;
        assert_eq!(response.status, 500);
        assert_eq!(response.body["error"], "Session ghost not found.");
    }

    #[tokio::test]
    async fn test_upstream_rejection_maps_to_502() {
        let (service, _) = service(vec![Err(LlmError::InvalidRequestError(
            "bad shape".to_string(),
        ))]);
        service.registry.create("abc").await.unwrap();

        let response = service.dispatch(ask("abc", Some("q"), Some("ensembl"))).await;
        assert_eq!(response.status, 502);
    }

    #[tokio::test]
    async fn test_exhausted_retries_map_to_503() {
        let (service, provider) = service(vec![
            Err(LlmError::ServerError("down".to_string())),
            Err(LlmError::ServerError("down".to_string())),
            Err(LlmError::ServerError("down".to_string())),
        ]);
        service.registry.create("abc").await.unwrap();

        let response = service.dispatch(ask("abc", Some("q"), Some("ensembl"))).await;
        assert_eq!(response.status, 503);
        assert_eq!(provider.calls(), 3);
    }
}
