//! Bounded execution of model-provided code
//!
//! Runs extracted snippets through the configured interpreter inside a
//! session namespace, captures what the new snippet printed, and asks the
//! model for corrected code after failures. The initial attempt and both
//! corrections share one wall clock budget.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::exec::namespace::ExecNamespace;

/// Reply sent when no attempt produced working code.
pub const EXECUTION_APOLOGY: &str = "Apologies, I could not generate working code for your \
    request. Please try rephrasing your question.";

/// Replacement for the configured sensitive value in captured output.
const REDACTION_PLACEHOLDER: &str = "[redacted]";

/// Total tries per run: the initial attempt plus two corrections.
pub const MAX_EXEC_ATTEMPTS: u32 = 3;

/// File the composed script is written to inside the namespace.
const SCRIPT_FILE: &str = "snippet.py";

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Execution timed out after {0} seconds")]
    TimeoutError(u64),

    #[error("Failed to start interpreter: {0}")]
    SpawnError(std::io::Error),

    #[error("IO error during execution: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Correction request failed: {0}")]
    CorrectionError(String),
}

/// Outcome of one bounded run
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    /// Captured stdout of the successful attempt, or the apology text
    pub output: String,
    pub success: bool,
    /// Attempts consumed, counting the initial one
    pub attempts: u32,
}

/// Source of corrected code after a failed attempt
///
/// Implemented by the session over its conversation and completion client,
/// and by scripted doubles in tests.
#[async_trait]
pub trait CodeCorrector: Send {
    /// Ask for an alternative snippet given the interpreter's failure
    /// message. `None` when the reply contained no usable code.
    async fn correct(&mut self, error: &str) -> Result<Option<String>, ExecError>;
}

/// Executes snippets inside a namespace under a wall clock budget
pub struct CodeRunner {
    interpreter: String,
    redaction: Option<Regex>,
}

impl CodeRunner {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            redaction: None,
        }
    }

    /// Scrub every occurrence of `value` from captured output, matching
    /// case-insensitively.
    pub fn with_sensitive_value(mut self, value: &str) -> Self {
        if value.is_empty() {
            return self;
        }
        match RegexBuilder::new(&regex::escape(value))
            .case_insensitive(true)
            .build()
        {
            Ok(re) => self.redaction = Some(re),
            Err(e) => warn!("Unusable sensitive value pattern: {}", e),
        }
        self
    }

    /// Run `code` in `namespace`, asking `corrector` for alternatives after
    /// failed attempts. The whole sequence shares `limit`; when it expires
    /// the interpreter is killed and the run errors out.
    pub async fn run(
        &self,
        code: &str,
        namespace: &mut ExecNamespace,
        corrector: &mut dyn CodeCorrector,
        limit: Duration,
    ) -> Result<ExecutionResult, ExecError> {
        match timeout(limit, self.run_attempts(code, namespace, corrector)).await {
            Ok(result) => result,
            Err(_) => Err(ExecError::TimeoutError(limit.as_secs())),
        }
    }

    async fn run_attempts(
        &self,
        code: &str,
        namespace: &mut ExecNamespace,
        corrector: &mut dyn CodeCorrector,
    ) -> Result<ExecutionResult, ExecError> {
        let mut snippet = code.to_string();

        for attempt in 1..=MAX_EXEC_ATTEMPTS {
            let failure = if snippet.trim().is_empty() {
                "the reply contained no executable code".to_string()
            } else {
                match self.execute_once(&snippet, namespace).await? {
                    Attempt::Success { full_output } => {
                        let output = namespace.delta(&full_output).to_string();
                        namespace.commit(&snippet, &full_output);
                        return Ok(ExecutionResult {
                            output: self.redact(output),
                            success: true,
                            attempts: attempt,
                        });
                    }
                    Attempt::Failure { message } => message,
                }
            };

            debug!(attempt, "Execution attempt failed: {}", failure);
            if attempt == MAX_EXEC_ATTEMPTS {
                break;
            }
            snippet = corrector.correct(&failure).await?.unwrap_or_default();
        }

        Ok(ExecutionResult {
            output: EXECUTION_APOLOGY.to_string(),
            success: false,
            attempts: MAX_EXEC_ATTEMPTS,
        })
    }

    /// Execute one composed script, splitting success from failure by exit
    /// status. The failure message is the last non-empty stderr line, which
    /// for Python tracebacks is the exception itself.
    async fn execute_once(
        &self,
        snippet: &str,
        namespace: &ExecNamespace,
    ) -> Result<Attempt, ExecError> {
        let script_path = namespace.workdir().join(SCRIPT_FILE);
        tokio::fs::write(&script_path, namespace.compose(snippet)).await?;

        let child = Command::new(&self.interpreter)
            .arg(&script_path)
            .current_dir(namespace.workdir())
            .envs(namespace.env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ExecError::SpawnError)?;

        let output = child.wait_with_output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();

        if output.status.success() {
            Ok(Attempt::Success {
                full_output: stdout,
            })
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .map(|line| line.trim().to_string())
                .unwrap_or_else(|| format!("interpreter exited with {}", output.status));
            Ok(Attempt::Failure { message })
        }
    }

    fn redact(&self, output: String) -> String {
        match &self.redaction {
            Some(re) => re.replace_all(&output, REDACTION_PLACEHOLDER).into_owned(),
            None => output,
        }
    }
}

enum Attempt {
    Success { full_output: String },
    Failure { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct ScriptedCorrector {
        corrections: VecDeque<Option<String>>,
        errors_seen: Vec<String>,
    }

    impl ScriptedCorrector {
        fn new(corrections: Vec<Option<&str>>) -> Self {
            Self {
                corrections: corrections
                    .into_iter()
                    .map(|c| c.map(str::to_string))
                    .collect(),
                errors_seen: Vec::new(),
            }
        }

        fn none() -> Self {
            Self::new(Vec::new())
        }
    }

    #[async_trait]
    impl CodeCorrector for ScriptedCorrector {
        async fn correct(&mut self, error: &str) -> Result<Option<String>, ExecError> {
            self.errors_seen.push(error.to_string());
            Ok(self.corrections.pop_front().flatten())
        }
    }

    fn runner() -> CodeRunner {
        CodeRunner::new("sh")
    }

    fn limit() -> Duration {
        Duration::from_secs(10)
    }

    #[tokio::test]
    async fn test_captures_only_the_new_snippet_output() {
        let mut ns = ExecNamespace::new("").unwrap();
        let mut corrector = ScriptedCorrector::none();
        let runner = runner();

        let first = runner
            .run("echo one", &mut ns, &mut corrector, limit())
            .await
            .unwrap();
        assert_eq!(first.output, "one\n");
        assert!(first.success);
        assert_eq!(first.attempts, 1);

        let second = runner
            .run("echo two", &mut ns, &mut corrector, limit())
            .await
            .unwrap();
        assert_eq!(second.output, "two\n");
        assert!(corrector.errors_seen.is_empty());
    }

    #[tokio::test]
    async fn test_state_persists_between_runs() {
        let mut ns = ExecNamespace::new("").unwrap();
        let mut corrector = ScriptedCorrector::none();
        let runner = runner();

        runner
            .run("X=5", &mut ns, &mut corrector, limit())
            .await
            .unwrap();
        let result = runner
            .run("echo $X", &mut ns, &mut corrector, limit())
            .await
            .unwrap();
        assert_eq!(result.output, "5\n");
    }

    #[tokio::test]
    async fn test_failed_attempt_is_retried_with_corrected_code() {
        let mut ns = ExecNamespace::new("").unwrap();
        let mut corrector = ScriptedCorrector::new(vec![Some("echo fixed")]);
        let runner = runner();

        let result = runner
            .run("exit 3", &mut ns, &mut corrector, limit())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.attempts, 2);
        assert_eq!(result.output, "fixed\n");
        assert_eq!(corrector.errors_seen.len(), 1);
        assert!(!corrector.errors_seen[0].is_empty());
    }

    #[tokio::test]
    async fn test_failed_attempt_leaves_no_trace_in_the_namespace() {
        let mut ns = ExecNamespace::new("").unwrap();
        let mut corrector = ScriptedCorrector::new(vec![Some("echo ok")]);
        let runner = runner();

        let result = runner
            .run("echo oops; exit 1", &mut ns, &mut corrector, limit())
            .await
            .unwrap();
        assert_eq!(result.output, "ok\n");

        // Only the committed snippet replays on the next run.
        let next = runner
            .run("echo next", &mut ns, &mut corrector, limit())
            .await
            .unwrap();
        assert_eq!(next.output, "next\n");
    }

    #[tokio::test]
    async fn test_success_on_the_final_attempt() {
        let mut ns = ExecNamespace::new("").unwrap();
        let mut corrector = ScriptedCorrector::new(vec![Some("exit 2"), Some("echo done")]);
        let runner = runner();

        let result = runner
            .run("exit 1", &mut ns, &mut corrector, limit())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.attempts, 3);
        assert_eq!(result.output, "done\n");
    }

    #[tokio::test]
    async fn test_apology_after_exhausting_attempts() {
        let mut ns = ExecNamespace::new("").unwrap();
        let mut corrector = ScriptedCorrector::new(vec![Some("exit 1"), Some("exit 1")]);
        let runner = runner();

        let result = runner
            .run("exit 1", &mut ns, &mut corrector, limit())
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.attempts, MAX_EXEC_ATTEMPTS);
        assert_eq!(result.output, EXECUTION_APOLOGY);
        assert_eq!(corrector.errors_seen.len(), 2);
    }

    #[tokio::test]
    async fn test_correction_without_code_still_consumes_an_attempt() {
        let mut ns = ExecNamespace::new("").unwrap();
        let mut corrector = ScriptedCorrector::new(vec![None, None]);
        let runner = runner();

        let result = runner
            .run("exit 1", &mut ns, &mut corrector, limit())
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.output, EXECUTION_APOLOGY);
        assert_eq!(corrector.errors_seen.len(), 2);
    }

    #[tokio::test]
    async fn test_wall_clock_limit_covers_the_whole_run() {
        let mut ns = ExecNamespace::new("").unwrap();
        let mut corrector = ScriptedCorrector::none();
        let runner = runner();

        let result = runner
            .run("sleep 5", &mut ns, &mut corrector, Duration::from_millis(200))
            .await;
        assert!(matches!(result, Err(ExecError::TimeoutError(_))));
    }

    #[tokio::test]
    async fn test_sensitive_value_is_redacted_case_insensitively() {
        let mut ns = ExecNamespace::new("").unwrap();
        let mut corrector = ScriptedCorrector::none();
        let runner = CodeRunner::new("sh").with_sensitive_value("hunter2");

        let result = runner
            .run("echo Hunter2 and HUNTER2", &mut ns, &mut corrector, limit())
            .await
            .unwrap();
        assert_eq!(result.output, "[redacted] and [redacted]\n");
    }

    #[tokio::test]
    async fn test_env_vars_reach_the_interpreter() {
        let mut ns = ExecNamespace::new("").unwrap();
        ns.set_env("GENIE_TEST_VALUE", "visible");
        let mut corrector = ScriptedCorrector::none();
        let runner = runner();

        let result = runner
            .run("echo $GENIE_TEST_VALUE", &mut ns, &mut corrector, limit())
            .await
            .unwrap();
        assert_eq!(result.output, "visible\n");
    }
}
