use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key for the completion endpoint
    pub api_key: Option<String>,

    /// Base URL for the API
    pub base_url: Option<String>,

    /// Model to use
    pub model: String,

    /// Maximum tokens per completion response
    pub max_output_tokens: Option<u32>,

    /// Approximate token budget for a conversation before it is trimmed
    pub max_context_tokens: usize,

    /// Temperature for sampling
    pub temperature: f32,

    /// Attempts per completion call before giving up on a transient failure
    pub completion_attempts: u32,

    /// Seconds to sleep between completion attempts
    pub retry_backoff_secs: u64,

    /// Wall-clock limit in seconds for one code execution, corrections included
    pub exec_timeout_secs: u64,

    /// Interpreter used to run extracted code
    pub interpreter: String,

    /// Script run once when a session namespace is created
    pub init_script: String,

    /// Value scrubbed from captured output before it is returned
    pub sensitive_value: Option<String>,

    /// Hours a session may sit idle before it is evicted
    pub session_ttl_hours: i64,

    /// Unix socket the server listens on
    pub socket_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: "gpt-4-0613".to_string(),
            max_output_tokens: Some(1000),
            max_context_tokens: 8192,
            temperature: 0.75,
            completion_attempts: 3,
            retry_backoff_secs: 10,
            exec_timeout_secs: 120,
            interpreter: "python3".to_string(),
            init_script: "import gget".to_string(),
            sensitive_value: None,
            session_ttl_hours: 12,
            socket_path: std::env::temp_dir().join("genie.sock"),
        }
    }
}

impl Config {
    /// Initialize configuration from various sources
    pub async fn init() -> Result<Self> {
        debug!("Initializing configuration");

        let mut config = Self::default();

        // Try to load from configuration files
        if let Ok(file_config) = Self::load_from_file().await {
            config = file_config;
        }

        // Environment variables win over file values
        config.load_from_env();

        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if self.api_key.is_none() {
                self.api_key = Some(key);
            }
        }

        // Generic API key
        if let Ok(key) = std::env::var("GENIE_API_KEY") {
            self.api_key = Some(key);
        }

        if let Ok(base_url) = std::env::var("GENIE_BASE_URL") {
            self.base_url = Some(base_url);
        }

        if let Ok(model) = std::env::var("GENIE_MODEL") {
            self.model = model;
        }

        if let Ok(max_tokens_str) = std::env::var("GENIE_MAX_OUTPUT_TOKENS") {
            if let Ok(max_tokens) = max_tokens_str.parse() {
                self.max_output_tokens = Some(max_tokens);
            }
        }

        if let Ok(temp_str) = std::env::var("GENIE_TEMPERATURE") {
            if let Ok(temperature) = temp_str.parse() {
                self.temperature = temperature;
            }
        }

        if let Ok(timeout_str) = std::env::var("GENIE_EXEC_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout_str.parse() {
                self.exec_timeout_secs = timeout;
            }
        }

        if let Ok(interpreter) = std::env::var("GENIE_INTERPRETER") {
            self.interpreter = interpreter;
        }

        if let Ok(value) = std::env::var("GENIE_SENSITIVE_VALUE") {
            self.sensitive_value = Some(value);
        }

        if let Ok(socket) = std::env::var("GENIE_SOCKET") {
            self.socket_path = PathBuf::from(socket);
        }
    }

    /// Load configuration from genie.json files
    pub async fn load_from_file() -> Result<Self> {
        // Configuration priority:
        // 1. ./genie.json
        // 2. $HOME/.config/genie/genie.json

        let mut config_paths = vec![PathBuf::from("./genie.json")];

        if let Some(config_dir) = dirs::config_dir() {
            config_paths.push(config_dir.join("genie").join("genie.json"));
        }

        for path in config_paths {
            if path.exists() {
                debug!("Loading configuration from: {}", path.display());
                let content = tokio::fs::read_to_string(&path).await?;
                let config: Self = serde_json::from_str(&content)?;
                return Ok(config);
            }
        }

        Err(anyhow::anyhow!("No configuration file found"))
    }

    /// Check if the configuration has a valid API key
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.is_empty())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.has_api_key() {
            return Err(anyhow::anyhow!(
                "No API key configured. Set OPENAI_API_KEY or GENIE_API_KEY environment variable."
            ));
        }

        if self.model.is_empty() {
            return Err(anyhow::anyhow!("Model is required"));
        }

        if self.interpreter.is_empty() {
            return Err(anyhow::anyhow!("Interpreter is required"));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(anyhow::anyhow!("temperature must be between 0.0 and 2.0"));
        }

        if self.completion_attempts == 0 {
            return Err(anyhow::anyhow!("completion_attempts must be greater than 0"));
        }

        if self.exec_timeout_secs == 0 {
            return Err(anyhow::anyhow!("exec_timeout_secs must be greater than 0"));
        }

        if self.max_context_tokens == 0 {
            return Err(anyhow::anyhow!("max_context_tokens must be greater than 0"));
        }

        Ok(())
    }

    /// Wall-clock limit for one code execution
    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }

    /// Sleep between completion attempts
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    /// Idle lifetime of a session
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }
}
