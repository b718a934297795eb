use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub debate: DebateSettings,
    pub retry: RetryConfig,
    pub concurrency: ConcurrencyConfig,
    pub persistence: PersistenceConfig,
    /// JSON file replacing the built-in instrument/action graph.
    pub knowledge_graph_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Ollama,
    OpenAi,
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmProvider::Ollama => write!(f, "ollama"),
            LlmProvider::OpenAi => write!(f, "openai"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub base_url: String,
    /// Model behind the instrument and action agents.
    pub vision_model: String,
    /// Model for extraction, rating and candidate selection.
    pub text_model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DebateSettings {
    pub max_refinements: usize,
    /// Ratings must be strictly greater than this to accept a round.
    pub acceptance_threshold: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    pub max_concurrent_sessions: usize,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Where refinement candidates are written. Unset discards them.
    pub candidates_dir: Option<PathBuf>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            base_url: "https://api.openai.com".to_string(),
            vision_model: "gpt-4o".to_string(),
            text_model: "gpt-3.5-turbo".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl Default for DebateSettings {
    fn default() -> Self {
        Self {
            max_refinements: 3,
            acceptance_threshold: 3,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
        }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 4,
            request_timeout_secs: 120,
            connect_timeout_secs: 10,
        }
    }
}

impl ConcurrencyConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config")
    }

    /// Load `path` if given, otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// API key from the configured environment variable. Ollama needs none.
    pub fn api_key(&self) -> Result<Option<String>> {
        match self.llm.provider {
            LlmProvider::Ollama => Ok(None),
            LlmProvider::OpenAi => std::env::var(&self.llm.api_key_env)
                .map(Some)
                .with_context(|| format!("Environment variable {} is not set", self.llm.api_key_env)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.debate.max_refinements, 3);
        assert_eq!(config.debate.acceptance_threshold, 3);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.persistence.candidates_dir.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [llm]
            provider = "ollama"
            base_url = "http://localhost:11434"
            vision_model = "llava"

            [retry]
            delay_ms = 0

            [persistence]
            candidates_dir = "logs/candidates"
            "#,
        )
        .unwrap();

        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.llm.vision_model, "llava");
        assert_eq!(config.llm.text_model, "gpt-3.5-turbo");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay_ms, 0);
        assert_eq!(config.persistence.candidates_dir, Some(PathBuf::from("logs/candidates")));
        assert_eq!(config.debate.max_refinements, 3);
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let mut config = AppConfig::default();
        config.llm.provider = LlmProvider::Ollama;
        assert_eq!(config.api_key().unwrap(), None);
    }

    #[test]
    fn test_missing_key_is_error() {
        let mut config = AppConfig::default();
        config.llm.api_key_env = "SURGICAL_DEBATE_TEST_KEY_THAT_IS_NOT_SET".to_string();
        assert!(config.api_key().is_err());
    }
}
