use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{
    AI_MAX_RETRIES, COMPOSE_MAX_TOKENS, COMPOSE_TEMPERATURE, DEFAULT_FETCH_CONCURRENCY,
    DEFAULT_MAX_RESULTS, SEARCH_MAX_TOKENS,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Language model settings (OpenRouter-compatible endpoint)
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub compose: ComposeConfig,
    #[serde(default)]
    pub gmail: GmailConfig,
}

/// AI features configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// API key; the environment and keyring take precedence
    #[serde(default)]
    pub api_key: Option<String>,
    /// Chat completions endpoint
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,
    /// Model to use (default: anthropic/claude-3-haiku)
    #[serde(default = "default_ai_model")]
    pub model: String,
    /// Maximum tokens for a generated email body
    #[serde(default = "default_compose_max_tokens")]
    pub compose_max_tokens: u32,
    #[serde(default = "default_compose_temperature")]
    pub compose_temperature: f32,
    #[serde(default)]
    pub frequency_penalty: Option<f32>,
    #[serde(default)]
    pub presence_penalty: Option<f32>,
    /// Maximum tokens for a synthesized search query
    #[serde(default = "default_search_max_tokens")]
    pub search_max_tokens: u32,
    /// Ask the model to translate phrases the normalizer does not recognize
    #[serde(default = "default_true")]
    pub search_fallback: bool,
    /// Retries for failed model calls
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_ai_base_url(),
            model: default_ai_model(),
            compose_max_tokens: default_compose_max_tokens(),
            compose_temperature: default_compose_temperature(),
            frequency_penalty: None,
            presence_penalty: None,
            search_max_tokens: default_search_max_tokens(),
            search_fallback: true,
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Folder searched when none is given on the command line
    #[serde(default = "default_folder")]
    pub folder: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    /// Concurrent thread detail requests per search
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            folder: default_folder(),
            max_results: default_max_results(),
            fetch_concurrency: default_fetch_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComposeConfig {
    /// Name the drafts are written as
    #[serde(default)]
    pub username: Option<String>,
    /// Own address, left out of reply-all recipients
    #[serde(default)]
    pub address: Option<String>,
    /// JSON snapshot of the writing style matrix
    #[serde(default)]
    pub style_profile: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmailConfig {
    #[serde(default = "default_gmail_base_url")]
    pub base_url: String,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            base_url: default_gmail_base_url(),
        }
    }
}

fn default_ai_base_url() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}

fn default_ai_model() -> String {
    "anthropic/claude-3-haiku".to_string()
}

fn default_compose_max_tokens() -> u32 {
    COMPOSE_MAX_TOKENS
}

fn default_compose_temperature() -> f32 {
    COMPOSE_TEMPERATURE
}

fn default_search_max_tokens() -> u32 {
    SEARCH_MAX_TOKENS
}

fn default_max_retries() -> u32 {
    AI_MAX_RETRIES
}

fn default_true() -> bool {
    true
}

fn default_folder() -> String {
    "inbox".to_string()
}

fn default_max_results() -> u32 {
    DEFAULT_MAX_RESULTS
}

fn default_fetch_concurrency() -> usize {
    DEFAULT_FETCH_CONCURRENCY
}

fn default_gmail_base_url() -> String {
    "https://gmail.googleapis.com/gmail/v1/users/me".to_string()
}

impl Config {
    pub fn config_dir() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("zero");
        Ok(dir)
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load the user's config, or defaults when no file exists yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        let dir = Self::config_dir()?;

        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [ai]
            model = "openai/gpt-4o-mini"
            compose_max_tokens = 600
            compose_temperature = 0.4
            frequency_penalty = 0.2
            search_fallback = false

            [search]
            folder = "sent"
            max_results = 50

            [compose]
            username = "Ada Lovelace"
            address = "ada@example.com"
            style_profile = "/tmp/style.json"

            [gmail]
            base_url = "http://localhost:9000/gmail"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.ai.model, "openai/gpt-4o-mini");
        assert_eq!(config.ai.compose_max_tokens, 600);
        assert_eq!(config.ai.frequency_penalty, Some(0.2));
        assert_eq!(config.ai.presence_penalty, None);
        assert!(!config.ai.search_fallback);
        assert_eq!(config.ai.search_max_tokens, SEARCH_MAX_TOKENS);
        assert_eq!(config.search.folder, "sent");
        assert_eq!(config.search.max_results, 50);
        assert_eq!(config.search.fetch_concurrency, DEFAULT_FETCH_CONCURRENCY);
        assert_eq!(config.compose.address.as_deref(), Some("ada@example.com"));
        assert_eq!(config.compose.username.as_deref(), Some("Ada Lovelace"));
        assert_eq!(
            config.compose.style_profile,
            Some(PathBuf::from("/tmp/style.json"))
        );
        assert_eq!(config.gmail.base_url, "http://localhost:9000/gmail");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.ai.api_key, None);
        assert_eq!(config.ai.model, "anthropic/claude-3-haiku");
        assert!(config.ai.search_fallback);
        assert_eq!(config.ai.max_retries, AI_MAX_RETRIES);
        assert_eq!(config.search.folder, "inbox");
        assert_eq!(config.search.max_results, DEFAULT_MAX_RESULTS);
        assert!(config.gmail.base_url.starts_with("https://gmail.googleapis.com"));
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let mut config = Config::default();
        config.compose.username = Some("Grace".to_string());
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.compose.username.as_deref(), Some("Grace"));
        assert_eq!(parsed.search.max_results, config.search.max_results);
    }
}
