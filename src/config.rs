//! Configuration management for OnboardBuddy
//!
//! Provides TOML-based configuration with defaults, environment overrides
//! and validation.
//! Location: ~/.onboardbuddy/config.toml

use crate::context::{
    effective_budget, ContextCompressor, HeuristicEncoder, HfEncoder, TokenAccountant, TokenEncoder,
    DEFAULT_COMPRESSION_THRESHOLD, DEFAULT_MAX_CONTEXT_TOKENS, PER_MESSAGE_OVERHEAD, REPLY_OVERHEAD,
};
use crate::errors::{AgentError, Result};
use crate::session::store::{RetentionPolicy, DEFAULT_MAX_HISTORY_LENGTH, DEFAULT_SESSION_TTL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Environment variable overriding `context.max_context_tokens`
pub const ENV_MAX_CONTEXT_TOKENS: &str = "ONBOARDBUDDY_MAX_CONTEXT_TOKENS";
/// Environment variable overriding `session.ttl_secs`
pub const ENV_SESSION_TTL: &str = "ONBOARDBUDDY_SESSION_TTL";
/// Environment variable overriding `session.max_history_length`
pub const ENV_MAX_HISTORY: &str = "ONBOARDBUDDY_MAX_HISTORY";

/// Complete configuration for OnboardBuddy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub tokenizer: TokenizerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Token budget and accounting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Signed so a misconfigured negative value still loads
    pub max_context_tokens: i64,
    pub per_message_overhead: usize,
    pub reply_overhead: usize,
    pub compression_threshold: f64,
}

/// Session storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// "file" or "memory"
    pub backend: String,
    pub ttl_secs: u64,
    pub max_history_length: usize,
}

/// Tokenizer selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    /// "heuristic" or "huggingface"
    pub kind: String,
    /// HuggingFace Hub model id to fetch `tokenizer.json` from
    pub model: Option<String>,
    /// Local `tokenizer.json`, preferred over `model`
    pub path: Option<String>,
}

/// File system paths configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub state_dir: String,
    pub sessions_dir: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: DEFAULT_MAX_CONTEXT_TOKENS as i64,
            per_message_overhead: PER_MESSAGE_OVERHEAD,
            reply_overhead: REPLY_OVERHEAD,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: "file".to_string(),
            ttl_secs: DEFAULT_SESSION_TTL.as_secs(),
            max_history_length: DEFAULT_MAX_HISTORY_LENGTH,
        }
    }
}

impl SessionConfig {
    /// Whether sessions outlive the process (false for the memory backend)
    pub fn is_persistent(&self) -> bool {
        self.backend != "memory"
    }
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            kind: "heuristic".to_string(),
            model: None,
            path: None,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_dir: "~/.onboardbuddy".to_string(),
            sessions_dir: "~/.onboardbuddy/sessions".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults, then apply env overrides
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut config = match path {
            Some(config_path) => Self::load_from_file(&config_path)?,
            None => Self::load_default()?,
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AgentError::ConfigError(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| AgentError::ConfigError(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".onboardbuddy").join("config.toml");
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        tracing::debug!("no config file found, using defaults");
        Ok(Config::default())
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// [`Config::load`])
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MAX_CONTEXT_TOKENS) {
            self.context.max_context_tokens = parse_override(ENV_MAX_CONTEXT_TOKENS, &value)?;
        }
        if let Some(value) = lookup(ENV_SESSION_TTL) {
            self.session.ttl_secs = parse_override(ENV_SESSION_TTL, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_HISTORY) {
            self.session.max_history_length = parse_override(ENV_MAX_HISTORY, &value)?;
        }
        Ok(())
    }

    /// Validate configuration values.
    ///
    /// A non-positive budget is accepted with a warning and behaves as a
    /// zero budget.
    pub fn validate(&self) -> Result<()> {
        if self.context.max_context_tokens <= 0 {
            tracing::warn!(
                max_context_tokens = self.context.max_context_tokens,
                "non-positive context budget, compression will keep as little as possible"
            );
        }

        if !(0.5..=1.0).contains(&self.context.compression_threshold) {
            return Err(AgentError::ConfigError(
                "compression_threshold must be between 0.5 and 1.0".to_string()
            ));
        }

        if self.session.ttl_secs < 60 {
            return Err(AgentError::ConfigError(
                "session ttl_secs must be at least 60".to_string()
            ));
        }

        match self.session.backend.as_str() {
            "file" | "memory" => {}
            other => return Err(AgentError::ConfigError(
                format!("Invalid session backend: {}", other)
            )),
        }

        match self.tokenizer.kind.as_str() {
            "heuristic" => {}
            "huggingface" => {
                if self.tokenizer.model.is_none() && self.tokenizer.path.is_none() {
                    return Err(AgentError::ConfigError(
                        "huggingface tokenizer needs a model or a path".to_string()
                    ));
                }
            }
            other => return Err(AgentError::ConfigError(
                format!("Invalid tokenizer kind: {}", other)
            )),
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| AgentError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AgentError::ConfigError(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path, contents)
            .map_err(|e| AgentError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Effective default budget, non-positive values clamped to 0
    pub fn budget(&self) -> usize {
        effective_budget(self.context.max_context_tokens)
    }

    /// Retention limits for session stores
    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            session_ttl: Duration::from_secs(self.session.ttl_secs),
            max_history_length: self.session.max_history_length,
        }
    }

    /// Build the configured tokenizer
    pub fn build_encoder(&self) -> Result<Arc<dyn TokenEncoder>> {
        match self.tokenizer.kind.as_str() {
            "huggingface" => {
                let encoder = match (&self.tokenizer.path, &self.tokenizer.model) {
                    (Some(path), _) => HfEncoder::from_file(Self::expand_path(path))?,
                    (None, Some(model)) => HfEncoder::from_hub(model)?,
                    (None, None) => {
                        return Err(AgentError::ConfigError(
                            "huggingface tokenizer needs a model or a path".to_string()
                        ))
                    }
                };
                Ok(Arc::new(encoder))
            }
            _ => Ok(Arc::new(HeuristicEncoder::new())),
        }
    }

    /// Build a token accountant from this configuration
    pub fn build_accountant(&self) -> Result<TokenAccountant> {
        Ok(TokenAccountant::with_encoder(self.build_encoder()?)
            .with_overheads(self.context.per_message_overhead, self.context.reply_overhead)
            .with_default_budget(self.budget()))
    }

    /// Build a context compressor from this configuration
    pub fn build_compressor(&self) -> Result<ContextCompressor> {
        Ok(ContextCompressor::new(self.build_accountant()?)
            .with_threshold(self.context.compression_threshold))
    }

    /// Expand tilde in paths
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    /// Get state directory path
    pub fn state_dir(&self) -> PathBuf {
        Self::expand_path(&self.paths.state_dir)
    }

    /// Get session storage directory path
    pub fn sessions_dir(&self) -> PathBuf {
        Self::expand_path(&self.paths.sessions_dir)
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AgentError::ConfigError(format!("Invalid value for {}: {:?}", key, value)))
}
