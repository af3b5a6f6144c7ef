//! Runtime configuration for summary-gateway.
//!
//! Configuration is loaded from a JSON file or constructed programmatically,
//! then frozen behind an `Arc` and handed to every component at startup.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "summary-gateway", about = "OpenAI-compatible summarization gateway")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address (overrides `server.listen`).
    #[arg(long)]
    pub listen: Option<String>,

    /// Shared API key clients must present as a bearer token.
    #[arg(long, env = "GATEWAY_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project metadata shown on the landing page.
    pub project: ProjectConfig,

    /// Server configuration.
    pub server: ServerConfig,

    /// Authentication.
    pub auth: AuthConfig,

    /// Upstream summarization endpoint.
    pub upstream: UpstreamConfig,

    /// Model catalog.
    pub models: ModelsConfig,

    /// Pseudo-stream pacing.
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
    pub version: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "summary-gateway".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:8080").
    pub listen: String,

    /// Attach a permissive CORS layer so browser front-ends on other origins can call the API.
    pub cors: bool,

    /// Largest accepted request body, in bytes. Larger bodies get a 413 envelope.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            cors: false,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// The single shared secret, compared verbatim against the bearer token.
    pub api_key: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key: "sk-askai-default-key-please-change-me".to_string(),
        }
    }
}

/// Upstream endpoint and the fixed header set sent with every call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub url: String,
    pub origin: String,
    pub referer: String,
    pub user_agent: String,
    pub accept_language: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "https://pjfuothbq9.execute-api.us-east-1.amazonaws.com/get-summary".to_string(),
            origin: "https://askaiquestions.net".to_string(),
            referer: "https://askaiquestions.net/".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36"
                .to_string(),
            accept_language: "zh-CN,zh;q=0.9,en;q=0.8".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Model name used when a request omits `model`.
    pub default_model: String,

    /// Models advertised by `/v1/models`.
    pub known_models: Vec<String>,

    /// `owned_by` value in the model list.
    pub owned_by: String,

    /// Freshness window for cached model list responses, in seconds.
    pub cache_ttl_secs: u64,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            default_model: "askai-default-model".to_string(),
            known_models: vec!["askai-default-model".to_string()],
            owned_by: "askai-project".to_string(),
            cache_ttl_secs: 3600,
        }
    }
}

/// Pseudo-stream settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Characters per emitted delta.
    pub chunk_size: usize,

    /// Pause after each content frame, in milliseconds (0 disables pacing).
    pub delay_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2,
            delay_ms: 2,
        }
    }
}

impl StreamConfig {
    pub fn delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.delay_ms)
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Apply command-line overrides on top of the file configuration.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(listen) = &cli.listen {
            self.server.listen = listen.clone();
        }
        if let Some(key) = &cli.api_key {
            self.auth.api_key = key.clone();
        }
    }

    /// Reject settings the gateway cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.api_key.is_empty() {
            return Err(ConfigError::Invalid("auth.api_key must not be empty".into()));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("server.max_body_bytes must be at least 1".into()));
        }
        if self.stream.chunk_size == 0 {
            return Err(ConfigError::Invalid("stream.chunk_size must be at least 1".into()));
        }
        if self.models.known_models.is_empty() {
            return Err(ConfigError::Invalid("models.known_models must not be empty".into()));
        }
        if !self.models.known_models.contains(&self.models.default_model) {
            return Err(ConfigError::Invalid(format!(
                "models.default_model {:?} is not listed in models.known_models",
                self.models.default_model
            )));
        }
        if self.upstream.url.is_empty() {
            return Err(ConfigError::Invalid("upstream.url must not be empty".into()));
        }
        Ok(())
    }
}
