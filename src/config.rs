use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct BusyConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub chat: ChatConfig,
    pub auth: AuthConfig,
    pub tool_server: ToolServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub api_key: String,
    pub api_key_header: String,
    pub model: String,
    pub dimensions: usize,
}

/// How `/api/chat` answers: one plain completion, or the memory-tool agent.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    Plain,
    Agent,
    Graph,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChatConfig {
    pub endpoint: String,
    pub api_key: String,
    pub api_key_header: String,
    pub model: String,
    pub temperature: f64,
    pub mode: ChatMode,
    pub max_tool_steps: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_ttl_hours: i64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ToolServerConfig {
    pub api_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_busy_dir()
            .join("busy.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/embeddings".into(),
            api_key: String::new(),
            api_key_header: "authorization".into(),
            model: "text-embedding-ada-002".into(),
            dimensions: 1536,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".into(),
            api_key: String::new(),
            api_key_header: "authorization".into(),
            model: "gpt-4o".into(),
            temperature: 0.7,
            mode: ChatMode::Agent,
            max_tool_steps: 8,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "busy_session".into(),
            session_ttl_hours: 24 * 30,
        }
    }
}

impl Default for ToolServerConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:3000".into(),
        }
    }
}

/// Returns `~/.busy/`
pub fn default_busy_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".busy")
}

/// Returns the default config file path: `~/.busy/config.toml`
pub fn default_config_path() -> PathBuf {
    default_busy_dir().join("config.toml")
}

impl BusyConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            BusyConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("BUSY_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("BUSY_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(port) = std::env::var("BUSY_PORT").map(|v| v.parse::<u16>()) {
            match port {
                Ok(port) => self.server.port = port,
                Err(e) => tracing::warn!(error = %e, "ignoring invalid BUSY_PORT"),
            }
        }
        if let Ok(val) = std::env::var("OPENAI_API_KEY") {
            self.embedding.api_key = val;
        }
        if let Ok(val) = std::env::var("BUSY_CHAT_API_KEY") {
            self.chat.api_key = val;
        }
        if let Ok(val) = std::env::var("BUSY_API_URL") {
            self.tool_server.api_base_url = val;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.embedding.dimensions == 0 {
            bail!("embedding.dimensions must be greater than zero");
        }
        if self.chat.max_tool_steps == 0 {
            bail!("chat.max_tool_steps must be at least 1");
        }
        Ok(())
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
