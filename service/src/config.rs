//! Service configuration loading
//!
//! Loads configuration from `study.toml` in the working directory (or the
//! file named by `STUDY_CONFIG`, or an explicit `--config` path). Missing
//! fields take the defaults below; selected environment variables override
//! the file after `.env` has been loaded.

use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Root configuration for the study service
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Socket address the HTTP server listens on
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Path to the SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Maximum pooled SQLite connections
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Upstream chat completion settings
    #[serde(default)]
    pub openai: OpenAiConfig,
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/study.db")
}

fn default_pool_size() -> u32 {
    8
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            db_path: default_db_path(),
            pool_size: default_pool_size(),
            openai: OpenAiConfig::default(),
        }
    }
}

/// OpenAI-compatible completion endpoint settings
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct OpenAiConfig {
    /// Bearer token; usually supplied through `OPENAI_API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL; `/chat/completions` is appended
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Defaults used when a request carries no `config` override
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_top_p")]
    pub top_p: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_temperature() -> f64 {
    1.0
}

fn default_top_p() -> f64 {
    1.0
}

fn default_max_tokens() -> u32 {
    512
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ServiceConfig {
    /// Environment variable naming a config file
    pub const ENV_CONFIG_PATH: &'static str = "STUDY_CONFIG";

    /// Config file looked up in the working directory
    pub const DEFAULT_CONFIG_FILENAME: &'static str = "study.toml";

    /// Load configuration and apply environment overrides.
    ///
    /// Resolution order:
    /// 1. `explicit` (the `--config` flag)
    /// 2. `STUDY_CONFIG` environment variable
    /// 3. `study.toml` in the working directory
    ///
    /// A named file must exist. When no file is named and `study.toml` is
    /// absent, defaults are used.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let named = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(Self::ENV_CONFIG_PATH).map(PathBuf::from));

        let mut cfg = match named {
            Some(path) => Self::load_from_path(&path)?,
            None => {
                let path = PathBuf::from(Self::DEFAULT_CONFIG_FILENAME);
                if path.exists() {
                    Self::load_from_path(&path)?
                } else {
                    tracing::info!(
                        path = %path.display(),
                        "service config not found, using defaults"
                    );
                    Self::default()
                }
            }
        };

        cfg.apply_env_overrides(|name| std::env::var(name).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let cfg: ServiceConfig = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Overlay `STUDY_BIND`, `STUDY_DB_PATH`, `OPENAI_API_KEY` and
    /// `OPENAI_BASE_URL`. Empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(bind) = var("STUDY_BIND") {
            self.bind = bind;
        }
        if let Some(db_path) = var("STUDY_DB_PATH") {
            self.db_path = PathBuf::from(db_path);
        }
        if let Some(key) = var("OPENAI_API_KEY") {
            self.openai.api_key = Some(key);
        }
        if let Some(base_url) = var("OPENAI_BASE_URL") {
            self.openai.base_url = base_url;
        }
    }

    /// Parsed listen address
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("bind address '{}': {e}", self.bind)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;

        if self.pool_size == 0 {
            return Err(ConfigError::Invalid("pool_size must be at least 1".to_string()));
        }
        if self.openai.model.trim().is_empty() {
            return Err(ConfigError::Invalid("openai.model must not be empty".to_string()));
        }
        if self.openai.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "openai.base_url must not be empty".to_string(),
            ));
        }
        if self.openai.max_tokens == 0 {
            return Err(ConfigError::Invalid(
                "openai.max_tokens must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
