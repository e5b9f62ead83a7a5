//! # Settings Module
//!
//! Process-level settings for the pipeline: provider credentials, model names,
//! timeouts and limits. Values come from the environment (`Settings::from_env`)
//! or are assembled with the builder, and are handed to the components that
//! need them when the caller wires the pipeline together.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Error type for settings resolution
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed
    #[error("invalid value {value:?} for {key}")]
    InvalidValue {
        /// Variable name
        key: String,
        /// Raw value
        value: String,
    },
}

/// Settings for the crawl → clean → extract pipeline
#[derive(Debug, Clone)]
pub struct Settings {
    /// Path of the libsql database file
    pub database_path: PathBuf,

    /// Gemini API key; the Gemini provider is only registered when set
    pub gemini_api_key: Option<String>,

    /// OpenAI API key; the GPT provider is only registered when set
    pub openai_api_key: Option<String>,

    /// Gemini model name
    pub gemini_model: String,

    /// OpenAI model name
    pub openai_model: String,

    /// Timeout for a static GET
    pub fetch_timeout: Duration,

    /// Deadline for a headless navigation
    pub render_timeout: Duration,

    /// Time to let client-side rendering settle after navigation
    pub render_settle: Duration,

    /// Timeout for a single model invocation
    pub model_timeout: Duration,

    /// Client-side request quota per provider
    pub model_requests_per_minute: u32,

    /// Upper bound on the cleaned text handed to a model, in bytes
    pub max_content_bytes: usize,

    /// Explicit Chromium binary for headless rendering
    pub chrome_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("oppcrawl.db"),
            gemini_api_key: None,
            openai_api_key: None,
            gemini_model: "gemini-2.5-flash".to_string(),
            openai_model: "gpt-4.1-mini".to_string(),
            fetch_timeout: Duration::from_secs(15),
            render_timeout: Duration::from_secs(30),
            render_settle: Duration::from_millis(3000),
            model_timeout: Duration::from_secs(60),
            model_requests_per_minute: 30,
            max_content_bytes: 40_000,
            chrome_path: None,
        }
    }
}

impl Settings {
    /// Create a new builder
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::new()
    }

    /// Read settings from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            database_path: non_empty("OPPCRAWL_DATABASE")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            gemini_api_key: non_empty("GEMINI_API_KEY"),
            openai_api_key: non_empty("OPENAI_API_KEY"),
            gemini_model: non_empty("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            openai_model: non_empty("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            fetch_timeout: parse_or(&non_empty, "OPPCRAWL_FETCH_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.fetch_timeout),
            render_timeout: parse_or(&non_empty, "OPPCRAWL_RENDER_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.render_timeout),
            render_settle: parse_or(&non_empty, "OPPCRAWL_RENDER_SETTLE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.render_settle),
            model_timeout: parse_or(&non_empty, "OPPCRAWL_MODEL_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.model_timeout),
            model_requests_per_minute: parse_or(&non_empty, "OPPCRAWL_MODEL_RPM")?
                .unwrap_or(defaults.model_requests_per_minute),
            max_content_bytes: parse_or(&non_empty, "OPPCRAWL_MAX_CONTENT_BYTES")?
                .unwrap_or(defaults.max_content_bytes),
            chrome_path: non_empty("CHROME_PATH").map(PathBuf::from),
        })
    }
}

fn parse_or<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        None => Ok(None),
    }
}

/// Builder for Settings
#[derive(Debug, Default)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            settings: Settings::default(),
        }
    }

    /// Set the database path
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.database_path = path.into();
        self
    }

    /// Set the Gemini API key
    pub fn gemini_api_key(mut self, key: impl Into<String>) -> Self {
        self.settings.gemini_api_key = Some(key.into());
        self
    }

    /// Set the OpenAI API key
    pub fn openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.settings.openai_api_key = Some(key.into());
        self
    }

    /// Set the static fetch timeout
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.settings.fetch_timeout = timeout;
        self
    }

    /// Set the headless render deadline
    pub fn render_timeout(mut self, timeout: Duration) -> Self {
        self.settings.render_timeout = timeout;
        self
    }

    /// Set the model invocation timeout
    pub fn model_timeout(mut self, timeout: Duration) -> Self {
        self.settings.model_timeout = timeout;
        self
    }

    /// Set the cleaned text bound
    pub fn max_content_bytes(mut self, max: usize) -> Self {
        self.settings.max_content_bytes = max;
        self
    }

    /// Build the settings
    pub fn build(self) -> Settings {
        self.settings
    }
}
