//! Configuration loading
//!
//! Resolution priority follows the usual order: command-line arguments
//! (handled by the binary) override environment variables, which override the
//! TOML config file, which overrides compiled defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// External classifier (LLM) settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// API key; when empty the classifier is treated as permanently unavailable
    pub api_key: String,
    /// OpenAI-compatible chat completions endpoint
    pub api_url: String,
    pub model: String,
    /// Timeout for single-item classification calls
    pub classify_timeout_secs: u64,
    /// Timeout for bulk import normalization calls (longer: larger responses)
    pub import_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "Meta-Llama-3_3-70B-Instruct".to_string(),
            classify_timeout_secs: 10,
            import_timeout_secs: 30,
        }
    }
}

/// Service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    /// Whether WebSocket connections must present a valid access token
    pub auth_required: bool,
    pub llm: LlmSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            auth_required: true,
            llm: LlmSettings::default(),
        }
    }
}

/// OS-dependent default database location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("courses").join("courses.db"))
        .unwrap_or_else(|| PathBuf::from("./courses.db"))
}

/// Default configuration file path for the platform
fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("courses").join("config.toml"))
}

/// Parse a TOML configuration document
pub fn parse_config(content: &str) -> Result<AppConfig> {
    toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
}

/// Load configuration: explicit file, else the default location when present,
/// else compiled defaults; environment variables are applied on top.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let mut config = match explicit {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Cannot read {}: {}", path.display(), e))
            })?;
            parse_config(&content)?
        }
        None => match default_config_file() {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path)?;
                parse_config(&content)?
            }
            _ => AppConfig::default(),
        },
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(v) = std::env::var("COURSES_DB_PATH") {
        config.database_path = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("COURSES_AUTH_REQUIRED") {
        config.auth_required = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes");
    }
    if let Ok(v) = std::env::var("LLM_API_KEY") {
        config.llm.api_key = v;
    }
    if let Ok(v) = std::env::var("LLM_API_URL") {
        config.llm.api_url = v;
    }
    if let Ok(v) = std::env::var("LLM_MODEL") {
        config.llm.model = v;
    }
    if let Ok(v) = std::env::var("LLM_CLASSIFY_TIMEOUT") {
        if let Ok(secs) = v.parse() {
            config.llm.classify_timeout_secs = secs;
        }
    }
    if let Ok(v) = std::env::var("LLM_IMPORT_TIMEOUT") {
        if let Ok(secs) = v.parse() {
            config.llm.import_timeout_secs = secs;
        }
    }
}
