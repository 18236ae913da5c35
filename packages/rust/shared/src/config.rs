//! Application configuration for Refinery.
//!
//! User config lives at `~/.refinery/refinery.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RefineryError, Result};
use crate::types::{DEFAULT_EMBEDDING_MODEL, DEFAULT_MODEL};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "refinery.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".refinery";

// ---------------------------------------------------------------------------
// Config structs (matching refinery.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// OpenAI settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP service.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".into()
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Default chat model for structuring and keyword extraction.
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding model. Changing this changes the vector dimension.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            embedding_model: default_embedding_model(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> String {
    DEFAULT_MODEL.into()
}
fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.into()
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the content database. `~` expands to the home directory.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "~/.refinery/content.db".into()
}

impl StorageConfig {
    /// Resolve the database path, expanding a leading `~`.
    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        if let Some(rest) = self.db_path.strip_prefix("~/") {
            let home = dirs::home_dir().ok_or_else(|| {
                RefineryError::config("could not determine home directory")
            })?;
            Ok(home.join(rest))
        } else {
            Ok(PathBuf::from(&self.db_path))
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.refinery/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| RefineryError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.refinery/refinery.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| RefineryError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| RefineryError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| RefineryError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| RefineryError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| RefineryError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the OpenAI API key from the configured env var.
///
/// A missing key is batch-fatal: the boundary layer rejects requests before
/// the pipeline runs.
pub fn api_key(config: &AppConfig) -> Option<String> {
    match std::env::var(&config.openai.api_key_env) {
        Ok(val) if !val.is_empty() => Some(val),
        _ => None,
    }
}

/// Check that the OpenAI API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.openai.api_key_env;
    match api_key(config) {
        Some(_) => Ok(()),
        None => Err(RefineryError::config(format!(
            "OpenAI API key not found. Set the {var_name} environment variable."
        ))),
    }
}
