
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::SiteQaError;
use crate::embeddings::chunking::ChunkingConfig;

/// Environment variables checked, in order, for the Gemini API key.
pub const API_KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Default name of the optional configuration file in the working directory.
pub const CONFIG_FILE_NAME: &str = "siteqa.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Root of the local HTML mirror to index.
    pub content_dir: PathBuf,
    /// Directory holding the persisted vector index.
    pub index_dir: PathBuf,
    /// Number of chunks retrieved per question.
    pub top_k: usize,
    pub chunking: ChunkingConfig,
    pub gemini: GeminiConfig,
    pub capture: CaptureConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            content_dir: PathBuf::from("./site"),
            index_dir: PathBuf::from("./vectorstore"),
            top_k: 4,
            chunking: ChunkingConfig::default(),
            gemini: GeminiConfig::default(),
            capture: CaptureConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeminiConfig {
    pub embedding_model: String,
    pub chat_model: String,
    /// Texts sent per batch embedding request.
    pub batch_size: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            embedding_model: "embedding-001".to_string(),
            chat_model: "gemini-1.5-pro".to_string(),
            batch_size: 16,
        }
    }
}

/// External screen-capture command for the advise loop.
///
/// The command is run as-is with `{output}` replaced by the path of the PNG
/// file it must write. Capture is an external collaborator; siteqa never
/// grabs the screen itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    pub command: Vec<String>,
    /// Seconds between captures.
    pub interval_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        let command = if cfg!(target_os = "macos") {
            vec![
                "screencapture".to_string(),
                "-x".to_string(),
                "{output}".to_string(),
            ]
        } else if cfg!(target_os = "linux") {
            vec!["grim".to_string(), "{output}".to_string()]
        } else {
            Vec::new()
        };
        Self {
            command,
            interval_secs: 5,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid top_k: {0} (must be at least 1)")]
    InvalidTopK(usize),
    #[error("Invalid chunk size: {0} (must be between 100 and 8192)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid batch size: {0} (must be between 1 and 100)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0:?} (cannot be empty)")]
    InvalidModel(String),
    #[error("No API key found: set GEMINI_API_KEY or GOOGLE_API_KEY in the environment")]
    MissingApiKey,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Config {
    /// Load configuration from `siteqa.toml` in the given directory, falling
    /// back to defaults when the file does not exist.
    #[inline]
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let config_path = dir.as_ref().join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }

        let chunking = &self.chunking;
        if !(100..=8192).contains(&chunking.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(chunking.chunk_size));
        }
        if chunking.chunk_overlap >= chunking.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                chunking.chunk_overlap,
                chunking.chunk_size,
            ));
        }

        let gemini = &self.gemini;
        if gemini.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(gemini.embedding_model.clone()));
        }
        if gemini.chat_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(gemini.chat_model.clone()));
        }
        if gemini.batch_size == 0 || gemini.batch_size > 100 {
            return Err(ConfigError::InvalidBatchSize(gemini.batch_size));
        }

        Ok(())
    }
}

/// Resolve the provider API key from the process environment.
///
/// Read once at startup and passed into the client constructor; no other
/// component touches the environment.
#[inline]
pub fn resolve_api_key() -> crate::Result<String> {
    for var in API_KEY_ENV_VARS {
        if let Ok(key) = env::var(var) {
            if !key.trim().is_empty() {
                return Ok(key);
            }
        }
    }
    Err(SiteQaError::Config(ConfigError::MissingApiKey.to_string()))
}
