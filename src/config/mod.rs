// Configuration management: TOML settings persisted under a base directory.


use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::chunking::ChunkingConfig;
use crate::confidence::ConfidenceProfile;

pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub batch_size: u32,
    pub embedding_dimension: u32,
}

impl Default for OllamaConfig {
    #[inline]
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "nomic-embed-text:latest".to_string(),
            batch_size: 16,
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of candidates returned when the caller does not ask for more
    pub default_k: usize,
    /// Over-fetch factor for the post-filter fallback on backends without
    /// native document predicates
    pub overfetch_multiplier: usize,
    pub confidence_profile: ConfidenceProfile,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            default_k: 5,
            overfetch_multiplier: 2,
            confidence_profile: ConfidenceProfile::Enhanced,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid chunk size: {0} (must be between 100 and 8192 characters)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid default k: {0} (must be between 1 and 100)")]
    InvalidDefaultK(usize),
    #[error("Invalid over-fetch multiplier: {0} (must be at least 2)")]
    InvalidOverfetchMultiplier(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Load configuration from `config.toml` under `base_dir`, falling back
    /// to defaults when the file does not exist.
    #[inline]
    pub fn load<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let config_path = base_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                ollama: OllamaConfig::default(),
                chunking: ChunkingConfig::default(),
                retrieval: RetrievalConfig::default(),
                base_dir: base_dir.as_ref().to_path_buf(),
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = base_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.base_dir.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;

        if !(100..=8192).contains(&self.chunking.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(self.chunking.chunk_size));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                self.chunking.chunk_overlap,
                self.chunking.chunk_size,
            ));
        }

        if !(1..=100).contains(&self.retrieval.default_k) {
            return Err(ConfigError::InvalidDefaultK(self.retrieval.default_k));
        }
        if self.retrieval.overfetch_multiplier < 2 {
            return Err(ConfigError::InvalidOverfetchMultiplier(
                self.retrieval.overfetch_multiplier,
            ));
        }

        Ok(())
    }

    /// Default base directory for application state
    #[inline]
    pub fn default_base_dir() -> Result<PathBuf, ConfigError> {
        let dir = dirs::data_local_dir()
            .ok_or(ConfigError::DirectoryError)?
            .join("askdocs");
        Ok(dir)
    }

    /// Path for the SQLite document registry
    #[inline]
    pub fn registry_path(&self) -> PathBuf {
        self.base_dir.join("registry.db")
    }

    /// Directory holding the persisted vector index
    #[inline]
    pub fn index_dir(&self) -> PathBuf {
        self.base_dir.join("index")
    }

    /// Directory where uploaded document files are stored
    #[inline]
    pub fn uploads_dir(&self) -> PathBuf {
        self.base_dir.join("uploads")
    }
}

impl OllamaConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(64..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        Ok(())
    }

    #[inline]
    pub fn url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}
