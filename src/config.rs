//! Configuration management for ragtrace
//!
//! TOML file with defaults for every field, plus environment overrides for
//! secrets. Location: ~/.ragtrace/config.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{RagError, Result};

/// Environment variable holding the document store connection string
pub const ENV_CONNECTION_STRING: &str = "MONGODB_URI";
/// Environment variable holding the embedding service credential
pub const ENV_API_KEY: &str = "VOYAGE_API_KEY";
/// Environment variable enabling trace capture
pub const ENV_DEBUG: &str = "RAG_DEBUG";

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub trace: TraceConfig,
}

/// Embedding service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub model: String,
    /// Output dimensionality; must match the store's vector index
    pub dimensions: usize,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

/// Which document store backend executes the similarity search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mongodb,
    Qdrant,
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    #[serde(skip_serializing)]
    pub connection_string: Option<String>,
    /// Database name; falls back to the one in the connection string
    pub database: Option<String>,
    pub collection: String,
    pub index_name: String,
    pub vector_field: String,
    pub text_field: String,
    pub top_k: usize,
}

/// Trace capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub enabled: bool,
    pub overall_timeout_secs: u64,
    pub snippet_chars: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.voyageai.com/v1/embeddings".to_string(),
            model: "voyage-finance-2".to_string(),
            dimensions: 1024,
            api_key: None,
            timeout_secs: 15,
            max_retries: 2,
            backoff_base_ms: 1000,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Mongodb,
            connection_string: None,
            database: None,
            collection: "documents".to_string(),
            index_name: "vector_index".to_string(),
            vector_field: "embedding".to_string(),
            text_field: "text".to_string(),
            top_k: 5,
        }
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            overall_timeout_secs: 30,
            snippet_chars: 500,
        }
    }
}

impl EmbeddingConfig {
    /// Per-attempt deadline
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Credential, treating a blank value as absent
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}

impl StoreConfig {
    /// Connection string, treating a blank value as absent
    pub fn connection_string(&self) -> Option<&str> {
        self.connection_string
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

impl TraceConfig {
    /// Deadline the outer caller imposes on a whole retrieval
    pub fn overall_timeout(&self) -> Duration {
        Duration::from_secs(self.overall_timeout_secs)
    }
}

impl RagConfig {
    /// Load from the default location, then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load from an explicit path; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path)?;
            toml::from_str(&contents)
                .map_err(|e| RagError::Config(format!("Failed to parse config file: {}", e)))?
        } else {
            RagConfig::default()
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides from the current process
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (process env in production)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(uri) = lookup(ENV_CONNECTION_STRING) {
            self.store.connection_string = Some(uri);
        }
        if let Some(key) = lookup(ENV_API_KEY) {
            self.embedding.api_key = Some(key);
        }
        if let Some(flag) = lookup(ENV_DEBUG) {
            self.trace.enabled = flag.trim() == "1";
        }
    }

    /// Reject values no deployment can use
    pub fn validate(&self) -> Result<()> {
        if self.store.top_k == 0 {
            return Err(RagError::Config("store.top_k must be at least 1".to_string()));
        }
        if self.embedding.timeout_secs == 0 {
            return Err(RagError::Config(
                "embedding.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.embedding.dimensions == 0 {
            return Err(RagError::Config(
                "embedding.dimensions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Save to the given path; secrets are never written
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| RagError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, toml_string)?;
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| RagError::Config("Could not determine home directory".to_string()))?;
        Ok(home.join(".ragtrace").join("config.toml"))
    }
}
