use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::embeddings::{provider::known_model_width, SOURCE_WIDTH};
use crate::error::{Result, SemSearchError};

/// Endpoint used when `base_url` is not configured
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Embedding model used when none is configured
pub const DEFAULT_MODEL: &str = "text-embedding-ada-002";
/// Environment variable holding the embedding API key
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

const SETTINGS_FILE: &str = "settings.json";
const CATALOG_FILE: &str = "issues.json";
const STORE_DIR: &str = "embeddings";

/// On-disk representation of settings.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub enabled: bool,
    pub embedding_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub search_limit: usize,
    /// Concurrent indexing workers used by sync
    pub workers: usize,
    /// Total attempts per indexing task before giving up
    pub max_attempts: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: false,
            embedding_model: DEFAULT_MODEL.to_string(),
            base_url: None,
            search_limit: 10,
            workers: 4,
            max_attempts: 3,
        }
    }
}

impl Settings {
    /// Endpoint the embedding generator talks to.
    pub fn api_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
    }

    fn validate(&self) -> Result<()> {
        if self.embedding_model.trim().is_empty() {
            return Err(SemSearchError::Config("embedding_model must not be empty".into()));
        }
        if self.search_limit == 0 {
            return Err(SemSearchError::Config("search_limit must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(SemSearchError::Config("workers must be at least 1".into()));
        }
        if self.max_attempts == 0 {
            return Err(SemSearchError::Config("max_attempts must be at least 1".into()));
        }
        if let Some(width) = known_model_width(&self.embedding_model) {
            if width > SOURCE_WIDTH {
                return Err(SemSearchError::Config(format!(
                    "model {} produces {} dimensions, more than the supported {}",
                    self.embedding_model, width, SOURCE_WIDTH
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding settings, the issue catalog and the embedding store
    pub data_dir: PathBuf,
    pub settings: Settings,
}

impl Config {
    pub fn load(data_dir_override: Option<&Path>) -> Result<Self> {
        let data_dir = match data_dir_override {
            Some(dir) => dir.to_path_buf(),
            None => default_data_dir()?,
        };

        let settings_path = data_dir.join(SETTINGS_FILE);
        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).map_err(|e| {
                SemSearchError::Config(format!("invalid {}: {}", settings_path.display(), e))
            })?
        } else {
            Settings::default()
        };

        // Env overrides win over settings.json
        if let Ok(model) = std::env::var("ISSUE_SEMSEARCH_MODEL") {
            if !model.trim().is_empty() {
                settings.embedding_model = model;
            }
        }
        if let Ok(url) = std::env::var("ISSUE_SEMSEARCH_BASE_URL") {
            if !url.trim().is_empty() {
                settings.base_url = Some(url);
            }
        }

        settings.validate()?;

        Ok(Config { data_dir, settings })
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join(CATALOG_FILE)
    }

    /// Directory of the embedding store
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_DIR)
    }

    /// Embedding API key from the environment, if set and non-blank
    pub fn api_key() -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

fn default_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("ISSUE_SEMSEARCH_DIR") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let base = dirs::data_dir()
        .ok_or_else(|| SemSearchError::Config("Could not determine data directory".into()))?;
    Ok(base.join("issue-semsearch"))
}
