use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub mode: OperationMode,
    pub model: ModelConfig,
    pub retrieval: RetrievalConfig,
    pub concurrency: ConcurrencyConfig,
    pub poll: PollConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    Fast,     // More parallel chunks, shorter timeouts, fewer passages
    Accurate, // Fewer parallel chunks, long timeouts, repair malformed replies
    #[default]
    Balanced,
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationMode::Fast => "fast",
            OperationMode::Accurate => "accurate",
            OperationMode::Balanced => "balanced",
        })
    }
}

impl FromStr for OperationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(OperationMode::Fast),
            "accurate" => Ok(OperationMode::Accurate),
            "balanced" => Ok(OperationMode::Balanced),
            other => Err(format!("unknown mode '{other}' (expected fast, balanced or accurate)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub max_passages: usize,
    pub repair_attempts: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalBackend {
    KnowledgeBase,
    Qdrant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub backend: RetrievalBackend,
    pub base_url: String,
    pub api_key: Option<String>,
    /// Embedding endpoint, only used by the qdrant backend.
    pub embedding_url: String,
    pub embedding_model: String,
    pub max_results: usize,
    pub max_query_chars: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub max_concurrent_chunks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    pub max_attempts: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub deadline_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: OperationMode::Balanced,
            model: ModelConfig {
                base_url: "http://localhost:11434".to_string(),
                model: "llama3.1:8b".to_string(),
                temperature: 0.2,
                max_tokens: 2048,
                timeout_secs: 120,
                max_passages: 5,
                repair_attempts: 0,
            },
            retrieval: RetrievalConfig {
                backend: RetrievalBackend::KnowledgeBase,
                base_url: "http://localhost:8080".to_string(),
                api_key: None,
                embedding_url: "http://localhost:11434".to_string(),
                embedding_model: "nomic-embed-text".to_string(),
                max_results: 5,
                max_query_chars: 500,
                timeout_secs: 30,
            },
            concurrency: ConcurrencyConfig {
                max_concurrent_chunks: 4,
            },
            poll: PollConfig {
                max_attempts: 30,
                initial_backoff_ms: 1000,
                max_backoff_ms: 10000,
                deadline_secs: 300,
            },
        }
    }
}

impl AppConfig {
    pub fn for_mode(mode: OperationMode) -> Self {
        match mode {
            OperationMode::Fast => Self::fast_mode(),
            OperationMode::Accurate => Self::accurate_mode(),
            OperationMode::Balanced => Self::default(),
        }
    }

    pub fn fast_mode() -> Self {
        let mut config = Self::default();
        config.mode = OperationMode::Fast;
        config.model.timeout_secs = 60;
        config.model.max_passages = 3;
        config.retrieval.max_results = 3;
        config.retrieval.timeout_secs = 15;
        config.concurrency.max_concurrent_chunks = 10;
        config
    }

    pub fn accurate_mode() -> Self {
        let mut config = Self::default();
        config.mode = OperationMode::Accurate;
        config.model.temperature = 0.0;
        config.model.timeout_secs = 300;
        config.model.repair_attempts = 2;
        config.retrieval.timeout_secs = 60;
        config.concurrency.max_concurrent_chunks = 2;
        config
    }

    /// Preset for `mode`, overlaid with whatever keys `path` sets.
    pub fn load(mode: OperationMode, path: Option<&Path>) -> Result<Self> {
        let preset = Self::for_mode(mode);
        let Some(path) = path else {
            return Ok(preset);
        };

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let overlay: Value = serde_json::from_str(&text)
            .with_context(|| format!("Config file {} is not valid JSON", path.display()))?;

        let mut merged = serde_json::to_value(preset).context("Failed to encode preset config")?;
        merge(&mut merged, overlay);

        serde_json::from_value(merged)
            .with_context(|| format!("Config file {} has invalid settings", path.display()))
    }
}

/// Recursively overlay `patch` onto `base`; objects merge, everything else replaces.
fn merge(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, patch) => *base = patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_differ_where_expected() {
        let fast = AppConfig::for_mode(OperationMode::Fast);
        let balanced = AppConfig::for_mode(OperationMode::Balanced);
        let accurate = AppConfig::for_mode(OperationMode::Accurate);

        assert!(fast.concurrency.max_concurrent_chunks > balanced.concurrency.max_concurrent_chunks);
        assert!(accurate.concurrency.max_concurrent_chunks < balanced.concurrency.max_concurrent_chunks);
        assert_eq!(balanced.model.repair_attempts, 0);
        assert!(accurate.model.repair_attempts > 0);
        assert_eq!(balanced.retrieval.max_query_chars, 500);
    }

    #[test]
    fn test_file_overlays_preset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doccheck.json");
        std::fs::write(
            &path,
            r#"{"retrieval": {"backend": "qdrant", "base_url": "http://qdrant:6333"}, "model": {"model": "mistral"}}"#,
        )
        .unwrap();

        let config = AppConfig::load(OperationMode::Fast, Some(&path)).unwrap();

        assert_eq!(config.retrieval.backend, RetrievalBackend::Qdrant);
        assert_eq!(config.retrieval.base_url, "http://qdrant:6333");
        assert_eq!(config.model.model, "mistral");
        // untouched keys keep the preset's values
        assert_eq!(config.concurrency.max_concurrent_chunks, 10);
        assert_eq!(config.retrieval.max_results, 3);
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"concurrency": {"max_concurrent_chunks": "many"}}"#).unwrap();

        let err = AppConfig::load(OperationMode::Balanced, Some(&path)).unwrap_err();
        assert!(err.to_string().contains("invalid settings"));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("FAST".parse::<OperationMode>().unwrap(), OperationMode::Fast);
        assert!("turbo".parse::<OperationMode>().is_err());
    }
}
