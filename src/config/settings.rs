//! Configuration settings for Glimt.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub search: SearchSettings,
    pub agent: AgentSettings,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Directory holding per-video materialized artifacts.
    pub fn artifact_dir(&self) -> PathBuf {
        PathBuf::from(&self.general.artifact_dir)
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory where downloaded video artifacts are materialized.
    pub artifact_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            artifact_dir: "/tmp/glimt/artifacts".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// LLM backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Chat model for planner/critic reasoning.
    pub model: String,
    /// Vision-capable model for frame queries.
    pub vision_model: String,
    /// Per-request wall-clock timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4.1".to_string(),
            vision_model: "gpt-4o".to_string(),
            timeout_seconds: 120,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Search index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Search service endpoint (Azure-AI-Search-compatible REST API).
    pub endpoint: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Index for chapter/summary documents.
    pub video_index: String,
    /// Index for keyframe documents.
    pub keyframe_index: String,
    /// Name of the vector field in both indexes.
    pub vector_field: String,
    /// Candidate pool size for video search before deduplication.
    pub search_pool: usize,
    /// Minimum relevance score (0-100) for video search hits.
    pub min_score: f32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key_env: "GLIMT_SEARCH_KEY".to_string(),
            video_index: "video-index".to_string(),
            keyframe_index: "video-keyframes-index".to_string(),
            vector_field: "embeddings".to_string(),
            search_pool: 50,
            min_score: 80.0,
        }
    }
}

/// Agent orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Phrase whose appearance in a turn terminates the loop.
    pub terminal_phrase: String,
    /// Turn ceiling when the critic participates (validation round-trips
    /// need headroom).
    pub max_turns_with_critic: usize,
    /// Turn ceiling for the plain single-agent tool loop.
    pub max_turns: usize,
    /// Retry delays in seconds applied between backend call attempts.
    pub retry_intervals_seconds: Vec<u64>,
    /// Extra wait in seconds when a failure is rate-limit flavored.
    pub rate_limit_extra_seconds: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            terminal_phrase: "TERMINATE".to_string(),
            max_turns_with_critic: 250,
            max_turns: 20,
            retry_intervals_seconds: vec![10, 15],
            rate_limit_extra_seconds: 30,
        }
    }
}

impl AgentSettings {
    /// Build the retry policy these settings describe.
    pub fn retry_policy(&self, call_timeout_seconds: u64) -> crate::retry::RetryPolicy {
        crate::retry::RetryPolicy {
            intervals: self
                .retry_intervals_seconds
                .iter()
                .map(|s| std::time::Duration::from_secs(*s))
                .collect(),
            rate_limit_extra: std::time::Duration::from_secs(self.rate_limit_extra_seconds),
            call_timeout: Some(std::time::Duration::from_secs(call_timeout_seconds)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.agent.max_turns_with_critic, 250);
        assert_eq!(settings.agent.max_turns, 20);
        assert_eq!(settings.agent.terminal_phrase, "TERMINATE");
        assert_eq!(settings.agent.retry_intervals_seconds, vec![10, 15]);
        assert_eq!(settings.search.min_score, 80.0);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml = r#"
            [agent]
            max_turns = 12
        "#;
        let settings: Settings = toml::from_str(toml).unwrap();
        assert_eq!(settings.agent.max_turns, 12);
        assert_eq!(settings.agent.max_turns_with_critic, 250);
        assert_eq!(settings.llm.model, "gpt-4.1");
    }

    #[test]
    fn test_retry_policy_from_settings() {
        let settings = Settings::default();
        let policy = settings.agent.retry_policy(60);
        assert_eq!(policy.attempts(), 2);
        assert_eq!(
            policy.call_timeout,
            Some(std::time::Duration::from_secs(60))
        );
    }
}
