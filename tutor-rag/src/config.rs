//! Configuration for the retrieval pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::index::DistanceMetric;

/// File name of the index snapshot inside a data directory.
pub const SNAPSHOT_FILE_NAME: &str = "vector_index.json";

/// Configuration parameters for chunking, retrieval, generation, and memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Window size in whitespace tokens.
    pub window_size: usize,
    /// Number of tokens shared between consecutive windows.
    pub overlap: usize,
    /// `top_k` used when the caller does not specify one.
    pub default_top_k: usize,
    /// Largest `top_k` a caller may request.
    pub max_top_k: usize,
    /// Number of retrieved results sent to the generator and reported as sources.
    pub context_k: usize,
    /// Generated answers shorter than this (after trimming) count as failures.
    pub min_answer_chars: usize,
    /// Source snippets longer than this are truncated with an ellipsis.
    pub snippet_chars: usize,
    /// Number of prior conversation entries prepended to a generation request.
    pub history_turns: usize,
    /// Per-user conversation log bound.
    pub memory_bound: usize,
    /// Distance metric used by the vector index.
    pub distance_metric: DistanceMetric,
    /// Timeout for a single embedding call, in seconds.
    pub embed_timeout_secs: u64,
    /// Timeout for a single generation call, in seconds.
    pub generation_timeout_secs: u64,
    /// Snapshot location for the vector index. `None` disables persistence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persist_location: Option<String>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            window_size: 500,
            overlap: 50,
            default_top_k: 5,
            max_top_k: 20,
            context_k: 3,
            min_answer_chars: 20,
            snippet_chars: 200,
            history_turns: 4,
            memory_bound: 10,
            distance_metric: DistanceMetric::SquaredL2,
            embed_timeout_secs: 30,
            generation_timeout_secs: 60,
            persist_location: None,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Build a configuration from `TUTOR_*` environment variables.
    ///
    /// Recognised variables: `TUTOR_DATA_DIR` (enables persistence at
    /// `{dir}/vector_index.json`), `TUTOR_WINDOW_SIZE`, `TUTOR_CHUNK_OVERLAP`
    /// and `TUTOR_TOP_K`. Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a variable does not parse or the
    /// resulting configuration fails validation.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();
        if let Ok(dir) = std::env::var("TUTOR_DATA_DIR") {
            let location = std::path::Path::new(&dir).join(SNAPSHOT_FILE_NAME);
            builder = builder.persist_location(location.to_string_lossy().into_owned());
        }
        if let Some(size) = env_usize("TUTOR_WINDOW_SIZE")? {
            builder = builder.window_size(size);
        }
        if let Some(overlap) = env_usize("TUTOR_CHUNK_OVERLAP")? {
            builder = builder.overlap(overlap);
        }
        if let Some(top_k) = env_usize("TUTOR_TOP_K")? {
            builder = builder.default_top_k(top_k);
        }
        builder.build()
    }

    /// Embedding call timeout.
    pub fn embed_timeout(&self) -> Duration {
        Duration::from_secs(self.embed_timeout_secs)
    }

    /// Generation call timeout.
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}

fn env_usize(name: &str) -> Result<Option<usize>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| RagError::ConfigError(format!("{name}={raw:?} is not a number: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the window size in tokens.
    pub fn window_size(mut self, size: usize) -> Self {
        self.config.window_size = size;
        self
    }

    /// Set the overlap between consecutive windows in tokens.
    pub fn overlap(mut self, overlap: usize) -> Self {
        self.config.overlap = overlap;
        self
    }

    /// Set the default number of results to retrieve.
    pub fn default_top_k(mut self, k: usize) -> Self {
        self.config.default_top_k = k;
        self
    }

    /// Set the largest `top_k` a caller may request.
    pub fn max_top_k(mut self, k: usize) -> Self {
        self.config.max_top_k = k;
        self
    }

    /// Set how many results feed the prompt and the reported sources.
    pub fn context_k(mut self, k: usize) -> Self {
        self.config.context_k = k;
        self
    }

    /// Set the shortest acceptable generated answer.
    pub fn min_answer_chars(mut self, chars: usize) -> Self {
        self.config.min_answer_chars = chars;
        self
    }

    /// Set the snippet length for reported sources.
    pub fn snippet_chars(mut self, chars: usize) -> Self {
        self.config.snippet_chars = chars;
        self
    }

    /// Set how many prior conversation entries are sent to the generator.
    pub fn history_turns(mut self, turns: usize) -> Self {
        self.config.history_turns = turns;
        self
    }

    /// Set the per-user conversation bound.
    pub fn memory_bound(mut self, bound: usize) -> Self {
        self.config.memory_bound = bound;
        self
    }

    /// Set the distance metric of the vector index.
    pub fn distance_metric(mut self, metric: DistanceMetric) -> Self {
        self.config.distance_metric = metric;
        self
    }

    /// Set the embedding timeout in seconds.
    pub fn embed_timeout_secs(mut self, secs: u64) -> Self {
        self.config.embed_timeout_secs = secs;
        self
    }

    /// Set the generation timeout in seconds.
    pub fn generation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.generation_timeout_secs = secs;
        self
    }

    /// Enable persistence at the given snapshot location.
    pub fn persist_location(mut self, location: impl Into<String>) -> Self {
        self.config.persist_location = Some(location.into());
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `window_size == 0` or `overlap >= window_size`
    /// - `default_top_k` is zero or exceeds `max_top_k`
    /// - `context_k == 0` or `memory_bound == 0`
    /// - either timeout is zero
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl RagConfig {
    /// Check that the parameters are consistent. See [`RagConfigBuilder::build`].
    pub fn validate(&self) -> Result<()> {
        let config = self;
        if config.window_size == 0 {
            return Err(RagError::ConfigError("window_size must be greater than zero".into()));
        }
        if config.overlap >= config.window_size {
            return Err(RagError::ConfigError(format!(
                "overlap ({}) must be less than window_size ({})",
                config.overlap, config.window_size
            )));
        }
        if config.default_top_k == 0 || config.default_top_k > config.max_top_k {
            return Err(RagError::ConfigError(format!(
                "default_top_k ({}) must be between 1 and max_top_k ({})",
                config.default_top_k, config.max_top_k
            )));
        }
        if config.context_k == 0 {
            return Err(RagError::ConfigError("context_k must be greater than zero".into()));
        }
        if config.memory_bound == 0 {
            return Err(RagError::ConfigError("memory_bound must be greater than zero".into()));
        }
        if config.embed_timeout_secs == 0 || config.generation_timeout_secs == 0 {
            return Err(RagError::ConfigError("timeouts must be greater than zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = RagConfig::builder().build().unwrap();
        assert_eq!(config.window_size, 500);
        assert_eq!(config.overlap, 50);
        assert_eq!(config.context_k, 3);
        assert_eq!(config.memory_bound, 10);
        assert_eq!(config.history_turns, 4);
        assert_eq!(config.distance_metric, DistanceMetric::SquaredL2);
        assert!(config.persist_location.is_none());
    }

    #[test]
    fn overlap_must_be_smaller_than_window() {
        let err = RagConfig::builder().window_size(50).overlap(50).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(msg) if msg.contains("overlap")));
    }

    #[test]
    fn default_top_k_is_bounded() {
        assert!(RagConfig::builder().default_top_k(0).build().is_err());
        assert!(RagConfig::builder().max_top_k(4).default_top_k(5).build().is_err());
        assert!(RagConfig::builder().max_top_k(5).default_top_k(5).build().is_ok());
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        assert!(RagConfig::builder().generation_timeout_secs(0).build().is_err());
        assert!(RagConfig::builder().embed_timeout_secs(0).build().is_err());
    }

    #[test]
    fn serde_roundtrip_keeps_metric() {
        let config = RagConfig::builder()
            .distance_metric(DistanceMetric::Cosine)
            .persist_location("data/vector_index.json")
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"cosine\""));
        let back: RagConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
