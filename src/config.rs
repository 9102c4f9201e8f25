use crate::error::{RagError, Result};
use crate::index::Metric;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_TOP_K: usize = 20;
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.76;
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 24_000;
const API_KEY_FILE_NAME: &str = ".gemini_api_key";

/// `~/.gemini_api_key`, or the bare file name when no home directory is set
pub fn default_api_key_file() -> PathBuf {
    match env::var_os("HOME").or_else(|| env::var_os("USERPROFILE")) {
        Some(home) => PathBuf::from(home).join(API_KEY_FILE_NAME),
        None => PathBuf::from(API_KEY_FILE_NAME),
    }
}

/// Tuning for the whole pipeline: chunking, retrieval, prompt budget and retries
#[derive(Debug, Clone)]
pub struct RagConfig {
    /// Window length in characters
    pub chunk_size: usize,
    /// Characters shared between neighbouring windows
    pub chunk_overlap: usize,
    /// Number of candidates pulled from the index per query
    pub top_k: usize,
    /// Minimum cosine similarity for a candidate to reach the prompt
    pub similarity_threshold: f32,
    pub metric: Metric,
    /// Upper bound on the prompt length in characters
    pub max_context_chars: usize,
    pub retry: RetrySettings,
}

/// Deadline and backoff applied to every remote call
#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub request_timeout: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        RagConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            metric: Metric::Cosine,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            retry: RetrySettings::default(),
        }
    }
}

impl RagConfig {
    /// Check the settings are consistent with each other
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Configuration(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Configuration(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(RagError::Configuration(format!(
                "similarity threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.max_context_chars == 0 {
            return Err(RagError::Configuration(
                "max context size must be greater than zero".to_string(),
            ));
        }
        if self.retry.request_timeout.is_zero() {
            return Err(RagError::Configuration(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
