use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CachePolicy;
use crate::chunk::{ChunkConfig, DEFAULT_CHUNK_WORDS};
use crate::chunk_summary::DEFAULT_CHUNK_SUMMARY_WORDS;
use crate::document_summary::DEFAULT_DOCUMENT_SUMMARY_WORDS;
use crate::generation::{GenerationOptions, DEFAULT_CONTEXT_WINDOW, DEFAULT_TIMEOUT_SECS};
use crate::meta::{DEFAULT_META_MAX_WORDS, DEFAULT_META_MIN_WORDS};
use crate::postprocess::DEFAULT_LENGTH_TOLERANCE;
use crate::progressive::DEFAULT_PROGRESSIVE_WORDS;
use crate::strategy::{StrategyKind, DEFAULT_MAX_WORKERS};

/// Tunables for one pipeline run. Every field has a default, so a partial
/// `[pipeline]` table deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub chunk_words: usize,
    pub chunk_overlap_words: usize,
    pub chunk_summary_words: usize,
    pub document_summary_words: usize,
    pub meta_min_words: usize,
    pub meta_max_words: usize,
    pub progressive_context_words: usize,
    pub strategy: StrategyKind,
    pub max_workers: usize,
    pub timeout_secs: u64,
    pub context_window: u32,
    pub length_tolerance: f64,
    /// `None` keeps every focus entry.
    pub cache_capacity: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_words: DEFAULT_CHUNK_WORDS,
            chunk_overlap_words: 0,
            chunk_summary_words: DEFAULT_CHUNK_SUMMARY_WORDS,
            document_summary_words: DEFAULT_DOCUMENT_SUMMARY_WORDS,
            meta_min_words: DEFAULT_META_MIN_WORDS,
            meta_max_words: DEFAULT_META_MAX_WORDS,
            progressive_context_words: DEFAULT_PROGRESSIVE_WORDS,
            strategy: StrategyKind::default(),
            max_workers: DEFAULT_MAX_WORKERS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            context_window: DEFAULT_CONTEXT_WINDOW,
            length_tolerance: DEFAULT_LENGTH_TOLERANCE,
            cache_capacity: None,
        }
    }
}

impl PipelineConfig {
    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
            context_window: self.context_window,
        }
    }

    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            target_words: self.chunk_words.max(1),
            overlap_words: self.chunk_overlap_words,
        }
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy::from_capacity(self.cache_capacity)
    }
}
