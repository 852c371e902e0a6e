use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::Document;

pub const DEFAULT_CHUNK_WORDS: usize = 1000;
const CHUNK_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkConfig {
    pub target_words: usize,
    pub overlap_words: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            target_words: DEFAULT_CHUNK_WORDS,
            overlap_words: 0,
        }
    }
}

impl ChunkConfig {
    pub fn with_target(target_words: usize) -> Self {
        Self {
            target_words,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub document_id: String,
    pub index: usize,
    pub text: String,
    pub word_count: usize,
    /// Word offsets into the source document, end exclusive.
    pub word_start: usize,
    pub word_end: usize,
}

pub struct Chunker {
    config: ChunkConfig,
}

impl Chunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> ChunkConfig {
        self.config
    }

    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        self.split(&document.id, &document.text)
    }

    /// Splits on whitespace word boundaries into chunks of `target_words`.
    ///
    /// Consecutive chunks share `overlap_words` words; the last chunk may be short.
    pub fn split(&self, document_id: &str, text: &str) -> Vec<Chunk> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }
        let chunk_size = self.config.target_words.max(1);
        let overlap = self.config.overlap_words.min(chunk_size.saturating_sub(1));
        let mut start = 0usize;
        let mut chunks = Vec::new();
        while start < words.len() {
            let end = (start + chunk_size).min(words.len());
            chunks.push(build_chunk(document_id, chunks.len(), start, end, &words));
            if end == words.len() {
                break;
            }
            start = if overlap == 0 {
                end
            } else {
                end.saturating_sub(overlap)
            };
        }
        chunks
    }
}

fn build_chunk(
    document_id: &str,
    index: usize,
    start: usize,
    end: usize,
    words: &[&str],
) -> Chunk {
    let slice = &words[start..end];
    Chunk {
        chunk_id: stable_chunk_id(document_id, index, start, end, CHUNK_VERSION),
        document_id: document_id.to_string(),
        index,
        text: slice.join(" "),
        word_count: slice.len(),
        word_start: start,
        word_end: end,
    }
}

fn stable_chunk_id(
    document_id: &str,
    index: usize,
    word_start: usize,
    word_end: usize,
    version: u32,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update(version.to_be_bytes());
    hasher.update(index.to_be_bytes());
    hasher.update(word_start.to_be_bytes());
    hasher.update(word_end.to_be_bytes());
    hex::encode(&hasher.finalize()[..8])
}
