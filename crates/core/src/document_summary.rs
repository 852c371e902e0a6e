use std::sync::Arc;

use tracing::warn;

use crate::generation::{GenerationOptions, GenerationRequest, TextGenerator};
use crate::model::{ChunkSummary, Document, DocumentSummary, SummaryStatus};
use crate::prompts;

pub const DEFAULT_DOCUMENT_SUMMARY_WORDS: usize = 300;

/// Reduces one document's chunk summaries into a single summary.
pub struct DocumentSummarizer {
    generator: Arc<dyn TextGenerator>,
    options: GenerationOptions,
    target_words: usize,
}

impl DocumentSummarizer {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        options: GenerationOptions,
        target_words: usize,
    ) -> Self {
        Self {
            generator,
            options,
            target_words,
        }
    }

    /// `summaries` must be in chunk index order. Failed chunk placeholders are
    /// left out of the prompt and named as gaps instead.
    pub fn combine(
        &self,
        document: &Document,
        summaries: &[ChunkSummary],
        emphasis: &str,
    ) -> DocumentSummary {
        let chunk_count = summaries.len();
        if chunk_count == 0 {
            return DocumentSummary::failed(document, 0, "document produced no chunks");
        }
        let usable: Vec<&ChunkSummary> = summaries.iter().filter(|s| s.status.is_ok()).collect();
        let missing: Vec<usize> = summaries
            .iter()
            .filter(|s| !s.status.is_ok())
            .map(|s| s.index)
            .collect();
        if usable.is_empty() {
            return DocumentSummary::failed(
                document,
                chunk_count,
                format!("all {chunk_count} chunk summaries failed"),
            );
        }
        let request = GenerationRequest::new(
            prompts::DOCUMENT_SYSTEM_PROMPT,
            prompts::document_prompt(
                &document.name,
                emphasis,
                &usable,
                &missing,
                self.target_words,
            ),
            self.options,
        );
        match self.generator.generate(&request) {
            Ok(text) => DocumentSummary {
                document_id: document.id.clone(),
                document_name: document.name.clone(),
                text,
                chunk_count,
                failed_chunks: missing.len(),
                status: SummaryStatus::Ok,
            },
            Err(err) => {
                warn!(document = %document.id, "document summary failed: {err}");
                DocumentSummary {
                    failed_chunks: missing.len(),
                    ..DocumentSummary::failed(
                        document,
                        chunk_count,
                        format!("document summary failed: {err}"),
                    )
                }
            }
        }
    }
}
