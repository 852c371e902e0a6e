use std::sync::Arc;

use crate::error::Result;
use crate::focus::FocusSpec;
use crate::generation::{GenerationOptions, GenerationRequest, TextGenerator};
use crate::model::DocumentSummary;
use crate::prompts;

pub const DEFAULT_META_MIN_WORDS: usize = 350;
pub const DEFAULT_META_MAX_WORDS: usize = 500;

/// Reduces the successful document summaries into one meta-summary.
pub struct MetaSummarizer {
    generator: Arc<dyn TextGenerator>,
    options: GenerationOptions,
    min_words: usize,
    max_words: usize,
}

impl MetaSummarizer {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        options: GenerationOptions,
        min_words: usize,
        max_words: usize,
    ) -> Self {
        Self {
            generator,
            options,
            min_words: min_words.min(max_words),
            max_words,
        }
    }

    /// `documents` must already be in input order. Returns `Ok(None)` when
    /// there is nothing to synthesize.
    pub fn synthesize(
        &self,
        documents: &[&DocumentSummary],
        focus: &FocusSpec,
    ) -> Result<Option<String>> {
        if documents.is_empty() {
            return Ok(None);
        }
        let request = GenerationRequest::new(
            prompts::META_SYSTEM_PROMPT,
            prompts::meta_prompt(
                documents,
                &focus.emphasis,
                &focus.instructions,
                self.min_words,
                self.max_words,
            ),
            self.options,
        );
        self.generator.generate(&request).map(Some)
    }
}

/// Stand-in meta-summary built from the document summaries themselves.
pub fn stitch_summaries(documents: &[&DocumentSummary]) -> String {
    documents
        .iter()
        .map(|doc| format!("{}:\n{}", doc.document_name, doc.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
