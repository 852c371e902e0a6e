use std::sync::Arc;

use tracing::warn;

use crate::chunk::Chunk;
use crate::error::Result;
use crate::generation::{GenerationOptions, GenerationRequest, TextGenerator};
use crate::model::{ChunkSummary, Document, SummaryStatus};
use crate::postprocess::PostProcessor;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::progressive::ProgressiveContext;
use crate::prompts;

pub const DEFAULT_CHUNK_SUMMARY_WORDS: usize = 75;

/// Summarizes the chunks of one document in index order.
///
/// Each call sees the summary of the chunk before it and the bounded
/// progressive context of everything summarized so far in that document.
pub struct ChunkSummarizer {
    generator: Arc<dyn TextGenerator>,
    options: GenerationOptions,
    post: PostProcessor,
    target_words: usize,
    context_budget: usize,
}

impl ChunkSummarizer {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        options: GenerationOptions,
        post: PostProcessor,
        target_words: usize,
        context_budget: usize,
    ) -> Self {
        Self {
            generator,
            options,
            post,
            target_words,
            context_budget,
        }
    }

    /// One generation call for one chunk, followed by length enforcement.
    pub fn summarize(
        &self,
        chunk: &Chunk,
        previous_summary: &str,
        progressive_context: &str,
        emphasis: &str,
    ) -> Result<String> {
        let request = GenerationRequest::new(
            prompts::CHUNK_SYSTEM_PROMPT,
            prompts::chunk_prompt(
                emphasis,
                progressive_context,
                previous_summary,
                &chunk.text,
                self.target_words,
            ),
            self.options,
        );
        let text = self.generator.generate(&request)?;
        Ok(self.post.enforce(&text, self.target_words))
    }

    /// Summarizes every chunk of `document`; a failed chunk becomes a failed
    /// placeholder and the next chunk proceeds with the last good summary.
    pub fn summarize_document(
        &self,
        document: &Document,
        chunks: &[Chunk],
        emphasis: &str,
        progress: &dyn ProgressSink,
    ) -> Vec<ChunkSummary> {
        let mut context = ProgressiveContext::new(self.context_budget);
        let mut previous = String::new();
        let mut summaries = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let rendered = context.render();
            let (text, status) = match self.summarize(chunk, &previous, &rendered, emphasis) {
                Ok(text) => {
                    context.push(chunk.index, &text);
                    (text, SummaryStatus::Ok)
                }
                Err(err) => {
                    warn!(
                        document = %document.id,
                        chunk = chunk.index,
                        "chunk summary failed: {err}"
                    );
                    (
                        format!("[section {} could not be summarized]", chunk.index + 1),
                        SummaryStatus::Failed {
                            reason: err.to_string(),
                        },
                    )
                }
            };
            let given_previous = if status.is_ok() {
                std::mem::replace(&mut previous, text.clone())
            } else {
                previous.clone()
            };
            progress.notify(&ProgressEvent::ChunkDone {
                document_id: document.id.clone(),
                index: chunk.index,
                total: chunks.len(),
                ok: status.is_ok(),
            });
            summaries.push(ChunkSummary {
                document_id: document.id.clone(),
                index: chunk.index,
                text,
                previous_summary: given_previous,
                progressive_context: rendered,
                status,
            });
        }
        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{ChunkConfig, Chunker};
    use crate::error::DigestError;
    use crate::progress::SilentProgress;

    fn summarizer(generator: Arc<dyn TextGenerator>) -> ChunkSummarizer {
        let post = PostProcessor::new(generator.clone(), GenerationOptions::default());
        ChunkSummarizer::new(generator, GenerationOptions::default(), post, 75, 600)
    }

    fn document(words: usize) -> (Document, Vec<Chunk>) {
        let text = (0..words).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let document = Document::new("doc-1", "report.txt", text);
        let chunks = Chunker::new(ChunkConfig::with_target(10)).chunk_document(&document);
        (document, chunks)
    }

    fn first_word_of_chunk(prompt: &str) -> String {
        let start = prompt.rfind("TEXT:\n").unwrap() + "TEXT:\n".len();
        prompt[start..].split_whitespace().next().unwrap().to_string()
    }

    #[test]
    fn each_chunk_sees_its_predecessor_summary() {
        let generator: Arc<dyn TextGenerator> = Arc::new(|req: &GenerationRequest| -> Result<String> {
            Ok(format!("summary of {}", first_word_of_chunk(&req.prompt)))
        });
        let (document, chunks) = document(30);
        let out = summarizer(generator).summarize_document(&document, &chunks, "dates", &SilentProgress);
        assert_eq!(out.len(), 3);
        assert_eq!(out.iter().map(|s| s.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(out[0].previous_summary, "");
        assert_eq!(out[1].previous_summary, "summary of w0");
        assert_eq!(out[2].previous_summary, "summary of w10");
        assert!(out[2].progressive_context.contains("[Section 1] summary of w0"));
        assert!(out[2].progressive_context.contains("[Section 2] summary of w10"));
    }

    #[test]
    fn failed_chunk_is_a_placeholder_and_processing_continues() {
        let generator: Arc<dyn TextGenerator> = Arc::new(|req: &GenerationRequest| -> Result<String> {
            let first = first_word_of_chunk(&req.prompt);
            if first == "w10" {
                return Err(DigestError::GenerationService("overloaded".into()));
            }
            Ok(format!("summary of {first}"))
        });
        let (document, chunks) = document(30);
        let out = summarizer(generator).summarize_document(&document, &chunks, "", &SilentProgress);
        assert!(out[0].status.is_ok());
        assert!(!out[1].status.is_ok());
        assert_eq!(out[1].text, "[section 2 could not be summarized]");
        assert!(out[2].status.is_ok());
        assert_eq!(out[2].previous_summary, "summary of w0");
        assert!(!out[2].progressive_context.contains("could not"));
    }

    #[test]
    fn emphasis_reaches_every_prompt() {
        let generator: Arc<dyn TextGenerator> = Arc::new(|req: &GenerationRequest| -> Result<String> {
            assert!(req.prompt.starts_with("Focus: dates and injuries\n"));
            Ok("ok".into())
        });
        let (document, chunks) = document(25);
        let out = summarizer(generator).summarize_document(
            &document,
            &chunks,
            "dates and injuries",
            &SilentProgress,
        );
        assert!(out.iter().all(|s| s.status.is_ok()));
    }
}
