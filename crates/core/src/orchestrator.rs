use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::FocusCache;
use crate::chunk::{Chunk, Chunker};
use crate::chunk_summary::ChunkSummarizer;
use crate::config::PipelineConfig;
use crate::document_summary::DocumentSummarizer;
use crate::error::{DigestError, Result};
use crate::focus::FocusResolver;
use crate::generation::{CountingGenerator, TextGenerator};
use crate::meta::{stitch_summaries, MetaSummarizer};
use crate::model::{
    Document, DocumentOutcome, DocumentSummary, ExcludedDocument, MultiDocumentSummaryResult,
    RunStatus,
};
use crate::postprocess::PostProcessor;
use crate::progress::{ProgressEvent, ProgressSink, TracingProgress};
use crate::strategy::ExecutionStrategy;
use crate::template::Template;

const DEFAULT_MODEL_ID: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    ResolvingFocus,
    Chunking,
    MapPhase,
    ReducePhase,
    Done,
    Failed,
}

impl PipelineStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStage::Done | PipelineStage::Failed)
    }

    fn can_advance_to(self, next: PipelineStage) -> bool {
        use PipelineStage::*;
        match (self, next) {
            (Idle, ResolvingFocus)
            | (ResolvingFocus, Chunking)
            | (Chunking, MapPhase)
            | (MapPhase, ReducePhase)
            | (ReducePhase, Done) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// Forward-only walk through the pipeline stages; each stage is entered once.
#[derive(Debug)]
pub(crate) struct StageTracker {
    current: PipelineStage,
    visited: Vec<PipelineStage>,
}

impl StageTracker {
    pub(crate) fn new() -> Self {
        Self {
            current: PipelineStage::Idle,
            visited: vec![PipelineStage::Idle],
        }
    }

    pub(crate) fn advance(&mut self, next: PipelineStage) -> Result<()> {
        if !self.current.can_advance_to(next) {
            return Err(DigestError::Other(format!(
                "illegal stage transition {:?} -> {:?}",
                self.current, next
            )));
        }
        debug!(from = ?self.current, to = ?next, "pipeline stage");
        self.current = next;
        self.visited.push(next);
        Ok(())
    }

    pub(crate) fn current(&self) -> PipelineStage {
        self.current
    }

    pub(crate) fn visited(&self) -> &[PipelineStage] {
        &self.visited
    }
}

/// Drives one multi-document run: focus, chunking, map, reduce.
pub struct Orchestrator {
    generator: Arc<dyn TextGenerator>,
    cache: Arc<FocusCache>,
    config: PipelineConfig,
    model_id: String,
    progress: Arc<dyn ProgressSink>,
    strategy: Box<dyn ExecutionStrategy>,
}

impl Orchestrator {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        cache: Arc<FocusCache>,
        config: PipelineConfig,
    ) -> Self {
        let strategy = config.strategy.build(config.max_workers);
        Self {
            generator,
            cache,
            config,
            model_id: DEFAULT_MODEL_ID.to_string(),
            progress: Arc::new(TracingProgress),
            strategy,
        }
    }

    /// Model identifier used in the fast focus-cache key.
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_strategy(mut self, strategy: Box<dyn ExecutionStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Summarizes `documents` under `template`.
    ///
    /// Per-document failures are reported inside the result. A run in which
    /// every document failed still returns `Ok` with [`RunStatus::Failed`];
    /// call [`MultiDocumentSummaryResult::into_result`] to treat that as an
    /// error. An empty document list is an error.
    pub fn run(
        &self,
        documents: &[Document],
        template: &Template,
    ) -> Result<MultiDocumentSummaryResult> {
        let started = Instant::now();
        let mut stages = StageTracker::new();
        if documents.is_empty() {
            stages.advance(PipelineStage::Failed)?;
            return Err(DigestError::NoDocumentsSupplied);
        }
        let counter = Arc::new(CountingGenerator::new(self.generator.clone()));
        let generator: Arc<dyn TextGenerator> = counter.clone();
        let options = self.config.generation_options();
        info!(
            documents = documents.len(),
            preset = %template.preset_id,
            strategy = self.strategy.name(),
            "starting summarization run"
        );

        stages.advance(PipelineStage::ResolvingFocus)?;
        let resolver = FocusResolver::new(generator.clone(), self.cache.clone(), options);
        let resolution =
            resolver.resolve_detailed(&template.content, &self.model_id, &template.preset_id);
        let focus = resolution.spec;
        self.progress.notify(&ProgressEvent::FocusResolved {
            emphasis: focus.emphasis.clone(),
            instructions: focus.instructions.len(),
            source: resolution.source,
        });

        stages.advance(PipelineStage::Chunking)?;
        let chunker = Chunker::new(self.config.chunk_config());
        let chunked: Vec<Vec<Chunk>> = documents
            .iter()
            .map(|document| {
                let chunks = chunker.chunk_document(document);
                self.progress.notify(&ProgressEvent::DocumentChunked {
                    document_id: document.id.clone(),
                    chunks: chunks.len(),
                });
                chunks
            })
            .collect();

        stages.advance(PipelineStage::MapPhase)?;
        let post = PostProcessor::new(generator.clone(), options)
            .with_tolerance(self.config.length_tolerance);
        let chunk_summarizer = ChunkSummarizer::new(
            generator.clone(),
            options,
            post.clone(),
            self.config.chunk_summary_words,
            self.config.progressive_context_words,
        );
        let document_summarizer = DocumentSummarizer::new(
            generator.clone(),
            options,
            self.config.document_summary_words,
        );
        let progress = self.progress.as_ref();
        let emphasis = focus.emphasis.as_str();
        let work = |position: usize, document: &Document| -> DocumentOutcome {
            let chunks = &chunked[position];
            if chunks.is_empty() {
                warn!(document = %document.id, "document has no text");
                progress.notify(&ProgressEvent::DocumentDone {
                    document_id: document.id.clone(),
                    ok: false,
                });
                return DocumentOutcome {
                    summary: DocumentSummary::failed(document, 0, "document has no text"),
                    chunks: Vec::new(),
                };
            }
            let summaries =
                chunk_summarizer.summarize_document(document, chunks, emphasis, progress);
            let mut summary = document_summarizer.combine(document, &summaries, emphasis);
            if summary.is_ok() {
                summary.text = post.enforce(&summary.text, self.config.document_summary_words);
            }
            progress.notify(&ProgressEvent::DocumentDone {
                document_id: document.id.clone(),
                ok: summary.is_ok(),
            });
            DocumentOutcome {
                summary,
                chunks: summaries,
            }
        };
        let outcomes = self.strategy.run(documents, &work);

        stages.advance(PipelineStage::ReducePhase)?;
        let mut summaries = Vec::with_capacity(outcomes.len());
        let mut chunk_summaries = Vec::new();
        for outcome in outcomes {
            summaries.push(outcome.summary);
            chunk_summaries.extend(outcome.chunks);
        }
        let excluded: Vec<ExcludedDocument> = summaries
            .iter()
            .filter(|summary| !summary.is_ok())
            .map(|summary| ExcludedDocument {
                document_id: summary.document_id.clone(),
                document_name: summary.document_name.clone(),
                reason: summary.status.reason().unwrap_or_default().to_string(),
            })
            .collect();
        let succeeded: Vec<&DocumentSummary> =
            summaries.iter().filter(|summary| summary.is_ok()).collect();

        let mut warnings = Vec::new();
        let (meta_summary, status) = if succeeded.is_empty() {
            stages.advance(PipelineStage::Failed)?;
            let failed = summaries.len();
            warn!(failed, "every document failed; no meta-summary");
            (
                None,
                RunStatus::Failed {
                    reason: DigestError::AllDocumentsFailed { failed }.to_string(),
                },
            )
        } else {
            let meta = MetaSummarizer::new(
                generator.clone(),
                options,
                self.config.meta_min_words,
                self.config.meta_max_words,
            );
            let text = match meta.synthesize(&succeeded, &focus) {
                Ok(Some(text)) => post.enforce(&text, self.config.meta_max_words),
                Ok(None) => stitch_summaries(&succeeded),
                Err(err) => {
                    warn!("meta-summary failed, stitching document summaries: {err}");
                    warnings.push(format!(
                        "meta-summary generation failed ({err}); document summaries were stitched together instead"
                    ));
                    stitch_summaries(&succeeded)
                }
            };
            self.progress.notify(&ProgressEvent::MetaSummaryDone {
                documents: succeeded.len(),
            });
            stages.advance(PipelineStage::Done)?;
            let status = if excluded.is_empty() {
                RunStatus::Succeeded
            } else {
                RunStatus::Partial {
                    excluded: excluded.len(),
                }
            };
            (Some(text), status)
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            stage = ?stages.current(),
            stages = ?stages.visited(),
            succeeded = summaries.len() - excluded.len(),
            excluded = excluded.len(),
            generation_calls = counter.calls(),
            elapsed_ms,
            "summarization run finished"
        );
        Ok(MultiDocumentSummaryResult {
            focus,
            documents: summaries,
            chunk_summaries,
            meta_summary,
            status,
            excluded,
            warnings,
            generation_calls: counter.calls(),
            elapsed_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GenerationRequest;
    use crate::prompts;
    use crate::strategy::Sequential;
    use parking_lot::Mutex;

    fn words(prefix: &str, count: usize) -> String {
        (0..count)
            .map(|i| format!("{prefix}{i}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            chunk_words: 10,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn stage_tracker_walks_forward_only() {
        let mut stages = StageTracker::new();
        for stage in [
            PipelineStage::ResolvingFocus,
            PipelineStage::Chunking,
            PipelineStage::MapPhase,
            PipelineStage::ReducePhase,
            PipelineStage::Done,
        ] {
            stages.advance(stage).unwrap();
        }
        assert_eq!(stages.visited().len(), 6);
        assert!(stages.advance(PipelineStage::Failed).is_err());

        let mut stages = StageTracker::new();
        assert!(stages.advance(PipelineStage::MapPhase).is_err());
        stages.advance(PipelineStage::ResolvingFocus).unwrap();
        assert!(stages.advance(PipelineStage::ResolvingFocus).is_err());
        stages.advance(PipelineStage::Failed).unwrap();
        assert_eq!(stages.current(), PipelineStage::Failed);
    }

    #[test]
    fn empty_input_is_rejected() {
        let generator = |_: &GenerationRequest| -> Result<String> { Ok("x".into()) };
        let orchestrator = Orchestrator::new(
            Arc::new(generator),
            Arc::new(FocusCache::default()),
            config(),
        );
        let err = orchestrator
            .run(&[], &Template::new("general", "Dates."))
            .unwrap_err();
        assert!(matches!(err, DigestError::NoDocumentsSupplied));
    }

    #[test]
    fn blank_document_is_excluded_with_reason() {
        let generator = |req: &GenerationRequest| -> Result<String> {
            if req.system.as_deref() == Some(prompts::FOCUS_SYSTEM_PROMPT) {
                return Ok(r#"{"emphasis":"dates","instructions":[]}"#.into());
            }
            Ok("summary".into())
        };
        let orchestrator = Orchestrator::new(
            Arc::new(generator),
            Arc::new(FocusCache::default()),
            config(),
        )
        .with_strategy(Box::new(Sequential));
        let documents = vec![
            Document::new("doc-001", "a.txt", words("a", 5)),
            Document::new("doc-002", "b.txt", "   "),
        ];
        let result = orchestrator
            .run(&documents, &Template::new("general", "Dates."))
            .unwrap();
        assert_eq!(result.status, RunStatus::Partial { excluded: 1 });
        assert_eq!(result.excluded[0].document_id, "doc-002");
        assert_eq!(result.excluded[0].reason, "document has no text");
        assert!(result.meta_summary.is_some());
    }

    #[test]
    fn meta_failure_falls_back_to_stitched_summaries() {
        let generator = |req: &GenerationRequest| -> Result<String> {
            match req.system.as_deref() {
                Some(prompts::META_SYSTEM_PROMPT) => {
                    Err(DigestError::GenerationService("model unloaded".into()))
                }
                Some(prompts::FOCUS_SYSTEM_PROMPT) => Ok("not json at all".into()),
                _ => Ok("short summary".into()),
            }
        };
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let orchestrator = Orchestrator::new(
            Arc::new(generator),
            Arc::new(FocusCache::default()),
            config(),
        )
        .with_progress(Arc::new(move |event: &ProgressEvent| {
            sink.lock().push(event.clone())
        }));
        let documents = vec![Document::new("doc-001", "a.txt", words("a", 15))];
        let result = orchestrator
            .run(&documents, &Template::new("general", "Dates."))
            .unwrap();
        assert_eq!(result.status, RunStatus::Succeeded);
        assert!(result.focus.is_neutral());
        assert_eq!(result.meta_summary.as_deref(), Some("a.txt:\nshort summary"));
        assert_eq!(result.warnings.len(), 1);
        let events = events.lock();
        assert!(matches!(events.first(), Some(ProgressEvent::FocusResolved { .. })));
        assert!(matches!(
            events.last(),
            Some(ProgressEvent::MetaSummaryDone { documents: 1 })
        ));
    }
}
