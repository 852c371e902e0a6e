mod cache;
mod chunk;
mod chunk_summary;
mod config;
mod document_summary;
mod error;
mod focus;
mod generation;
mod meta;
mod model;
mod orchestrator;
mod postprocess;
mod progress;
mod progressive;
pub mod prompts;
mod strategy;
mod template;

pub use cache::{CacheEntry, CachePolicy, CacheStats, CacheTier, FastKey, FocusCache};
pub use chunk::{Chunk, ChunkConfig, Chunker, DEFAULT_CHUNK_WORDS};
pub use chunk_summary::{ChunkSummarizer, DEFAULT_CHUNK_SUMMARY_WORDS};
pub use config::PipelineConfig;
pub use document_summary::{DocumentSummarizer, DEFAULT_DOCUMENT_SUMMARY_WORDS};
pub use error::{DigestError, Result};
pub use focus::{
    content_hash, parse_focus_output, FocusResolution, FocusResolver, FocusSource, FocusSpec,
};
pub use generation::{
    GenerationOptions, GenerationRequest, LlmGenerator, TextGenerator, DEFAULT_CONTEXT_WINDOW,
    DEFAULT_TIMEOUT_SECS,
};
pub use meta::{stitch_summaries, MetaSummarizer, DEFAULT_META_MAX_WORDS, DEFAULT_META_MIN_WORDS};
pub use model::{
    ChunkSummary, Document, DocumentOutcome, DocumentSummary, ExcludedDocument,
    MultiDocumentSummaryResult, RunStatus, SummaryStatus,
};
pub use orchestrator::{Orchestrator, PipelineStage};
pub use postprocess::{PostProcessor, DEFAULT_LENGTH_TOLERANCE};
pub use progress::{ProgressEvent, ProgressSink, SilentProgress, TracingProgress};
pub use progressive::{ProgressiveContext, DEFAULT_PROGRESSIVE_WORDS};
pub use strategy::{
    Concurrent, DocumentWork, ExecutionStrategy, Sequential, StrategyKind, DEFAULT_MAX_WORKERS,
};
pub use template::{Template, TemplateLibrary, TemplateOrigin, DEFAULT_PRESET};
