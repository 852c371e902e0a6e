use serde::Serialize;
use tracing::{debug, info};

use crate::focus::FocusSource;

/// Advisory notifications about pipeline progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    FocusResolved {
        emphasis: String,
        instructions: usize,
        source: FocusSource,
    },
    DocumentChunked {
        document_id: String,
        chunks: usize,
    },
    ChunkDone {
        document_id: String,
        index: usize,
        total: usize,
        ok: bool,
    },
    DocumentDone {
        document_id: String,
        ok: bool,
    },
    MetaSummaryDone {
        documents: usize,
    },
}

/// Receives progress events, possibly from several worker threads at once.
pub trait ProgressSink: Send + Sync {
    fn notify(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn notify(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Logs every event through `tracing`.
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn notify(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::FocusResolved {
                emphasis,
                instructions,
                source,
            } => info!(%emphasis, instructions, ?source, "focus resolved"),
            ProgressEvent::DocumentChunked {
                document_id,
                chunks,
            } => info!(document = %document_id, chunks, "document chunked"),
            ProgressEvent::ChunkDone {
                document_id,
                index,
                total,
                ok,
            } => debug!(
                document = %document_id,
                "chunk {}/{} {}",
                index + 1,
                total,
                if *ok { "done" } else { "failed" }
            ),
            ProgressEvent::DocumentDone { document_id, ok } => {
                info!(document = %document_id, ok, "document summarized")
            }
            ProgressEvent::MetaSummaryDone { documents } => {
                info!(documents, "meta-summary done")
            }
        }
    }
}

/// Discards every event.
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn notify(&self, _event: &ProgressEvent) {}
}
