use serde::{Deserialize, Serialize};

use crate::error::{DigestError, Result};
use crate::focus::FocusSpec;

/// One cleaned input document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SummaryStatus {
    Ok,
    Failed { reason: String },
}

impl SummaryStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, SummaryStatus::Ok)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            SummaryStatus::Ok => None,
            SummaryStatus::Failed { reason } => Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSummary {
    pub document_id: String,
    pub index: usize,
    pub text: String,
    /// Summary of the chunk that came before, as handed to the generator.
    pub previous_summary: String,
    /// Rendered progressive context handed to the generator.
    pub progressive_context: String,
    pub status: SummaryStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub document_id: String,
    pub document_name: String,
    pub text: String,
    pub chunk_count: usize,
    pub failed_chunks: usize,
    pub status: SummaryStatus,
}

impl DocumentSummary {
    pub fn failed(document: &Document, chunk_count: usize, reason: impl Into<String>) -> Self {
        Self {
            document_id: document.id.clone(),
            document_name: document.name.clone(),
            text: String::new(),
            chunk_count,
            failed_chunks: chunk_count,
            status: SummaryStatus::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}

/// Output of the per-document unit of work in the map phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentOutcome {
    pub summary: DocumentSummary,
    pub chunks: Vec<ChunkSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedDocument {
    pub document_id: String,
    pub document_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Partial { excluded: usize },
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiDocumentSummaryResult {
    pub focus: FocusSpec,
    /// One entry per input document, in input order.
    pub documents: Vec<DocumentSummary>,
    /// Chunk summaries grouped by document in input order, then by index.
    pub chunk_summaries: Vec<ChunkSummary>,
    pub meta_summary: Option<String>,
    pub status: RunStatus,
    pub excluded: Vec<ExcludedDocument>,
    /// Degradations that did not fail the run, e.g. a stitched meta-summary.
    #[serde(default)]
    pub warnings: Vec<String>,
    pub generation_calls: usize,
    pub elapsed_ms: u64,
}

impl MultiDocumentSummaryResult {
    pub fn succeeded_documents(&self) -> impl Iterator<Item = &DocumentSummary> {
        self.documents.iter().filter(|doc| doc.is_ok())
    }

    pub fn chunks_for<'a>(&'a self, document_id: &'a str) -> impl Iterator<Item = &'a ChunkSummary> {
        self.chunk_summaries
            .iter()
            .filter(move |chunk| chunk.document_id == document_id)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, RunStatus::Failed { .. })
    }

    /// Turns a run in which every document failed into an error.
    pub fn into_result(self) -> Result<Self> {
        if self.is_failed() {
            return Err(DigestError::AllDocumentsFailed {
                failed: self.excluded.len(),
            });
        }
        Ok(self)
    }
}
