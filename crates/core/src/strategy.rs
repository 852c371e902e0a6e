use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::{Document, DocumentOutcome, DocumentSummary};

pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Per-document unit of work: input position and the document itself.
pub type DocumentWork<'a> = dyn Fn(usize, &Document) -> DocumentOutcome + Sync + 'a;

/// Schedules the map phase. Output is always aligned with input order.
pub trait ExecutionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(&self, documents: &[Document], work: &DocumentWork<'_>) -> Vec<DocumentOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Sequential,
    #[default]
    Concurrent,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Sequential => "sequential",
            StrategyKind::Concurrent => "concurrent",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "sequential" | "serial" => Some(StrategyKind::Sequential),
            "concurrent" | "parallel" => Some(StrategyKind::Concurrent),
            _ => None,
        }
    }

    pub fn build(self, max_workers: usize) -> Box<dyn ExecutionStrategy> {
        match self {
            StrategyKind::Sequential => Box::new(Sequential),
            StrategyKind::Concurrent => Box::new(Concurrent::new(max_workers)),
        }
    }
}

/// One document at a time, in input order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

impl ExecutionStrategy for Sequential {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn run(&self, documents: &[Document], work: &DocumentWork<'_>) -> Vec<DocumentOutcome> {
        documents
            .iter()
            .enumerate()
            .map(|(position, document)| run_isolated(position, document, work))
            .collect()
    }
}

/// Bounded worker pool; results are re-sorted into input order.
#[derive(Debug, Clone, Copy)]
pub struct Concurrent {
    workers: usize,
}

impl Concurrent {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Default for Concurrent {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORKERS)
    }
}

impl ExecutionStrategy for Concurrent {
    fn name(&self) -> &'static str {
        "concurrent"
    }

    fn run(&self, documents: &[Document], work: &DocumentWork<'_>) -> Vec<DocumentOutcome> {
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers.min(documents.len().max(1)))
            .thread_name(|i| format!("focusdigest-worker-{i}"))
            .build()
        {
            Ok(pool) => pool,
            Err(err) => {
                warn!("worker pool unavailable, running sequentially: {err}");
                return Sequential.run(documents, work);
            }
        };
        let (tx, rx) = mpsc::channel();
        pool.scope(|scope| {
            for (position, document) in documents.iter().enumerate() {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let outcome = run_isolated(position, document, work);
                    let _ = tx.send((position, outcome));
                });
            }
        });
        drop(tx);
        let mut finished: Vec<(usize, DocumentOutcome)> = rx.into_iter().collect();
        debug!(
            completion_order = ?finished.iter().map(|(position, _)| *position).collect::<Vec<_>>(),
            "map phase finished"
        );
        finished.sort_by_key(|(position, _)| *position);
        finished.into_iter().map(|(_, outcome)| outcome).collect()
    }
}

/// A panicking unit becomes a failed outcome instead of tearing down its siblings.
fn run_isolated(position: usize, document: &Document, work: &DocumentWork<'_>) -> DocumentOutcome {
    match panic::catch_unwind(AssertUnwindSafe(|| work(position, document))) {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!(document = %document.id, "document worker panicked");
            DocumentOutcome {
                summary: DocumentSummary::failed(document, 0, "document worker panicked"),
                chunks: Vec::new(),
            }
        }
    }
}
