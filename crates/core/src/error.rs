use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DigestError {
    #[error("generation timed out after {timeout:?}")]
    GenerationTimeout { timeout: Duration },
    #[error("generation service error: {0}")]
    GenerationService(String),
    #[error("malformed focus output: {0}")]
    MalformedFocusOutput(String),
    #[error("no documents supplied")]
    NoDocumentsSupplied,
    #[error("all {failed} document(s) failed")]
    AllDocumentsFailed { failed: usize },
    #[error("unknown preset: {0}")]
    UnknownPreset(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("other: {0}")]
    Other(String),
}

impl DigestError {
    /// Failures of a single generation call, recoverable at the unit that issued it.
    pub fn is_generation_failure(&self) -> bool {
        matches!(
            self,
            DigestError::GenerationTimeout { .. } | DigestError::GenerationService(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DigestError>;

impl From<anyhow::Error> for DigestError {
    fn from(value: anyhow::Error) -> Self {
        Self::Other(value.to_string())
    }
}
