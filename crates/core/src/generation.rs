use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use focusdigest_llm::{is_timeout, LlmClient, LlmRequest};
use serde::{Deserialize, Serialize};

use crate::error::{DigestError, Result};

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_CONTEXT_WINDOW: u32 = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub timeout: Duration,
    pub context_window: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub options: GenerationOptions,
}

impl GenerationRequest {
    pub fn new(system: &str, prompt: String, options: GenerationOptions) -> Self {
        Self {
            system: Some(system.to_string()),
            prompt,
            options,
        }
    }
}

/// Prompt in, text out. Each call is blocking and may time out.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

impl<F> TextGenerator for F
where
    F: Fn(&GenerationRequest) -> Result<String> + Send + Sync,
{
    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self(request)
    }
}

/// Adapts the HTTP client to the generator contract.
pub struct LlmGenerator {
    client: LlmClient,
}

impl LlmGenerator {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }
}

impl TextGenerator for LlmGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let req = LlmRequest {
            system: request.system.clone(),
            user: request.prompt.clone(),
            timeout: Some(request.options.timeout),
            context_window: Some(request.options.context_window),
        };
        match self.client.chat_blocking(&req) {
            Ok(response) => {
                let content = response.content.trim();
                if content.is_empty() {
                    return Err(DigestError::GenerationService(
                        "service returned an empty response".to_string(),
                    ));
                }
                tracing::debug!(
                    prompt_tokens = response.prompt_tokens,
                    completion_tokens = response.completion_tokens,
                    "generation call completed"
                );
                Ok(content.to_string())
            }
            Err(err) if is_timeout(&err) => Err(DigestError::GenerationTimeout {
                timeout: request.options.timeout,
            }),
            Err(err) => Err(DigestError::GenerationService(format!("{err:#}"))),
        }
    }
}

/// Counts calls passing through to the wrapped generator.
pub(crate) struct CountingGenerator {
    inner: Arc<dyn TextGenerator>,
    calls: AtomicUsize,
}

impl CountingGenerator {
    pub(crate) fn new(inner: Arc<dyn TextGenerator>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl TextGenerator for CountingGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.generate(request)
    }
}
