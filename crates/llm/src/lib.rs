use anyhow::{anyhow, Context, Result};
use reqwest::{header::HeaderValue, Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::env;
use tokio::time::{sleep, timeout, Duration};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OPENAI_URL: &str = "http://localhost:1234/v1";
const MAX_RETRIES: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Ollama,
    OpenAi,
    Local,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Ollama => "ollama",
            LlmProvider::OpenAi => "openai",
            LlmProvider::Local => "local",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "ollama" => Some(LlmProvider::Ollama),
            "openai" | "openai-compatible" => Some(LlmProvider::OpenAi),
            "local" | "offline" => Some(LlmProvider::Local),
            _ => None,
        }
    }
}

/// One prompt for the generation service.
///
/// `timeout` bounds the whole call, including rate-limit retries. `context_window`
/// is forwarded to providers that accept it (Ollama's `num_ctx`).
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub system: Option<String>,
    pub user: String,
    pub timeout: Option<Duration>,
    pub context_window: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl LlmResponse {
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    provider: LlmProvider,
    model: String,
    config: ProviderConfig,
}

#[derive(Clone)]
enum ProviderConfig {
    Ollama(OllamaConfig),
    OpenAi(OpenAiConfig),
    Local,
}

#[derive(Clone)]
struct OllamaConfig {
    base_url: String,
}

#[derive(Clone)]
struct OpenAiConfig {
    api_key: Option<String>,
    base_url: String,
}

impl LlmClient {
    pub fn new(provider: LlmProvider, model: impl Into<String>) -> Result<Self> {
        let model = model.into();
        let http = Client::builder()
            .build()
            .context("failed to create HTTP client")?;
        let config = match provider {
            LlmProvider::Ollama => ProviderConfig::Ollama(OllamaConfig {
                base_url: env::var("OLLAMA_HOST")
                    .map(|host| normalize_host(&host))
                    .unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string()),
            }),
            LlmProvider::OpenAi => ProviderConfig::OpenAi(OpenAiConfig {
                api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
                base_url: env::var("OPENAI_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_OPENAI_URL.to_string()),
            }),
            LlmProvider::Local => ProviderConfig::Local,
        };
        Ok(Self {
            http,
            provider,
            model,
            config,
        })
    }

    /// Points the client at a different service endpoint. Ignored by the offline provider.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        match &mut self.config {
            ProviderConfig::Ollama(cfg) => cfg.base_url = normalize_host(&base_url),
            ProviderConfig::OpenAi(cfg) => cfg.base_url = base_url,
            ProviderConfig::Local => {}
        }
        self
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn chat(&self, req: &LlmRequest) -> Result<LlmResponse> {
        let call = async {
            match &self.config {
                ProviderConfig::Ollama(cfg) => self.chat_ollama(cfg, req).await,
                ProviderConfig::OpenAi(cfg) => self.chat_openai(cfg, req).await,
                ProviderConfig::Local => Ok(self.chat_local(req)),
            }
        };
        match req.timeout {
            Some(limit) => timeout(limit, call)
                .await
                .map_err(|elapsed| {
                    anyhow::Error::new(elapsed)
                        .context(format!("{} request timed out", self.provider.as_str()))
                })?,
            None => call.await,
        }
    }

    /// Runs one request to completion on a private current-thread runtime.
    ///
    /// Safe to call from worker threads that are not inside a tokio runtime.
    pub fn chat_blocking(&self, req: &LlmRequest) -> Result<LlmResponse> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to create tokio runtime")?;
        rt.block_on(self.chat(req))
    }

    async fn chat_ollama(&self, cfg: &OllamaConfig, req: &LlmRequest) -> Result<LlmResponse> {
        let url = format!("{}/api/chat", cfg.base_url.trim_end_matches('/'));
        let mut payload = json!({
            "model": self.model,
            "messages": build_messages(req),
            "stream": false,
        });
        if let Some(num_ctx) = req.context_window {
            payload["options"] = json!({ "num_ctx": num_ctx });
        }
        let response = with_timeout(self.http.post(&url).json(&payload), req)
            .send()
            .await
            .with_context(|| "ollama request failed")?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(anyhow!(format!(
                "ollama returned error (status {}): {}",
                status, body
            )));
        }
        let decoded: OllamaChatResponse =
            serde_json::from_str(&body).context("failed to decode ollama response")?;
        if let Some(err) = decoded.error {
            return Err(anyhow!(format!("ollama reported an error: {err}")));
        }
        let content = decoded
            .message
            .map(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| anyhow!("missing text in Ollama response"))?;
        Ok(LlmResponse {
            content,
            prompt_tokens: decoded.prompt_eval_count.unwrap_or(0),
            completion_tokens: decoded.eval_count.unwrap_or(0),
        })
    }

    async fn chat_openai(&self, cfg: &OpenAiConfig, req: &LlmRequest) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", cfg.base_url.trim_end_matches('/'));
        let payload = json!({
            "model": self.model,
            "messages": build_messages(req),
        });
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            let mut builder = with_timeout(self.http.post(&url).json(&payload), req);
            if let Some(key) = &cfg.api_key {
                builder = builder.bearer_auth(key);
            }
            // Transport failures surface immediately; only rate limiting is retried.
            let response = builder
                .send()
                .await
                .with_context(|| format!("openai request to {url} failed"))?;
            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                if attempt > MAX_RETRIES {
                    return Err(anyhow!("openai rate limited after {MAX_RETRIES} retries"));
                }
                let wait = backoff_delay(attempt, response.headers().get("retry-after"));
                sleep(wait).await;
                continue;
            }
            let value = decode_openai_body(response).await?;
            let content = extract_openai_text(&value)
                .filter(|content| !content.trim().is_empty())
                .ok_or_else(|| anyhow!("missing text in OpenAI response"))?;
            let usage: OpenAiUsage = value
                .get("usage")
                .and_then(|value| serde_json::from_value(value.clone()).ok())
                .unwrap_or_default();
            return Ok(LlmResponse {
                content,
                prompt_tokens: usage.prompt_tokens.unwrap_or(0),
                completion_tokens: usage.completion_tokens.unwrap_or(0),
            });
        }
    }

    fn chat_local(&self, req: &LlmRequest) -> LlmResponse {
        let content = synthesize_local_response(req);
        LlmResponse {
            content,
            prompt_tokens: 0,
            completion_tokens: 0,
        }
    }
}

/// True when any cause in the chain is a transport or deadline timeout.
pub fn is_timeout(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause.is::<tokio::time::error::Elapsed>()
            || cause
                .downcast_ref::<reqwest::Error>()
                .map(|e| e.is_timeout())
                .unwrap_or(false)
    })
}

fn build_messages(req: &LlmRequest) -> Vec<Value> {
    let mut messages = Vec::new();
    if let Some(system) = &req.system {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.push(json!({ "role": "user", "content": req.user }));
    messages
}

fn with_timeout(builder: RequestBuilder, req: &LlmRequest) -> RequestBuilder {
    match req.timeout {
        Some(limit) => builder.timeout(limit),
        None => builder,
    }
}

fn normalize_host(host: &str) -> String {
    let trimmed = host.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

fn backoff_delay(attempt: usize, retry_after: Option<&HeaderValue>) -> Duration {
    if let Some(value) = retry_after {
        if let Ok(text) = value.to_str() {
            if let Ok(secs) = text.parse::<u64>() {
                return Duration::from_secs(secs.max(1));
            }
        }
    }
    let capped = attempt.min(6) as u32;
    Duration::from_secs(1u64 << capped)
}

fn synthesize_local_response(req: &LlmRequest) -> String {
    let system_lower = req
        .system
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    if system_lower.contains("summarization focus") {
        let template = extract_context_block(&req.user, "TEMPLATE:", "END TEMPLATE");
        return local_focus_json(&template);
    }
    let body = extract_context_block(&req.user, "TEXT:", "END TEXT");
    if system_lower.contains("condense") {
        return summarize_text(&body, 80);
    }
    summarize_text(&body, 40)
}

fn local_focus_json(template: &str) -> String {
    let mut emphasis = String::new();
    let mut instructions = Vec::new();
    for line in template.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let bullet = line
            .strip_prefix("- ")
            .or_else(|| line.strip_prefix("* "))
            .or_else(|| {
                let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
                if digits > 0 {
                    line[digits..].strip_prefix(". ")
                } else {
                    None
                }
            });
        match bullet {
            Some(item) => instructions.push(item.trim().to_string()),
            None if emphasis.is_empty() => {
                emphasis = line.trim_start_matches('#').trim().to_string();
            }
            None => {}
        }
    }
    json!({ "emphasis": emphasis, "instructions": instructions }).to_string()
}

async fn decode_openai_body(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(anyhow!(format!(
            "openai returned error (status {}): {}",
            status, body
        )));
    }
    serde_json::from_str(&body).context("failed to decode openai response")
}

fn extract_context_block(text: &str, start_marker: &str, stop_marker: &str) -> String {
    if let Some(start_idx) = text.rfind(start_marker) {
        let after = &text[start_idx + start_marker.len()..];
        if let Some(end_idx) = after.find(stop_marker) {
            let (segment, _) = after.split_at(end_idx);
            return segment.trim().to_string();
        }
        return after.trim().to_string();
    }
    text.trim().to_string()
}

fn summarize_text(text: &str, max_words: usize) -> String {
    if max_words == 0 {
        return String::new();
    }
    let cleaned = text
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<&str>>()
        .join(" ");
    cleaned
        .split_whitespace()
        .take(max_words)
        .collect::<Vec<&str>>()
        .join(" ")
}

fn extract_openai_text(value: &Value) -> Option<String> {
    let choice = value.get("choices")?.as_array()?.first()?;
    if let Some(text) = choice.get("text").and_then(|t| t.as_str()) {
        return Some(text.to_string());
    }
    let content = choice.get("message")?.get("content")?;
    if let Some(text) = content.as_str() {
        return Some(text.to_string());
    }
    content
        .as_array()?
        .iter()
        .find_map(|part| part.get("text").and_then(|t| t.as_str()))
        .map(|text| text.to_string())
}

#[derive(Default, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}
