use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::cache::{CacheTier, FastKey, FocusCache};
use crate::error::{DigestError, Result};
use crate::generation::{GenerationOptions, GenerationRequest, TextGenerator};
use crate::prompts;

const CONTENT_HASH_CHARS: usize = 8;

/// What a summary should emphasise and how it should be structured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusSpec {
    pub emphasis: String,
    pub instructions: Vec<String>,
    pub source_hash: String,
}

impl FocusSpec {
    pub fn neutral(source_hash: impl Into<String>) -> Self {
        Self {
            emphasis: String::new(),
            instructions: Vec::new(),
            source_hash: source_hash.into(),
        }
    }

    pub fn is_neutral(&self) -> bool {
        self.emphasis.is_empty() && self.instructions.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusSource {
    FastCache,
    DurableCache,
    Generated,
    /// Generation failed or its output was unusable; the focus is neutral.
    Degraded,
    EmptyTemplate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusResolution {
    pub spec: FocusSpec,
    pub source: FocusSource,
}

/// First 8 hex characters of the SHA-256 of the template bytes.
pub fn content_hash(template: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(template.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(CONTENT_HASH_CHARS);
    digest
}

pub struct FocusResolver {
    generator: Arc<dyn TextGenerator>,
    cache: Arc<FocusCache>,
    options: GenerationOptions,
}

impl FocusResolver {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        cache: Arc<FocusCache>,
        options: GenerationOptions,
    ) -> Self {
        Self {
            generator,
            cache,
            options,
        }
    }

    pub fn resolve(&self, template: &str, model_id: &str, preset_id: &str) -> FocusSpec {
        self.resolve_detailed(template, model_id, preset_id).spec
    }

    /// Never fails: generation or parse errors degrade to a neutral focus.
    pub fn resolve_detailed(
        &self,
        template: &str,
        model_id: &str,
        preset_id: &str,
    ) -> FocusResolution {
        let hash = content_hash(template);
        if template.trim().is_empty() {
            return FocusResolution {
                spec: FocusSpec::neutral(hash),
                source: FocusSource::EmptyTemplate,
            };
        }
        let fast_key = FastKey::new(model_id, preset_id);
        if let Some((spec, tier)) = self.cache.lookup(&fast_key, &hash) {
            debug!(preset = preset_id, hash = %hash, ?tier, "focus cache hit");
            let source = match tier {
                CacheTier::Fast => FocusSource::FastCache,
                CacheTier::Durable => FocusSource::DurableCache,
            };
            return FocusResolution { spec, source };
        }
        match self.derive(template, &hash) {
            Ok(spec) => {
                info!(
                    preset = preset_id,
                    hash = %hash,
                    emphasis = %spec.emphasis,
                    instructions = spec.instructions.len(),
                    "derived focus from template"
                );
                FocusResolution {
                    spec: self.cache.insert(fast_key, spec),
                    source: FocusSource::Generated,
                }
            }
            Err(err) => {
                warn!(preset = preset_id, hash = %hash, "focus derivation degraded to neutral: {err}");
                FocusResolution {
                    spec: FocusSpec::neutral(hash),
                    source: FocusSource::Degraded,
                }
            }
        }
    }

    fn derive(&self, template: &str, hash: &str) -> Result<FocusSpec> {
        let request = GenerationRequest::new(
            prompts::FOCUS_SYSTEM_PROMPT,
            prompts::focus_prompt(template),
            self.options,
        );
        let raw = self.generator.generate(&request)?;
        let (emphasis, instructions) = parse_focus_output(&raw)?;
        Ok(FocusSpec {
            emphasis,
            instructions,
            source_hash: hash.to_string(),
        })
    }
}

/// Accepts a JSON object (possibly wrapped in prose or code fences) or
/// `Emphasis:` / `Instructions:` labelled lines.
pub fn parse_focus_output(raw: &str) -> Result<(String, Vec<String>)> {
    if let Some(parsed) = parse_focus_json(raw) {
        return Ok(parsed);
    }
    if let Some(parsed) = parse_focus_lines(raw) {
        return Ok(parsed);
    }
    let preview: String = raw.chars().take(80).collect();
    Err(DigestError::MalformedFocusOutput(preview))
}

fn parse_focus_json(raw: &str) -> Option<(String, Vec<String>)> {
    raw.match_indices('{').find_map(|(start, _)| {
        let value = serde_json::Deserializer::from_str(&raw[start..])
            .into_iter::<Value>()
            .next()?
            .ok()?;
        value.is_object().then(|| focus_from_value(&value)).flatten()
    })
}

fn focus_from_value(value: &Value) -> Option<(String, Vec<String>)> {
    let emphasis = ["emphasis", "focus"]
        .iter()
        .find_map(|key| value.get(*key))
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    let instructions = ["instructions", "directives"]
        .iter()
        .find_map(|key| value.get(*key))
        .map(|v| match v {
            Value::Array(items) => items
                .iter()
                .filter_map(|item| item.as_str())
                .map(clean_directive)
                .filter(|s| !s.is_empty())
                .collect(),
            Value::String(text) => text
                .lines()
                .map(clean_directive)
                .filter(|s| !s.is_empty())
                .collect(),
            _ => Vec::new(),
        })
        .unwrap_or_default();
    non_empty(emphasis, instructions)
}

fn parse_focus_lines(raw: &str) -> Option<(String, Vec<String>)> {
    let mut emphasis = String::new();
    let mut instructions = Vec::new();
    let mut in_instructions = false;
    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(value) = labelled(line, &["emphasis", "focus"]) {
            if emphasis.is_empty() {
                emphasis = value.to_string();
            }
            in_instructions = false;
        } else if let Some(inline) = labelled(line, &["instructions", "directives"]) {
            in_instructions = true;
            if !inline.is_empty() {
                instructions.push(clean_directive(inline));
            }
        } else if in_instructions {
            let item = clean_directive(line);
            if !item.is_empty() {
                instructions.push(item);
            }
        }
    }
    non_empty(emphasis, instructions)
}

/// Value after `Label:` when `line` starts with one of `labels` followed by a colon.
fn labelled<'a>(line: &'a str, labels: &[&str]) -> Option<&'a str> {
    labels.iter().find_map(|label| {
        let head = line.get(..label.len())?;
        if !head.eq_ignore_ascii_case(label) {
            return None;
        }
        line[label.len()..]
            .trim_start()
            .strip_prefix(':')
            .map(str::trim)
    })
}

fn non_empty(emphasis: String, instructions: Vec<String>) -> Option<(String, Vec<String>)> {
    if emphasis.is_empty() && instructions.is_empty() {
        None
    } else {
        Some((emphasis, instructions))
    }
}

fn clean_directive(line: &str) -> String {
    let trimmed = line.trim();
    let without_bullet = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
        .unwrap_or(trimmed);
    let digits = without_bullet
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .count();
    let without_number = if digits > 0 {
        without_bullet[digits..]
            .strip_prefix('.')
            .or_else(|| without_bullet[digits..].strip_prefix(')'))
            .unwrap_or(without_bullet)
    } else {
        without_bullet
    };
    without_number.trim().to_string()
}
