use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use focusdigest_core::{PipelineConfig, StrategyKind};
use focusdigest_llm::LlmProvider;
use serde::Deserialize;

use crate::cli::{LlmArgs, TemplateArgs};

pub const DEFAULT_CONFIG: &str = "focusdigest.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub pipeline: PipelineConfig,
    pub paths: PathsSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub provider: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Ollama.as_str().to_string(),
            model: None,
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub template_dir: Option<PathBuf>,
    pub cache_file: Option<PathBuf>,
    pub preset: Option<String>,
}

impl AppConfig {
    pub fn provider(&self) -> Result<LlmProvider> {
        LlmProvider::from_str(&self.llm.provider).ok_or_else(|| {
            anyhow!(
                "unknown provider '{}'. choose ollama|openai|local",
                self.llm.provider
            )
        })
    }

    pub fn model(&self) -> Result<String> {
        let provider = self.provider()?;
        Ok(self
            .llm
            .model
            .clone()
            .unwrap_or_else(|| default_model(provider).to_string()))
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| env::var(key).ok())
    }

    pub(crate) fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(provider) = get("FOCUSDIGEST_PROVIDER") {
            self.llm.provider = provider;
        }
        if let Some(model) = get("FOCUSDIGEST_MODEL") {
            self.llm.model = Some(model);
        }
        if let Some(base_url) = get("FOCUSDIGEST_BASE_URL") {
            self.llm.base_url = Some(base_url);
        }
        if let Some(workers) = get("FOCUSDIGEST_WORKERS") {
            self.pipeline.max_workers = workers
                .trim()
                .parse()
                .map_err(|_| anyhow!("FOCUSDIGEST_WORKERS must be a number, got '{workers}'"))?;
        }
        if let Some(strategy) = get("FOCUSDIGEST_STRATEGY") {
            self.pipeline.strategy = parse_strategy(&strategy)?;
        }
        if let Some(timeout) = get("FOCUSDIGEST_TIMEOUT_SECS") {
            self.pipeline.timeout_secs = timeout
                .trim()
                .parse()
                .map_err(|_| anyhow!("FOCUSDIGEST_TIMEOUT_SECS must be a number, got '{timeout}'"))?;
        }
        Ok(())
    }

    pub fn apply_llm_args(&mut self, args: &LlmArgs) {
        if let Some(provider) = &args.provider {
            self.llm.provider = provider.clone();
        }
        if let Some(model) = &args.model {
            self.llm.model = Some(model.clone());
        }
        if let Some(base_url) = &args.base_url {
            self.llm.base_url = Some(base_url.clone());
        }
    }

    pub fn apply_template_args(&mut self, args: &TemplateArgs) {
        if let Some(preset) = &args.preset {
            self.paths.preset = Some(preset.clone());
        }
        if let Some(dir) = &args.template_dir {
            self.paths.template_dir = Some(dir.clone());
        }
    }
}

/// A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&contents).map_err(|e| anyhow!("invalid config {}: {e}", path.display()))
}

pub fn parse_strategy(value: &str) -> Result<StrategyKind> {
    StrategyKind::from_str(value).ok_or_else(|| {
        anyhow!(
            "unknown strategy '{}'. choose sequential|concurrent",
            value
        )
    })
}

fn default_model(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::Ollama => "llama3.1:8b",
        LlmProvider::OpenAi => "local-model",
        LlmProvider::Local => "local",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(&dir.path().join(DEFAULT_CONFIG)).unwrap();
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.model().unwrap(), "llama3.1:8b");
        assert_eq!(config.pipeline, PipelineConfig::default());
    }

    #[test]
    fn file_sections_are_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG);
        fs::write(
            &path,
            r#"
[llm]
provider = "openai"
model = "qwen2.5-14b"
base_url = "http://127.0.0.1:1234/v1"

[pipeline]
strategy = "sequential"
chunk_words = 800
cache_capacity = 64

[paths]
preset = "deposition"
"#,
        )
        .unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.provider().unwrap(), LlmProvider::OpenAi);
        assert_eq!(config.model().unwrap(), "qwen2.5-14b");
        assert_eq!(config.pipeline.strategy, StrategyKind::Sequential);
        assert_eq!(config.pipeline.chunk_words, 800);
        assert_eq!(config.pipeline.cache_capacity, Some(64));
        assert_eq!(config.pipeline.max_workers, 4);
        assert_eq!(config.paths.preset.as_deref(), Some("deposition"));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG);
        fs::write(&path, "[pipeline\nchunk_words = 1").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn env_then_flags_override_file_values() {
        let vars: HashMap<&str, &str> = [
            ("FOCUSDIGEST_PROVIDER", "local"),
            ("FOCUSDIGEST_WORKERS", "8"),
            ("FOCUSDIGEST_STRATEGY", "sequential"),
            ("FOCUSDIGEST_TIMEOUT_SECS", "30"),
            ("FOCUSDIGEST_MODEL", ""),
        ]
        .into_iter()
        .collect();
        let mut config = AppConfig::default();
        config
            .apply_env_from(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.provider().unwrap(), LlmProvider::Local);
        assert_eq!(config.pipeline.max_workers, 8);
        assert_eq!(config.pipeline.strategy, StrategyKind::Sequential);
        assert_eq!(config.pipeline.timeout_secs, 30);
        assert_eq!(config.llm.model, None);

        config.apply_llm_args(&LlmArgs {
            provider: Some("ollama".into()),
            model: Some("mistral".into()),
            base_url: None,
        });
        assert_eq!(config.provider().unwrap(), LlmProvider::Ollama);
        assert_eq!(config.model().unwrap(), "mistral");
    }

    #[test]
    fn bad_env_values_are_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env_from(|key| (key == "FOCUSDIGEST_STRATEGY").then(|| "random".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("unknown strategy"));
        let err = config
            .apply_env_from(|key| (key == "FOCUSDIGEST_WORKERS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("FOCUSDIGEST_WORKERS"));
    }
}
