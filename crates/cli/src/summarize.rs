use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use focusdigest_core::{
    Document, FocusCache, FocusResolver, LlmGenerator, Orchestrator, Template, TemplateLibrary,
    TextGenerator, DEFAULT_PRESET,
};
use focusdigest_llm::LlmClient;
use serde_json::json;
use tracing::{info, warn};

use crate::cli::{LlmArgs, SummarizeArgs, TemplateArgs};
use crate::config::{parse_strategy, AppConfig};
use crate::report;

pub fn run(mut config: AppConfig, args: SummarizeArgs) -> Result<()> {
    config.apply_llm_args(&args.llm);
    config.apply_template_args(&args.template);
    if let Some(strategy) = &args.strategy {
        config.pipeline.strategy = parse_strategy(strategy)?;
    }
    if let Some(workers) = args.workers {
        config.pipeline.max_workers = workers;
    }
    if let Some(chunk_words) = args.chunk_words {
        config.pipeline.chunk_words = chunk_words;
    }
    if let Some(cache_file) = &args.cache_file {
        config.paths.cache_file = Some(cache_file.clone());
    }
    let format = report::parse_format(&args.format)?;

    let template = select_template(&config)?;
    let documents = load_documents(&args.files)?;
    let (generator, model) = build_generator(&config)?;
    let cache = open_cache(&config)?;

    let orchestrator = Orchestrator::new(generator, cache.clone(), config.pipeline.clone())
        .with_model_id(model);
    let result = orchestrator.run(&documents, &template)?;
    cache.flush()?;

    let rendered = report::render(&result, format)?;
    match &args.out {
        Some(path) => {
            fs::write(path, &rendered)
                .with_context(|| format!("failed to write report {}", path.display()))?;
            info!(path = %path.display(), "wrote report");
        }
        None => print!("{rendered}"),
    }
    result.into_result()?;
    Ok(())
}

pub fn run_focus(
    mut config: AppConfig,
    template_args: TemplateArgs,
    llm_args: LlmArgs,
    cache_file: Option<PathBuf>,
) -> Result<()> {
    config.apply_llm_args(&llm_args);
    config.apply_template_args(&template_args);
    if cache_file.is_some() {
        config.paths.cache_file = cache_file;
    }
    let template = select_template(&config)?;
    let (generator, model) = build_generator(&config)?;
    let cache = open_cache(&config)?;
    let resolver = FocusResolver::new(
        generator,
        cache.clone(),
        config.pipeline.generation_options(),
    );
    let resolution = resolver.resolve_detailed(&template.content, &model, &template.preset_id);
    cache.flush()?;
    let value = json!({
        "preset": template.preset_id,
        "content_hash": resolution.spec.source_hash,
        "source": resolution.source,
        "emphasis": resolution.spec.emphasis,
        "instructions": resolution.spec.instructions,
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

pub(crate) fn library(config: &AppConfig) -> Result<TemplateLibrary> {
    match &config.paths.template_dir {
        Some(dir) => TemplateLibrary::with_user_dir(dir)
            .with_context(|| format!("failed to load templates from {}", dir.display())),
        None => Ok(TemplateLibrary::builtin()),
    }
}

fn select_template(config: &AppConfig) -> Result<Template> {
    let preset = config.paths.preset.as_deref().unwrap_or(DEFAULT_PRESET);
    Ok(library(config)?.get(preset)?.clone())
}

fn build_generator(config: &AppConfig) -> Result<(Arc<dyn TextGenerator>, String)> {
    let provider = config.provider()?;
    let model = config.model()?;
    let mut client = LlmClient::new(provider, model.clone())?;
    if let Some(base_url) = &config.llm.base_url {
        client = client.with_base_url(base_url.clone());
    }
    info!(provider = provider.as_str(), model = %model, "generation service");
    Ok((Arc::new(LlmGenerator::new(client)), model))
}

fn open_cache(config: &AppConfig) -> Result<Arc<FocusCache>> {
    let policy = config.pipeline.cache_policy();
    let cache = match &config.paths.cache_file {
        Some(path) => FocusCache::load(path, policy)
            .with_context(|| format!("failed to open focus cache {}", path.display()))?,
        None => FocusCache::new(policy),
    };
    Ok(Arc::new(cache))
}

/// One document per file, in argument order. Blank files are skipped.
pub(crate) fn load_documents(files: &[PathBuf]) -> Result<Vec<Document>> {
    let mut documents = Vec::with_capacity(files.len());
    for (position, path) in files.iter().enumerate() {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if text.trim().is_empty() {
            warn!(path = %path.display(), "skipping empty file");
            continue;
        }
        documents.push(Document::new(
            format!("doc-{:03}", position + 1),
            display_name(path),
            text,
        ));
    }
    Ok(documents)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
