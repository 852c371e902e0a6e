use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use focusdigest_core::{Chunk, Chunker, TemplateLibrary, TemplateOrigin};

use crate::config::AppConfig;
use crate::summarize::library;

const PREVIEW_WORDS: usize = 12;

pub fn run_presets(mut config: AppConfig, template_dir: Option<PathBuf>) -> Result<()> {
    if template_dir.is_some() {
        config.paths.template_dir = template_dir;
    }
    print!("{}", render_presets(&library(&config)?));
    Ok(())
}

pub fn run_chunk(
    mut config: AppConfig,
    file: PathBuf,
    chunk_words: Option<usize>,
    overlap: Option<usize>,
) -> Result<()> {
    if let Some(words) = chunk_words {
        config.pipeline.chunk_words = words;
    }
    if let Some(overlap) = overlap {
        config.pipeline.chunk_overlap_words = overlap;
    }
    let text =
        fs::read_to_string(&file).with_context(|| format!("failed to read {}", file.display()))?;
    let chunks = Chunker::new(config.pipeline.chunk_config()).split("preview", &text);
    print!("{}", render_chunks(&chunks));
    Ok(())
}

fn render_presets(library: &TemplateLibrary) -> String {
    let mut out = String::new();
    for template in library.presets() {
        let origin = match &template.origin {
            TemplateOrigin::Builtin => "builtin".to_string(),
            TemplateOrigin::User(path) => path.display().to_string(),
        };
        let headline = template
            .content
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("");
        out.push_str(&format!(
            "{:<20} {}  {:<10} {}\n",
            template.preset_id,
            template.content_hash(),
            origin,
            headline
        ));
    }
    out
}

fn render_chunks(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    for chunk in chunks {
        let preview: Vec<&str> = chunk.text.split_whitespace().take(PREVIEW_WORDS).collect();
        let ellipsis = if chunk.word_count > PREVIEW_WORDS { " ..." } else { "" };
        out.push_str(&format!(
            "#{:<3} words {}..{} ({}) {}  {}{}\n",
            chunk.index + 1,
            chunk.word_start,
            chunk.word_end,
            chunk.word_count,
            chunk.chunk_id,
            preview.join(" "),
            ellipsis
        ));
    }
    out.push_str(&format!("{} chunk(s)\n", chunks.len()));
    out
}
