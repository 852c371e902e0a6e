use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "focusdigest",
    version,
    about = "Focus-directed summarization across many documents"
)]
pub struct Cli {
    /// TOML config file (defaults to ./focusdigest.toml when present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Summarize documents under a template and write a report.
    Summarize(SummarizeArgs),
    /// Resolve and print the focus derived from a template.
    Focus {
        #[command(flatten)]
        template: TemplateArgs,
        #[command(flatten)]
        llm: LlmArgs,
        #[arg(long = "cache-file")]
        cache_file: Option<PathBuf>,
    },
    /// List available presets.
    Presets {
        #[arg(long = "template-dir")]
        template_dir: Option<PathBuf>,
    },
    /// Preview chunk boundaries for one file.
    Chunk {
        file: PathBuf,
        #[arg(long = "chunk-words")]
        chunk_words: Option<usize>,
        #[arg(long)]
        overlap: Option<usize>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SummarizeArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    #[command(flatten)]
    pub template: TemplateArgs,
    #[command(flatten)]
    pub llm: LlmArgs,
    /// sequential | concurrent
    #[arg(long)]
    pub strategy: Option<String>,
    #[arg(long)]
    pub workers: Option<usize>,
    #[arg(long = "chunk-words")]
    pub chunk_words: Option<usize>,
    #[arg(long = "cache-file")]
    pub cache_file: Option<PathBuf>,
    /// markdown | json
    #[arg(long, default_value = "markdown")]
    pub format: String,
    #[arg(short = 'o', long = "out")]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TemplateArgs {
    #[arg(long)]
    pub preset: Option<String>,
    #[arg(long = "template-dir")]
    pub template_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct LlmArgs {
    /// ollama | openai | local
    #[arg(long)]
    pub provider: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long = "base-url")]
    pub base_url: Option<String>,
}
