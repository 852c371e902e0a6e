mod cli;
mod config;
mod inspect;
mod logging;
mod report;
mod summarize;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::cli::{Cli, Command};
use crate::config::{load_config, DEFAULT_CONFIG};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = cli.verbose || logging::env_flag();
    logging::init_tracing(verbose);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let mut config = load_config(&config_path)?;
    config.apply_env()?;

    match cli.command {
        Command::Summarize(args) => summarize::run(config, args),
        Command::Focus {
            template,
            llm,
            cache_file,
        } => summarize::run_focus(config, template, llm, cache_file),
        Command::Presets { template_dir } => inspect::run_presets(config, template_dir),
        Command::Chunk {
            file,
            chunk_words,
            overlap,
        } => inspect::run_chunk(config, file, chunk_words, overlap),
    }
}
