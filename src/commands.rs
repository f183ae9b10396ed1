use anyhow::{Context, Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::corpus::Corpus;
use crate::provider;
use crate::retriever::Retriever;
use crate::session::{QaContext, SessionStats};

/// Overrides given on the command line for one session
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub corpus: Option<PathBuf>,
    pub top_k: Option<usize>,
    pub trees: Option<usize>,
}

/// Applies command-line overrides on top of the loaded configuration
#[inline]
pub fn apply_overrides(config: &mut Config, options: &SessionOptions) -> Result<PathBuf> {
    if let Some(top_k) = options.top_k {
        config.retrieval.set_top_k(top_k)?;
    }
    if let Some(trees) = options.trees {
        config.retrieval.set_trees(trees)?;
    }

    options
        .corpus
        .clone()
        .or_else(|| config.corpus_path.clone())
        .ok_or_else(|| {
            anyhow!(
                "No corpus given. Pass a corpus file or set corpus_path in {}",
                config.config_file_path().display()
            )
        })
}

fn build_spinner(message: String) -> ProgressBar {
    if console::user_attended_stderr() {
        let bar = ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    } else {
        ProgressBar::hidden()
    }
}

/// Loads the corpus, embeds it and builds the index; everything a session needs
#[inline]
pub fn prepare_session(config: &Config, corpus_path: &Path) -> Result<QaContext> {
    let corpus = Corpus::load(corpus_path)?;
    let (embedder, completer) = provider::from_config(config)?;

    let bar = build_spinner(format!(
        "Embedding {} passages of \"{}\"",
        corpus.len(),
        corpus.title()
    ));
    let built = Retriever::build(corpus, embedder.as_ref(), &config.retrieval);
    bar.finish_and_clear();
    let retriever = built.context("Failed to build the retrieval index")?;

    info!(
        "Index ready: {} items, ef_construction {}",
        retriever.index().len(),
        retriever.index().options().ef_construction()
    );

    Ok(QaContext::new(
        retriever,
        embedder,
        completer,
        config.session.clone(),
        config.retrieval.top_k,
    ))
}

/// Runs the interactive question loop on stdin and stdout
#[inline]
pub fn run_session(config_dir: &Path, options: &SessionOptions) -> Result<SessionStats> {
    let mut config = Config::load(config_dir)?;
    let corpus_path = apply_overrides(&mut config, options)?;
    let context = prepare_session(&config, &corpus_path)?;

    eprintln!(
        "{}",
        console::style(format!(
            "Ask questions about \"{}\" ({} to quit)",
            context.retriever().corpus().title(),
            config.session.exit_command
        ))
        .bold()
        .cyan()
    );

    let stdin = io::stdin();
    let stdout = io::stdout();
    let stats = context
        .run_loop(stdin.lock(), stdout.lock())
        .context("Question loop failed")?;
    Ok(stats)
}
