use clap::{Parser, Subcommand};
use doc_qa::Result;
use doc_qa::commands::{SessionOptions, run_session};
use doc_qa::config::{get_config_dir, run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "doc-qa")]
#[command(about = "Answer questions about a document using retrieved excerpts")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml (defaults to ~/.doc-qa)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask questions about a corpus interactively (the default)
    Ask {
        /// Corpus file (.yaml, .yml, .json or .toml); falls back to corpus_path from the config
        corpus: Option<PathBuf>,
        /// Number of excerpts retrieved per question
        #[arg(long)]
        top_k: Option<usize>,
        /// Index build effort; ef_construction is 20 times this
        #[arg(long)]
        trees: Option<usize>,
    },
    /// Configure the provider, retrieval and default corpus
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };

    match cli.command {
        Some(Commands::Config { show }) => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Some(Commands::Ask {
            corpus,
            top_k,
            trees,
        }) => {
            run_session(
                &config_dir,
                &SessionOptions {
                    corpus,
                    top_k,
                    trees,
                },
            )?;
        }
        None => {
            run_session(&config_dir, &SessionOptions::default())?;
        }
    }

    Ok(())
}
