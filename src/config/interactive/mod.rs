
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::{Path, PathBuf};

use super::{Config, ConfigError, EmbeddingBackend, ProviderConfig, RetrievalConfig};

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Doc QA Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir);

    eprintln!("{}", style("Provider Configuration").bold().yellow());
    eprintln!("Configure the OpenAI-compatible endpoint used for embeddings and answers.");
    eprintln!();

    configure_provider(&mut config.provider)?;
    if config.provider.embedding_backend == EmbeddingBackend::Ollama {
        configure_ollama(&mut config)?;
    }

    eprintln!();
    eprintln!("{}", style("Retrieval Configuration").bold().yellow());
    configure_retrieval(&mut config.retrieval)?;

    let corpus: String = Input::new()
        .with_prompt("Default corpus file (leave empty for none)")
        .allow_empty(true)
        .default(
            config
                .corpus_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        )
        .interact_text()?;
    config.corpus_path = (!corpus.trim().is_empty()).then(|| PathBuf::from(corpus.trim()));

    eprintln!();
    if api_key_is_set(&config.provider) {
        eprintln!(
            "{}",
            style(format!("✓ {} is set", config.provider.api_key_env)).green()
        );
    } else {
        eprintln!(
            "{}",
            style(format!(
                "⚠ Warning: {} is not set in this shell",
                config.provider.api_key_env
            ))
            .yellow()
        );
        eprintln!("Export it before asking questions.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

/// Same rule as [`ProviderConfig::api_key`]: unset and blank both count as missing
fn api_key_is_set(provider: &ProviderConfig) -> bool {
    provider.api_key().is_ok()
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Provider Settings:").bold().yellow());
    eprintln!("  Base URL: {}", style(&config.provider.base_url).cyan());
    let key_state = if api_key_is_set(&config.provider) {
        style("set").green()
    } else {
        style("not set").red()
    };
    eprintln!(
        "  API Key: ${} ({})",
        style(&config.provider.api_key_env).cyan(),
        key_state
    );
    eprintln!(
        "  Embeddings: {} via {}",
        style(&config.provider.embedding_model).cyan(),
        style(config.provider.embedding_backend).cyan()
    );
    eprintln!(
        "  Completion Model: {}",
        style(&config.provider.completion_model).cyan()
    );
    eprintln!(
        "  Timeout: {}s, Attempts: {}",
        style(config.provider.timeout_seconds).cyan(),
        style(config.provider.retry_attempts).cyan()
    );

    if config.provider.embedding_backend == EmbeddingBackend::Ollama {
        eprintln!();
        match config.ollama_url() {
            Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
            Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
        }
    }

    eprintln!();
    eprintln!("{}", style("Retrieval Settings:").bold().yellow());
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());
    eprintln!(
        "  Build effort (trees): {} (ef_construction {})",
        style(config.retrieval.trees).cyan(),
        style(config.retrieval.build_options().ef_construction()).cyan()
    );
    eprintln!(
        "  Max connections: {}",
        style(config.retrieval.max_connections).cyan()
    );
    eprintln!(
        "  Search breadth: {}",
        style(config.retrieval.search_k_for(config.retrieval.top_k)).cyan()
    );

    if let Some(corpus) = &config.corpus_path {
        eprintln!();
        eprintln!("Default corpus: {}", style(corpus.display()).cyan());
    }

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> Config {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No usable configuration found. Using defaults.").yellow()
            );
            Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            }
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            config
        },
    )
}

fn configure_provider(provider: &mut ProviderConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("API base URL")
        .default(provider.base_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            ProviderConfig {
                base_url: input.clone(),
                ..ProviderConfig::default()
            }
            .api_url()
            .map(|_| ())
        })
        .interact_text()?;

    let api_key_env: String = Input::new()
        .with_prompt("Environment variable holding the API key")
        .default(provider.api_key_env.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Variable name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let backends = &[EmbeddingBackend::OpenAi, EmbeddingBackend::Ollama];
    let default_index = backends
        .iter()
        .position(|&b| b == provider.embedding_backend)
        .unwrap_or(0);
    let backend_index = Select::new()
        .with_prompt("Embedding backend")
        .default(default_index)
        .items(backends)
        .interact()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(provider.embedding_model.clone())
        .interact_text()?;

    let completion_model: String = Input::new()
        .with_prompt("Completion model")
        .default(provider.completion_model.clone())
        .interact_text()?;

    provider.set_base_url(base_url)?;
    provider.api_key_env = api_key_env.trim().to_string();
    provider.embedding_backend = backends
        .get(backend_index)
        .copied()
        .unwrap_or_default();
    provider.set_embedding_model(embedding_model)?;
    provider.set_completion_model(completion_model)?;

    Ok(())
}

fn configure_ollama(config: &mut Config) -> Result<()> {
    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(config.ollama.host.clone())
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(config.ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    config.ollama.host = host;
    config.ollama.port = port;
    config.ollama.validate()?;
    Ok(())
}

fn configure_retrieval(retrieval: &mut RetrievalConfig) -> Result<()> {
    let top_k: usize = Input::new()
        .with_prompt("Excerpts per question (top k)")
        .default(retrieval.top_k)
        .validate_with(|input: &usize| -> Result<(), ConfigError> {
            RetrievalConfig::default().set_top_k(*input)
        })
        .interact_text()?;

    let trees: usize = Input::new()
        .with_prompt("Index build effort (trees)")
        .default(retrieval.trees)
        .validate_with(|input: &usize| -> Result<(), ConfigError> {
            RetrievalConfig::default().set_trees(*input)
        })
        .interact_text()?;

    retrieval.set_top_k(top_k)?;
    retrieval.set_trees(trees)?;
    Ok(())
}
