// Configuration management module
// TOML settings for the provider, retrieval tunables and the question loop

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, EmbeddingBackend, OllamaConfig, ProviderConfig, RetrievalConfig,
    SessionConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
