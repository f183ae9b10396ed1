use thiserror::Error;

pub type Result<T> = std::result::Result<T, QaError>;

#[derive(Error, Debug)]
pub enum QaError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Corpus error: {0}")]
    Load(#[from] corpus::LoadError),

    #[error("Index error: {0}")]
    Index(#[from] index::IndexError),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Completion error: {0}")]
    Completion(String),

    #[error("Query cannot be empty")]
    EmptyQuery,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod answer;
pub mod commands;
pub mod config;
pub mod corpus;
pub mod index;
pub mod provider;
pub mod retriever;
pub mod session;
