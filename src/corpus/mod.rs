//! Corpus store: the pre-chunked document that questions are answered from.
//!
//! A corpus source is a small structured file with a `title` and an ordered
//! `sentences` list. YAML is the usual format; JSON and TOML are accepted as
//! well and picked by file extension. Once loaded, a [`Corpus`] is read-only.


use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// One passage of the source document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 0-based position in the document, also the chunk's index item id
    pub ordinal: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corpus {
    title: String,
    chunks: Vec<Chunk>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("corpus file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read corpus file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported corpus format for {} (expected .yaml, .yml, .json or .toml)", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("failed to parse corpus file {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
    #[error("corpus is missing a non-empty `title`")]
    MissingTitle,
    #[error("corpus is missing a non-empty `sentences` list")]
    NoSentences,
    #[error("sentence {ordinal} is blank")]
    BlankSentence { ordinal: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Yaml,
    Json,
    Toml,
}

impl SourceFormat {
    fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }
}

/// On-disk shape; both fields optional so their absence maps to a [`LoadError`]
/// instead of a generic parse failure.
#[derive(Debug, Deserialize)]
struct CorpusSource {
    title: Option<String>,
    sentences: Option<Vec<String>>,
}

impl Corpus {
    /// Builds a corpus from a title and its sentences, in document order
    #[inline]
    pub fn new(title: impl Into<String>, sentences: Vec<String>) -> Result<Self, LoadError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(LoadError::MissingTitle);
        }
        if sentences.is_empty() {
            return Err(LoadError::NoSentences);
        }

        let chunks = sentences
            .into_iter()
            .enumerate()
            .map(|(ordinal, text)| {
                if text.trim().is_empty() {
                    Err(LoadError::BlankSentence { ordinal })
                } else {
                    Ok(Chunk { ordinal, text })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { title, chunks })
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }

        let format =
            SourceFormat::from_path(path).ok_or_else(|| LoadError::UnsupportedFormat(path.to_path_buf()))?;

        let content = fs::read_to_string(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("Parsing {:?} corpus from {}", format, path.display());
        let corpus = Self::parse(&content, format, path)?;

        info!(
            "Loaded corpus {:?} with {} chunks from {}",
            corpus.title,
            corpus.len(),
            path.display()
        );
        Ok(corpus)
    }

    fn parse(content: &str, format: SourceFormat, path: &Path) -> Result<Self, LoadError> {
        let source: Result<CorpusSource, String> = match format {
            SourceFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            SourceFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            SourceFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        };
        let source = source.map_err(|message| LoadError::Parse {
            path: path.to_path_buf(),
            message,
        })?;

        let title = source.title.ok_or(LoadError::MissingTitle)?;
        let sentences = source.sentences.ok_or(LoadError::NoSentences)?;
        Self::new(title, sentences)
    }

    #[inline]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[inline]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    #[inline]
    pub fn get(&self, ordinal: usize) -> Option<&Chunk> {
        self.chunks.get(ordinal)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Always false for a loaded corpus; kept for API symmetry with `len`
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunk texts in ordinal order, ready for a batched embedding call
    #[inline]
    pub fn texts(&self) -> Vec<String> {
        self.chunks.iter().map(|c| c.text.clone()).collect()
    }
}
