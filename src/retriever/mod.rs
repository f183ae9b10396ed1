
use itertools::Itertools;
use tracing::{debug, info, warn};

use crate::config::RetrievalConfig;
use crate::corpus::Corpus;
use crate::index::{AngularIndex, IndexBuilder};
use crate::provider::Embedder;
use crate::{QaError, Result};

/// A retrieved chunk and its angular distance from the question
#[derive(Debug, Clone, PartialEq)]
pub struct Excerpt {
    pub ordinal: usize,
    pub text: String,
    pub distance: f32,
}

/// Excerpts for one question, nearest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    pub excerpts: Vec<Excerpt>,
}

impl RetrievalResult {
    #[inline]
    pub fn len(&self) -> usize {
        self.excerpts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.excerpts.is_empty()
    }

    /// Numbered excerpt list, `[1]. text` per line, in result order
    #[inline]
    pub fn render(&self) -> String {
        self.excerpts
            .iter()
            .enumerate()
            .map(|(i, excerpt)| format!("[{}]. {}", i + 1, excerpt.text))
            .join("\n")
    }

    #[inline]
    pub fn texts(&self) -> Vec<&str> {
        self.excerpts.iter().map(|e| e.text.as_str()).collect()
    }
}

/// Owns the corpus and the index built over its embeddings
#[derive(Debug)]
pub struct Retriever {
    corpus: Corpus,
    index: AngularIndex,
    options: RetrievalConfig,
}

impl Retriever {
    /// Embeds every chunk in one batched call and builds the index.
    ///
    /// Item `i` of the index is chunk `i` of the corpus.
    #[inline]
    pub fn build(corpus: Corpus, embedder: &dyn Embedder, options: &RetrievalConfig) -> Result<Self> {
        info!(
            "Embedding {} chunks of {:?} with {}",
            corpus.len(),
            corpus.title(),
            embedder.model()
        );
        let embeddings = embedder.embed(&corpus.texts())?;

        if embeddings.len() != corpus.len() {
            return Err(QaError::Embedding(format!(
                "expected {} embeddings, provider returned {}",
                corpus.len(),
                embeddings.len()
            )));
        }

        let dimension = embeddings.first().map_or(0, Vec::len);
        if dimension == 0 {
            return Err(QaError::Embedding(
                "provider returned an empty embedding".to_string(),
            ));
        }
        debug!("Embedding dimension is {}", dimension);

        let mut builder = IndexBuilder::with_capacity(dimension, corpus.len())?;
        for (chunk, embedding) in corpus.chunks().iter().zip(&embeddings) {
            if embedding.len() != dimension {
                return Err(QaError::Embedding(format!(
                    "embedding for chunk {} has {} dimensions, expected {}",
                    chunk.ordinal,
                    embedding.len(),
                    dimension
                )));
            }
            builder.add_item(chunk.ordinal, embedding)?;
        }

        let index = builder.build(options.build_options())?;

        Ok(Self {
            corpus,
            index,
            options: options.clone(),
        })
    }

    #[inline]
    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    #[inline]
    pub fn index(&self) -> &AngularIndex {
        &self.index
    }

    /// The `k` chunks nearest to `query`, nearest first.
    ///
    /// `k` is clamped to the corpus size; `k == 0` yields an empty result
    /// without calling the provider.
    #[inline]
    pub fn retrieve(&self, query: &str, embedder: &dyn Embedder, k: usize) -> Result<RetrievalResult> {
        if query.trim().is_empty() {
            return Err(QaError::EmptyQuery);
        }

        let clamped = k.min(self.corpus.len());
        if clamped < k {
            warn!(
                "Requested {} excerpts but the corpus only has {}; returning {}",
                k,
                self.corpus.len(),
                clamped
            );
        }
        if clamped == 0 {
            return Ok(RetrievalResult::default());
        }

        let query_embedding = embedder
            .embed(&[query.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| {
                QaError::Embedding("provider returned no embedding for the query".to_string())
            })?;

        if query_embedding.len() != self.index.dimension() {
            return Err(QaError::Embedding(format!(
                "query embedding has {} dimensions, index has {}",
                query_embedding.len(),
                self.index.dimension()
            )));
        }

        let neighbours =
            self.index
                .nearest(&query_embedding, clamped, self.options.search_k_for(clamped))?;

        let excerpts = neighbours
            .into_iter()
            .filter_map(|n| {
                self.corpus.get(n.ordinal).map(|chunk| Excerpt {
                    ordinal: chunk.ordinal,
                    text: chunk.text.clone(),
                    distance: n.distance,
                })
            })
            .collect::<Vec<_>>();

        debug!(
            "Retrieved excerpts {:?} for query",
            excerpts.iter().map(|e| (e.ordinal, e.distance)).collect::<Vec<_>>()
        );
        Ok(RetrievalResult { excerpts })
    }
}
