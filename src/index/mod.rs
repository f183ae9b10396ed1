//! Approximate nearest-neighbour index over unit vectors.
//!
//! A thin wrapper around an `hnsw_rs` cosine graph. Vectors are normalised on
//! the way in, the graph proposes candidates, and candidates are re-ranked by
//! exact angular distance `sqrt(2 - 2cos)` so results are stable and sorted.
//!
//! Items are added to an [`IndexBuilder`]; [`IndexBuilder::build`] consumes it
//! and returns an immutable [`AngularIndex`].


pub mod distance;

use hnsw_rs::prelude::{DistCosine, Hnsw};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

use distance::{angular_distance, magnitude, normalized};

/// Upper bound on graph layers, as in `hnsw_rs` itself
const MAX_LAYERS: usize = 16;

/// Construction candidates per unit of build effort
const EF_CONSTRUCTION_PER_EFFORT: usize = 20;

#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    #[error("index dimension must be greater than zero")]
    ZeroDimension,
    #[error("expected vector dimension {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("items must be added in ordinal order: expected {expected}, found {found}")]
    OrdinalOutOfOrder { expected: usize, found: usize },
    #[error("vector for item {ordinal} contains non-finite values")]
    NonFinite { ordinal: usize },
    #[error("vector for item {ordinal} has zero norm")]
    ZeroVector { ordinal: usize },
    #[error("query vector has zero norm or non-finite values")]
    InvalidQuery,
    #[error("cannot build an index without items")]
    Empty,
    #[error("build effort must be greater than zero")]
    NoEffort,
    #[error("max connections must be at least 2, got {0}")]
    TooFewConnections(usize),
}

/// Graph construction parameters.
///
/// `effort` is the configured `trees` value: `ef_construction` is
/// `effort * 20`, so the default of 10 gives the usual 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    pub effort: usize,
    pub max_connections: usize,
}

impl BuildOptions {
    #[inline]
    pub fn ef_construction(&self) -> usize {
        self.effort
            .saturating_mul(EF_CONSTRUCTION_PER_EFFORT)
            .max(self.max_connections)
    }
}

impl Default for BuildOptions {
    #[inline]
    fn default() -> Self {
        Self {
            effort: 10,
            max_connections: 16,
        }
    }
}

/// A returned item and its angular distance from the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbour {
    pub ordinal: usize,
    pub distance: f32,
}

#[derive(Debug)]
pub struct IndexBuilder {
    dimension: usize,
    items: Vec<Vec<f32>>,
}

impl IndexBuilder {
    #[inline]
    pub fn new(dimension: usize) -> Result<Self, IndexError> {
        if dimension == 0 {
            return Err(IndexError::ZeroDimension);
        }
        Ok(Self {
            dimension,
            items: Vec::new(),
        })
    }

    #[inline]
    pub fn with_capacity(dimension: usize, capacity: usize) -> Result<Self, IndexError> {
        let mut builder = Self::new(dimension)?;
        builder.items.reserve_exact(capacity);
        Ok(builder)
    }

    /// Adds the vector for item `ordinal`, which must be the next free ordinal.
    #[inline]
    pub fn add_item(&mut self, ordinal: usize, vector: &[f32]) -> Result<(), IndexError> {
        if ordinal != self.items.len() {
            return Err(IndexError::OrdinalOutOfOrder {
                expected: self.items.len(),
                found: ordinal,
            });
        }
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                found: vector.len(),
            });
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(IndexError::NonFinite { ordinal });
        }
        if magnitude(vector) <= f32::EPSILON {
            return Err(IndexError::ZeroVector { ordinal });
        }

        self.items.push(normalized(vector));
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Inserts every item into the graph and freezes the index
    #[inline]
    pub fn build(self, options: BuildOptions) -> Result<AngularIndex, IndexError> {
        if self.items.is_empty() {
            return Err(IndexError::Empty);
        }
        if options.effort == 0 {
            return Err(IndexError::NoEffort);
        }
        if options.max_connections < 2 {
            return Err(IndexError::TooFewConnections(options.max_connections));
        }

        let graph: Hnsw<'static, f32, DistCosine> = Hnsw::new(
            options.max_connections,
            self.items.len(),
            MAX_LAYERS,
            options.ef_construction(),
            DistCosine {},
        );
        for (ordinal, item) in self.items.iter().enumerate() {
            graph.insert((item.as_slice(), ordinal));
        }

        info!(
            "Built angular index: {} items, {} dimensions, {} max connections, ef_construction {}",
            self.items.len(),
            self.dimension,
            options.max_connections,
            options.ef_construction()
        );

        Ok(AngularIndex {
            dimension: self.dimension,
            items: self.items,
            options,
            graph,
        })
    }
}

/// Immutable, query-ready index. Item `i` is the `i`-th vector added.
pub struct AngularIndex {
    dimension: usize,
    items: Vec<Vec<f32>>,
    options: BuildOptions,
    graph: Hnsw<'static, f32, DistCosine>,
}

impl fmt::Debug for AngularIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AngularIndex")
            .field("dimension", &self.dimension)
            .field("items", &self.items.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl AngularIndex {
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn options(&self) -> BuildOptions {
        self.options
    }

    /// Stored unit vector for item `ordinal`
    #[inline]
    pub fn item_vector(&self, ordinal: usize) -> Option<&[f32]> {
        self.items.get(ordinal).map(Vec::as_slice)
    }

    /// The `n` items closest to `query`, nearest first.
    ///
    /// `ef_search` is the graph search breadth, raised to at least `n`. The
    /// result always has `min(n, len)` entries: when the graph comes back
    /// short the items are ranked exhaustively.
    #[inline]
    pub fn nearest(
        &self,
        query: &[f32],
        n: usize,
        ef_search: usize,
    ) -> Result<Vec<Neighbour>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                found: query.len(),
            });
        }
        if query.iter().any(|x| !x.is_finite()) || magnitude(query) <= f32::EPSILON {
            return Err(IndexError::InvalidQuery);
        }

        let n = n.min(self.items.len());
        if n == 0 {
            return Ok(Vec::new());
        }
        let query = normalized(query);
        let ef = ef_search.max(n);

        let mut candidates: Vec<usize> = self
            .graph
            .search(&query, n, ef)
            .into_iter()
            .map(|neighbour| neighbour.d_id)
            .filter(|&ordinal| ordinal < self.items.len())
            .collect();
        candidates.sort_unstable();
        candidates.dedup();

        if candidates.len() < n {
            debug!(
                "Graph returned {} of {} neighbours, ranking all {} items",
                candidates.len(),
                n,
                self.items.len()
            );
            candidates = (0..self.items.len()).collect();
        }

        let mut neighbours: Vec<Neighbour> = candidates
            .into_iter()
            .map(|ordinal| Neighbour {
                ordinal,
                distance: angular_distance(&query, &self.items[ordinal]),
            })
            .collect();
        neighbours.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.ordinal.cmp(&b.ordinal))
        });
        neighbours.truncate(n);

        debug!(
            "Nearest-neighbour query with ef {} returned {} items",
            ef,
            neighbours.len()
        );
        Ok(neighbours)
    }
}
