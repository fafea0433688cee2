//! Random projection forest: the approximate nearest neighbor index.

pub mod neighbor_queue;
pub(crate) mod tree;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::distance::DistanceMetric;
use crate::error::{BreedSearchError, Result};
use crate::index::Index;
use crate::vector::Vector;

use neighbor_queue::{MaxHeap, Neighbor};
use tree::Forest;

/// Tuning knobs for the forest that are fixed at build time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    /// Maximum number of items kept in a leaf.
    pub leaf_size: usize,
    /// Leaf entries to inspect per query. `None` means `k * n_trees`.
    pub search_k: Option<usize>,
    /// Seed for hyperplane sampling; a fixed seed makes builds reproducible.
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            leaf_size: 32,
            search_k: None,
            seed: 42,
        }
    }
}

impl ForestParams {
    pub fn new(leaf_size: usize, seed: u64) -> Self {
        Self {
            leaf_size,
            search_k: None,
            seed,
        }
    }

    pub fn with_search_k(mut self, search_k: usize) -> Self {
        self.search_k = Some(search_k);
        self
    }
}

/// An angular-distance random projection forest over embeddings.
#[derive(Debug)]
pub struct ForestIndex {
    dimension: usize,
    metric: DistanceMetric,
    params: ForestParams,
    /// Vectors indexed by item ID. Unused IDs stay `None`.
    items: Vec<Option<Vector>>,
    count: usize,
    forest: Option<Forest>,
}

impl ForestIndex {
    /// Create a new empty forest with default parameters.
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self::with_params(dimension, metric, ForestParams::default())
    }

    /// Create a new empty forest with custom parameters.
    pub fn with_params(dimension: usize, metric: DistanceMetric, params: ForestParams) -> Self {
        Self {
            dimension,
            metric,
            params,
            items: Vec::new(),
            count: 0,
            forest: None,
        }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Number of trees, zero until built.
    pub fn n_trees(&self) -> usize {
        self.forest.as_ref().map(|f| f.n_trees()).unwrap_or(0)
    }

    /// Search with an explicit `search_k` (runtime accuracy/speed tuning).
    pub fn search_with_k(
        &self,
        query: &Vector,
        k: usize,
        search_k: usize,
    ) -> Result<Vec<(usize, f32)>> {
        let forest = self.forest.as_ref().ok_or(BreedSearchError::IndexNotBuilt)?;
        self.check_vector(query)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let min_unique = k.min(self.count);
        let candidates = forest.candidates(query.as_slice(), search_k, min_unique);

        let mut best = MaxHeap::new();
        for id in candidates {
            if let Some(v) = self.get_vector(id) {
                let distance = self.metric.distance(query, v)?;
                best.push_bounded(Neighbor::new(id, distance), k);
            }
        }

        Ok(best
            .into_sorted_vec()
            .into_iter()
            .map(|n| (n.id, n.distance))
            .collect())
    }

    fn check_vector(&self, vector: &Vector) -> Result<()> {
        if vector.dimension() != self.dimension {
            return Err(BreedSearchError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.dimension(),
            });
        }
        if vector.as_slice().iter().any(|x| !x.is_finite()) {
            return Err(BreedSearchError::InvalidVector {
                reason: "Vector contains non-finite components".to_string(),
            });
        }
        if self.metric.requires_direction() && vector.norm() == 0.0 {
            return Err(BreedSearchError::InvalidVector {
                reason: "Zero vector has no direction".to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn items(&self) -> &[Option<Vector>] {
        &self.items
    }

    pub(crate) fn forest(&self) -> Option<&Forest> {
        self.forest.as_ref()
    }

    /// Reassemble a built index from persisted parts.
    pub(crate) fn from_parts(
        dimension: usize,
        metric: DistanceMetric,
        params: ForestParams,
        items: Vec<Option<Vector>>,
        forest: Forest,
    ) -> Result<Self> {
        if items
            .iter()
            .flatten()
            .any(|v| v.dimension() != dimension)
        {
            return Err(BreedSearchError::CorruptIndex(
                "stored vector has the wrong dimension".to_string(),
            ));
        }
        if !forest.is_consistent(items.len()) {
            return Err(BreedSearchError::CorruptIndex(
                "tree references out of range".to_string(),
            ));
        }
        let count = items.iter().filter(|v| v.is_some()).count();
        Ok(Self {
            dimension,
            metric,
            params,
            items,
            count,
            forest: Some(forest),
        })
    }
}

impl Index for ForestIndex {
    fn add(&mut self, id: usize, vector: Vector) -> Result<()> {
        if self.forest.is_some() {
            return Err(BreedSearchError::IndexAlreadyBuilt);
        }
        self.check_vector(&vector)?;

        if id >= self.items.len() {
            self.items.resize_with(id + 1, || None);
        }
        if self.items[id].replace(vector).is_none() {
            self.count += 1;
        }
        Ok(())
    }

    fn build(&mut self, n_trees: usize) -> Result<()> {
        if self.forest.is_some() {
            return Err(BreedSearchError::IndexAlreadyBuilt);
        }
        if n_trees == 0 {
            return Err(BreedSearchError::ConfigError(
                "tree count must be at least 1".to_string(),
            ));
        }
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let forest = Forest::build(
            &self.items,
            self.metric,
            n_trees,
            self.params.leaf_size,
            &mut rng,
        );
        log::debug!(
            "Built forest: {} trees, {} nodes over {} items",
            forest.n_trees(),
            forest.n_nodes(),
            self.count
        );
        self.forest = Some(forest);
        Ok(())
    }

    fn search(&self, query: &Vector, k: usize) -> Result<Vec<(usize, f32)>> {
        let search_k = self
            .params
            .search_k
            .unwrap_or_else(|| k.saturating_mul(self.n_trees()));
        self.search_with_k(query, k, search_k)
    }

    fn get_vector(&self, id: usize) -> Option<&Vector> {
        self.items.get(id).and_then(|v| v.as_ref())
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.count
    }

    fn is_built(&self) -> bool {
        self.forest.is_some()
    }
}
