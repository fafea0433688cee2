//! Brute-force flat index: exact O(n) k-NN, the ground truth for recall checks

use std::collections::BTreeMap;

use crate::distance::DistanceMetric;
use crate::error::{BreedSearchError, Result};
use crate::index::Index;
use crate::vector::Vector;

/// A flat (brute-force) index that computes distance to every stored vector.
#[derive(Debug)]
pub struct FlatIndex {
    vectors: BTreeMap<usize, Vector>,
    metric: DistanceMetric,
    dimension: usize,
    built: bool,
}

impl FlatIndex {
    /// Create a new empty flat index with the given dimension and metric.
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            vectors: BTreeMap::new(),
            metric,
            dimension,
            built: false,
        }
    }

    /// Iterate over all (id, vector) pairs in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (&usize, &Vector)> {
        self.vectors.iter()
    }
}

impl Index for FlatIndex {
    fn add(&mut self, id: usize, vector: Vector) -> Result<()> {
        if self.built {
            return Err(BreedSearchError::IndexAlreadyBuilt);
        }
        if vector.dimension() != self.dimension {
            return Err(BreedSearchError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.dimension(),
            });
        }
        self.vectors.insert(id, vector);
        Ok(())
    }

    fn build(&mut self, _n_trees: usize) -> Result<()> {
        if self.built {
            return Err(BreedSearchError::IndexAlreadyBuilt);
        }
        self.built = true;
        Ok(())
    }

    fn get_vector(&self, id: usize) -> Option<&Vector> {
        self.vectors.get(&id)
    }

    fn search(&self, query: &Vector, k: usize) -> Result<Vec<(usize, f32)>> {
        if !self.built {
            return Err(BreedSearchError::IndexNotBuilt);
        }
        let mut results: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .map(|(&id, vec)| {
                let distance = self.metric.distance(query, vec)?;
                Ok((id, distance))
            })
            .collect::<Result<Vec<_>>>()?;

        results.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        results.truncate(k);
        Ok(results)
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn is_built(&self) -> bool {
        self.built
    }
}
