//! Index trait for pluggable nearest neighbor backends

use crate::distance::DistanceMetric;
use crate::error::Result;
use crate::vector::Vector;

/// A build-once nearest neighbor index.
///
/// Items are added under caller-assigned `usize` IDs, the index is finalized
/// with [`Index::build`], and from then on it is read-only.
pub trait Index {
    /// Add a vector with the given item ID. Only valid before `build`.
    fn add(&mut self, id: usize, vector: Vector) -> Result<()>;

    /// Finalize the index for querying. Must be called exactly once.
    fn build(&mut self, n_trees: usize) -> Result<()>;

    /// Search for the `k` nearest neighbors of `query`.
    /// Returns a Vec of `(id, distance)` pairs sorted by distance ascending.
    fn search(&self, query: &Vector, k: usize) -> Result<Vec<(usize, f32)>>;

    /// Retrieve a vector by its item ID.
    fn get_vector(&self, id: usize) -> Option<&Vector>;

    /// The distance metric used by this index.
    fn metric(&self) -> DistanceMetric;

    /// The configured embedding dimension.
    fn dimension(&self) -> usize;

    /// The number of vectors in this index.
    fn len(&self) -> usize;

    /// Whether `build` has been called.
    fn is_built(&self) -> bool;

    /// Whether the index is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to `k` nearest item IDs, closest first.
    fn query(&self, query: &Vector, k: usize) -> Result<Vec<usize>> {
        Ok(self
            .search(query, k)?
            .into_iter()
            .map(|(id, _)| id)
            .collect())
    }
}
