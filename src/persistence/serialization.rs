//! Serialization utilities: bincode for the index payload, JSON for catalogs and maps.

use crate::distance::DistanceMetric;
use crate::error::{BreedSearchError, Result};
use crate::forest::tree::Forest;
use crate::forest::{ForestIndex, ForestParams};
use crate::vector::Vector;
use serde::{Deserialize, Serialize};

/// Serializable representation of a built forest index.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct IndexSnapshot {
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub params: ForestParams,
    pub items: Vec<Option<Vec<f32>>>,
    pub forest: Forest,
}

impl IndexSnapshot {
    /// Capture a built index. Returns `IndexNotBuilt` for an unfinalized one.
    pub fn capture(index: &ForestIndex) -> Result<Self> {
        use crate::index::Index;

        let forest = index.forest().ok_or(BreedSearchError::IndexNotBuilt)?;
        Ok(Self {
            dimension: index.dimension(),
            metric: index.metric(),
            params: index.params().clone(),
            items: index
                .items()
                .iter()
                .map(|v| v.as_ref().map(|v| v.as_slice().to_vec()))
                .collect(),
            forest: forest.clone(),
        })
    }

    pub fn restore(self) -> Result<ForestIndex> {
        let items = self.items.into_iter().map(|v| v.map(Vector::new)).collect();
        ForestIndex::from_parts(self.dimension, self.metric, self.params, items, self.forest)
    }
}

/// Encode data to bincode bytes.
pub fn to_bincode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| BreedSearchError::SerializationError(e.to_string()))
}

/// Decode data from bincode bytes.
pub fn from_bincode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| BreedSearchError::SerializationError(e.to_string()))
}

/// Encode data to pretty JSON bytes.
pub fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|e| BreedSearchError::SerializationError(e.to_string()))
}

/// Decode data from JSON bytes.
pub fn from_json<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| BreedSearchError::SerializationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Index;

    #[test]
    fn test_capture_requires_build() {
        let index = ForestIndex::new(2, DistanceMetric::Angular);
        assert!(matches!(
            IndexSnapshot::capture(&index),
            Err(BreedSearchError::IndexNotBuilt)
        ));
    }

    #[test]
    fn test_snapshot_restores_queries() {
        let mut index = ForestIndex::new(2, DistanceMetric::Angular);
        index.add(0, Vector::new(vec![1.0, 0.0])).unwrap();
        index.add(1, Vector::new(vec![0.0, 1.0])).unwrap();
        index.add(2, Vector::new(vec![1.0, 1.0])).unwrap();
        index.build(2).unwrap();

        let bytes = to_bincode(&IndexSnapshot::capture(&index).unwrap()).unwrap();
        let decoded: IndexSnapshot = from_bincode(&bytes).unwrap();
        let restored = decoded.restore().unwrap();

        let q = Vector::new(vec![0.9, 0.2]);
        assert_eq!(restored.len(), 3);
        assert_eq!(restored.query(&q, 3).unwrap(), index.query(&q, 3).unwrap());
    }

    #[test]
    fn test_from_json_reports_errors() {
        let result: Result<Vec<String>> = from_json(b"{not json");
        assert!(matches!(result, Err(BreedSearchError::SerializationError(_))));
    }
}
