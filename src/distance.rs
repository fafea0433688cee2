//! Distance metrics for embedding similarity

use crate::error::{BreedSearchError, Result};
use crate::vector::Vector;
use serde::{Deserialize, Serialize};

/// Distance metrics for measuring embedding similarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Angle between vectors, magnitude ignored: sqrt(2 - 2 cos θ)
    Angular,
    /// Euclidean (L2) distance
    Euclidean,
}

impl Default for DistanceMetric {
    fn default() -> Self {
        DistanceMetric::Angular
    }
}

impl DistanceMetric {
    /// Compute the distance between two vectors using this metric
    pub fn distance(&self, v1: &Vector, v2: &Vector) -> Result<f32> {
        if !v1.has_same_dimension(v2) {
            return Err(BreedSearchError::DimensionMismatch {
                expected: v1.dimension(),
                actual: v2.dimension(),
            });
        }

        match self {
            DistanceMetric::Angular => angular_distance(v1, v2),
            DistanceMetric::Euclidean => Ok(euclidean_distance(v1, v2)),
        }
    }

    /// Whether vectors must have a non-zero norm under this metric
    pub fn requires_direction(&self) -> bool {
        matches!(self, DistanceMetric::Angular)
    }

    /// Stable numeric tag used in the on-disk index header
    pub(crate) fn tag(&self) -> u8 {
        match self {
            DistanceMetric::Angular => 0,
            DistanceMetric::Euclidean => 1,
        }
    }
}

/// Compute Euclidean (L2) distance between two vectors
pub fn euclidean_distance(v1: &Vector, v2: &Vector) -> f32 {
    v1.as_slice()
        .iter()
        .zip(v2.as_slice().iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// Cosine similarity in [-1, 1]
pub fn cosine_similarity(v1: &Vector, v2: &Vector) -> Result<f32> {
    let norm1 = v1.norm();
    let norm2 = v2.norm();

    if norm1 == 0.0 || norm2 == 0.0 {
        return Err(BreedSearchError::InvalidVector {
            reason: "Cannot compute angular distance with zero vector".to_string(),
        });
    }

    // Clamp to [-1, 1] to handle floating point errors
    Ok((v1.dot(v2) / (norm1 * norm2)).clamp(-1.0, 1.0) as f32)
}

/// Angular distance: the euclidean distance between the unit-normalized vectors
pub fn angular_distance(v1: &Vector, v2: &Vector) -> Result<f32> {
    let similarity = cosine_similarity(v1, v2)?;
    Ok((2.0 - 2.0 * similarity).max(0.0).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_euclidean_distance() {
        let v1 = Vector::new(vec![1.0, 2.0, 3.0]);
        let v2 = Vector::new(vec![4.0, 5.0, 6.0]);
        let dist = euclidean_distance(&v1, &v2);
        assert_relative_eq!(dist, 5.196152, epsilon = 1e-5);
    }

    #[test]
    fn test_angular_same_direction() {
        let v1 = Vector::new(vec![1.0, 2.0, 3.0]);
        let v2 = Vector::new(vec![2.0, 4.0, 6.0]);
        let dist = angular_distance(&v1, &v2).unwrap();
        assert_relative_eq!(dist, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_angular_orthogonal() {
        let v1 = Vector::new(vec![1.0, 0.0, 0.0]);
        let v2 = Vector::new(vec![0.0, 5.0, 0.0]);
        let dist = angular_distance(&v1, &v2).unwrap();
        assert_relative_eq!(dist, 2.0_f32.sqrt(), epsilon = 1e-6);
    }

    #[test]
    fn test_angular_opposite() {
        let v1 = Vector::new(vec![1.0, 0.0, 0.0]);
        let v2 = Vector::new(vec![-1.0, 0.0, 0.0]);
        let dist = angular_distance(&v1, &v2).unwrap();
        assert_relative_eq!(dist, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_angular_ignores_huge_magnitudes() {
        let small = Vector::new(vec![1.0, 0.01]);
        let huge = Vector::new(vec![1e20, 1e18]);
        let x_axis = Vector::new(vec![1.0, 0.0]);
        let near = angular_distance(&small, &x_axis).unwrap();
        assert_relative_eq!(angular_distance(&huge, &x_axis).unwrap(), near, epsilon = 1e-5);
        assert!(near < 0.02);
    }

    #[test]
    fn test_angular_zero_vector() {
        let v1 = Vector::new(vec![0.0, 0.0]);
        let v2 = Vector::new(vec![1.0, 0.0]);
        assert!(matches!(
            DistanceMetric::Angular.distance(&v1, &v2),
            Err(BreedSearchError::InvalidVector { .. })
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let v1 = Vector::new(vec![1.0, 2.0]);
        let v2 = Vector::new(vec![1.0, 2.0, 3.0]);
        assert!(matches!(
            DistanceMetric::Euclidean.distance(&v1, &v2),
            Err(BreedSearchError::DimensionMismatch { .. })
        ));
    }
}
