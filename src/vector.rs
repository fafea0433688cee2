//! Embedding vector type and operations

use crate::error::{BreedSearchError, Result};
use serde::{Deserialize, Serialize};

/// A fixed-length embedding in n-dimensional space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    data: Vec<f32>,
}

impl Vector {
    /// Create a new vector from a Vec<f32>
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// A vector of `dimension` zeros
    pub fn zeros(dimension: usize) -> Self {
        Self {
            data: vec![0.0; dimension],
        }
    }

    /// Get the dimension of the vector
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    /// Get the underlying data as a slice
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Consume the vector, returning the raw components
    pub fn into_inner(self) -> Vec<f32> {
        self.data
    }

    /// Check if this vector has the same dimension as another
    pub fn has_same_dimension(&self, other: &Vector) -> bool {
        self.dimension() == other.dimension()
    }

    /// L2 norm, accumulated in f64 so that squares of large components
    /// do not overflow.
    pub fn norm(&self) -> f64 {
        self.data
            .iter()
            .map(|&x| f64::from(x) * f64::from(x))
            .sum::<f64>()
            .sqrt()
    }

    /// Dot product with another vector of the same dimension, in f64.
    pub fn dot(&self, other: &Vector) -> f64 {
        self.data
            .iter()
            .zip(other.data.iter())
            .map(|(&a, &b)| f64::from(a) * f64::from(b))
            .sum()
    }

    /// Normalize the vector to unit length
    pub fn normalize(&mut self) -> Result<()> {
        let norm = self.norm();
        if norm == 0.0 {
            return Err(BreedSearchError::InvalidVector {
                reason: "Cannot normalize zero vector".to_string(),
            });
        }
        for x in &mut self.data {
            *x = (f64::from(*x) / norm) as f32;
        }
        Ok(())
    }

    /// Create a normalized copy of the vector
    pub fn normalized(&self) -> Result<Vector> {
        let mut v = self.clone();
        v.normalize()?;
        Ok(v)
    }

    /// Parse a vector from a comma-separated string
    pub fn from_str(s: &str) -> Result<Self> {
        let data: Result<Vec<f32>> = s
            .split(',')
            .map(|x| {
                x.trim()
                    .parse::<f32>()
                    .map_err(|_| BreedSearchError::InvalidVector {
                        reason: format!("Invalid float: {}", x),
                    })
            })
            .collect();
        Ok(Vector::new(data?))
    }
}
