//! Linear classification head over an embedding provider.
//!
//! The head is the final fully connected layer of a classifier, supplied as a
//! JSON file `{"weights": [[f32; dim]; classes], "bias": [f32; classes]}`.

use super::{Classifier, EmbeddingProvider};
use crate::error::{BreedSearchError, Result};
use crate::persistence::serialization;
use image::DynamicImage;
use ndarray::{Array1, Array2, ArrayView1};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct HeadFile {
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

/// `logits = weights · embedding + bias`
#[derive(Debug, Clone)]
pub struct LinearHead {
    weights: Array2<f32>,
    bias: Array1<f32>,
}

impl LinearHead {
    pub fn new(weights: Array2<f32>, bias: Array1<f32>) -> Result<Self> {
        if weights.nrows() != bias.len() {
            return Err(BreedSearchError::ModelError(format!(
                "head has {} weight rows but {} biases",
                weights.nrows(),
                bias.len()
            )));
        }
        Ok(Self { weights, bias })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let file: HeadFile = serialization::from_json(&bytes)?;

        let rows = file.weights.len();
        let cols = file.weights.first().map(Vec::len).unwrap_or(0);
        if rows == 0 || cols == 0 {
            return Err(BreedSearchError::ModelError("empty classification head".to_string()));
        }
        if file.weights.iter().any(|r| r.len() != cols) {
            return Err(BreedSearchError::ModelError(
                "ragged weight matrix in classification head".to_string(),
            ));
        }

        let flat: Vec<f32> = file.weights.into_iter().flatten().collect();
        let weights = Array2::from_shape_vec((rows, cols), flat)
            .map_err(|e| BreedSearchError::ModelError(e.to_string()))?;
        Self::new(weights, Array1::from(file.bias))
    }

    pub fn num_classes(&self) -> usize {
        self.weights.nrows()
    }

    pub fn input_dimension(&self) -> usize {
        self.weights.ncols()
    }

    pub fn apply(&self, embedding: ArrayView1<f32>) -> Array1<f32> {
        self.weights.dot(&embedding) + &self.bias
    }
}

/// An embedder followed by a linear head.
pub struct LinearClassifier {
    embedder: Arc<dyn EmbeddingProvider>,
    head: LinearHead,
}

impl LinearClassifier {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, head: LinearHead) -> Result<Self> {
        if head.input_dimension() != embedder.dimension() {
            return Err(BreedSearchError::DimensionMismatch {
                expected: embedder.dimension(),
                actual: head.input_dimension(),
            });
        }
        Ok(Self { embedder, head })
    }
}

impl Classifier for LinearClassifier {
    fn num_classes(&self) -> usize {
        self.head.num_classes()
    }

    fn logits(&self, image: &DynamicImage) -> Result<Vec<f32>> {
        let embedding = self.embedder.embed(image)?;
        Ok(self
            .head
            .apply(ArrayView1::from(embedding.as_slice()))
            .to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HistogramEmbedder;
    use approx::assert_relative_eq;
    use ndarray::array;
    use tempfile::TempDir;

    #[test]
    fn test_apply() {
        let head = LinearHead::new(array![[1.0, 0.0], [0.5, 2.0]], array![0.0, -1.0]).unwrap();
        let out = head.apply(ArrayView1::from(&[2.0, 3.0][..]));
        assert_relative_eq!(out[0], 2.0);
        assert_relative_eq!(out[1], 6.0);
    }

    #[test]
    fn test_load_validates_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("head.json");

        std::fs::write(&path, r#"{"weights": [[1.0, 2.0], [3.0]], "bias": [0.0, 0.0]}"#).unwrap();
        assert!(matches!(LinearHead::load(&path), Err(BreedSearchError::ModelError(_))));

        std::fs::write(&path, r#"{"weights": [[1.0, 2.0]], "bias": [0.0, 0.0]}"#).unwrap();
        assert!(matches!(LinearHead::load(&path), Err(BreedSearchError::ModelError(_))));

        std::fs::write(&path, r#"{"weights": [[1.0, 2.0]], "bias": [0.5]}"#).unwrap();
        let head = LinearHead::load(&path).unwrap();
        assert_eq!(head.num_classes(), 1);
        assert_eq!(head.input_dimension(), 2);
    }

    #[test]
    fn test_classifier_checks_embedding_dimension() {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HistogramEmbedder::new(2).unwrap());
        let head = LinearHead::new(Array2::zeros((3, 4)), Array1::zeros(3)).unwrap();
        assert!(matches!(
            LinearClassifier::new(embedder.clone(), head),
            Err(BreedSearchError::DimensionMismatch { expected: 8, actual: 4 })
        ));

        let head = LinearHead::new(Array2::ones((3, 8)), array![0.0, 1.0, 2.0]).unwrap();
        let classifier = LinearClassifier::new(embedder, head).unwrap();
        let img = DynamicImage::new_rgb8(10, 10);
        let logits = classifier.logits(&img).unwrap();
        assert_eq!(logits.len(), 3);
        // histogram sums to one
        assert_relative_eq!(logits[2], 3.0, epsilon = 1e-5);
    }
}
