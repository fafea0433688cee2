//! Colour histogram embedder.
//!
//! Quantizes each RGB channel of the preprocessed image into `bins` buckets and
//! returns the normalized joint histogram, `bins³` values that sum to one.
//! With the default 8 bins this is a 512-dimensional embedding, which needs no
//! model file and is fully deterministic.

use super::{preprocess, EmbeddingProvider};
use crate::error::{BreedSearchError, Result};
use crate::vector::Vector;
use image::DynamicImage;

#[derive(Debug, Clone)]
pub struct HistogramEmbedder {
    bins: usize,
}

impl HistogramEmbedder {
    pub fn new(bins: usize) -> Result<Self> {
        if bins == 0 || bins > 256 {
            return Err(BreedSearchError::ConfigError(format!(
                "histogram bins must be in 1..=256, got {}",
                bins
            )));
        }
        Ok(Self { bins })
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    fn bucket(&self, value: u8) -> usize {
        value as usize * self.bins / 256
    }
}

impl Default for HistogramEmbedder {
    fn default() -> Self {
        Self { bins: 8 }
    }
}

impl EmbeddingProvider for HistogramEmbedder {
    fn dimension(&self) -> usize {
        self.bins.pow(3)
    }

    fn embed(&self, image: &DynamicImage) -> Result<Vector> {
        let rgb = preprocess(image);
        let mut counts = vec![0.0f32; self.dimension()];
        for pixel in rgb.pixels() {
            let [r, g, b] = pixel.0;
            let at = (self.bucket(r) * self.bins + self.bucket(g)) * self.bins + self.bucket(b);
            counts[at] += 1.0;
        }

        let total = rgb.pixels().len() as f32;
        counts.iter_mut().for_each(|c| *c /= total);
        Ok(Vector::new(counts))
    }
}
