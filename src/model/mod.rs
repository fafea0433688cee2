//! Model capabilities: image embeddings and class logits.
//!
//! The rest of the crate only sees the [`EmbeddingProvider`] and [`Classifier`]
//! traits. Backends are constructed once from [`ModelConfig`] and shared
//! behind `Arc`.

pub mod histogram;
pub mod linear;
#[cfg(feature = "torch")]
pub mod torch;

use crate::config::{ModelBackendKind, ModelConfig};
use crate::error::{BreedSearchError, Result};
use crate::vector::Vector;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use std::path::Path;
use std::sync::Arc;

pub use histogram::HistogramEmbedder;
pub use linear::{LinearClassifier, LinearHead};

/// Side length of the square model input.
pub const INPUT_SIZE: u32 = 224;

/// Produces a fixed-length embedding for an image.
pub trait EmbeddingProvider: Send + Sync {
    /// Length of every embedding this provider returns.
    fn dimension(&self) -> usize;

    fn embed(&self, image: &DynamicImage) -> Result<Vector>;
}

/// Produces one score per category for an image.
pub trait Classifier: Send + Sync {
    fn num_classes(&self) -> usize;

    fn logits(&self, image: &DynamicImage) -> Result<Vec<f32>>;
}

/// Resize to the model input shape and convert to RGB.
pub fn preprocess(image: &DynamicImage) -> RgbImage {
    image
        .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Triangle)
        .to_rgb8()
}

/// Channel-major `[3, H, W]` floats in `[0, 1]`.
pub fn to_chw(rgb: &RgbImage) -> Vec<f32> {
    let (width, height) = rgb.dimensions();
    let plane = (width * height) as usize;
    let mut data = vec![0.0f32; plane * 3];
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let at = (y * width + x) as usize;
        for c in 0..3 {
            data[c * plane + at] = pixel[c] as f32 / 255.0;
        }
    }
    data
}

/// Ordered category names; position is the class index.
#[derive(Debug, Clone, PartialEq)]
pub struct Categories {
    names: Vec<String>,
}

impl Categories {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Read one category per line. Blank lines are ignored.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let names: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            return Err(BreedSearchError::ModelError(format!(
                "no categories in {}",
                path.as_ref().display()
            )));
        }
        Ok(Self { names })
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// The model components selected by configuration.
#[derive(Clone)]
pub struct ModelBackend {
    pub embedder: Arc<dyn EmbeddingProvider>,
    /// Absent for embedders without a classification head.
    pub classifier: Option<Arc<dyn Classifier>>,
}

impl std::fmt::Debug for ModelBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBackend")
            .field("dimension", &self.embedder.dimension())
            .field(
                "num_classes",
                &self.classifier.as_ref().map(|c| c.num_classes()),
            )
            .finish()
    }
}

impl ModelBackend {
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        match config.backend {
            ModelBackendKind::Histogram => Ok(Self {
                embedder: Arc::new(HistogramEmbedder::new(config.histogram_bins)?),
                classifier: None,
            }),
            ModelBackendKind::Linear => {
                let head_path = config.head_path.as_ref().ok_or_else(|| {
                    BreedSearchError::ConfigError(
                        "linear backend needs model.head_path".to_string(),
                    )
                })?;
                let embedder: Arc<dyn EmbeddingProvider> =
                    Arc::new(HistogramEmbedder::new(config.histogram_bins)?);
                let head = LinearHead::load(head_path)?;
                let classifier = LinearClassifier::new(embedder.clone(), head)?;
                Ok(Self {
                    embedder,
                    classifier: Some(Arc::new(classifier)),
                })
            }
            ModelBackendKind::Torch => Self::torch(config),
        }
    }

    #[cfg(feature = "torch")]
    fn torch(config: &ModelConfig) -> Result<Self> {
        let weights = config.weights_path.as_ref().ok_or_else(|| {
            BreedSearchError::ConfigError("torch backend needs model.weights_path".to_string())
        })?;
        let net = Arc::new(torch::ResNet18::load(weights)?);
        Ok(Self {
            embedder: net.clone(),
            classifier: Some(net),
        })
    }

    #[cfg(not(feature = "torch"))]
    fn torch(_config: &ModelConfig) -> Result<Self> {
        Err(BreedSearchError::ConfigError(
            "torch backend requested but breedsearch was built without the `torch` feature"
                .to_string(),
        ))
    }

    /// The classifier, or an error for embedding-only backends.
    pub fn require_classifier(&self) -> Result<Arc<dyn Classifier>> {
        self.classifier.clone().ok_or_else(|| {
            BreedSearchError::ConfigError(
                "configured model backend has no classification head".to_string(),
            )
        })
    }
}
