//! Error types for breed search

use crate::distance::DistanceMetric;
use thiserror::Error;

/// Result type alias for breedsearch operations
pub type Result<T> = std::result::Result<T, BreedSearchError>;

/// Error types that can occur while indexing, searching or predicting
#[derive(Error, Debug)]
pub enum BreedSearchError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Metric mismatch: expected {expected:?}, index was built with {actual:?}")]
    MetricMismatch {
        expected: DistanceMetric,
        actual: DistanceMetric,
    },

    #[error("Invalid vector: {reason}")]
    InvalidVector { reason: String },

    #[error("Index has not been built yet")]
    IndexNotBuilt,

    #[error("Index has already been built")]
    IndexAlreadyBuilt,

    #[error("Corrupt index file: {0}")]
    CorruptIndex(String),

    #[error("Catalog mismatch: catalog lists {catalog} items, index holds {index}")]
    CatalogMismatch { catalog: usize, index: usize },

    #[error("Catalog was written for another index (catalog checksum {catalog:?}, index checksum {index:#010x})")]
    StaleCatalog { catalog: Option<u32>, index: u32 },

    #[error("Unknown image: {name}")]
    UnknownImage { name: String },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Model error: {0}")]
    ModelError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}
