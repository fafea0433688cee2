//! Application configuration.
//!
//! Every field has a default matching the conventional on-disk layout, so an
//! empty JSON object (or no config file at all) is a valid configuration.

use crate::distance::DistanceMetric;
use crate::error::{BreedSearchError, Result};
use crate::forest::ForestParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackendKind {
    /// Colour histogram embeddings, no classifier
    Histogram,
    /// Histogram embeddings with a linear head loaded from JSON
    Linear,
    /// Pretrained ResNet-18 (requires the `torch` feature)
    Torch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub backend: ModelBackendKind,
    pub histogram_bins: usize,
    /// Linear head JSON for the `linear` backend.
    pub head_path: Option<PathBuf>,
    /// VarStore weights for the `torch` backend.
    pub weights_path: Option<PathBuf>,
    /// Category names, one per line, in class-index order.
    pub categories_path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: ModelBackendKind::Histogram,
            histogram_bins: 8,
            head_path: None,
            weights_path: None,
            categories_path: PathBuf::from("model/categories.txt"),
        }
    }
}

/// Query-time knobs for breed and similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Images kept from a breed match.
    pub max_results: usize,
    /// Fuzzy score a suggestion must exceed to be offered.
    pub suggestion_threshold: u8,
    /// Neighbours shown in a similarity grid.
    pub similar_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 5,
            suggestion_threshold: 80,
            similar_k: 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub images_dir: PathBuf,
    pub index_path: PathBuf,
    pub label_map_path: PathBuf,
    /// Where breed search strips are written.
    pub grid_dir: PathBuf,
    /// Where similarity grids are written.
    pub similar_dir: PathBuf,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub n_trees: usize,
    pub forest: ForestParams,
    /// Log indexing progress every this many images.
    pub progress_interval: usize,
    pub search: SearchConfig,
    pub model: ModelConfig,
    pub addr: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from("PetImages/Dog"),
            index_path: PathBuf::from("indexes/dog_index.ann"),
            label_map_path: PathBuf::from("model/breed_predictions.json"),
            grid_dir: PathBuf::from("ImageDumpDogSimilarPredictions"),
            similar_dir: PathBuf::from("ImageDumpDog"),
            dimension: 512,
            metric: DistanceMetric::Angular,
            n_trees: 10,
            forest: ForestParams::default(),
            progress_interval: 100,
            search: SearchConfig::default(),
            model: ModelConfig::default(),
            addr: "127.0.0.1:8000".to_string(),
        }
    }
}

impl AppConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: AppConfig = serde_json::from_str(&text).map_err(|e| {
            BreedSearchError::ConfigError(format!("{}: {}", path.as_ref().display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(BreedSearchError::ConfigError(msg.to_string()));
        if self.dimension == 0 {
            return fail("dimension must be positive");
        }
        if self.n_trees == 0 {
            return fail("n_trees must be at least 1");
        }
        if self.forest.leaf_size == 0 {
            return fail("forest.leaf_size must be at least 1");
        }
        if self.progress_interval == 0 {
            return fail("progress_interval must be at least 1");
        }
        if self.search.max_results == 0 {
            return fail("search.max_results must be at least 1");
        }
        if self.search.suggestion_threshold > 100 {
            return fail("search.suggestion_threshold must be at most 100");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_follow_layout() {
        let config = AppConfig::default();
        assert_eq!(config.images_dir, PathBuf::from("PetImages/Dog"));
        assert_eq!(config.index_path, PathBuf::from("indexes/dog_index.ann"));
        assert_eq!(config.n_trees, 10);
        assert_eq!(config.dimension, 512);
        assert_eq!(config.search.suggestion_threshold, 80);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"n_trees": 25, "forest": {"seed": 7}, "model": {"backend": "linear", "head_path": "head.json"}}"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.n_trees, 25);
        assert_eq!(config.forest.seed, 7);
        assert_eq!(config.forest.leaf_size, ForestParams::default().leaf_size);
        assert_eq!(config.model.backend, ModelBackendKind::Linear);
        assert_eq!(config.model.histogram_bins, 8);
        assert_eq!(config.label_map_path, PathBuf::from("model/breed_predictions.json"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"n_trees": 0}"#).unwrap();
        assert!(matches!(AppConfig::load(&path), Err(BreedSearchError::ConfigError(_))));

        std::fs::write(&path, r#"{"metric": "manhattan"}"#).unwrap();
        assert!(matches!(AppConfig::load(&path), Err(BreedSearchError::ConfigError(_))));
    }
}
