//! Nearest-neighbour image lookup over the persisted index.

use crate::config::AppConfig;
use crate::corpus::{load_rgb, CorpusImage};
use crate::error::{BreedSearchError, Result};
use crate::forest::ForestIndex;
use crate::grid;
use crate::index::Index;
use crate::model::EmbeddingProvider;
use crate::persistence::{self, ItemCatalog, LoadedIndex};
use crate::report::BatchReport;
use crate::vector::Vector;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarImage {
    pub id: usize,
    pub name: String,
    pub distance: f32,
}

#[derive(Debug, Clone)]
pub struct SimilarResult {
    pub query: String,
    pub neighbours: Vec<SimilarImage>,
    pub grid_path: PathBuf,
    pub render_report: BatchReport,
}

pub struct SimilarImageFinder {
    index: ForestIndex,
    catalog: ItemCatalog,
    embedder: Arc<dyn EmbeddingProvider>,
    images_dir: PathBuf,
    similar_dir: PathBuf,
}

impl SimilarImageFinder {
    pub fn new(
        loaded: LoadedIndex,
        embedder: Arc<dyn EmbeddingProvider>,
        images_dir: impl Into<PathBuf>,
        similar_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let LoadedIndex { index, catalog } = loaded;
        if embedder.dimension() != index.dimension() {
            return Err(BreedSearchError::DimensionMismatch {
                expected: index.dimension(),
                actual: embedder.dimension(),
            });
        }
        Ok(Self {
            index,
            catalog,
            embedder,
            images_dir: images_dir.into(),
            similar_dir: similar_dir.into(),
        })
    }

    /// Load index and catalog from `config.index_path`.
    pub fn from_config(config: &AppConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let loaded = persistence::load_bundle(&config.index_path, config.dimension, config.metric)?;
        log::info!(
            "Loaded index {} with {} images",
            config.index_path.display(),
            loaded.index.len()
        );
        Self::new(loaded, embedder, &config.images_dir, &config.similar_dir)
    }

    pub fn index(&self) -> &ForestIndex {
        &self.index
    }

    pub fn catalog(&self) -> &ItemCatalog {
        &self.catalog
    }

    fn resolve(&self, hits: Vec<(usize, f32)>, exclude: Option<usize>, k: usize) -> Vec<SimilarImage> {
        hits.into_iter()
            .filter(|(id, _)| Some(*id) != exclude)
            .filter_map(|(id, distance)| {
                self.catalog.name(id).map(|name| SimilarImage {
                    id,
                    name: name.to_string(),
                    distance,
                })
            })
            .take(k)
            .collect()
    }

    /// Neighbours of an arbitrary vector.
    pub fn nearest(&self, vector: &Vector, k: usize) -> Result<Vec<SimilarImage>> {
        Ok(self.resolve(self.index.search(vector, k)?, None, k))
    }

    /// Neighbours of an indexed image, using its stored embedding.
    /// The image itself is not part of the result.
    pub fn similar_to_item(&self, name: &str, k: usize) -> Result<Vec<SimilarImage>> {
        let id = self
            .catalog
            .id_of(name)
            .ok_or_else(|| BreedSearchError::UnknownImage {
                name: name.to_string(),
            })?;
        let vector = self
            .index
            .get_vector(id)
            .ok_or_else(|| BreedSearchError::UnknownImage {
                name: name.to_string(),
            })?;
        let hits = self.index.search(vector, k.saturating_add(1))?;
        Ok(self.resolve(hits, Some(id), k))
    }

    /// Neighbours of any image file, embedded on the fly.
    pub fn similar_to_image(&self, path: impl AsRef<Path>, k: usize) -> Result<Vec<SimilarImage>> {
        let image = load_rgb(path)?;
        let vector = self.embedder.embed(&image)?;
        self.nearest(&vector, k)
    }

    pub fn grid_path_for(&self, name: &str) -> PathBuf {
        self.similar_dir
            .join(format!("similar_{}.png", grid::slug(name)))
    }

    /// Resolve `image` as a corpus filename first, then as a file path, and
    /// render the query beside its neighbours.
    pub fn render(&self, image: &str, k: usize) -> Result<SimilarResult> {
        let (query, neighbours) = if self.catalog.id_of(image).is_some() {
            let query = CorpusImage {
                name: image.to_string(),
                path: self.images_dir.join(image),
            };
            (query, self.similar_to_item(image, k)?)
        } else {
            let path = PathBuf::from(image);
            if !path.is_file() {
                return Err(BreedSearchError::UnknownImage {
                    name: image.to_string(),
                });
            }
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| image.to_string());
            let neighbours = self.similar_to_image(&path, k)?;
            (CorpusImage { name, path }, neighbours)
        };

        let tiles: Vec<CorpusImage> = neighbours
            .iter()
            .map(|n| CorpusImage {
                name: n.name.clone(),
                path: self.images_dir.join(&n.name),
            })
            .collect();
        let grid_path = self.grid_path_for(&query.name);
        let render_report = grid::render_grid(&query, &tiles, &grid_path)?;
        log::info!(
            "Saved {} similar images for {} to {}",
            neighbours.len(),
            query.name,
            grid_path.display()
        );

        Ok(SimilarResult {
            query: query.name,
            neighbours,
            grid_path,
            render_report,
        })
    }
}
