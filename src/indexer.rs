//! Builds the forest index from an image corpus.

use crate::config::AppConfig;
use crate::corpus::Corpus;
use crate::distance::DistanceMetric;
use crate::error::{BreedSearchError, Result};
use crate::forest::{ForestIndex, ForestParams};
use crate::index::Index;
use crate::model::EmbeddingProvider;
use crate::persistence::{self, ItemCatalog};
use crate::report::BatchReport;
use std::path::Path;
use std::sync::Arc;

/// The result of indexing a corpus.
#[derive(Debug)]
pub struct IndexBuild {
    pub index: ForestIndex,
    pub catalog: ItemCatalog,
    pub report: BatchReport,
}

pub struct Indexer {
    embedder: Arc<dyn EmbeddingProvider>,
    metric: DistanceMetric,
    n_trees: usize,
    params: ForestParams,
    progress_interval: usize,
}

impl Indexer {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            metric: DistanceMetric::Angular,
            n_trees: 10,
            params: ForestParams::default(),
            progress_interval: 100,
        }
    }

    /// Configure from `config`; the embedder must produce `config.dimension` values.
    pub fn from_config(config: &AppConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        if embedder.dimension() != config.dimension {
            return Err(BreedSearchError::DimensionMismatch {
                expected: config.dimension,
                actual: embedder.dimension(),
            });
        }
        Ok(Self::new(embedder)
            .with_metric(config.metric)
            .with_trees(config.n_trees)
            .with_params(config.forest.clone())
            .with_progress_interval(config.progress_interval))
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    pub fn with_params(mut self, params: ForestParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    /// Embed every decodable image and build the forest. Nothing is written.
    ///
    /// Item IDs are dense over successfully embedded images, in corpus order.
    pub fn build(&self, corpus: &Corpus) -> Result<IndexBuild> {
        let dimension = self.embedder.dimension();
        let mut index = ForestIndex::with_params(dimension, self.metric, self.params.clone());
        let mut catalog = ItemCatalog::new(dimension, self.metric);
        let mut report = BatchReport::new();

        let images = corpus.images()?;
        log::info!(
            "Indexing {} files from {}",
            images.len(),
            corpus.root().display()
        );

        for image in &images {
            let decoded = match image.load() {
                Ok(img) => img,
                Err(e) => {
                    report.skipped(&image.name, e);
                    continue;
                }
            };
            let embedding = match self.embedder.embed(&decoded) {
                Ok(v) => v,
                Err(e) => {
                    report.skipped(&image.name, e);
                    continue;
                }
            };

            let id = catalog.len();
            match index.add(id, embedding) {
                Ok(()) => {}
                Err(e @ BreedSearchError::InvalidVector { .. }) => {
                    report.skipped(&image.name, e);
                    continue;
                }
                Err(e) => return Err(e),
            }
            catalog.push(image.name.clone());
            report.processed(id, image.name.clone());

            if catalog.len() % self.progress_interval == 0 {
                log::info!("Processed {} images", catalog.len());
            }
        }

        index.build(self.n_trees)?;
        catalog.n_trees = index.n_trees();
        log::info!(
            "Built index over {} images ({} skipped, {} trees)",
            report.processed_count(),
            report.skipped_count(),
            self.n_trees
        );

        Ok(IndexBuild {
            index,
            catalog,
            report,
        })
    }

    /// Build and persist index and catalog to `index_path`.
    ///
    /// The files are only written after the whole build succeeds.
    pub fn build_and_save(&self, corpus: &Corpus, index_path: &Path) -> Result<IndexBuild> {
        let build = self.build(corpus)?;
        persistence::save_bundle(&build.index, &build.catalog, index_path)?;
        log::info!(
            "Saved index to {} and catalog to {}",
            index_path.display(),
            ItemCatalog::path_for(index_path).display()
        );
        Ok(build)
    }
}
