//! Item catalog: the explicit item ID → filename mapping stored beside the index.

use crate::distance::DistanceMetric;
use crate::error::{BreedSearchError, Result};
use crate::index::Index;
use crate::persistence::atomic::StagedFile;
use crate::persistence::serialization;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Ordered filenames where position is the item ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemCatalog {
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub n_trees: usize,
    /// Payload checksum of the index file this catalog was saved with.
    #[serde(default)]
    pub index_checksum: Option<u32>,
    items: Vec<String>,
    #[serde(skip)]
    lookup: HashMap<String, usize>,
}

impl ItemCatalog {
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            n_trees: 0,
            index_checksum: None,
            items: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    /// Where the catalog for the index at `index_path` lives.
    pub fn path_for(index_path: impl AsRef<Path>) -> PathBuf {
        index_path.as_ref().with_extension("items.json")
    }

    /// Append a filename and return its item ID.
    pub fn push(&mut self, name: impl Into<String>) -> usize {
        let name = name.into();
        let id = self.items.len();
        self.lookup.entry(name.clone()).or_insert(id);
        self.items.push(name);
        id
    }

    pub fn name(&self, id: usize) -> Option<&str> {
        self.items.get(id).map(String::as_str)
    }

    pub fn id_of(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Check that the catalog describes `index`.
    pub fn verify_against<I: Index>(&self, index: &I) -> Result<()> {
        if self.dimension != index.dimension() {
            return Err(BreedSearchError::DimensionMismatch {
                expected: index.dimension(),
                actual: self.dimension,
            });
        }
        if self.metric != index.metric() {
            return Err(BreedSearchError::MetricMismatch {
                expected: index.metric(),
                actual: self.metric,
            });
        }
        if self.items.len() != index.len() {
            return Err(BreedSearchError::CatalogMismatch {
                catalog: self.items.len(),
                index: index.len(),
            });
        }
        Ok(())
    }

    /// Check that the catalog was saved together with the index file whose
    /// payload checksum is `checksum`.
    pub fn verify_checksum(&self, checksum: u32) -> Result<()> {
        if self.index_checksum != Some(checksum) {
            return Err(BreedSearchError::StaleCatalog {
                catalog: self.index_checksum,
                index: checksum,
            });
        }
        Ok(())
    }

    pub(crate) fn stage(&self, path: &Path) -> Result<StagedFile> {
        StagedFile::stage(path, &serialization::to_json(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.stage(path.as_ref())?.commit()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let mut catalog: ItemCatalog = serialization::from_json(&bytes)?;
        catalog.lookup = HashMap::with_capacity(catalog.items.len());
        for (id, name) in catalog.items.iter().enumerate() {
            catalog.lookup.entry(name.clone()).or_insert(id);
        }
        Ok(catalog)
    }
}
