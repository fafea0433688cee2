//! Persistence layer: framed index file, item catalog, and atomic replacement.

pub mod atomic;
pub mod catalog;
pub mod index_file;
pub mod serialization;

use crate::distance::DistanceMetric;
use crate::error::{BreedSearchError, Result};
use crate::forest::ForestIndex;
use crate::index::Index;
use std::path::Path;

pub use catalog::ItemCatalog;

/// A loaded index together with the catalog that names its items.
#[derive(Debug)]
pub struct LoadedIndex {
    pub index: ForestIndex,
    pub catalog: ItemCatalog,
}

/// Persist an index and its catalog.
///
/// Both files are fully written to temporaries before either is renamed into
/// place; a failure while writing leaves the previous files untouched. The
/// catalog records the index payload checksum, so a catalog left behind by a
/// failed rename is rejected on load.
pub fn save_bundle(index: &ForestIndex, catalog: &ItemCatalog, index_path: &Path) -> Result<()> {
    catalog.verify_against(index)?;
    let (staged_index, checksum) = index_file::stage_index(index, index_path)?;
    let mut catalog = catalog.clone();
    catalog.index_checksum = Some(checksum);
    let staged_catalog = catalog.stage(&ItemCatalog::path_for(index_path))?;
    staged_index.commit()?;
    staged_catalog.commit()
}

/// Load an index and its catalog, rejecting any mismatch between them.
pub fn load_bundle(
    index_path: &Path,
    dimension: usize,
    metric: DistanceMetric,
) -> Result<LoadedIndex> {
    let (index, header) = index_file::load_with_header(index_path, dimension, metric)?;
    let catalog_path = ItemCatalog::path_for(index_path);
    let catalog = ItemCatalog::load(&catalog_path).map_err(|e| match e {
        BreedSearchError::IoError(io) => BreedSearchError::IoError(std::io::Error::new(
            io.kind(),
            format!("item catalog {}: {}", catalog_path.display(), io),
        )),
        other => other,
    })?;
    catalog.verify_against(&index)?;
    catalog.verify_checksum(header.checksum)?;
    log::debug!(
        "Loaded index {} ({} items, {} trees)",
        index_path.display(),
        index.len(),
        index.n_trees()
    );
    Ok(LoadedIndex { index, catalog })
}
