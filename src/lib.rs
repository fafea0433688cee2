//! # breedsearch
//!
//! Dog breed prediction and similar-image search over an approximate nearest
//! neighbor index.
//!
//! This library provides:
//! - Embedding vectors and the angular distance metric
//! - A random projection forest index with an exact flat baseline
//! - A framed on-disk index format plus an item catalog
//! - Corpus indexing, breed label maps and breed search with fuzzy suggestions
//! - Similar-image lookup and result grids
//! - An HTTP API over all of the above
//!
//! ## Example
//!
//! ```rust
//! use breedsearch::{DistanceMetric, ForestIndex, Index, Vector};
//!
//! let mut index = ForestIndex::new(3, DistanceMetric::Angular);
//! index.add(0, Vector::new(vec![1.0, 0.0, 0.0])).unwrap();
//! index.add(1, Vector::new(vec![0.0, 1.0, 0.0])).unwrap();
//! index.build(10).unwrap();
//!
//! let nearest = index.query(&Vector::new(vec![0.9, 0.1, 0.0]), 1).unwrap();
//! assert_eq!(nearest, vec![0]);
//! ```

pub mod config;
pub mod corpus;
pub mod distance;
pub mod error;
pub mod flat_index;
pub mod forest;
pub mod fuzzy;
pub mod grid;
pub mod index;
pub mod indexer;
pub mod label_map;
pub mod metrics;
pub mod model;
pub mod persistence;
pub mod predictor;
pub mod report;
pub mod searcher;
pub mod server;
pub mod similar;
pub mod vector;

pub use config::AppConfig;
pub use corpus::{Corpus, CorpusImage};
pub use distance::DistanceMetric;
pub use error::{BreedSearchError, Result};
pub use flat_index::FlatIndex;
pub use forest::{ForestIndex, ForestParams};
pub use index::Index;
pub use indexer::{IndexBuild, Indexer};
pub use label_map::BreedLabelMap;
pub use predictor::Predictor;
pub use report::{BatchReport, ItemOutcome};
pub use searcher::{BreedSearch, BreedSearcher, Suggestion};
pub use similar::{SimilarImage, SimilarImageFinder};
pub use vector::Vector;

/// Initialize logging from `RUST_LOG`, defaulting to `info`.
pub fn init_logging() {
    let env = env_logger::Env::default()
        .default_filter_or("info")
        .default_write_style_or("auto");

    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .format_module_path(false)
        .format_target(false)
        .try_init();
}
