//! HTTP API server for breed prediction and image search.

pub mod routes;

use crate::config::AppConfig;
use crate::error::Result;
use crate::index::Index;
use crate::metrics::MetricsCollector;
use crate::model::{Categories, ModelBackend};
use crate::predictor::Predictor;
use crate::searcher::BreedSearcher;
use crate::similar::SimilarImageFinder;
use std::sync::{Arc, RwLock};

/// Shared application state for the HTTP server.
///
/// Every component is loaded once at startup and never mutated afterwards;
/// only the metrics are written by handlers.
pub struct AppState {
    /// Absent when the configured model has no classification head.
    pub predictor: Option<Arc<Predictor>>,
    pub searcher: Arc<BreedSearcher>,
    pub finder: Arc<SimilarImageFinder>,
    pub similar_k: usize,
    pub metrics: RwLock<MetricsCollector>,
}

impl AppState {
    pub fn new(
        predictor: Option<Arc<Predictor>>,
        searcher: Arc<BreedSearcher>,
        finder: Arc<SimilarImageFinder>,
        similar_k: usize,
    ) -> Self {
        Self {
            predictor,
            searcher,
            finder,
            similar_k,
            metrics: RwLock::new(MetricsCollector::new()),
        }
    }

    /// Load the model, index, catalog and label map named by `config`.
    /// Any missing or mismatched file is fatal.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let backend = ModelBackend::from_config(&config.model)?;
        let predictor = match &backend.classifier {
            Some(classifier) => {
                let categories = Categories::load(&config.model.categories_path)?;
                Some(Arc::new(Predictor::new(classifier.clone(), categories)?))
            }
            None => {
                log::warn!("Model backend has no classifier; /predict_breed is disabled");
                None
            }
        };
        let searcher = BreedSearcher::from_config(config)?;
        let finder = SimilarImageFinder::from_config(config, backend.embedder.clone())?;

        Ok(Self::new(
            predictor,
            Arc::new(searcher),
            Arc::new(finder),
            config.search.similar_k,
        ))
    }
}

/// Start the HTTP server on `config.addr`.
pub async fn start(config: AppConfig) -> anyhow::Result<()> {
    let state = tokio::task::spawn_blocking(move || {
        AppState::from_config(&config).map(|state| (state, config.addr))
    })
    .await??;
    let (state, addr) = state;
    log::info!(
        "Serving {} indexed images, {} known breeds",
        state.finder.index().len(),
        state.searcher.known_breeds().len()
    );

    let app = routes::create_router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("Server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
