//! HTTP route handlers for the breed search API.

use crate::error::BreedSearchError;
use crate::index::Index;
use crate::metrics::{MetricsSnapshot, QueryKind};
use crate::server::AppState;
use crate::similar::SimilarImage;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

// --- Request/Response types ---

#[derive(Deserialize)]
pub struct PredictParams {
    pub image_path: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub breed: Option<String>,
}

#[derive(Deserialize)]
pub struct SimilarParams {
    pub image: Option<String>,
    pub k: Option<usize>,
}

#[derive(Serialize)]
pub struct PredictResponse {
    pub breed: String,
}

#[derive(Serialize)]
pub struct SimilarResponse {
    pub query: String,
    pub neighbours: Vec<SimilarImage>,
    pub grid_path: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub indexed_images: usize,
    pub known_breeds: usize,
    pub predictor: bool,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            detail: detail.into(),
            suggestion: None,
        }),
    )
}

fn join_error(e: tokio::task::JoinError) -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Worker failed: {}", e))
}

fn record(state: &AppState, kind: QueryKind, start: Instant, ok: bool) {
    if let Ok(mut metrics) = state.metrics.write() {
        metrics.record_query(kind, start.elapsed());
        if !ok {
            metrics.record_error();
        }
    }
}

// --- Router ---

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/predict_breed", get(predict_breed))
        .route("/search", get(search_by_breed))
        .route("/similar", get(similar))
        .route("/metrics", get(get_metrics))
        .with_state(state)
}

// --- Handlers ---

async fn predict_breed(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PredictParams>,
) -> Result<Json<PredictResponse>, ApiError> {
    let predictor = state.predictor.clone().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Breed prediction is not configured",
        )
    })?;
    let image_path = params.image_path.unwrap_or_default();

    let start = Instant::now();
    let result = tokio::task::spawn_blocking(move || predictor.predict_path(&image_path))
        .await
        .map_err(join_error)?;
    record(&state, QueryKind::Predict, start, result.is_ok());

    let breed = result.map_err(|e| {
        api_error(
            StatusCode::BAD_REQUEST,
            format!("Error processing image: {}", e),
        )
    })?;
    Ok(Json(PredictResponse { breed }))
}

async fn search_by_breed(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Response, ApiError> {
    let breed = params.breed.unwrap_or_default();
    if breed.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Breed name is required"));
    }

    let start = Instant::now();
    let searcher = state.searcher.clone();
    let query = breed.clone();
    let result = tokio::task::spawn_blocking(move || {
        let found = searcher.search(&query)?;
        let png = match &found.grid_path {
            Some(path) => Some(std::fs::read(path)?),
            None => None,
        };
        Ok::<_, BreedSearchError>((found, png))
    })
    .await
    .map_err(join_error)?;
    record(&state, QueryKind::BreedSearch, start, result.is_ok());

    let (found, png) = result.map_err(|e| match e {
        BreedSearchError::InvalidQuery(msg) => api_error(StatusCode::BAD_REQUEST, msg),
        other => api_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    })?;

    match png {
        Some(bytes) if !found.matches.is_empty() => {
            Ok(([(header::CONTENT_TYPE, "image/png")], bytes).into_response())
        }
        _ => {
            if let Ok(mut metrics) = state.metrics.write() {
                metrics.record_breed_miss();
            }
            Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    detail: format!("No similar images found for breed: {}", breed),
                    suggestion: found.suggestion.map(|s| s.breed),
                }),
            ))
        }
    }
}

async fn similar(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SimilarParams>,
) -> Result<Json<SimilarResponse>, ApiError> {
    let image = params.image.unwrap_or_default();
    if image.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Image name is required"));
    }
    let k = params.k.unwrap_or(state.similar_k);

    let start = Instant::now();
    let finder = state.finder.clone();
    let result = tokio::task::spawn_blocking(move || finder.render(&image, k))
        .await
        .map_err(join_error)?;
    record(&state, QueryKind::Similar, start, result.is_ok());

    let result = result.map_err(|e| match e {
        BreedSearchError::UnknownImage { .. } => api_error(StatusCode::NOT_FOUND, e.to_string()),
        other => api_error(StatusCode::BAD_REQUEST, other.to_string()),
    })?;
    Ok(Json(SimilarResponse {
        query: result.query,
        neighbours: result.neighbours,
        grid_path: result.grid_path.display().to_string(),
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        indexed_images: state.finder.index().len(),
        known_breeds: state.searcher.known_breeds().len(),
        predictor: state.predictor.is_some(),
    })
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Result<Json<MetricsSnapshot>, ApiError> {
    let metrics = state
        .metrics
        .read()
        .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Lock poisoned"))?;
    Ok(Json(metrics.snapshot()))
}
