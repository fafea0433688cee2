//! HTTP API tests driven through the router without binding a socket.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use breedsearch::model::{EmbeddingProvider, HistogramEmbedder};
use breedsearch::persistence;
use breedsearch::server::routes::create_router;
use breedsearch::server::AppState;
use breedsearch::{
    BreedLabelMap, BreedSearcher, Corpus, DistanceMetric, ForestParams, Indexer, SimilarImageFinder,
};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct Fixture {
    _dir: TempDir,
    images: PathBuf,
    app: Router,
}

fn fixture(with_predictor: bool) -> Fixture {
    let dir = TempDir::new().unwrap();
    let images = common::write_corpus(dir.path());
    let corpus = Corpus::open(&images).unwrap();

    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HistogramEmbedder::default());
    let index_path = dir.path().join("indexes").join("dog_index.ann");
    Indexer::new(embedder.clone())
        .with_trees(2)
        .with_params(ForestParams::new(8, 5))
        .build_and_save(&corpus, &index_path)
        .unwrap();
    let loaded = persistence::load_bundle(&index_path, 512, DistanceMetric::Angular).unwrap();
    let finder = SimilarImageFinder::new(loaded, embedder, &images, dir.path().join("similar")).unwrap();

    let predictor = common::predictor();
    let (map, _) = BreedLabelMap::generate(&corpus, &predictor).unwrap();
    let searcher = BreedSearcher::new(&map, &images, dir.path().join("grids"));

    let state = AppState::new(
        with_predictor.then(|| Arc::new(predictor)),
        Arc::new(searcher),
        Arc::new(finder),
        24,
    );
    Fixture {
        _dir: dir,
        images,
        app: create_router(Arc::new(state)),
    }
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, body.to_vec())
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, _, body) = get(app, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health() {
    let f = fixture(true);
    let (status, body) = get_json(&f.app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["indexed_images"], 3);
    assert_eq!(body["known_breeds"], 3);
    assert_eq!(body["predictor"], true);
}

#[tokio::test]
async fn test_search_returns_png_strip() {
    let f = fixture(true);
    let (status, content_type, body) = get(&f.app, "/search?breed=poodle").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/png"));
    assert_eq!(&body[..8], b"\x89PNG\r\n\x1a\n");

    let strip = image::load_from_memory(&body).unwrap();
    assert_eq!((strip.width(), strip.height()), (1000, 200));
}

#[tokio::test]
async fn test_search_without_breed_is_bad_request() {
    let f = fixture(true);
    for uri in ["/search", "/search?breed=", "/search?breed=%20%20"] {
        let (status, body) = get_json(&f.app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Breed name is required");
    }
}

#[tokio::test]
async fn test_search_miss_is_not_found_with_suggestion() {
    let f = fixture(true);

    let (status, body) = get_json(&f.app, "/search?breed=dachshund").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "No similar images found for breed: dachshund");
    assert!(body.get("suggestion").is_none());

    let (status, body) = get_json(&f.app, "/search?breed=Toy%20Poodel").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["suggestion"], "toy poodle");
}

#[tokio::test]
async fn test_predict_breed() {
    let f = fixture(true);
    let uri = format!("/predict_breed?image_path={}", f.images.join("B.png").display());
    let (status, body) = get_json(&f.app, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["breed"], "toy poodle");

    let uri = format!("/predict_breed?image_path={}", f.images.join("D.jpg").display());
    let (status, body) = get_json(&f.app, &uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .starts_with("Error processing image:"));

    let (status, _) = get_json(&f.app, "/predict_breed?image_path=missing.jpg").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_predict_without_classifier_is_unavailable() {
    let f = fixture(false);
    let (status, _) = get_json(&f.app, "/predict_breed?image_path=A.png").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (_, body) = get_json(&f.app, "/health").await;
    assert_eq!(body["predictor"], false);
}

#[tokio::test]
async fn test_similar() {
    let f = fixture(true);
    let (status, body) = get_json(&f.app, "/similar?image=A.png&k=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], "A.png");
    let neighbours = body["neighbours"].as_array().unwrap();
    assert_eq!(neighbours.len(), 2);
    assert!(neighbours.iter().all(|n| n["name"] != "A.png"));
    assert!(body["grid_path"].as_str().unwrap().ends_with("similar_a_png.png"));

    let (status, _) = get_json(&f.app, "/similar?image=nowhere.png").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get_json(&f.app, "/similar").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_count_requests() {
    let f = fixture(true);
    get(&f.app, "/search?breed=poodle").await;
    get(&f.app, "/search?breed=dachshund").await;
    get(&f.app, "/similar?image=nowhere.png").await;

    let (status, body) = get_json(&f.app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_queries"], 3);
    assert_eq!(body["breed_searches"], 2);
    assert_eq!(body["breed_misses"], 1);
    assert_eq!(body["similar_queries"], 1);
    assert_eq!(body["errors"], 1);
}
