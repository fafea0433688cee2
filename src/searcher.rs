//! Breed search over the label map with a fuzzy "did you mean" fallback.

use crate::config::{AppConfig, SearchConfig};
use crate::corpus::CorpusImage;
use crate::error::{BreedSearchError, Result};
use crate::fuzzy;
use crate::grid;
use crate::label_map::BreedLabelMap;
use crate::report::BatchReport;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Closest known breed for a query that matched nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub breed: String,
    pub score: u8,
}

/// Outcome of a breed query.
#[derive(Debug, Clone, PartialEq)]
pub struct BreedSearch {
    pub query: String,
    /// Matching filenames in label-map order, truncated.
    pub matches: Vec<String>,
    /// Rendered strip, present whenever there are matches.
    pub grid_path: Option<PathBuf>,
    /// Only set when nothing matched and the best fuzzy score beats the threshold.
    pub suggestion: Option<Suggestion>,
    pub render_report: Option<BatchReport>,
}

#[derive(Debug)]
pub struct BreedSearcher {
    /// Filename → lowercased breed.
    labels: Vec<(String, String)>,
    /// Distinct lowercased breeds in first-appearance order.
    breeds: Vec<String>,
    images_dir: PathBuf,
    grid_dir: PathBuf,
    max_results: usize,
    suggestion_threshold: u8,
}

impl BreedSearcher {
    pub fn new(label_map: &BreedLabelMap, images_dir: impl Into<PathBuf>, grid_dir: impl Into<PathBuf>) -> Self {
        let labels: Vec<(String, String)> = label_map
            .iter()
            .map(|(image, breed)| (image.to_string(), breed.to_lowercase()))
            .collect();
        let mut breeds: Vec<String> = Vec::new();
        for (_, breed) in &labels {
            if !breeds.contains(breed) {
                breeds.push(breed.clone());
            }
        }

        let defaults = SearchConfig::default();
        Self {
            labels,
            breeds,
            images_dir: images_dir.into(),
            grid_dir: grid_dir.into(),
            max_results: defaults.max_results,
            suggestion_threshold: defaults.suggestion_threshold,
        }
    }

    /// Load the label map named by `config`. A missing map is an error.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let label_map = BreedLabelMap::load(&config.label_map_path).map_err(|e| match e {
            BreedSearchError::IoError(io) => BreedSearchError::IoError(std::io::Error::new(
                io.kind(),
                format!("breed label map {}: {}", config.label_map_path.display(), io),
            )),
            other => other,
        })?;
        log::info!(
            "Loaded {} breed labels from {}",
            label_map.len(),
            config.label_map_path.display()
        );
        Ok(Self::new(&label_map, &config.images_dir, &config.grid_dir).with_search_config(&config.search))
    }

    pub fn with_search_config(mut self, search: &SearchConfig) -> Self {
        self.max_results = search.max_results;
        self.suggestion_threshold = search.suggestion_threshold;
        self
    }

    pub fn known_breeds(&self) -> &[String] {
        &self.breeds
    }

    pub fn grid_path_for(&self, query: &str) -> PathBuf {
        self.grid_dir
            .join(format!("{}_similar_images.png", grid::slug(query)))
    }

    /// Every image whose breed contains `query`, case-insensitively, untruncated.
    pub fn candidates(&self, query: &str) -> Vec<&str> {
        let needle = query.trim().to_lowercase();
        self.labels
            .iter()
            .filter(|(_, breed)| breed.contains(&needle))
            .map(|(image, _)| image.as_str())
            .collect()
    }

    /// Best fuzzy match among known breeds, whatever its score.
    pub fn closest_breed(&self, query: &str) -> Option<Suggestion> {
        let needle = query.trim().to_lowercase();
        fuzzy::extract_one(&needle, self.breeds.iter().map(String::as_str)).map(|(breed, score)| {
            Suggestion {
                breed: breed.to_string(),
                score,
            }
        })
    }

    pub fn search(&self, query: &str) -> Result<BreedSearch> {
        if query.trim().is_empty() {
            return Err(BreedSearchError::InvalidQuery(
                "Breed name is required".to_string(),
            ));
        }

        let candidates = self.candidates(query);
        if candidates.is_empty() {
            let suggestion = self
                .closest_breed(query)
                .filter(|s| s.score > self.suggestion_threshold);
            match &suggestion {
                Some(s) => log::info!(
                    "No exact matches found for breed: {}. Did you mean: {}?",
                    query,
                    s.breed
                ),
                None => log::info!("No exact matches found for breed: {}", query),
            }
            return Ok(BreedSearch {
                query: query.to_string(),
                matches: Vec::new(),
                grid_path: None,
                suggestion,
                render_report: None,
            });
        }

        let matches: Vec<String> = candidates
            .into_iter()
            .take(self.max_results)
            .map(str::to_string)
            .collect();
        let tiles: Vec<CorpusImage> = matches
            .iter()
            .map(|name| CorpusImage {
                name: name.clone(),
                path: self.images_dir.join(name),
            })
            .collect();
        let grid_path = self.grid_path_for(query);
        let report = grid::render_strip(&tiles, &grid_path)?;
        log::info!("Saved similar images for breed: {}", query);

        Ok(BreedSearch {
            query: query.to_string(),
            matches,
            grid_path: Some(grid_path),
            suggestion: None,
            render_report: Some(report),
        })
    }

    /// Matching filenames only; empty when nothing matched.
    pub fn search_by_breed(&self, query: &str) -> Result<Vec<String>> {
        Ok(self.search(query)?.matches)
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn searcher(dir: &Path) -> BreedSearcher {
        let map: BreedLabelMap = [
            ("A.jpg", "Labrador retriever"),
            ("B.jpg", "toy poodle"),
            ("C.jpg", "standard poodle"),
        ]
        .into_iter()
        .collect();
        for name in ["A.jpg", "B.jpg", "C.jpg"] {
            RgbImage::from_pixel(10, 10, Rgb([120, 80, 40]))
                .save(dir.join(name))
                .unwrap();
        }
        BreedSearcher::new(&map, dir, dir.join("grids"))
    }

    #[test]
    fn test_substring_matches_in_map_order() {
        let dir = TempDir::new().unwrap();
        let s = searcher(dir.path());
        let found = s.search("poodle").unwrap();
        assert_eq!(found.matches, vec!["B.jpg", "C.jpg"]);
        assert_eq!(found.render_report.unwrap().processed_count(), 2);
        assert!(s.grid_path_for("poodle").exists());
        assert_eq!(s.search_by_breed("RETRIEVER").unwrap(), vec!["A.jpg"]);
    }

    #[test]
    fn test_miss_returns_empty_with_suggestion_side_channel() {
        let dir = TempDir::new().unwrap();
        let s = searcher(dir.path());

        let result = s.search("dachshund").unwrap();
        assert!(result.matches.is_empty());
        assert!(result.grid_path.is_none());
        assert!(result.suggestion.is_none());

        let result = s.search("Toy Poodel").unwrap();
        assert!(result.matches.is_empty());
        let suggestion = result.suggestion.unwrap();
        assert_eq!(suggestion.breed, "toy poodle");
        assert!(suggestion.score > 80);

        assert!(s.search_by_breed("xyz-not-a-breed").unwrap().is_empty());
    }

    #[test]
    fn test_truncates_to_max_results() {
        let dir = TempDir::new().unwrap();
        let map: BreedLabelMap = (0..8)
            .map(|i| (format!("{}.jpg", i), "Boston terrier".to_string()))
            .chain(std::iter::once(("x.jpg".to_string(), "Yorkshire terrier".to_string())))
            .collect();
        let s = BreedSearcher::new(&map, dir.path(), dir.path().join("grids"));

        let found = s.search("terrier").unwrap();
        assert_eq!(found.matches, vec!["0.jpg", "1.jpg", "2.jpg", "3.jpg", "4.jpg"]);
        // none of the files exist, so every tile is skipped but the strip is still written
        assert_eq!(found.render_report.unwrap().skipped_count(), 5);
        assert!(found.grid_path.unwrap().exists());
        assert_eq!(s.candidates("terrier").len(), 9);
    }

    #[test]
    fn test_empty_query_is_invalid() {
        let dir = TempDir::new().unwrap();
        let s = searcher(dir.path());
        assert!(matches!(s.search("   "), Err(BreedSearchError::InvalidQuery(_))));
    }

    #[test]
    fn test_known_breeds_are_distinct_and_lowercase() {
        let map: BreedLabelMap = [("a", "Pug"), ("b", "pug"), ("c", "Beagle")].into_iter().collect();
        let s = BreedSearcher::new(&map, "imgs", "grids");
        assert_eq!(s.known_breeds(), &["pug", "beagle"]);
    }

    #[test]
    fn test_missing_label_map_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.label_map_path = dir.path().join("breed_predictions.json");
        assert!(matches!(
            BreedSearcher::from_config(&config),
            Err(BreedSearchError::IoError(_))
        ));
    }
}
