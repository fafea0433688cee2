//! Breed label map: ordered filename → predicted breed, stored as a JSON object.

use crate::corpus::Corpus;
use crate::error::{BreedSearchError, Result};
use crate::persistence::atomic::write_atomic;
use crate::persistence::serialization;
use crate::predictor::Predictor;
use crate::report::BatchReport;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

/// Filename → breed pairs in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BreedLabelMap {
    entries: Vec<(String, String)>,
    /// Filename → position in `entries`.
    positions: HashMap<String, usize>,
}

impl BreedLabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite; an existing key keeps its position.
    pub fn insert(&mut self, image: impl Into<String>, breed: impl Into<String>) {
        let image = image.into();
        let breed = breed.into();
        match self.positions.get(&image) {
            Some(&at) => self.entries[at].1 = breed,
            None => {
                self.positions.insert(image.clone(), self.entries.len());
                self.entries.push((image, breed));
            }
        }
    }

    pub fn get(&self, image: &str) -> Option<&str> {
        self.positions
            .get(image)
            .map(|&at| self.entries[at].1.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read a map file. Key order in the file is preserved.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let object: Map<String, Value> = serialization::from_json(&bytes)?;
        let mut map = Self::new();
        for (image, breed) in object {
            match breed {
                Value::String(breed) => map.insert(image, breed),
                other => {
                    return Err(BreedSearchError::SerializationError(format!(
                        "breed for {} is not a string: {}",
                        image, other
                    )))
                }
            }
        }
        Ok(map)
    }

    /// Write the map atomically as a JSON object in insertion order.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let object: Map<String, Value> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        write_atomic(path, &serialization::to_json(&object)?)
    }

    /// Predict a breed for every decodable image of the corpus.
    pub fn generate(corpus: &Corpus, predictor: &Predictor) -> Result<(Self, BatchReport)> {
        let mut map = Self::new();
        let mut report = BatchReport::new();
        for image in corpus.images()? {
            let breed = match image.load().and_then(|img| predictor.predict(&img)) {
                Ok(breed) => breed,
                Err(e) => {
                    report.skipped(image.name, e);
                    continue;
                }
            };
            log::info!("Predicted breed for {}: {}", image.name, breed);
            report.processed(map.len(), image.name.clone());
            map.insert(image.name, breed);
        }
        Ok((map, report))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BreedLabelMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}
