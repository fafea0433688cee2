//! Breed prediction: argmax over classifier logits, mapped to a category name.

use crate::corpus::load_rgb;
use crate::error::{BreedSearchError, Result};
use crate::model::{Categories, Classifier};
use image::DynamicImage;
use std::path::Path;
use std::sync::Arc;

pub struct Predictor {
    classifier: Arc<dyn Classifier>,
    categories: Categories,
}

impl Predictor {
    /// The category list must have one name per classifier output.
    pub fn new(classifier: Arc<dyn Classifier>, categories: Categories) -> Result<Self> {
        if classifier.num_classes() != categories.len() {
            return Err(BreedSearchError::ModelError(format!(
                "classifier has {} outputs but {} categories were supplied",
                classifier.num_classes(),
                categories.len()
            )));
        }
        Ok(Self {
            classifier,
            categories,
        })
    }

    pub fn categories(&self) -> &Categories {
        &self.categories
    }

    /// Index of the highest logit.
    pub fn predict_index(&self, image: &DynamicImage) -> Result<usize> {
        let logits = self.classifier.logits(image)?;
        argmax(&logits).ok_or_else(|| {
            BreedSearchError::ModelError("classifier returned no logits".to_string())
        })
    }

    /// Predicted category name. Always returns a label, however low the score.
    pub fn predict(&self, image: &DynamicImage) -> Result<String> {
        let index = self.predict_index(image)?;
        self.categories
            .name(index)
            .map(str::to_string)
            .ok_or_else(|| {
                BreedSearchError::ModelError(format!("class index {} out of range", index))
            })
    }

    /// Decode an image file and predict its category.
    pub fn predict_path(&self, path: impl AsRef<Path>) -> Result<String> {
        self.predict(&load_rgb(path)?)
    }
}

/// Position of the maximum; the first one wins ties. NaN never wins.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    /// Scores each class by how close it is to the image's mean red value.
    struct RedClassifier;

    impl Classifier for RedClassifier {
        fn num_classes(&self) -> usize {
            3
        }

        fn logits(&self, image: &DynamicImage) -> Result<Vec<f32>> {
            let rgb = image.to_rgb8();
            let red = rgb.pixels().map(|p| p[0] as f32).sum::<f32>() / rgb.pixels().len() as f32;
            Ok(vec![-(red - 0.0).abs(), -(red - 128.0).abs(), -(red - 255.0).abs()])
        }
    }

    fn categories() -> Categories {
        Categories::new(vec![
            "Labrador".to_string(),
            "Poodle".to_string(),
            "Bulldog".to_string(),
        ])
    }

    #[test]
    fn test_argmax_ties_pick_lowest_index() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0, 2.0]), Some(1));
        assert_eq!(argmax(&[f32::NAN, -1.0]), Some(1));
        assert_eq!(argmax(&[]), None);
        assert_eq!(argmax(&[-5.0]), Some(0));
    }

    #[test]
    fn test_predict() {
        let predictor = Predictor::new(Arc::new(RedClassifier), categories()).unwrap();
        let red = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, image::Rgb([250, 0, 0])));
        let dark = DynamicImage::ImageRgb8(RgbImage::new(8, 8));
        assert_eq!(predictor.predict(&red).unwrap(), "Bulldog");
        assert_eq!(predictor.predict(&dark).unwrap(), "Labrador");
        // deterministic
        assert_eq!(predictor.predict(&red).unwrap(), predictor.predict(&red).unwrap());
    }

    #[test]
    fn test_category_count_must_match() {
        let short = Categories::new(vec!["Labrador".to_string()]);
        assert!(matches!(
            Predictor::new(Arc::new(RedClassifier), short),
            Err(BreedSearchError::ModelError(_))
        ));
    }

    #[test]
    fn test_predict_path_missing_file() {
        let predictor = Predictor::new(Arc::new(RedClassifier), categories()).unwrap();
        assert!(predictor.predict_path("does/not/exist.jpg").is_err());
    }
}
