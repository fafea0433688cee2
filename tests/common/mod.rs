//! Shared fixtures: a tiny corpus of solid-colour images and a classifier
//! that names the dominant channel.

#![allow(dead_code)]

use breedsearch::model::{Categories, Classifier};
use breedsearch::{Predictor, Result};
use image::{DynamicImage, Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const BREEDS: [&str; 3] = ["Labrador retriever", "toy poodle", "standard poodle"];

/// Writes A.png (red), B.png (green), C.png (blue) and an undecodable D.jpg.
pub fn write_corpus(dir: &Path) -> PathBuf {
    let images = dir.join("PetImages").join("Dog");
    std::fs::create_dir_all(&images).unwrap();
    for (name, color) in [
        ("A.png", [240, 20, 20]),
        ("B.png", [20, 240, 20]),
        ("C.png", [20, 20, 240]),
    ] {
        RgbImage::from_pixel(32, 24, Rgb(color))
            .save(images.join(name))
            .unwrap();
    }
    std::fs::write(images.join("D.jpg"), b"\xff\xd8 truncated").unwrap();
    images
}

/// One logit per channel: the mean intensity of that channel.
pub struct DominantChannel;

impl Classifier for DominantChannel {
    fn num_classes(&self) -> usize {
        3
    }

    fn logits(&self, image: &DynamicImage) -> Result<Vec<f32>> {
        let rgb = image.to_rgb8();
        let mut sums = [0.0f32; 3];
        for pixel in rgb.pixels() {
            for (c, sum) in sums.iter_mut().enumerate() {
                *sum += pixel[c] as f32;
            }
        }
        let n = (rgb.width() * rgb.height()).max(1) as f32;
        Ok(sums.iter().map(|s| s / n).collect())
    }
}

pub fn predictor() -> Predictor {
    let categories = Categories::new(BREEDS.iter().map(|b| b.to_string()).collect());
    Predictor::new(Arc::new(DominantChannel), categories).unwrap()
}
