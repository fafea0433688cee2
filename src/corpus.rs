//! Stable enumeration of a flat image directory.

use crate::error::{BreedSearchError, Result};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One file of the corpus, identified by its filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusImage {
    pub name: String,
    pub path: PathBuf,
}

impl CorpusImage {
    /// Decode the file and convert it to RGB.
    pub fn load(&self) -> Result<DynamicImage> {
        load_rgb(&self.path)
    }
}

/// Decode an image file and convert it to 8-bit RGB.
pub fn load_rgb(path: impl AsRef<Path>) -> Result<DynamicImage> {
    let img = image::open(path.as_ref())?;
    Ok(DynamicImage::ImageRgb8(img.to_rgb8()))
}

/// A flat directory of image files.
#[derive(Debug, Clone)]
pub struct Corpus {
    root: PathBuf,
}

impl Corpus {
    /// Open a corpus directory. A missing directory is an error.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(BreedSearchError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("corpus directory not found: {}", root.display()),
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a corpus file by name.
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Every regular file directly under the root, sorted by filename.
    ///
    /// Nothing is filtered by extension; undecodable files surface later as
    /// per-item skips.
    pub fn images(&self) -> Result<Vec<CorpusImage>> {
        let mut images = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| {
                BreedSearchError::IoError(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    e.to_string(),
                ))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            images.push(CorpusImage {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path().to_path_buf(),
            });
        }
        Ok(images)
    }
}
