//! COCO JSON dataset.
//!
//! Loads the whole document eagerly and indexes `images`, `annotations` and
//! `categories` by id. Image files are resolved against the directory holding
//! the JSON file.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use serde::Deserialize;
use serde_json::Value;

use super::model::{AnnotationRecord, CategoryRecord, Dataset, ImageLocation, ImageRecord};
use super::{decode_file, require_image, DatasetSource, ImageId, Key};
use crate::error::DatalensError;

// ============================================================================
// COCO Schema Types (internal to this module)
// ============================================================================

/// Top-level COCO dataset structure. Other top-level keys are ignored.
#[derive(Debug, Deserialize)]
struct CocoDocument {
    images: Vec<CocoImage>,
    annotations: Vec<CocoAnnotation>,
    categories: Vec<CocoCategory>,
}

#[derive(Debug, Deserialize)]
struct CocoImage {
    id: Key,
    file_name: String,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CocoCategory {
    id: i64,
    name: String,
    #[serde(default)]
    supercategory: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CocoAnnotation {
    id: Key,
    image_id: Key,
    category_id: i64,
    /// Passed through untouched; COCO writes `[x, y, width, height]`.
    #[serde(default)]
    bbox: Value,
}

// ============================================================================
// Public API
// ============================================================================

/// A COCO-style dataset backed by a JSON file on disk.
#[derive(Debug)]
pub struct CocoJsonDataset {
    name: String,
    root: PathBuf,
    dataset: Dataset,
}

impl CocoJsonDataset {
    /// Reads a dataset from a COCO JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn open(path: &Path) -> Result<Self, DatalensError> {
        let file = File::open(path).map_err(DatalensError::Io)?;
        let reader = BufReader::new(file);

        let document: CocoDocument =
            serde_json::from_reader(reader).map_err(|source| DatalensError::JsonParse {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            name: path.display().to_string(),
            root: image_root(path),
            dataset: document_to_dataset(document),
        })
    }

    /// Reads a dataset from a COCO JSON string, resolving images under `root`.
    ///
    /// Useful for testing without file I/O.
    pub fn from_coco_str(json: &str, root: &Path) -> Result<Self, serde_json::Error> {
        let document: CocoDocument = serde_json::from_str(json)?;
        Ok(Self::from_document(document, root))
    }

    /// Reads a dataset from a COCO JSON byte slice, resolving images under `root`.
    ///
    /// Useful for fuzzing and processing raw bytes without UTF-8 validation overhead.
    pub fn from_coco_slice(bytes: &[u8], root: &Path) -> Result<Self, serde_json::Error> {
        let document: CocoDocument = serde_json::from_slice(bytes)?;
        Ok(Self::from_document(document, root))
    }

    fn from_document(document: CocoDocument, root: &Path) -> Self {
        Self {
            name: root.display().to_string(),
            root: root.to_path_buf(),
            dataset: document_to_dataset(document),
        }
    }

    /// Absolute or relative path the image file for `id` resolves to.
    pub fn image_path(&self, id: &ImageId) -> Result<PathBuf, DatalensError> {
        let record = require_image(&self.dataset, id)?;
        match &record.location {
            ImageLocation::File(file_name) => Ok(self.root.join(file_name)),
            _ => Err(DatalensError::ImageNotFound { id: id.to_string() }),
        }
    }
}

impl DatasetSource for CocoJsonDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    fn load_image(&self, id: &ImageId) -> Result<DynamicImage, DatalensError> {
        decode_file(&self.image_path(id)?)
    }
}

/// The directory image file names are relative to.
pub(crate) fn image_root(json_path: &Path) -> PathBuf {
    json_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

// ============================================================================
// Conversion: COCO -> Dataset
// ============================================================================

fn document_to_dataset(document: CocoDocument) -> Dataset {
    let mut dataset = Dataset::default();

    for img in document.images {
        let mut record = ImageRecord::new(img.id, ImageLocation::File(img.file_name));
        record.width = img.width;
        record.height = img.height;
        dataset.images.insert(record.id.clone(), record);
    }

    for cat in document.categories {
        let mut record = CategoryRecord::new(cat.id, cat.name);
        record.supercategory = cat.supercategory;
        dataset.categories.insert(record.id, record);
    }

    for ann in document.annotations {
        let record = AnnotationRecord::new(ann.id, ann.image_id, ann.category_id, ann.bbox);
        dataset.annotations.insert(record.id.clone(), record);
    }

    dataset
}
