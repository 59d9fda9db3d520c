//! kwcoco-flavored COCO dataset.
//!
//! kwcoco files are COCO JSON with a few lenient extensions this reader
//! honors:
//!
//! - an optional top-level `img_root`, joined onto the bundle directory (the
//!   JSON file's parent) to form the image root;
//! - images without a `file_name` whose pixels live in `assets` (or the
//!   legacy `auxiliary` list);
//! - annotations without an `id`, which receive sequential ids after the
//!   largest integer id present.
//!
//! Unknown top-level sections such as `videos` or `tracks` are ignored.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use serde::Deserialize;
use serde_json::Value;

use super::coco_json::image_root;
use super::model::{AnnotationRecord, CategoryRecord, Dataset, ImageLocation, ImageRecord};
use super::{decode_file, require_image, AnnotationId, DatasetSource, ImageId, Key};
use crate::error::DatalensError;

#[derive(Debug, Deserialize)]
struct KwcocoDocument {
    #[serde(default)]
    img_root: Option<String>,
    #[serde(default)]
    images: Vec<KwcocoImage>,
    #[serde(default)]
    annotations: Vec<KwcocoAnnotation>,
    #[serde(default)]
    categories: Vec<KwcocoCategory>,
}

#[derive(Debug, Deserialize)]
struct KwcocoImage {
    id: Key,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    assets: Vec<KwcocoAsset>,
    #[serde(default)]
    auxiliary: Vec<KwcocoAsset>,
}

#[derive(Debug, Deserialize)]
struct KwcocoAsset {
    #[serde(default)]
    file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KwcocoCategory {
    id: i64,
    name: String,
    #[serde(default)]
    supercategory: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KwcocoAnnotation {
    #[serde(default)]
    id: Option<Key>,
    image_id: Key,
    category_id: i64,
    #[serde(default)]
    bbox: Value,
}

/// A kwcoco bundle: a COCO JSON file plus the directory its images live in.
#[derive(Debug)]
pub struct KwcocoDataset {
    name: String,
    img_root: PathBuf,
    dataset: Dataset,
}

impl KwcocoDataset {
    /// Reads a kwcoco (or plain COCO) JSON file.
    pub fn open(path: &Path) -> Result<Self, DatalensError> {
        let file = File::open(path).map_err(DatalensError::Io)?;
        let document: KwcocoDocument = serde_json::from_reader(BufReader::new(file))
            .map_err(|source| DatalensError::JsonParse {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self::from_document(document, &image_root(path), path.display().to_string()))
    }

    /// Reads a kwcoco document from a string with `bundle_dir` as its bundle
    /// directory.
    pub fn from_kwcoco_str(json: &str, bundle_dir: &Path) -> Result<Self, serde_json::Error> {
        let document: KwcocoDocument = serde_json::from_str(json)?;
        Ok(Self::from_document(document, bundle_dir, bundle_dir.display().to_string()))
    }

    fn from_document(document: KwcocoDocument, bundle_dir: &Path, name: String) -> Self {
        let img_root = match document.img_root.as_deref() {
            Some(root) => bundle_dir.join(root),
            None => bundle_dir.to_path_buf(),
        };

        let mut dataset = Dataset::default();

        for img in document.images {
            let location = match primary_file_name(&img) {
                Some(file_name) => ImageLocation::File(file_name),
                None => {
                    tracing::debug!(image_id = %img.id, "kwcoco image has no file_name or assets");
                    ImageLocation::Unresolved
                }
            };
            let mut record = ImageRecord::new(img.id, location);
            record.width = img.width;
            record.height = img.height;
            dataset.images.insert(record.id.clone(), record);
        }

        for cat in document.categories {
            let mut record = CategoryRecord::new(cat.id, cat.name);
            record.supercategory = cat.supercategory;
            dataset.categories.insert(record.id, record);
        }

        let mut next_id = document
            .annotations
            .iter()
            .filter_map(|ann| ann.id.as_ref().and_then(Key::as_i64))
            .max()
            .unwrap_or(0);

        for ann in document.annotations {
            let id = match ann.id {
                Some(id) => AnnotationId(id),
                None => {
                    next_id += 1;
                    AnnotationId::from(next_id)
                }
            };
            let record = AnnotationRecord::new(id, ann.image_id, ann.category_id, ann.bbox);
            dataset.annotations.insert(record.id.clone(), record);
        }

        Self {
            name,
            img_root,
            dataset,
        }
    }

    /// Resolves the image file for `id`. Absolute file names are used as-is.
    pub fn image_path(&self, id: &ImageId) -> Result<PathBuf, DatalensError> {
        let record = require_image(&self.dataset, id)?;
        match &record.location {
            ImageLocation::File(file_name) => Ok(self.img_root.join(file_name)),
            ImageLocation::Unresolved => Err(DatalensError::ImageUnresolved { id: id.to_string() }),
            _ => Err(DatalensError::ImageNotFound { id: id.to_string() }),
        }
    }
}

impl DatasetSource for KwcocoDataset {
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

fn primary_file_name(img: &KwcocoImage) -> Option<String> {
    img.file_name.clone().or_else(|| {
        img.assets
            .iter()
            .chain(img.auxiliary.iter())
            .find_map(|asset| asset.file_name.clone())
    })
}
