//! Core dataset model shared by every dataset variant.
//!
//! Whatever the source schema, readers normalize into one id-indexed
//! [`Dataset`]: images, annotations and categories keyed by their ids.

use std::collections::BTreeMap;
use std::sync::Arc;

use image::DynamicImage;
use serde::Serialize;
use serde_json::Value;

use super::ids::{AnnotationId, CategoryId, ImageId};

/// An id-indexed dataset aggregate.
///
/// Invariant once a reader returns: every annotation's `image_id` keys into
/// `images` and every `category_id` keys into `categories`.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    /// All images, keyed by id.
    pub images: BTreeMap<ImageId, ImageRecord>,

    /// All annotations (bounding boxes with labels), keyed by id.
    pub annotations: BTreeMap<AnnotationId, AnnotationRecord>,

    /// All category definitions, keyed by id.
    pub categories: BTreeMap<CategoryId, CategoryRecord>,
}

impl Dataset {
    /// Looks up the image record for `id`.
    pub fn image(&self, id: &ImageId) -> Option<&ImageRecord> {
        self.images.get(id)
    }

    /// Returns all annotations attached to `image_id`, in annotation-id order.
    pub fn annotations_for(&self, image_id: &ImageId) -> Vec<&AnnotationRecord> {
        self.annotations
            .values()
            .filter(|ann| &ann.image_id == image_id)
            .collect()
    }

    /// Returns the category name for `id`, if declared.
    pub fn category_name(&self, id: CategoryId) -> Option<&str> {
        self.categories.get(&id).map(|cat| cat.name.as_str())
    }
}

/// Where the pixels of an image live.
#[derive(Clone, Debug)]
pub enum ImageLocation {
    /// A file name, resolved against the dataset's image root.
    File(String),

    /// A row index into the backing storage; fetched lazily.
    Row(usize),

    /// A decoded payload held inline (streamed sources cannot seek back).
    Inline(Arc<DynamicImage>),

    /// Declared without any file name or asset; loading it fails.
    Unresolved,
}

/// An image in the dataset.
#[derive(Clone, Debug)]
pub struct ImageRecord {
    /// Unique identifier for this image.
    pub id: ImageId,

    /// Where to fetch the pixels from.
    pub location: ImageLocation,

    /// Width in pixels, when the source declares it.
    pub width: Option<u32>,

    /// Height in pixels, when the source declares it.
    pub height: Option<u32>,
}

impl ImageRecord {
    /// Creates a new image record with no declared dimensions.
    pub fn new(id: impl Into<ImageId>, location: ImageLocation) -> Self {
        Self {
            id: id.into(),
            location,
            width: None,
            height: None,
        }
    }

    /// Sets the declared dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Returns the file name, if this image is file-backed.
    pub fn file_name(&self) -> Option<&str> {
        match &self.location {
            ImageLocation::File(name) => Some(name),
            _ => None,
        }
    }
}

/// A category (class label) in the dataset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryRecord {
    /// Unique identifier for this category.
    pub id: CategoryId,

    /// Name of the category (e.g., "person", "car", "dog").
    pub name: String,

    /// Optional supercategory for hierarchical taxonomies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supercategory: Option<String>,
}

impl CategoryRecord {
    /// Creates a new category with the given properties.
    pub fn new(id: impl Into<CategoryId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            supercategory: None,
        }
    }
}

/// An annotation: a bounding box on an image with a category label.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnnotationRecord {
    /// Unique identifier for this annotation.
    pub id: AnnotationId,

    /// The image this annotation belongs to.
    pub image_id: ImageId,

    /// The category of the annotated object.
    pub category_id: CategoryId,

    /// Bounding box exactly as the source wrote it.
    pub bbox: Value,
}

impl AnnotationRecord {
    /// Creates a new annotation.
    pub fn new(
        id: impl Into<AnnotationId>,
        image_id: impl Into<ImageId>,
        category_id: impl Into<CategoryId>,
        bbox: Value,
    ) -> Self {
        Self {
            id: id.into(),
            image_id: image_id.into(),
            category_id: category_id.into(),
            bbox,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Dataset {
        let mut dataset = Dataset::default();
        for id in [1i64, 2] {
            let record = ImageRecord::new(id, ImageLocation::File(format!("{id}.jpg")));
            dataset.images.insert(record.id.clone(), record);
        }
        dataset
            .categories
            .insert(CategoryId(1), CategoryRecord::new(1i64, "cat"));
        for (ann, img) in [(10i64, 1i64), (11, 2), (12, 1)] {
            let record = AnnotationRecord::new(ann, img, 1i64, json!([0, 0, 1, 1]));
            dataset.annotations.insert(record.id.clone(), record);
        }
        dataset
    }

    #[test]
    fn annotations_for_filters_by_image() {
        let dataset = sample();
        let ids: Vec<_> = dataset
            .annotations_for(&ImageId::from(1i64))
            .iter()
            .map(|ann| ann.id.clone())
            .collect();
        assert_eq!(ids, vec![AnnotationId::from(10i64), AnnotationId::from(12i64)]);
    }

    #[test]
    fn file_name_only_for_file_locations() {
        let dataset = sample();
        assert_eq!(
            dataset.image(&ImageId::from(2i64)).and_then(ImageRecord::file_name),
            Some("2.jpg")
        );
        assert!(ImageRecord::new(3i64, ImageLocation::Row(0)).file_name().is_none());
        assert_eq!(dataset.category_name(CategoryId(1)), Some("cat"));
    }
}
