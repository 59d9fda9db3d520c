//! Dataset variants and the shared id-indexed model.
//!
//! Every source (COCO JSON, kwcoco, Hugging Face hub) normalizes into the same
//! [`Dataset`] aggregate and exposes images through [`DatasetSource`].
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use datalens::dataset::{CocoJsonDataset, DatasetSource, ImageId};
//!
//! let dataset = CocoJsonDataset::open(Path::new("annotations.json"))?;
//! let image = dataset.get_image(&ImageId::from(1i64))?;
//! println!("{}x{}", image.width(), image.height());
//! # Ok::<(), datalens::DatalensError>(())
//! ```

pub mod coco_json;
mod ids;
#[cfg(feature = "kwcoco")]
pub mod kwcoco;
mod model;

use std::path::Path;

use image::{DynamicImage, RgbImage};

use crate::error::DatalensError;

pub use coco_json::CocoJsonDataset;
pub use ids::{AnnotationId, CategoryId, ImageId, Key};
#[cfg(feature = "kwcoco")]
pub use kwcoco::KwcocoDataset;
pub use model::{AnnotationRecord, CategoryRecord, Dataset, ImageLocation, ImageRecord};

/// A dataset that can hand out decoded images by id.
pub trait DatasetSource: Send + Sync {
    /// Short human-readable name, used in logs.
    fn name(&self) -> &str;

    /// The normalized images, annotations and categories.
    fn dataset(&self) -> &Dataset;

    /// Loads the image in whatever color mode the source stores it.
    fn load_image(&self, id: &ImageId) -> Result<DynamicImage, DatalensError>;

    /// Loads the image converted to 8-bit RGB.
    fn get_image(&self, id: &ImageId) -> Result<RgbImage, DatalensError> {
        Ok(into_rgb(self.load_image(id)?))
    }
}

/// Converts any decoded image to 8-bit RGB, reusing the buffer when it
/// already is.
pub fn into_rgb(image: DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    }
}

/// Reads and fully decodes an image file.
///
/// The file is read into memory and closed before decoding, so scanning many
/// images never holds more than one handle open.
pub(crate) fn decode_file(path: &Path) -> Result<DynamicImage, DatalensError> {
    let bytes = std::fs::read(path)?;
    image::load_from_memory(&bytes).map_err(|source| DatalensError::ImageDecode {
        target: path.display().to_string(),
        source,
    })
}

/// Looks up `id` or fails with [`DatalensError::ImageNotFound`].
pub(crate) fn require_image<'a>(
    dataset: &'a Dataset,
    id: &ImageId,
) -> Result<&'a ImageRecord, DatalensError> {
    dataset
        .image(id)
        .ok_or_else(|| DatalensError::ImageNotFound { id: id.to_string() })
}
