use image::DynamicImage;

use super::normalize::normalize_rows;
use super::{RowSource, HF_ROWS_TO_TAKE_STREAMING};
use crate::dataset::{require_image, Dataset, DatasetSource, ImageId, ImageLocation};
use crate::error::DatalensError;

/// A Hugging Face hub dataset, normalized into the shared model.
pub struct HuggingFaceDataset {
    name: String,
    source: Box<dyn RowSource>,
    dataset: Dataset,
}

impl HuggingFaceDataset {
    /// Indexes every row of `source`.
    ///
    /// Streaming sources are capped at [`HF_ROWS_TO_TAKE_STREAMING`] rows.
    pub fn from_source(
        name: impl Into<String>,
        source: Box<dyn RowSource>,
    ) -> Result<Self, DatalensError> {
        let name = name.into();
        let features = source.features()?;
        let mut rows = source.rows()?;
        if source.is_streaming() {
            rows.truncate(HF_ROWS_TO_TAKE_STREAMING);
        }

        let dataset = normalize_rows(features.as_ref(), rows);
        tracing::info!(
            dataset = %name,
            images = dataset.images.len(),
            annotations = dataset.annotations.len(),
            categories = dataset.categories.len(),
            "indexed hub dataset"
        );

        Ok(Self {
            name,
            source,
            dataset,
        })
    }
}

impl DatasetSource for HuggingFaceDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    fn load_image(&self, id: &ImageId) -> Result<DynamicImage, DatalensError> {
        match &require_image(&self.dataset, id)?.location {
            ImageLocation::Inline(image) => Ok(image.as_ref().clone()),
            ImageLocation::Row(row_index) => self.source.fetch_image(*row_index),
            ImageLocation::File(_) | ImageLocation::Unresolved => {
                Err(DatalensError::ImageNotFound { id: id.to_string() })
            }
        }
    }
}
