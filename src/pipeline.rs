//! Cached access to original and transformed images of the active dataset.
//!
//! The pipeline keeps two bounded caches: one for images as decoded from the
//! dataset, one for images after the active [`Transform`]. Both start at
//! [`CacheConfig::default_capacity`] and are recreated once, on the first
//! load after a dataset is activated, with a capacity estimated from that
//! image's size and the memory available at the time.

use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};

use crate::cache::{
    estimate_capacity, image_bytes, CacheConfig, CacheObserver, CacheSizing, ImageCache,
    MemoryProbe, NoopObserver, SystemMemory,
};
use crate::dataset::{into_rgb, DatasetSource, ImageId};
use crate::error::DatalensError;

/// An image-to-image operation applied to originals.
pub trait Transform: Send + Sync {
    fn execute(&self, image: &RgbImage) -> RgbImage;
}

impl<F> Transform for F
where
    F: Fn(&RgbImage) -> RgbImage + Send + Sync,
{
    fn execute(&self, image: &RgbImage) -> RgbImage {
        self(image)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Insert {
    Evicting,
    IfRoom,
}

pub struct ImagePipeline {
    config: CacheConfig,
    probe: Box<dyn MemoryProbe>,
    dataset: Option<Arc<dyn DatasetSource>>,
    transform: Option<Box<dyn Transform>>,
    originals: ImageCache<ImageId>,
    transformed: ImageCache<ImageId>,
    sizing: CacheSizing,
}

impl Default for ImagePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl ImagePipeline {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self::with_probe(config, Box::new(SystemMemory))
    }

    /// Uses `probe` instead of the system's free memory for sizing.
    pub fn with_probe(config: CacheConfig, probe: Box<dyn MemoryProbe>) -> Self {
        let capacity = config.default_capacity;
        Self {
            config,
            probe,
            dataset: None,
            transform: None,
            originals: ImageCache::new(capacity),
            transformed: ImageCache::new(capacity),
            sizing: CacheSizing::Pending,
        }
    }

    pub fn dataset(&self) -> Option<&Arc<dyn DatasetSource>> {
        self.dataset.as_ref()
    }

    pub fn sizing(&self) -> CacheSizing {
        self.sizing
    }

    pub fn originals(&self) -> &ImageCache<ImageId> {
        &self.originals
    }

    pub fn transformed(&self) -> &ImageCache<ImageId> {
        &self.transformed
    }

    /// Activates `dataset`, dropping everything cached for the previous one.
    pub fn set_dataset(&mut self, dataset: Arc<dyn DatasetSource>) {
        tracing::debug!(dataset = dataset.name(), "activating dataset");
        self.dataset = Some(dataset);
        self.clear_all();
    }

    /// Empties both caches and re-arms capacity estimation.
    pub fn clear_all(&mut self) {
        let capacity = self.config.default_capacity;
        self.originals = ImageCache::new(capacity);
        self.transformed = ImageCache::new(capacity);
        self.sizing = CacheSizing::Pending;
    }

    /// Replaces the active transform; transformed images computed with the
    /// previous one are discarded.
    pub fn set_transform(&mut self, transform: impl Transform + 'static) {
        self.transform = Some(Box::new(transform));
        self.transformed.clear();
    }

    pub fn get_image(&mut self, id: &ImageId) -> Result<Arc<RgbImage>, DatalensError> {
        self.get_image_with(id, &mut NoopObserver)
    }

    /// Returns the original image, evicting older cached originals if needed.
    pub fn get_image_with(
        &mut self,
        id: &ImageId,
        observer: &mut dyn CacheObserver<ImageId>,
    ) -> Result<Arc<RgbImage>, DatalensError> {
        self.original(id, Insert::Evicting, observer)
    }

    /// Returns the original image, caching it only while there is room.
    pub fn get_image_without_cache_eviction(
        &mut self,
        id: &ImageId,
    ) -> Result<Arc<RgbImage>, DatalensError> {
        self.original(id, Insert::IfRoom, &mut NoopObserver)
    }

    pub fn get_transformed_image(&mut self, id: &ImageId) -> Result<Arc<RgbImage>, DatalensError> {
        self.get_transformed_image_with(id, &mut NoopObserver)
    }

    /// Returns the transformed image at the original's dimensions.
    pub fn get_transformed_image_with(
        &mut self,
        id: &ImageId,
        observer: &mut dyn CacheObserver<ImageId>,
    ) -> Result<Arc<RgbImage>, DatalensError> {
        self.transformed_image(id, Insert::Evicting, observer)
    }

    pub fn get_transformed_image_without_cache_eviction(
        &mut self,
        id: &ImageId,
    ) -> Result<Arc<RgbImage>, DatalensError> {
        self.transformed_image(id, Insert::IfRoom, &mut NoopObserver)
    }

    fn original(
        &mut self,
        id: &ImageId,
        insert: Insert,
        observer: &mut dyn CacheObserver<ImageId>,
    ) -> Result<Arc<RgbImage>, DatalensError> {
        let dataset = self.dataset.clone().ok_or(DatalensError::NoActiveDataset)?;

        if let Some(image) = self.originals.get(id).cloned() {
            store(&mut self.originals, id, &image, insert, observer);
            return Ok(image);
        }

        let decoded = dataset.load_image(id)?;
        if self.sizing.is_pending() {
            self.size_caches(&decoded);
        }
        let image = Arc::new(into_rgb(decoded));

        store(&mut self.originals, id, &image, insert, observer);
        Ok(image)
    }

    fn transformed_image(
        &mut self,
        id: &ImageId,
        insert: Insert,
        observer: &mut dyn CacheObserver<ImageId>,
    ) -> Result<Arc<RgbImage>, DatalensError> {
        if self.dataset.is_none() {
            return Err(DatalensError::NoActiveDataset);
        }
        if self.transform.is_none() {
            return Err(DatalensError::TransformNotSet);
        }

        if let Some(image) = self.transformed.get(id).cloned() {
            store(&mut self.transformed, id, &image, insert, observer);
            return Ok(image);
        }

        let original = self.get_image_without_cache_eviction(id)?;
        let transform = self.transform.as_ref().ok_or(DatalensError::TransformNotSet)?;
        let output = transform.execute(&original);
        let output = if output.dimensions() == original.dimensions() {
            output
        } else {
            imageops::resize(
                &output,
                original.width(),
                original.height(),
                FilterType::CatmullRom,
            )
        };

        let image = Arc::new(output);
        store(&mut self.transformed, id, &image, insert, observer);
        Ok(image)
    }

    /// Sizes both caches from the first image as decoded, before any color
    /// conversion.
    fn size_caches(&mut self, first: &DynamicImage) {
        let bytes = image_bytes(first);
        let available = self.probe.available_bytes().unwrap_or(0);
        let capacity = estimate_capacity(bytes, available, &self.config);
        tracing::info!(
            image_bytes = bytes,
            available_bytes = available,
            capacity,
            "sized image caches"
        );

        self.originals = ImageCache::new(capacity);
        self.transformed = ImageCache::new(capacity);
        self.sizing = CacheSizing::Sized(capacity);
    }
}

fn store(
    cache: &mut ImageCache<ImageId>,
    id: &ImageId,
    image: &Arc<RgbImage>,
    insert: Insert,
    observer: &mut dyn CacheObserver<ImageId>,
) {
    match insert {
        Insert::Evicting => cache.add_with(id.clone(), Arc::clone(image), observer),
        Insert::IfRoom => {
            if !cache.add_if_room(id.clone(), Arc::clone(image)) {
                tracing::trace!(image = %id, "cache full, not storing");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FixedMemory;
    use crate::dataset::{Dataset, ImageLocation, ImageRecord};
    use image::{DynamicImage, Rgb};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Solid {
        dataset: Dataset,
        loads: AtomicUsize,
    }

    impl Solid {
        fn with_images(count: i64) -> Self {
            let mut dataset = Dataset::default();
            for id in 1..=count {
                let record = ImageRecord::new(id, ImageLocation::Row(id as usize));
                dataset.images.insert(record.id.clone(), record);
            }
            Self {
                dataset,
                loads: AtomicUsize::new(0),
            }
        }
    }

    impl DatasetSource for Solid {
        fn name(&self) -> &str {
            "solid"
        }

        fn dataset(&self) -> &Dataset {
            &self.dataset
        }

        fn load_image(&self, id: &ImageId) -> Result<DynamicImage, DatalensError> {
            let record = crate::dataset::require_image(&self.dataset, id)?;
            let ImageLocation::Row(row) = record.location else {
                return Err(DatalensError::ImageNotFound { id: id.to_string() });
            };
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
                4,
                2,
                Rgb([row as u8, 0, 0]),
            )))
        }
    }

    fn small_config(capacity: usize) -> CacheConfig {
        CacheConfig {
            default_capacity: capacity,
            memory_fraction: 0.4,
            min_images: capacity * 2,
            max_images: capacity * 2,
        }
    }

    fn pipeline(images: i64, capacity: usize) -> (ImagePipeline, Arc<Solid>) {
        let source = Arc::new(Solid::with_images(images));
        let mut pipeline =
            ImagePipeline::with_probe(small_config(capacity), Box::new(FixedMemory(None)));
        pipeline.set_dataset(source.clone());
        (pipeline, source)
    }

    fn id(n: i64) -> ImageId {
        ImageId::from(n)
    }

    #[test]
    fn no_dataset_is_an_error() {
        let mut pipeline = ImagePipeline::new();
        assert!(matches!(
            pipeline.get_image(&id(1)),
            Err(DatalensError::NoActiveDataset)
        ));
    }

    #[test]
    fn transformed_without_transform_is_an_error() {
        let (mut pipeline, _) = pipeline(1, 2);
        assert!(matches!(
            pipeline.get_transformed_image(&id(1)),
            Err(DatalensError::TransformNotSet)
        ));
    }

    #[test]
    fn hits_do_not_reload() {
        let (mut pipeline, source) = pipeline(2, 2);
        let first = pipeline.get_image(&id(1)).expect("load");
        let second = pipeline.get_image(&id(1)).expect("hit");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn first_load_sizes_the_caches() {
        let (mut pipeline, _) = pipeline(1, 3);
        assert_eq!(pipeline.sizing(), CacheSizing::Pending);
        pipeline.get_image(&id(1)).expect("load");
        assert_eq!(pipeline.sizing(), CacheSizing::Sized(3));
        assert_eq!(pipeline.originals().capacity(), 3);
        assert_eq!(pipeline.transformed().capacity(), 3);
        assert!(pipeline.originals().contains(&id(1)));
    }

    #[test]
    fn evicting_path_drops_oldest() {
        let (mut pipeline, _) = pipeline(3, 2);
        for n in 1..=3 {
            pipeline.get_image(&id(n)).expect("load");
        }
        let cached: Vec<_> = pipeline.originals().keys_by_age().cloned().collect();
        assert_eq!(cached, vec![id(2), id(3)]);
    }

    #[test]
    fn scan_path_keeps_first_images() {
        let (mut pipeline, _) = pipeline(3, 2);
        for n in 1..=3 {
            let image = pipeline.get_image_without_cache_eviction(&id(n)).expect("load");
            assert_eq!(image.get_pixel(0, 0).0, [n as u8, 0, 0]);
        }
        let cached: Vec<_> = pipeline.originals().keys_by_age().cloned().collect();
        assert_eq!(cached, vec![id(1), id(2)]);
    }

    #[test]
    fn scan_hits_refresh_recency() {
        let (mut pipeline, _) = pipeline(3, 2);
        pipeline.get_image_without_cache_eviction(&id(1)).expect("load");
        pipeline.get_image_without_cache_eviction(&id(2)).expect("load");
        pipeline.get_image_without_cache_eviction(&id(1)).expect("hit");
        let cached: Vec<_> = pipeline.originals().keys_by_age().cloned().collect();
        assert_eq!(cached, vec![id(2), id(1)]);

        pipeline.get_image(&id(3)).expect("load");
        assert!(pipeline.originals().contains(&id(1)));
        assert!(!pipeline.originals().contains(&id(2)));
    }

    #[test]
    fn transform_output_is_resized_back() {
        let (mut pipeline, _) = pipeline(1, 2);
        pipeline.set_transform(|image: &RgbImage| {
            imageops::resize(image, 2, 1, FilterType::Nearest)
        });
        let out = pipeline.get_transformed_image(&id(1)).expect("transform");
        assert_eq!(out.dimensions(), (4, 2));
        assert!(pipeline.transformed().contains(&id(1)));
    }

    #[test]
    fn set_transform_recomputes() {
        let (mut pipeline, source) = pipeline(1, 2);
        pipeline.set_transform(|image: &RgbImage| {
            RgbImage::from_pixel(image.width(), image.height(), Rgb([10, 10, 10]))
        });
        let first = pipeline.get_transformed_image(&id(1)).expect("first");
        assert_eq!(first.get_pixel(0, 0).0, [10, 10, 10]);

        pipeline.set_transform(|image: &RgbImage| {
            RgbImage::from_pixel(image.width(), image.height(), Rgb([20, 20, 20]))
        });
        assert!(pipeline.transformed().is_empty());
        let second = pipeline.get_transformed_image(&id(1)).expect("second");
        assert_eq!(second.get_pixel(0, 0).0, [20, 20, 20]);
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn transformed_miss_does_not_evict_originals() {
        let (mut pipeline, _) = pipeline(3, 2);
        pipeline.set_transform(|image: &RgbImage| image.clone());
        pipeline.get_image(&id(1)).expect("load");
        pipeline.get_image(&id(2)).expect("load");
        pipeline.get_transformed_image(&id(3)).expect("transform");
        assert!(pipeline.originals().contains(&id(1)));
        assert!(pipeline.originals().contains(&id(2)));
        assert!(!pipeline.originals().contains(&id(3)));
        assert!(pipeline.transformed().contains(&id(3)));
    }

    #[test]
    fn clear_all_rearms_sizing() {
        let (mut pipeline, source) = pipeline(1, 2);
        pipeline.get_image(&id(1)).expect("load");
        pipeline.clear_all();
        assert!(pipeline.sizing().is_pending());
        assert!(pipeline.originals().is_empty());
        pipeline.get_image(&id(1)).expect("reload");
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn missing_image_propagates() {
        let (mut pipeline, _) = pipeline(1, 2);
        assert!(matches!(
            pipeline.get_image(&id(9)),
            Err(DatalensError::ImageNotFound { .. })
        ));
    }
}
