//! Bounded image caches and their one-shot, memory-aware sizing.

mod lru;
mod memory;
mod sizing;

use std::sync::Arc;

use image::{DynamicImage, RgbImage};

pub use lru::{CacheObserver, LruCache, NoopObserver};
pub use memory::{FixedMemory, MemoryProbe, SystemMemory};
pub use sizing::{estimate_capacity, CacheSizing};

/// Decoded RGB images keyed by `K`, shared with callers by `Arc`.
pub type ImageCache<K> = LruCache<K, Arc<RgbImage>>;

/// Cache capacity knobs.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheConfig {
    /// Capacity of each cache before the first image has been sized.
    pub default_capacity: usize,
    /// Share of available memory the two caches may use together.
    pub memory_fraction: f64,
    /// Lower bound on the number of images both caches hold together.
    pub min_images: usize,
    /// Upper bound on the number of images both caches hold together.
    pub max_images: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_capacity: 50,
            memory_fraction: 0.4,
            min_images: 50,
            max_images: 500,
        }
    }
}

/// In-memory size of a decoded image in its native color mode.
pub fn image_bytes(image: &DynamicImage) -> u64 {
    image.as_bytes().len() as u64
}
