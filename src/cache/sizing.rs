use super::CacheConfig;

/// Whether a pipeline's caches have been sized from a real image yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CacheSizing {
    /// Caches still use [`CacheConfig::default_capacity`].
    #[default]
    Pending,
    /// Caches were recreated with this per-cache capacity.
    Sized(usize),
}

impl CacheSizing {
    pub fn is_pending(self) -> bool {
        matches!(self, CacheSizing::Pending)
    }
}

/// Per-cache capacity for images of `image_bytes`, given `available_bytes`
/// of free memory.
///
/// A fraction of free memory is the budget; the number of images that fit is
/// clamped to the configured bounds and split evenly between the original and
/// transformed caches.
pub fn estimate_capacity(image_bytes: u64, available_bytes: u64, config: &CacheConfig) -> usize {
    let budget = (available_bytes as f64 * config.memory_fraction).round();
    let fit = if image_bytes == 0 {
        config.max_images
    } else {
        let raw = (budget / image_bytes as f64).floor();
        if raw >= config.max_images as f64 {
            config.max_images
        } else {
            raw as usize
        }
    };
    // Not `clamp`: the bounds are public and may be inverted.
    fit.max(config.min_images).min(config.max_images) / 2
}
