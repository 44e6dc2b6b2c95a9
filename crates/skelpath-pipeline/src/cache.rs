//! Content-keyed memoization of the binarization stage.
//!
//! Interactive previews re-run the pipeline with the same image and
//! preprocessing parameters many times while only downstream settings
//! change. [`PreprocessCache`] keeps recent binary masks keyed by a
//! 128-bit SipHash-1-3 digest of the image content and parameters, so a
//! recycled or reallocated image buffer can never alias a stale entry.

use std::collections::{HashMap, VecDeque};
use std::hash::Hasher;

use image::{DynamicImage, GrayImage};
use siphasher::sip128::{Hasher128, SipHasher13};

use crate::types::PipelineError;

/// Digest identifying one (image, threshold, kernel) combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PreprocessKey(u128);

impl PreprocessKey {
    /// Hash the decoded pixels together with the preprocessing parameters.
    #[must_use]
    pub fn new(image: &DynamicImage, threshold: u8, kernel_size: u32) -> Self {
        let mut hasher = SipHasher13::new();
        hasher.write(&image.width().to_le_bytes());
        hasher.write(&image.height().to_le_bytes());
        hasher.write(format!("{:?}", image.color()).as_bytes());
        hasher.write(image.as_bytes());
        hasher.write(&[threshold]);
        hasher.write(&kernel_size.to_le_bytes());
        Self(hasher.finish128().as_u128())
    }
}

/// Bounded first-in-first-out cache of binary masks.
#[derive(Debug, Clone)]
pub struct PreprocessCache {
    capacity: usize,
    entries: HashMap<PreprocessKey, GrayImage>,
    order: VecDeque<PreprocessKey>,
    hits: u64,
    misses: u64,
}

impl PreprocessCache {
    /// Default number of cached masks.
    pub const DEFAULT_CAPACITY: usize = 8;

    /// Create a cache holding at most `capacity` masks. A capacity of
    /// zero disables caching.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Binarize `image`, reusing a cached mask for identical input.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::preprocess::binarize`] errors; failures are
    /// not cached.
    pub fn binarize(
        &mut self,
        image: &DynamicImage,
        threshold: u8,
        kernel_size: u32,
    ) -> Result<GrayImage, PipelineError> {
        let key = PreprocessKey::new(image, threshold, kernel_size);
        if let Some(mask) = self.entries.get(&key) {
            self.hits += 1;
            tracing::trace!(hits = self.hits, "preprocess cache hit");
            return Ok(mask.clone());
        }
        self.misses += 1;
        let mask = crate::preprocess::binarize(image, threshold, kernel_size)?;
        self.insert(key, mask.clone());
        Ok(mask)
    }

    /// Cached mask for `key`, if present.
    #[must_use]
    pub fn get(&self, key: &PreprocessKey) -> Option<&GrayImage> {
        self.entries.get(key)
    }

    /// Store a mask, evicting the oldest entry when full.
    pub fn insert(&mut self, key: PreprocessKey, mask: GrayImage) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.insert(key, mask).is_none() {
            self.order.push_back(key);
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    /// Number of cached masks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no masks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lookups served from the cache.
    #[must_use]
    pub const fn hits(&self) -> u64 {
        self.hits
    }

    /// Lookups that had to binarize.
    #[must_use]
    pub const fn misses(&self) -> u64 {
        self.misses
    }

    /// Drop every cached mask.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

impl Default for PreprocessCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
