//! Two-tier result cache with clear-all eviction.
//!
//! Tier 1 maps a threshold to the full-resolution result for the current
//! source version. Tier 2 maps a display size and threshold to a scaled
//! rendering of that result.

use std::hash::Hash;
use std::sync::Arc;

use hashbrown::HashMap;
use tracing::debug;

use crate::display::DisplayImage;
use crate::threshold::Threshold;
use crate::worker::ProcessedResult;

pub const DEFAULT_CACHE_CAPACITY: usize = 10;

/// Bounded map that drops every entry when a new key would exceed capacity.
#[derive(Debug)]
pub struct ClearAllCache<K, V> {
    entries: HashMap<K, V>,
    capacity: usize,
}

impl<K: Eq + Hash, V> ClearAllCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be positive");
        Self {
            entries: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Inserts `value`, clearing the whole map first if `key` is new and
    /// the map is full. Returns true if an eviction happened.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let evict = self.entries.len() >= self.capacity && !self.entries.contains_key(&key);
        if evict {
            debug!(capacity = self.capacity, "cache tier full, clearing");
            self.entries.clear();
        }

        self.entries.insert(key, value);
        evict
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayKey {
    pub width: u32,
    pub height: u32,
    pub threshold: Threshold,
}

#[derive(Debug)]
pub struct ResultCache {
    source_version: u64,
    threshold: Option<Threshold>,
    processed: ClearAllCache<Threshold, Arc<ProcessedResult>>,
    display: ClearAllCache<DisplayKey, Arc<DisplayImage>>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            source_version: 0,
            threshold: None,
            processed: ClearAllCache::new(capacity),
            display: ClearAllCache::new(capacity),
        }
    }

    pub fn source_version(&self) -> u64 {
        self.source_version
    }

    pub fn selected_threshold(&self) -> Option<Threshold> {
        self.threshold
    }

    /// Drops both tiers; called whenever the source image is replaced.
    pub fn invalidate_source(&mut self, source_version: u64) {
        debug!(
            from = self.source_version,
            to = source_version,
            "invalidating result cache"
        );
        self.source_version = source_version;
        self.processed.clear();
        self.display.clear();
    }

    /// Records the active threshold; tier 2 is cleared if it changed.
    pub fn select_threshold(&mut self, threshold: Threshold) {
        if self.threshold != Some(threshold) {
            self.display.clear();
            self.threshold = Some(threshold);
        }
    }

    pub fn processed(
        &self,
        source_version: u64,
        threshold: Threshold,
    ) -> Option<Arc<ProcessedResult>> {
        if source_version != self.source_version {
            return None;
        }

        self.processed
            .get(&threshold)
            .filter(|result| result.source_version == source_version)
            .cloned()
    }

    /// Returns false if `result` was computed against a stale source.
    pub fn insert_processed(&mut self, result: Arc<ProcessedResult>) -> bool {
        if result.source_version != self.source_version {
            debug!(
                result_version = result.source_version,
                current_version = self.source_version,
                "discarding stale result"
            );
            return false;
        }

        self.processed.insert(result.threshold, result);
        true
    }

    pub fn display(&self, key: &DisplayKey) -> Option<Arc<DisplayImage>> {
        if self.threshold != Some(key.threshold) {
            return None;
        }

        self.display
            .get(key)
            .filter(|image| image.source_version == self.source_version)
            .cloned()
    }

    /// Returns false if `image` belongs to a stale source or threshold.
    pub fn insert_display(&mut self, key: DisplayKey, image: Arc<DisplayImage>) -> bool {
        if self.threshold != Some(key.threshold) || image.source_version != self.source_version {
            return false;
        }

        self.display.insert(key, image);
        true
    }

    pub fn processed_len(&self) -> usize {
        self.processed.len()
    }

    pub fn display_len(&self) -> usize {
        self.display.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel_buffer::PixelBuffer;

    fn threshold(value: i64) -> Threshold {
        Threshold::new(value).unwrap()
    }

    fn result(source_version: u64, value: i64) -> Arc<ProcessedResult> {
        Arc::new(ProcessedResult {
            buffer: PixelBuffer::filled(1, 1, &[1, 2, 3]).unwrap(),
            threshold: threshold(value),
            source_version,
        })
    }

    fn display_image(source_version: u64, value: i64) -> Arc<DisplayImage> {
        Arc::new(DisplayImage::new(
            image::RgbaImage::new(2, 2),
            threshold(value),
            source_version,
        ))
    }

    #[test]
    #[should_panic(expected = "cache capacity must be positive")]
    fn zero_capacity_is_rejected() {
        ClearAllCache::<u32, u32>::new(0);
    }

    #[test]
    fn clear_all_eviction() {
        let mut cache = ClearAllCache::new(3);
        assert!(!cache.insert(1, "a"));
        assert!(!cache.insert(2, "b"));
        assert!(!cache.insert(3, "c"));
        assert_eq!(cache.len(), 3);

        assert!(cache.insert(4, "d"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&4), Some(&"d"));
        assert!(cache.get(&1).is_none());
    }

    #[test]
    fn replacing_existing_key_does_not_evict() {
        let mut cache = ClearAllCache::new(2);
        cache.insert(1, "a");
        cache.insert(2, "b");

        assert!(!cache.insert(2, "B"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&2), Some(&"B"));
    }

    #[test]
    fn processed_hit_and_miss() {
        let mut cache = ResultCache::new(4);
        cache.invalidate_source(1);

        assert!(cache.insert_processed(result(1, 60)));
        assert!(cache.processed(1, threshold(60)).is_some());
        assert!(cache.processed(1, threshold(61)).is_none());
        assert!(cache.processed(2, threshold(60)).is_none());
    }

    #[test]
    fn stale_processed_insert_is_rejected() {
        let mut cache = ResultCache::new(4);
        cache.invalidate_source(2);

        assert!(!cache.insert_processed(result(1, 60)));
        assert_eq!(cache.processed_len(), 0);
    }

    #[test]
    fn source_invalidation_clears_both_tiers() {
        let mut cache = ResultCache::new(4);
        cache.invalidate_source(1);
        cache.select_threshold(threshold(60));
        cache.insert_processed(result(1, 60));

        let key = DisplayKey {
            width: 2,
            height: 2,
            threshold: threshold(60),
        };
        assert!(cache.insert_display(key, display_image(1, 60)));

        cache.invalidate_source(2);

        assert!(cache.processed(1, threshold(60)).is_none());
        assert!(cache.processed(2, threshold(60)).is_none());
        assert!(cache.display(&key).is_none());
        assert_eq!(cache.processed_len(), 0);
        assert_eq!(cache.display_len(), 0);
    }

    #[test]
    fn threshold_change_clears_display_tier_only() {
        let mut cache = ResultCache::new(4);
        cache.invalidate_source(1);
        cache.select_threshold(threshold(60));
        cache.insert_processed(result(1, 60));

        let key = DisplayKey {
            width: 10,
            height: 5,
            threshold: threshold(60),
        };
        cache.insert_display(key, display_image(1, 60));
        assert!(cache.display(&key).is_some());

        cache.select_threshold(threshold(60));
        assert!(cache.display(&key).is_some(), "same threshold keeps tier 2");

        cache.select_threshold(threshold(70));
        assert_eq!(cache.display_len(), 0);
        assert!(cache.processed(1, threshold(60)).is_some());

        cache.select_threshold(threshold(60));
        assert!(cache.display(&key).is_none());
    }

    #[test]
    fn display_insert_for_other_threshold_is_rejected() {
        let mut cache = ResultCache::new(4);
        cache.invalidate_source(1);
        cache.select_threshold(threshold(60));

        let key = DisplayKey {
            width: 2,
            height: 2,
            threshold: threshold(80),
        };
        assert!(!cache.insert_display(key, display_image(1, 80)));
        assert!(cache.display(&key).is_none());
    }

    #[test]
    fn processed_tier_evicts_when_full() {
        let mut cache = ResultCache::new(2);
        cache.invalidate_source(1);
        cache.insert_processed(result(1, 1));
        cache.insert_processed(result(1, 2));
        cache.insert_processed(result(1, 3));

        assert_eq!(cache.processed_len(), 1);
        assert!(cache.processed(1, threshold(3)).is_some());
        assert!(cache.processed(1, threshold(1)).is_none());
    }
}
