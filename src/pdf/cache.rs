//! Bounded page cache for rendered PDF pages
//!
//! Entries are evicted oldest-produced first. Reads go through `peek`, so a
//! hit never changes eviction order.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use lru::LruCache;

use super::types::{PageBitmap, PageKey};

/// A rendered bitmap plus when it was produced
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub bitmap: Arc<PageBitmap>,
    /// Production sequence number, strictly increasing per cache
    pub generation: u64,
    pub produced_at: Instant,
}

/// Bounded cache of rendered pages
pub struct PageCache {
    cache: LruCache<PageKey, CacheEntry>,
    next_generation: u64,
}

impl PageCache {
    /// Create a new cache with the given capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).expect("1 is non-zero")),
            ),
            next_generation: 0,
        }
    }

    /// Get a cached page without touching eviction order
    #[must_use]
    pub fn get(&self, key: &PageKey) -> Option<Arc<PageBitmap>> {
        self.cache.peek(key).map(|entry| Arc::clone(&entry.bitmap))
    }

    /// Full entry for a key, including its generation
    #[must_use]
    pub fn entry(&self, key: &PageKey) -> Option<&CacheEntry> {
        self.cache.peek(key)
    }

    #[must_use]
    pub fn contains(&self, key: &PageKey) -> bool {
        self.cache.contains(key)
    }

    /// Insert a freshly produced page, returning a shared handle to it.
    ///
    /// A key that is already present keeps its original bitmap.
    pub fn insert(&mut self, key: PageKey, bitmap: PageBitmap) -> Arc<PageBitmap> {
        if let Some(existing) = self.cache.peek(&key) {
            return Arc::clone(&existing.bitmap);
        }

        let bitmap = Arc::new(bitmap);
        let entry = CacheEntry {
            bitmap: Arc::clone(&bitmap),
            generation: self.next_generation,
            produced_at: Instant::now(),
        };
        self.next_generation += 1;

        if let Some((evicted, old)) = self.cache.push(key, entry) {
            log::debug!(
                "Evicted page {} (zoom {}) generation {}",
                evicted.page,
                evicted.zoom(),
                old.generation
            );
        }
        bitmap
    }

    /// Clear all cached pages
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    /// Number of cached pages
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}
