//! URL-keyed image cache for the prefetch window

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use log::debug;
use lru::LruCache;

use super::loader::{LoadError, LoadedImage};

#[derive(Debug, Clone)]
pub enum CacheEntry {
    Loading,
    Ready(Arc<LoadedImage>),
    /// Settled without an image; keeps the error text for display
    Failed(String),
}

impl CacheEntry {
    pub fn is_settled(&self) -> bool {
        !matches!(self, CacheEntry::Loading)
    }
}

/// LRU-bounded image cache. Entries are created as `Loading` the moment a
/// load is requested, so a URL is never requested twice concurrently.
pub struct ImageCache {
    entries: LruCache<String, CacheEntry>,
}

impl ImageCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Mark `url` as loading. Returns false when it is already loading or
    /// loaded; failed entries are retried.
    pub fn request(&mut self, url: &str) -> bool {
        if let Some(entry) = self.entries.get(url) {
            if !matches!(entry, CacheEntry::Failed(_)) {
                return false;
            }
        }
        self.insert(url, CacheEntry::Loading);
        true
    }

    /// Record a load outcome. Completions for URLs that were evicted in the
    /// meantime are stored too and dropped by the next `retain_only`.
    pub fn settle(&mut self, url: &str, outcome: Result<LoadedImage, LoadError>) {
        let entry = match outcome {
            Ok(image) => CacheEntry::Ready(Arc::new(image)),
            Err(err) => CacheEntry::Failed(err.to_string()),
        };
        self.insert(url, entry);
    }

    fn insert(&mut self, url: &str, entry: CacheEntry) {
        if let Some((evicted, _)) = self.entries.push(url.to_string(), entry) {
            if evicted != url {
                debug!("Image cache over capacity, dropped {evicted}");
            }
        }
    }

    #[must_use]
    pub fn peek(&self, url: &str) -> Option<&CacheEntry> {
        self.entries.peek(url)
    }

    /// Ready image for `url`, promoting it in LRU order.
    pub fn get(&mut self, url: &str) -> Option<Arc<LoadedImage>> {
        match self.entries.get(url)? {
            CacheEntry::Ready(image) => Some(Arc::clone(image)),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_ready(&self, url: &str) -> bool {
        matches!(self.entries.peek(url), Some(CacheEntry::Ready(_)))
    }

    #[must_use]
    pub fn is_settled(&self, url: &str) -> bool {
        self.entries.peek(url).is_some_and(CacheEntry::is_settled)
    }

    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains(url)
    }

    /// Cached URLs, most recently used first.
    pub fn urls(&self) -> Vec<String> {
        self.entries.iter().map(|(url, _)| url.clone()).collect()
    }

    /// Drop every entry not in `keep`, returning the dropped URLs.
    pub fn retain_only(&mut self, keep: &HashSet<&str>) -> Vec<String> {
        let evicted: Vec<String> = self
            .entries
            .iter()
            .filter(|(url, _)| !keep.contains(url.as_str()))
            .map(|(url, _)| url.clone())
            .collect();

        for url in &evicted {
            self.entries.pop(url);
        }
        evicted
    }

    /// Grow (never shrink) the capacity.
    pub fn ensure_capacity(&mut self, capacity: usize) {
        if let Some(cap) = NonZeroUsize::new(capacity) {
            if cap > self.entries.cap() {
                self.entries.resize(cap);
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn image(url: &str) -> LoadedImage {
        LoadedImage {
            url: url.to_string(),
            bytes: vec![0; 16],
            width: 10,
            height: 20,
        }
    }

    #[test]
    fn request_is_single_flight() {
        let mut cache = ImageCache::new(8);
        assert!(cache.request("a"));
        assert!(!cache.request("a"));
        assert!(!cache.is_settled("a"));

        cache.settle("a", Ok(image("a")));
        assert!(cache.is_ready("a"));
        assert!(!cache.request("a"));
        assert_eq!(cache.get("a").unwrap().height, 20);
    }

    #[test]
    fn failed_entries_settle_and_retry() {
        let mut cache = ImageCache::new(8);
        cache.request("a");
        cache.settle("a", Err(LoadError::generic("boom")));
        assert!(cache.is_settled("a"));
        assert!(!cache.is_ready("a"));
        assert!(cache.get("a").is_none());

        assert!(cache.request("a"));
        assert!(!cache.is_settled("a"));
    }

    #[test]
    fn retain_only_evicts_outside_keep_set() {
        let mut cache = ImageCache::new(8);
        for url in ["a", "b", "c"] {
            cache.request(url);
        }
        let keep: HashSet<&str> = ["b"].into_iter().collect();
        let mut evicted = cache.retain_only(&keep);
        evicted.sort();
        assert_eq!(evicted, vec!["a".to_string(), "c".to_string()]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn late_completion_is_cached() {
        let mut cache = ImageCache::new(8);
        cache.settle("gone", Ok(image("gone")));
        assert!(cache.is_ready("gone"));
    }

    #[test]
    fn lru_bound_holds() {
        let mut cache = ImageCache::new(2);
        cache.request("a");
        cache.request("b");
        cache.request("c");
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains("a"));

        cache.ensure_capacity(1);
        assert_eq!(cache.capacity(), 2);
        cache.ensure_capacity(6);
        assert_eq!(cache.capacity(), 6);
    }
}
