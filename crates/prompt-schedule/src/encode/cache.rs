//! Per-compile memo of encoded texts.
//!
//! One cache lives for exactly one compile call. Segments whose resolved
//! text is identical share a single encoded value through an [`Arc`].

use std::collections::HashMap;
use std::sync::Arc;

/// Cache of encoded conditioning, keyed by resolved (unsplit) text.
#[derive(Debug)]
pub struct EncodingCache<C> {
    entries: HashMap<String, Arc<C>>,
    /// Hits counter for diagnostics.
    hits: u64,
    /// Misses counter for diagnostics.
    misses: u64,
}

impl<C> EncodingCache<C> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Look up `text`. Returns a shared handle on hit.
    pub fn get(&mut self, text: &str) -> Option<Arc<C>> {
        if let Some(entry) = self.entries.get(text) {
            self.hits += 1;
            Some(Arc::clone(entry))
        } else {
            self.misses += 1;
            None
        }
    }

    /// Store a freshly encoded value and return the shared handle.
    pub fn insert(&mut self, text: impl Into<String>, value: C) -> Arc<C> {
        let value = Arc::new(value);
        self.entries.insert(text.into(), Arc::clone(&value));
        value
    }

    /// Whether `text` has been encoded, without touching the counters.
    pub fn contains(&self, text: &str) -> bool {
        self.entries.contains_key(text)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Hit rate as a fraction (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl<C> Default for EncodingCache<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_hit_shares_value() {
        let mut cache = EncodingCache::new();
        let stored = cache.insert("a cat", vec![1.0f32, 2.0]);
        let hit = cache.get("a cat").unwrap();
        assert!(Arc::ptr_eq(&stored, &hit));
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn miss_is_counted() {
        let mut cache: EncodingCache<u8> = EncodingCache::new();
        assert!(cache.get("nothing").is_none());
        assert_eq!(cache.misses(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn contains_does_not_count() {
        let mut cache = EncodingCache::new();
        cache.insert("x", 1u8);
        assert!(cache.contains("x"));
        assert_eq!(cache.hits() + cache.misses(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn hit_rate_computation() {
        let mut cache = EncodingCache::new();
        cache.insert("t", 0u8);
        cache.get("t"); // hit
        cache.get("u"); // miss
        assert!((cache.hit_rate() - 0.5).abs() < 0.01);
    }
}
