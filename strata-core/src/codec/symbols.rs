//! Bounded symbol/venue hash cache
//!
//! Strings are mapped to 64-bit FNV-1a hashes. The cache memoizes both
//! directions so hot symbols skip rehashing on encode and resolve back to
//! their text on decode. It is owned by whoever builds the codec (a queue or
//! a pool) and shared through an `Arc`; there is no process-wide table.
//!
//! Once `capacity` distinct strings are cached, further strings are still
//! hashed on every call but not remembered, and decoding their hashes falls
//! back to [`placeholder`].

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::debug;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Deterministic 64-bit FNV-1a hash
#[inline]
pub fn fnv1a(value: &str) -> u64 {
    value.bytes().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
    })
}

/// Text used for a hash the cache cannot resolve
pub fn placeholder(hash: u64) -> String {
    format!("#{:016x}", hash)
}

pub struct SymbolCache {
    by_name: DashMap<String, u64>,
    by_hash: DashMap<u64, String>,
    capacity: usize,
    len: AtomicUsize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SymbolCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            by_name: DashMap::with_capacity(capacity),
            by_hash: DashMap::with_capacity(capacity),
            capacity,
            len: AtomicUsize::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Hash `name`, memoizing it while there is room
    pub fn intern(&self, name: &str) -> u64 {
        if let Some(hash) = self.by_name.get(name) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return *hash;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let hash = fnv1a(name);
        self.remember(name, hash);
        hash
    }

    /// Memoize `name` under `hash` while there is room. On a hash collision
    /// the first string keeps the slot and `name` is not memoized.
    pub(crate) fn remember(&self, name: &str, hash: u64) {
        if !self.reserve() {
            return;
        }
        // Reverse mapping first: once `by_name` hits, `resolve` must succeed
        let mut inserted = false;
        let owned = {
            let slot = self.by_hash.entry(hash).or_insert_with(|| {
                inserted = true;
                name.to_owned()
            });
            slot.as_str() == name
        };
        if !inserted {
            // Same name interned concurrently, or a collision
            self.len.fetch_sub(1, Ordering::Relaxed);
        }
        if owned {
            self.by_name.entry(name.to_owned()).or_insert(hash);
        } else {
            debug!(hash = %placeholder(hash), symbol = name, "Symbol hash collision, not memoized");
        }
    }

    /// Text for a hash previously interned
    pub fn resolve(&self, hash: u64) -> Option<String> {
        self.by_hash.get(&hash).map(|name| name.clone())
    }

    /// Text for a hash, or the placeholder if unknown
    pub fn resolve_or_placeholder(&self, hash: u64) -> String {
        self.resolve(hash).unwrap_or_else(|| placeholder(hash))
    }

    fn reserve(&self) -> bool {
        self.len
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |len| {
                (len < self.capacity).then_some(len + 1)
            })
            .is_ok()
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// (hits, misses) since creation
    pub fn hit_stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

impl Default for SymbolCache {
    fn default() -> Self {
        Self::new(4096)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_known_values() {
        // Reference vectors for 64-bit FNV-1a
        assert_eq!(fnv1a(""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a("a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn test_fnv1a_deterministic() {
        assert_eq!(fnv1a("BTC-USD"), fnv1a("BTC-USD"));
        assert_ne!(fnv1a("BTC-USD"), fnv1a("ETH-USD"));
    }

    #[test]
    fn test_intern_and_resolve() {
        let cache = SymbolCache::new(8);
        let hash = cache.intern("BTC-USD");
        assert_eq!(hash, fnv1a("BTC-USD"));
        assert_eq!(cache.resolve(hash).as_deref(), Some("BTC-USD"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_repeat_intern_hits_cache() {
        let cache = SymbolCache::new(8);
        cache.intern("ETH-USD");
        cache.intern("ETH-USD");
        cache.intern("ETH-USD");
        assert_eq!(cache.hit_stats(), (2, 1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_bounded_capacity() {
        let cache = SymbolCache::new(2);
        cache.intern("A");
        cache.intern("B");
        let c = cache.intern("C");

        assert!(cache.is_full());
        assert_eq!(cache.len(), 2);
        assert_eq!(c, fnv1a("C"));
        assert_eq!(cache.resolve(c), None);
        assert_eq!(cache.resolve_or_placeholder(c), placeholder(c));
    }

    #[test]
    fn test_collision_keeps_first_symbol() {
        let cache = SymbolCache::new(8);
        let hash = cache.intern("BTC-USD");

        // A different string landing on the same hash
        cache.remember("XBT-USD", hash);

        assert_eq!(cache.resolve(hash).as_deref(), Some("BTC-USD"));
        assert_eq!(cache.len(), 1);
        assert!(!cache.by_name.contains_key("XBT-USD"));
        assert_eq!(cache.intern("BTC-USD"), hash);
        assert_eq!(cache.hit_stats(), (1, 1));
    }

    #[test]
    fn test_placeholder_format() {
        assert_eq!(placeholder(0xab), "#00000000000000ab");
    }
}
