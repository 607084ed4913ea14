//! Size-bounded LRU eviction over a backing store

use crate::store::{Blob, BlobStore};
use crate::Result;
use lru::LruCache;
use std::io::Read;
use tracing::{debug, warn};

/// Bounds the tracked size of a backing store, evicting least recently used blobs
///
/// Only blobs written through this wrapper are tracked; the bound is on the
/// sum of their declared lengths, not on the backend's real disk usage.
/// A `max_size` of zero disables eviction.
///
/// Every operation except `contains` mutates the recency order, so sharing
/// an `Lru` between threads requires [`Synchronized`](super::Synchronized)
/// with exclusive locking on reads.
pub struct Lru<S> {
    max_size: u64,
    current_size: u64,
    /// Tracked key → declared size, most recently used first
    entries: LruCache<String, u64>,
    inner: S,
}

impl<S: BlobStore> Lru<S> {
    /// Wrap `inner`, bounding it to `max_size` bytes
    pub fn new(max_size: u64, inner: S) -> Self {
        Lru {
            max_size,
            current_size: 0,
            entries: LruCache::unbounded(),
            inner,
        }
    }

    /// Configured bound in bytes (zero means unbounded)
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Sum of the sizes of all tracked blobs
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    /// Number of tracked blobs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tracked keys, most recently used first
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Get the backing store
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Track a blob already present in the backing store as most recently used
    ///
    /// Used to adopt the records of a reopened cache. Evicts if the bound is
    /// exceeded.
    pub fn track(&mut self, key: impl Into<String>, length: u64) {
        if let Some(previous) = self.entries.put(key.into(), length) {
            self.current_size -= previous;
        }
        self.current_size += length;
        self.evict();
    }

    fn evict(&mut self) {
        while self.max_size != 0 && self.current_size > self.max_size {
            let Some((key, size)) = self.entries.pop_lru() else {
                break;
            };
            self.current_size -= size;
            debug!(key = %key, size, "evicting least recently used blob");

            if let Err(e) = self.inner.delete(&key) {
                warn!(key = %key, error = %e, "failed to delete evicted blob");
            }
        }
    }
}

impl<S: BlobStore> BlobStore for Lru<S> {
    fn get(&mut self, key: &str) -> Result<Blob> {
        self.entries.promote(key);
        self.inner.get(key)
    }

    fn put(&mut self, key: &str, blob: &mut dyn Read, length: u64) -> Result<()> {
        self.inner.put(key, blob, length)?;
        self.track(key, length);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        if let Some(size) = self.entries.pop(key) {
            self.current_size -= size;
        }
        self.inner.delete(key)
    }

    fn contains(&self, key: &str) -> Result<bool> {
        self.inner.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::Error;

    /// Fails every put, to check bookkeeping stays untouched
    struct RejectingStore;

    impl BlobStore for RejectingStore {
        fn get(&mut self, key: &str) -> Result<Blob> {
            Err(Error::NotFound(key.to_string()))
        }

        fn put(&mut self, _key: &str, _blob: &mut dyn Read, _length: u64) -> Result<()> {
            Err(Error::Unavailable("rejecting".into()))
        }

        fn delete(&mut self, key: &str) -> Result<()> {
            Err(Error::NotFound(key.to_string()))
        }

        fn contains(&self, _key: &str) -> Result<bool> {
            Ok(false)
        }
    }

    fn tracked_sum(lru: &Lru<MemoryStore>) -> u64 {
        lru.keys()
            .iter()
            .map(|k| lru.inner().value(k).map_or(0, |v| v.len() as u64))
            .sum()
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let backing = MemoryStore::new();
        let mut lru = Lru::new(3, backing.clone());

        lru.put_bytes("/foo", &[0x1, 0x2]).unwrap();
        lru.put_bytes("/bar", &[0x1, 0x2]).unwrap();

        assert!(!backing.contains("/foo").unwrap());
        assert_eq!(backing.value("/bar").map(|v| v.len()), Some(2));
        assert_eq!(lru.current_size(), 2);
        assert_eq!(lru.keys(), vec!["/bar".to_string()]);
    }

    #[test]
    fn test_get_refreshes_recency() {
        let backing = MemoryStore::new();
        let mut lru = Lru::new(4, backing.clone());

        lru.put_bytes("a", b"1").unwrap();
        lru.put_bytes("b", b"2").unwrap();
        lru.put_bytes("c", b"3").unwrap();
        lru.get("a").unwrap();
        lru.put_bytes("d", b"45").unwrap();

        // b was least recently used once a was read
        assert!(!backing.contains("b").unwrap());
        assert!(backing.contains("a").unwrap());
        assert!(backing.contains("c").unwrap());
        assert!(backing.contains("d").unwrap());
        assert_eq!(lru.keys(), vec!["d", "a", "c"]);
        assert_eq!(lru.current_size(), 4);
    }

    #[test]
    fn test_oversized_entry_is_evicted_immediately() {
        let backing = MemoryStore::new();
        let mut lru = Lru::new(3, backing.clone());

        lru.put_bytes("small", b"1").unwrap();
        lru.put_bytes("huge", b"12345").unwrap();

        assert!(!backing.contains("huge").unwrap());
        // Everything older was evicted first
        assert!(!backing.contains("small").unwrap());
        assert_eq!(lru.current_size(), 0);
        assert!(lru.is_empty());
    }

    #[test]
    fn test_zero_max_size_is_unbounded() {
        let backing = MemoryStore::new();
        let mut lru = Lru::new(0, backing.clone());

        for i in 0..50 {
            lru.put_bytes(&format!("k{}", i), &[0u8; 100]).unwrap();
        }

        assert_eq!(backing.len(), 50);
        assert_eq!(lru.current_size(), 5000);
    }

    #[test]
    fn test_put_existing_key_updates_size() {
        let backing = MemoryStore::new();
        let mut lru = Lru::new(10, backing.clone());

        lru.put_bytes("a", b"1234").unwrap();
        lru.put_bytes("b", b"12").unwrap();
        lru.put_bytes("a", b"1").unwrap();

        assert_eq!(lru.current_size(), 3);
        assert_eq!(lru.keys(), vec!["a", "b"]);
        assert_eq!(lru.current_size(), tracked_sum(&lru));
    }

    #[test]
    fn test_delete_drops_bookkeeping() {
        let backing = MemoryStore::new();
        let mut lru = Lru::new(10, backing.clone());

        lru.put_bytes("a", b"1234").unwrap();
        lru.delete("a").unwrap();

        assert_eq!(lru.current_size(), 0);
        assert!(lru.is_empty());
        assert!(backing.is_empty());
    }

    #[test]
    fn test_track_adopts_existing_blobs() {
        let backing = MemoryStore::new();
        backing.insert("old", vec![0u8; 3]);
        backing.insert("new", vec![0u8; 3]);

        let mut lru = Lru::new(4, backing.clone());
        assert_eq!(lru.max_size(), 4);
        lru.track("old", 3);
        lru.track("new", 3);

        // Adopting past the bound evicts the oldest adopted blob
        assert_eq!(lru.keys(), vec!["new".to_string()]);
        assert_eq!(lru.current_size(), 3);
        assert_eq!(backing.keys(), vec!["new".to_string()]);
    }

    #[test]
    fn test_failed_put_leaves_bookkeeping_alone() {
        let mut lru = Lru::new(10, RejectingStore);

        let err = lru.put_bytes("a", b"1234").unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
        assert_eq!(lru.current_size(), 0);
        assert!(lru.is_empty());
    }

    #[test]
    fn test_size_stays_bounded() {
        let backing = MemoryStore::new();
        let mut lru = Lru::new(64, backing.clone());

        for i in 0..200u64 {
            let len = (i * 7 % 23) as usize;
            lru.put_bytes(&format!("k{}", i % 31), &vec![0u8; len]).unwrap();
            if i % 5 == 0 {
                let _ = lru.get(&format!("k{}", i % 13));
            }

            assert!(lru.current_size() <= 64);
            assert_eq!(lru.current_size(), tracked_sum(&lru));
            assert_eq!(lru.len(), backing.len());
        }
    }
}
