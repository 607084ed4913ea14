//! Lock-based wrapper making a store stack safe to share between threads

use crate::store::{Blob, BlobStore};
use crate::Result;
use parking_lot::RwLock;
use std::io::Read;

/// Serializes access to a store that is not safe for concurrent use
///
/// `get`, `put` and `delete` take the lock exclusively. `get` has to: an
/// [`Lru`](super::Lru) anywhere below reorders its recency list on every
/// read, so readers holding a shared lock would race on that list.
/// Only `contains` takes the lock shared.
///
/// The operations are available through `&self`, so a `Synchronized` can be
/// shared behind an `Arc`. It also implements [`BlobStore`] for further
/// composition.
pub struct Synchronized<S> {
    inner: RwLock<S>,
}

impl<S: BlobStore> Synchronized<S> {
    /// Wrap `inner`
    pub fn new(inner: S) -> Self {
        Synchronized {
            inner: RwLock::new(inner),
        }
    }

    /// Return the blob stored under `key`
    pub fn get(&self, key: &str) -> Result<Blob> {
        self.inner.write().get(key)
    }

    /// Store `length` bytes read from `blob` under `key`
    pub fn put(&self, key: &str, blob: &mut dyn Read, length: u64) -> Result<()> {
        self.inner.write().put(key, blob, length)
    }

    /// Delete the blob stored under `key`
    pub fn delete(&self, key: &str) -> Result<()> {
        self.inner.write().delete(key)
    }

    /// Check whether `key` is present
    pub fn contains(&self, key: &str) -> Result<bool> {
        self.inner.read().contains(key)
    }

    /// Store an in-memory buffer
    pub fn put_bytes(&self, key: &str, data: &[u8]) -> Result<()> {
        self.inner.write().put_bytes(key, data)
    }

    /// Read a whole blob into memory, holding the lock only to open it
    pub fn get_bytes(&self, key: &str) -> Result<Vec<u8>> {
        self.get(key)?.read_to_vec(key)
    }

    /// Run `f` with exclusive access to the wrapped store
    pub fn with<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.inner.write())
    }

    /// Unwrap the inner store
    pub fn into_inner(self) -> S {
        self.inner.into_inner()
    }
}

impl<S: BlobStore> BlobStore for Synchronized<S> {
    fn get(&mut self, key: &str) -> Result<Blob> {
        self.inner.get_mut().get(key)
    }

    fn put(&mut self, key: &str, blob: &mut dyn Read, length: u64) -> Result<()> {
        self.inner.get_mut().put(key, blob, length)
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.inner.get_mut().delete(key)
    }

    fn contains(&self, key: &str) -> Result<bool> {
        self.inner.read().contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Lru;
    use crate::store::MemoryStore;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_concurrent_clients() {
        let backing = MemoryStore::new();
        let store = Arc::new(Synchronized::new(Lru::new(0, backing.clone())));

        let clients: Vec<_> = ["foo", "bar", "baz", "qux"]
            .into_iter()
            .map(|ns| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..100 {
                        let key = format!("/{}/{}", ns, i);
                        let val = format!("val{}", i);

                        store.put_bytes(&key, val.as_bytes()).unwrap();
                        assert!(store.contains(&key).unwrap(), "key should exist");
                        assert_eq!(store.get_bytes(&key).unwrap(), val.as_bytes());
                        store.delete(&key).unwrap();
                    }
                })
            })
            .collect();

        for client in clients {
            client.join().unwrap();
        }

        assert!(backing.is_empty(), "expected zero values after all clients");
        assert_eq!(store.with(|lru| lru.current_size()), 0);
    }

    #[test]
    fn test_into_inner() {
        let store = Synchronized::new(MemoryStore::new());
        store.put_bytes("k", b"v").unwrap();

        let inner = store.into_inner();
        assert_eq!(inner.value("k").as_deref(), Some(&b"v"[..]));
    }
}
