//! Store contract shared by every backend and wrapper

use super::Blob;
use crate::Result;
use std::io::Read;

/// Trait for blob stores
///
/// Implemented by concrete backends ([`FileStore`](super::FileStore),
/// [`MemoryStore`](super::MemoryStore)) and by every wrapper in
/// [`crate::layer`]. Wrappers own an inner `BlobStore` and forward the
/// operations whose semantics they leave alone.
///
/// `get`, `put` and `delete` take `&mut self`: wrappers such as
/// [`Lru`](crate::layer::Lru) mutate bookkeeping on each of them, reads
/// included. Share a stack across threads by wrapping it in
/// [`Synchronized`](crate::layer::Synchronized).
pub trait BlobStore {
    /// Return the blob stored under `key`
    ///
    /// Fails with `NotFound` if the key doesn't exist.
    fn get(&mut self, key: &str) -> Result<Blob>;

    /// Store `length` bytes read from `blob` under `key`
    ///
    /// A stream that ends before `length` bytes fails the call with
    /// `LengthMismatch`.
    fn put(&mut self, key: &str, blob: &mut dyn Read, length: u64) -> Result<()>;

    /// Delete the blob stored under `key`
    fn delete(&mut self, key: &str) -> Result<()>;

    /// Check whether `key` is present
    ///
    /// May fail if the store is unavailable.
    fn contains(&self, key: &str) -> Result<bool>;

    /// Store an in-memory buffer
    fn put_bytes(&mut self, key: &str, data: &[u8]) -> Result<()> {
        let mut reader = data;
        self.put(key, &mut reader, data.len() as u64)
    }

    /// Read a whole blob into memory
    fn get_bytes(&mut self, key: &str) -> Result<Vec<u8>> {
        self.get(key)?.read_to_vec(key)
    }
}

impl<S: BlobStore + ?Sized> BlobStore for Box<S> {
    fn get(&mut self, key: &str) -> Result<Blob> {
        (**self).get(key)
    }

    fn put(&mut self, key: &str, blob: &mut dyn Read, length: u64) -> Result<()> {
        (**self).put(key, blob, length)
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        (**self).delete(key)
    }

    fn contains(&self, key: &str) -> Result<bool> {
        (**self).contains(key)
    }
}
