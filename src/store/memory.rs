//! In-memory blob store for tests and examples

use super::{Blob, BlobStore};
use crate::{Error, Result};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

/// A blob store backed by a shared in-memory map
///
/// Clones share the same map, so a test can hand one clone to a wrapper
/// and inspect the contents through another.
#[derive(Clone, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<HashMap<String, Bytes>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the stored bytes for `key`, if any
    pub fn value(&self, key: &str) -> Option<Bytes> {
        self.values.lock().get(key).cloned()
    }

    /// Insert a value directly, bypassing the store contract
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.values.lock().insert(key.into(), data.into());
    }

    /// All stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.values.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of stored blobs
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    /// Check whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

impl BlobStore for MemoryStore {
    fn get(&mut self, key: &str) -> Result<Blob> {
        self.value(key)
            .map(Blob::from_bytes)
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    fn put(&mut self, key: &str, blob: &mut dyn Read, length: u64) -> Result<()> {
        let mut buf = Vec::with_capacity(length.min(1 << 20) as usize);
        blob.take(length).read_to_end(&mut buf)?;
        if buf.len() as u64 != length {
            return Err(Error::LengthMismatch {
                key: key.to_string(),
                expected: length,
                actual: buf.len() as u64,
            });
        }
        self.insert(key, buf);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.values.lock().remove(key);
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.values.lock().contains_key(key))
    }
}
