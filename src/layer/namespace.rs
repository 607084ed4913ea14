//! Key prefixing for tenants sharing one backend

use crate::store::{Blob, BlobStore};
use crate::Result;
use std::io::Read;

/// Roots every key under a fixed prefix before delegating
///
/// Keys are treated as slash-separated paths. Both the prefix and the key
/// are cleaned (empty and `.` segments dropped, `..` resolved), and the key
/// is cleaned on its own first, so `..` in a key never climbs out of the
/// namespace.
pub struct Namespaced<S> {
    prefix: String,
    inner: S,
}

impl<S: BlobStore> Namespaced<S> {
    /// Wrap `inner` under `prefix`
    pub fn new(prefix: impl AsRef<str>, inner: S) -> Self {
        Namespaced {
            prefix: clean(prefix.as_ref()),
            inner,
        }
    }

    /// The cleaned prefix, always starting with `/`
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The key the wrapped store sees for `key`
    pub fn scoped_key(&self, key: &str) -> String {
        let key = clean(key);
        if self.prefix == "/" {
            key
        } else if key == "/" {
            self.prefix.clone()
        } else {
            format!("{}{}", self.prefix, key)
        }
    }

    /// Get the wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: BlobStore> BlobStore for Namespaced<S> {
    fn get(&mut self, key: &str) -> Result<Blob> {
        let key = self.scoped_key(key);
        self.inner.get(&key)
    }

    fn put(&mut self, key: &str, blob: &mut dyn Read, length: u64) -> Result<()> {
        let key = self.scoped_key(key);
        self.inner.put(&key, blob, length)
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        let key = self.scoped_key(key);
        self.inner.delete(&key)
    }

    fn contains(&self, key: &str) -> Result<bool> {
        self.inner.contains(&self.scoped_key(key))
    }
}

/// Clean a slash path into rooted form
fn clean(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_clean() {
        assert_eq!(clean(""), "/");
        assert_eq!(clean("tenant"), "/tenant");
        assert_eq!(clean("/a//b/./c/"), "/a/b/c");
        assert_eq!(clean("a/../../b"), "/b");
    }

    #[test]
    fn test_keys_are_prefixed() {
        let backing = MemoryStore::new();
        let mut store = Namespaced::new("tenant-a", backing.clone());

        store.put_bytes("/foo", b"1").unwrap();
        store.put_bytes("bar/baz", b"2").unwrap();

        assert_eq!(backing.keys(), vec!["/tenant-a/bar/baz", "/tenant-a/foo"]);
        assert_eq!(store.get_bytes("foo").unwrap(), b"1");
        assert!(store.contains("/bar/baz").unwrap());

        store.delete("/foo").unwrap();
        assert!(!backing.contains("/tenant-a/foo").unwrap());
    }

    #[test]
    fn test_tenants_are_isolated() {
        let backing = MemoryStore::new();
        let mut a = Namespaced::new("a", backing.clone());
        let mut b = Namespaced::new("b", backing.clone());

        a.put_bytes("/shared", b"from a").unwrap();
        b.put_bytes("/shared", b"from b").unwrap();
        a.put_bytes("../b/shared", b"escape").unwrap();

        assert_eq!(b.get_bytes("/shared").unwrap(), b"from b");
        assert_eq!(a.get_bytes("/shared").unwrap(), b"from a");
        assert_eq!(backing.value("/a/b/shared").as_deref(), Some(&b"escape"[..]));
        assert_eq!(backing.len(), 3);
    }

    #[test]
    fn test_root_prefix_is_identity_after_cleaning() {
        let store = Namespaced::new("/", MemoryStore::new());
        assert_eq!(store.prefix(), "/");
        assert_eq!(store.scoped_key("foo/./bar"), "/foo/bar");

        let store = Namespaced::new("tenant//a/", MemoryStore::new());
        assert_eq!(store.prefix(), "/tenant/a");
    }
}
