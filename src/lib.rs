//! # blobstack
//!
//! A pluggable blob store with composable behavioral layers.
//!
//! Backends store opaque byte streams under caller-supplied string keys.
//! Wrappers stack on top of any backend and add one behavior each.
//!
//! ## Core Concepts
//!
//! - **Stores**: [`BlobStore`] implementations, concrete or composed
//! - **FileStore**: durable directory backend; writes publish atomically by rename
//! - **Lru**: bounds the tracked size of a store, evicting least recently used blobs
//! - **Tiered**: fronts an authority with caches, populated asynchronously on full reads
//! - **Synchronized**: one lock around a stack so threads can share it
//! - **Namespaced**: roots every key under a tenant prefix
//!
//! ## Example
//!
//! ```ignore
//! use blobstack::{BlobStore, FileStore, Lru, MemoryStore, Synchronized, Tiered};
//!
//! let authority = FileStore::open("/var/lib/blobs")?;
//! let fast = Lru::new(64 << 20, MemoryStore::new());
//! let store = Synchronized::new(Tiered::new(authority, vec![Box::new(fast)]));
//!
//! store.put_bytes("/report.pdf", &bytes)?;
//! let blob = store.get("/report.pdf")?;
//! ```

pub mod config;
pub mod digest;
pub mod layer;
pub mod store;

mod error;

pub use config::{SharedStack, StackConfig};
pub use error::{Error, Result};
pub use layer::{
    CacheStore, Lru, Namespaced, PopulationEvent, Populations, Synchronized, Tiered,
};
pub use store::{Blob, BlobStore, FileStore, MemoryStore};
