//! Blob store contract and concrete backends
//!
//! This module defines the [`BlobStore`] trait every backend and wrapper
//! implements, the [`Blob`] stream handed back by reads, and the concrete
//! backends: a durable directory store and an in-memory map.

mod blob;
mod file_store;
mod memory;
mod traits;

pub use blob::Blob;
pub use file_store::FileStore;
pub use memory::MemoryStore;
pub use traits::BlobStore;
