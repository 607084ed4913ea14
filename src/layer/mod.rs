//! Composable wrappers over a [`BlobStore`](crate::store::BlobStore)
//!
//! Each wrapper owns an inner store and changes the semantics of some
//! operations, forwarding the rest. A typical stack:
//!
//! ```ignore
//! Synchronized::new(Tiered::new(authority, vec![Box::new(Lru::new(max, fast))]))
//! ```

mod eviction;
mod namespace;
mod sync;
mod tiered;

pub use eviction::Lru;
pub use namespace::Namespaced;
pub use sync::Synchronized;
pub use tiered::{CacheStore, PopulationEvent, Populations, Tiered};
