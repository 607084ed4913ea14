//! Stack configuration
//!
//! Describes a composed store as JSON, stored by default in
//! `~/.config/blobstack/config.json`:
//!
//! ```json
//! {
//!   "authority": { "root": "/var/lib/blobs", "fresh": false },
//!   "caches": [ { "root": "/tmp/blob-cache", "max_size": 1048576, "persistent": true } ],
//!   "namespace": "tenant-a"
//! }
//! ```
//!
//! A cache tier is wiped on every build unless `persistent` is set. A
//! process that builds a stack per invocation, like the CLI, only gets
//! cache hits from persistent tiers.

use crate::layer::{CacheStore, Lru, Namespaced, Populations, Synchronized, Tiered};
use crate::store::{BlobStore, FileStore};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A fully composed, thread-safe stack
pub type SharedStack = Synchronized<Box<dyn BlobStore + Send + Sync>>;

/// The authoritative filesystem store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityConfig {
    /// Store root directory
    pub root: PathBuf,
    /// Wipe the root on startup instead of reopening it
    #[serde(default)]
    pub fresh: bool,
}

/// One filesystem cache tier
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache root directory (wiped on startup unless persistent)
    pub root: PathBuf,
    /// LRU bound in bytes, zero for unbounded
    #[serde(default)]
    pub max_size: u64,
    /// Reopen the root and adopt its records instead of wiping it
    #[serde(default)]
    pub persistent: bool,
}

/// Configuration for a composed store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackConfig {
    pub authority: AuthorityConfig,
    /// Cache tiers in probe order
    #[serde(default)]
    pub caches: Vec<CacheConfig>,
    /// Key prefix applied to every operation
    #[serde(default)]
    pub namespace: Option<String>,
}

impl StackConfig {
    /// A stack with just a persistent authority at `root`
    pub fn authority_only(root: impl Into<PathBuf>) -> Self {
        StackConfig {
            authority: AuthorityConfig {
                root: root.into(),
                fresh: false,
            },
            caches: Vec::new(),
            namespace: None,
        }
    }

    /// Default config location (~/.config/blobstack/config.json)
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not find config directory".into()))?;
        Ok(config_dir.join("blobstack").join("config.json"))
    }

    /// Load a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Save to a config file, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Reject layouts where wiping a cache would destroy other data
    pub fn validate(&self) -> Result<()> {
        let authority = &self.authority.root;

        for (i, cache) in self.caches.iter().enumerate() {
            if overlaps(&cache.root, authority) {
                return Err(Error::Config(format!(
                    "Cache root {} overlaps authority root {}",
                    cache.root.display(),
                    authority.display()
                )));
            }

            for other in &self.caches[..i] {
                if overlaps(&cache.root, &other.root) {
                    return Err(Error::Config(format!(
                        "Cache roots {} and {} overlap",
                        other.root.display(),
                        cache.root.display()
                    )));
                }
            }
        }

        Ok(())
    }

    /// Build the stack
    ///
    /// Composed as `Synchronized(Namespaced(Tiered(authority, [Lru(cache)..])))`,
    /// with the namespace layer present only when configured. Cache roots are
    /// wiped unless `persistent`; the authority is wiped only when `fresh` is
    /// set.
    pub fn build(&self) -> Result<SharedStack> {
        self.build_with_populations().map(|(stack, _)| stack)
    }

    /// Build the stack, keeping a handle on its cache population threads
    pub fn build_with_populations(&self) -> Result<(SharedStack, Populations)> {
        self.validate()?;

        let authority = if self.authority.fresh {
            FileStore::create(&self.authority.root)?
        } else {
            FileStore::open(&self.authority.root)?
        };

        let caches = self
            .caches
            .iter()
            .map(|cache| Ok(Box::new(open_cache(cache)?) as CacheStore))
            .collect::<Result<Vec<_>>>()?;

        let tiered = Tiered::new(authority, caches);
        let populations = tiered.populations();
        let stack: Box<dyn BlobStore + Send + Sync> = match &self.namespace {
            Some(prefix) => Box::new(Namespaced::new(prefix, tiered)),
            None => Box::new(tiered),
        };

        Ok((Synchronized::new(stack), populations))
    }
}

fn open_cache(cache: &CacheConfig) -> Result<Lru<FileStore>> {
    if !cache.persistent {
        return Ok(Lru::new(cache.max_size, FileStore::create(&cache.root)?));
    }

    let store = FileStore::open(&cache.root)?;
    let records = store.records()?;
    let mut lru = Lru::new(cache.max_size, store);
    for (key, length) in records {
        lru.track(key, length);
    }
    Ok(lru)
}

fn overlaps(a: &Path, b: &Path) -> bool {
    a.starts_with(b) || b.starts_with(a)
}
