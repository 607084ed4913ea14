//! Tiered read/write-through caching in front of an authoritative store
//!
//! Reads probe the caches in order and fall back to the authority. Bytes
//! coming from the authority (on a miss) or going to it (on a put) pass
//! through a tee that keeps a private copy; once the tee has seen exactly the
//! declared length it hands the copy to a detached thread that writes it into
//! every cache. A stream dropped early never populates anything, so caches
//! never hold a truncated blob.

use super::Synchronized;
use crate::store::{Blob, BlobStore};
use crate::Result;
use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use std::io::{self, Read};
use std::mem;
use std::sync::Arc;
use std::thread;
use tracing::{debug, trace, warn};

/// A cache tier, type-erased so tiers of different kinds can be mixed
pub type CacheStore = Box<dyn BlobStore + Send + Sync>;

/// Outcome of one tee, reported on the channel from [`Tiered::population_events`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PopulationEvent {
    /// Every cache write for `key` has been attempted
    Populated { key: String, failures: usize },
    /// The stream for `key` ended without exactly the declared length
    Abandoned { key: String },
}

/// Counts detached population threads that have not finished yet
///
/// Clones share the count. A short-lived process waits here before exiting
/// so its caches are not left half written.
#[derive(Clone, Default)]
pub struct Populations {
    inner: Arc<InFlight>,
}

#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Populations {
    /// Number of population threads still running
    pub fn in_flight(&self) -> usize {
        *self.inner.count.lock()
    }

    /// Block until every population thread has finished
    pub fn wait_idle(&self) {
        let mut count = self.inner.count.lock();
        while *count > 0 {
            self.inner.idle.wait(&mut count);
        }
    }

    fn start(&self) -> Running {
        *self.inner.count.lock() += 1;
        Running(self.clone())
    }
}

/// Marks one population thread as running until dropped
struct Running(Populations);

impl Drop for Running {
    fn drop(&mut self) {
        let mut count = self.0.inner.count.lock();
        *count -= 1;
        if *count == 0 {
            self.0.inner.idle.notify_all();
        }
    }
}

/// Fronts an authoritative store with an ordered list of caches
///
/// The authority answers every miss, every `contains`, and receives every
/// `put`. Caches only become consistent eventually: population runs on a
/// detached thread and its failures are logged, never returned. Concurrent
/// populations of the same key race; each cache keeps whichever write lands
/// last.
///
/// The population thread writes to caches while callers keep using the
/// stack, so each cache sits behind its own [`Synchronized`].
pub struct Tiered<A> {
    authority: A,
    caches: Arc<[Synchronized<CacheStore>]>,
    events: Option<Sender<PopulationEvent>>,
    populations: Populations,
}

impl<A: BlobStore> Tiered<A> {
    /// Front `authority` with `caches`, probed in the given order
    pub fn new(authority: A, caches: Vec<CacheStore>) -> Self {
        Tiered {
            authority,
            caches: caches.into_iter().map(Synchronized::new).collect(),
            events: None,
            populations: Populations::default(),
        }
    }

    /// Subscribe to population outcomes
    ///
    /// Each tee created after this call reports exactly one event. Meant for
    /// tests that need to wait for the detached population thread.
    pub fn population_events(&mut self) -> Receiver<PopulationEvent> {
        let (tx, rx) = unbounded();
        self.events = Some(tx);
        rx
    }

    /// Handle on the population threads spawned by this store
    pub fn populations(&self) -> Populations {
        self.populations.clone()
    }

    /// Get the authoritative store
    pub fn authority(&self) -> &A {
        &self.authority
    }

    /// Number of cache tiers
    pub fn cache_count(&self) -> usize {
        self.caches.len()
    }
}

impl<A: BlobStore> BlobStore for Tiered<A> {
    fn get(&mut self, key: &str) -> Result<Blob> {
        for (tier, cache) in self.caches.iter().enumerate() {
            match cache.get(key) {
                Ok(blob) => {
                    debug!(key, tier, "cache hit");
                    return Ok(blob);
                }
                Err(e) => debug!(key, tier, error = %e, "cache miss"),
            }
        }

        let blob = self.authority.get(key)?;
        if self.caches.is_empty() {
            return Ok(blob);
        }

        let key = key.to_string();
        let length = blob.length();
        let caches = Arc::clone(&self.caches);
        let events = self.events.clone();
        let populations = self.populations.clone();
        Ok(blob.map_reader(move |reader| -> Box<dyn Read + Send> {
            Box::new(Tee::new(reader, key, length, caches, events, populations))
        }))
    }

    fn put(&mut self, key: &str, blob: &mut dyn Read, length: u64) -> Result<()> {
        if self.caches.is_empty() {
            return self.authority.put(key, blob, length);
        }

        let mut tee = Tee::new(
            blob,
            key.to_string(),
            length,
            Arc::clone(&self.caches),
            self.events.clone(),
            self.populations.clone(),
        );
        self.authority.put(key, &mut tee, length)
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        for (tier, cache) in self.caches.iter().enumerate() {
            if let Err(e) = cache.delete(key) {
                debug!(key, tier, error = %e, "best-effort cache delete failed");
            }
        }
        self.authority.delete(key)
    }

    fn contains(&self, key: &str) -> Result<bool> {
        self.authority.contains(key)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum TeeState {
    Filling,
    Finished,
}

/// Forwards reads while accumulating a copy for cache population
struct Tee<R> {
    inner: R,
    key: String,
    length: u64,
    buf: Vec<u8>,
    state: TeeState,
    caches: Arc<[Synchronized<CacheStore>]>,
    events: Option<Sender<PopulationEvent>>,
    populations: Populations,
}

impl<R> Tee<R> {
    fn new(
        inner: R,
        key: String,
        length: u64,
        caches: Arc<[Synchronized<CacheStore>]>,
        events: Option<Sender<PopulationEvent>>,
        populations: Populations,
    ) -> Self {
        Tee {
            inner,
            key,
            length,
            buf: Vec::with_capacity(length.min(1 << 20) as usize),
            state: TeeState::Filling,
            caches,
            events,
            populations,
        }
    }

    fn populate(&mut self) {
        self.state = TeeState::Finished;

        let data = mem::take(&mut self.buf);
        let key = self.key.clone();
        let caches = Arc::clone(&self.caches);
        let events = self.events.clone();
        let running = self.populations.start();
        trace!(key = %key, length = self.length, "dispatching cache population");

        // A closure that never runs drops `running` with it
        let spawned = thread::Builder::new()
            .name("blobstack-populate".into())
            .spawn(move || {
                let failures = write_caches(&caches, &key, &data);
                notify(&events, PopulationEvent::Populated { key, failures });
                drop(running);
            });

        if let Err(e) = spawned {
            warn!(key = %self.key, error = %e, "failed to spawn cache population");
            notify(
                &self.events,
                PopulationEvent::Populated {
                    key: self.key.clone(),
                    failures: self.caches.len(),
                },
            );
        }
    }

    fn abandon(&mut self) {
        self.state = TeeState::Finished;
        self.buf = Vec::new();
        trace!(key = %self.key, length = self.length, "incomplete stream, caches left alone");
        notify(
            &self.events,
            PopulationEvent::Abandoned {
                key: self.key.clone(),
            },
        );
    }
}

impl<R: Read> Read for Tee<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(out)?;

        if self.state == TeeState::Filling {
            if (self.buf.len() + n) as u64 > self.length {
                self.abandon();
            } else {
                self.buf.extend_from_slice(&out[..n]);
                if self.buf.len() as u64 == self.length {
                    self.populate();
                }
            }
        }

        Ok(n)
    }
}

impl<R> Drop for Tee<R> {
    fn drop(&mut self) {
        if self.state == TeeState::Filling {
            // An empty blob completes without a single read
            if self.length == 0 {
                self.populate();
            } else {
                self.abandon();
            }
        }
    }
}

fn write_caches(caches: &[Synchronized<CacheStore>], key: &str, data: &[u8]) -> usize {
    let mut failures = 0;
    for (tier, cache) in caches.iter().enumerate() {
        let mut reader = data;
        if let Err(e) = cache.put(key, &mut reader, data.len() as u64) {
            warn!(key, tier, error = %e, "failed to write to cache");
            failures += 1;
        }
    }
    failures
}

fn notify(events: &Option<Sender<PopulationEvent>>, event: PopulationEvent) {
    if let Some(tx) = events {
        // Receiver may be gone; population itself has already happened
        let _ = tx.send(event);
    }
}
