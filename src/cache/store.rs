use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::cache::fingerprint::Fingerprint;
use crate::foundation::error::ForgeResult;
use crate::scene::request::Container;

/// Share of entries dropped when a full cache has nothing expired to purge.
const EVICT_FRACTION: usize = 5;

/// A previously encoded render.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedRender {
    /// Where the bytes were written.
    pub path: PathBuf,
    /// Encoded bytes.
    pub bytes: Arc<Vec<u8>>,
    /// Container of `bytes`.
    pub container: Container,
    /// Encoded width.
    pub width: u32,
    /// Encoded height.
    pub height: u32,
}

/// Storage seam for render results. Errors are never fatal to a render.
pub trait CacheBackend: Send + Sync {
    /// Look up a live entry.
    fn get(&self, key: &Fingerprint) -> ForgeResult<Option<CachedRender>>;
    /// Insert or replace an entry.
    fn put(&self, key: Fingerprint, value: CachedRender) -> ForgeResult<()>;
}

/// Sizing of a [`ResultCache`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheOpts {
    /// Maximum number of entries; `0` disables caching.
    pub capacity: usize,
    /// Entry lifetime.
    pub ttl: Duration,
    /// Period of the background expiry sweep.
    pub sweep_interval: Duration,
}

impl Default for CacheOpts {
    fn default() -> Self {
        Self {
            capacity: 256,
            ttl: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Counters since construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that returned an entry.
    pub hits: u64,
    /// Lookups that returned nothing (including expired entries).
    pub misses: u64,
    /// Entries removed for capacity or expiry.
    pub evictions: u64,
}

struct Entry {
    value: CachedRender,
    created_at: Instant,
}

struct Shared {
    map: RwLock<HashMap<Fingerprint, Entry>>,
    capacity: usize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl Shared {
    fn expired(&self, e: &Entry, now: Instant) -> bool {
        now.saturating_duration_since(e.created_at) >= self.ttl
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut map = self.map.write();
        let before = map.len();
        map.retain(|_, e| now.saturating_duration_since(e.created_at) < self.ttl);
        let removed = before - map.len();
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }
}

struct Sweeper {
    stop: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Bounded, time-expiring map from fingerprint to encoded render.
///
/// A background thread purges expired entries every `sweep_interval` until
/// [`ResultCache::shutdown`] is called or the cache is dropped.
pub struct ResultCache {
    shared: Arc<Shared>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("len", &self.len())
            .field("capacity", &self.shared.capacity)
            .field("ttl", &self.shared.ttl)
            .finish()
    }
}

impl ResultCache {
    /// Cache with the default sweep interval.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self::with_opts(CacheOpts {
            capacity,
            ttl,
            ..CacheOpts::default()
        })
    }

    pub fn with_opts(opts: CacheOpts) -> Self {
        let shared = Arc::new(Shared {
            map: RwLock::new(HashMap::new()),
            capacity: opts.capacity,
            ttl: opts.ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        });
        let sweeper = spawn_sweeper(Arc::clone(&shared), opts.sweep_interval);
        Self {
            shared,
            sweeper: Mutex::new(sweeper),
        }
    }

    /// Live entry for `key`. Expired entries are removed and reported as misses.
    pub fn lookup(&self, key: &Fingerprint) -> Option<CachedRender> {
        let now = Instant::now();
        let found = {
            let map = self.shared.map.read();
            map.get(key)
                .map(|e| (!self.shared.expired(e, now)).then(|| e.value.clone()))
        };
        match found {
            Some(Some(v)) => {
                self.shared.hits.fetch_add(1, Ordering::Relaxed);
                Some(v)
            }
            Some(None) => {
                let mut map = self.shared.map.write();
                if map.get(key).is_some_and(|e| self.shared.expired(e, now)) {
                    map.remove(key);
                    self.shared.evictions.fetch_add(1, Ordering::Relaxed);
                }
                drop(map);
                self.shared.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.shared.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert `value`, making room first when the cache is full.
    pub fn insert(&self, key: Fingerprint, value: CachedRender) {
        if self.shared.capacity == 0 {
            return;
        }
        let now = Instant::now();
        let mut map = self.shared.map.write();
        if !map.contains_key(&key) && map.len() >= self.shared.capacity {
            let before = map.len();
            map.retain(|_, e| now.saturating_duration_since(e.created_at) < self.shared.ttl);

            if map.len() >= self.shared.capacity {
                let n = (self.shared.capacity / EVICT_FRACTION).max(1);
                let mut by_age: Vec<(Instant, Fingerprint)> =
                    map.iter().map(|(k, e)| (e.created_at, *k)).collect();
                by_age.sort();
                for (_, k) in by_age.into_iter().take(n) {
                    map.remove(&k);
                }
            }
            self.shared
                .evictions
                .fetch_add((before - map.len()) as u64, Ordering::Relaxed);
        }
        map.insert(
            key,
            Entry {
                value,
                created_at: now,
            },
        );
    }

    /// Remove every expired entry now; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.shared.purge_expired()
    }

    pub fn len(&self) -> usize {
        self.shared.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.shared.map.write().clear();
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.shared.hits.load(Ordering::Relaxed),
            misses: self.shared.misses.load(Ordering::Relaxed),
            evictions: self.shared.evictions.load(Ordering::Relaxed),
        }
    }

    /// Stop the background sweeper and wait for it to exit. Idempotent.
    pub fn shutdown(&self) {
        let Some(sweeper) = self.sweeper.lock().take() else {
            return;
        };
        // The thread also exits when the sender is dropped.
        let _ = sweeper.stop.send(());
        if sweeper.handle.join().is_err() {
            tracing::warn!("cache sweeper thread panicked");
        }
    }

    /// Whether the background sweeper is still running.
    pub fn is_sweeping(&self) -> bool {
        self.sweeper.lock().is_some()
    }
}

impl Drop for ResultCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl CacheBackend for ResultCache {
    fn get(&self, key: &Fingerprint) -> ForgeResult<Option<CachedRender>> {
        Ok(self.lookup(key))
    }

    fn put(&self, key: Fingerprint, value: CachedRender) -> ForgeResult<()> {
        self.insert(key, value);
        Ok(())
    }
}

fn spawn_sweeper(shared: Arc<Shared>, interval: Duration) -> Option<Sweeper> {
    let interval = interval.max(Duration::from_millis(10));
    let (stop, rx) = mpsc::channel::<()>();
    let spawned = std::thread::Builder::new()
        .name("certiforge-cache-sweep".to_owned())
        .spawn(move || {
            while let Err(mpsc::RecvTimeoutError::Timeout) = rx.recv_timeout(interval) {
                let removed = shared.purge_expired();
                if removed > 0 {
                    tracing::debug!(removed, "cache sweep");
                }
            }
        });
    match spawned {
        Ok(handle) => Some(Sweeper { stop, handle }),
        Err(e) => {
            tracing::warn!(error = %e, "failed to start cache sweeper; expiry stays lazy");
            None
        }
    }
}

/// Backend that never stores anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCache;

impl CacheBackend for NoCache {
    fn get(&self, _key: &Fingerprint) -> ForgeResult<Option<CachedRender>> {
        Ok(None)
    }

    fn put(&self, _key: Fingerprint, _value: CachedRender) -> ForgeResult<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/store.rs"]
mod tests;
