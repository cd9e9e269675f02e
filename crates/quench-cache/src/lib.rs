//! Result cache for hook executions: in-memory LRU with TTL, optionally
//! persisted to disk.
//!
//! The cache is owned by the hook orchestrator and mutated only by it.
//! Reads and writes serialize through one mutex with short critical
//! sections; readers observe either the pre-write or post-write value.

pub mod disk;
pub mod key;

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::Utc;
use lru::LruCache;
use serde::{Deserialize, Serialize};

use quench_core::{HookResult, HookStatus, Issue};

pub use disk::MAX_BLOB_BYTES;
pub use key::compute_key;

use disk::DiskStore;

/// Snapshot of a hook result suitable for caching: no live handles, raw
/// output blobs only when small.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CachedResult {
    pub hook: String,
    /// Status the original run produced (`Passed`/`Failed`); replays are
    /// reported as `CacheHit` with this as the prior status.
    pub status: HookStatus,
    pub exit_code: Option<i32>,
    pub duration: Duration,
    pub issues: Vec<Issue>,
    pub stdout: String,
    pub stderr: String,
}

impl CachedResult {
    /// Snapshot a finished hook result, discarding oversized output blobs.
    pub fn from_result(result: &HookResult) -> Self {
        let clip = |text: &str| {
            if text.len() < MAX_BLOB_BYTES {
                text.to_string()
            } else {
                String::new()
            }
        };
        Self {
            hook: result.hook.clone(),
            status: result.status,
            exit_code: result.exit_code,
            duration: result.duration,
            issues: result.issues.clone(),
            stdout: clip(&result.stdout),
            stderr: clip(&result.stderr),
        }
    }
}

#[derive(Debug)]
struct Entry {
    result: CachedResult,
    inserted_at: Instant,
}

/// Bounded, TTL-checked result cache.
#[derive(Debug)]
pub struct ResultCache {
    inner: Mutex<LruCache<String, Entry>>,
    ttl: Duration,
    disk: Option<DiskStore>,
}

impl ResultCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(max_entries.max(1)).expect("max(1) is nonzero");
        Self {
            inner: Mutex::new(LruCache::new(cap)),
            ttl,
            disk: None,
        }
    }

    /// Enable on-disk persistence under the given directory.
    pub fn with_disk(mut self, dir: PathBuf) -> Self {
        self.disk = Some(DiskStore::new(dir));
        self
    }

    /// Look up an unexpired entry, falling back to disk. Expired or corrupt
    /// entries are evicted and read as misses.
    pub fn get(&self, key: &str) -> Option<CachedResult> {
        {
            let mut inner = self.inner.lock().expect("cache mutex poisoned");
            if let Some(entry) = inner.get(key) {
                if entry.inserted_at.elapsed() < self.ttl {
                    return Some(entry.result.clone());
                }
                inner.pop(key);
                if let Some(disk) = &self.disk {
                    disk.evict(key);
                }
                return None;
            }
        }

        let disk = self.disk.as_ref()?;
        let (result, created_at) = disk.load(key)?;
        let age = Utc::now().signed_duration_since(created_at);
        if age.num_seconds() < 0 || age.num_seconds() as u64 >= self.ttl.as_secs() {
            disk.evict(key);
            return None;
        }
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        inner.put(
            key.to_string(),
            Entry {
                result: result.clone(),
                inserted_at: Instant::now(),
            },
        );
        Some(result)
    }

    pub fn insert(&self, key: String, result: CachedResult) {
        if let Some(disk) = &self.disk {
            disk.store(&key, &result);
        }
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        inner.put(
            key,
            Entry {
                result,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
