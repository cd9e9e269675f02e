//! Optional on-disk persistence for cache entries.
//!
//! One self-describing JSON record per key plus optional sidecar files for
//! raw output blobs under 256 KiB. Unreadable, corrupt, or version-mismatched
//! records are treated as misses and deleted.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::CachedResult;

const RECORD_VERSION: u32 = 1;
/// Raw output blobs at or above this size are discarded rather than persisted;
/// the cache value is the parsed issues, not the text.
pub const MAX_BLOB_BYTES: usize = 256 * 1024;

#[derive(Serialize, Deserialize)]
struct DiskRecord {
    version: u32,
    hook: String,
    key: String,
    created_at: DateTime<Utc>,
    result: CachedResult,
}

#[derive(Debug)]
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    pub fn new(dir: PathBuf) -> Self {
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!(dir = %dir.display(), error = %e, "cannot create cache directory; persistence disabled for this path");
        }
        Self { dir }
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn blob_path(&self, key: &str, stream: &str) -> PathBuf {
        self.dir.join(format!("{key}.{stream}"))
    }

    /// Load an entry. Any defect in the record evicts it and reads as a miss.
    pub fn load(&self, key: &str) -> Option<(CachedResult, DateTime<Utc>)> {
        let path = self.record_path(key);
        let text = std::fs::read_to_string(&path).ok()?;
        let record: DiskRecord = match serde_json::from_str(&text) {
            Ok(record) => record,
            Err(e) => {
                debug!(key, error = %e, "corrupt cache record; evicting");
                self.evict(key);
                return None;
            }
        };
        if record.version != RECORD_VERSION || record.key != key {
            self.evict(key);
            return None;
        }

        let mut result = record.result;
        if let Ok(stdout) = std::fs::read_to_string(self.blob_path(key, "stdout")) {
            result.stdout = stdout;
        }
        if let Ok(stderr) = std::fs::read_to_string(self.blob_path(key, "stderr")) {
            result.stderr = stderr;
        }
        Some((result, record.created_at))
    }

    /// Persist an entry. Best-effort: write failures degrade to memory-only
    /// caching. Records are written to a temp file and renamed so readers
    /// never observe a torn record.
    pub fn store(&self, key: &str, result: &CachedResult) {
        let mut stripped = result.clone();
        let stdout = std::mem::take(&mut stripped.stdout);
        let stderr = std::mem::take(&mut stripped.stderr);

        let record = DiskRecord {
            version: RECORD_VERSION,
            hook: stripped.hook.clone(),
            key: key.to_string(),
            created_at: Utc::now(),
            result: stripped,
        };
        let Ok(json) = serde_json::to_string(&record) else {
            return;
        };
        if let Err(e) = self.write_atomic(&self.record_path(key), json.as_bytes()) {
            warn!(key, error = %e, "failed to persist cache record");
            return;
        }

        for (stream, blob) in [("stdout", stdout), ("stderr", stderr)] {
            let path = self.blob_path(key, stream);
            if blob.is_empty() || blob.len() >= MAX_BLOB_BYTES {
                let _ = std::fs::remove_file(&path);
            } else if let Err(e) = self.write_atomic(&path, blob.as_bytes()) {
                debug!(key, stream, error = %e, "failed to persist output blob");
            }
        }
    }

    pub fn evict(&self, key: &str) {
        let _ = std::fs::remove_file(self.record_path(key));
        let _ = std::fs::remove_file(self.blob_path(key, "stdout"));
        let _ = std::fs::remove_file(self.blob_path(key, "stderr"));
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)
    }
}
