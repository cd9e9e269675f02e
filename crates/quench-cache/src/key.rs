//! Content-addressed cache keys.
//!
//! A key covers everything that could change a hook's output: the hook name,
//! tool version, exact argv, environment additions, and the content hash of
//! every file matched by the hook's `cache_key_inputs` globs. Any file edit
//! under those globs therefore produces a different key (a cache miss); an
//! untouched workspace reproduces the key exactly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use quench_core::HookDefinition;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Compute the cache key for one hook in one workspace.
pub fn compute_key(def: &HookDefinition, workspace: &Path, tool_version: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(def.name.as_bytes());
    hasher.update([0]);
    hasher.update(tool_version.unwrap_or("").as_bytes());
    hasher.update([0]);
    for arg in &def.command {
        hasher.update(arg.as_bytes());
        hasher.update([0]);
    }
    for (key, value) in &def.env {
        hasher.update(key.as_bytes());
        hasher.update([1]);
        hasher.update(value.as_bytes());
        hasher.update([0]);
    }
    for (path, content_hash) in input_hashes(def, workspace) {
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update([1]);
        hasher.update(content_hash.as_bytes());
        hasher.update([0]);
    }
    hex(&hasher.finalize())
}

/// Hash every file matched by the definition's input globs, in sorted path
/// order so the key is independent of filesystem iteration order.
fn input_hashes(def: &HookDefinition, workspace: &Path) -> BTreeMap<PathBuf, String> {
    let mut hashes = BTreeMap::new();
    for pattern in &def.cache_key_inputs {
        let full = workspace.join(pattern);
        let Ok(paths) = glob::glob(&full.to_string_lossy()) else {
            debug!(hook = %def.name, pattern, "unparseable cache input glob; ignoring");
            continue;
        };
        for path in paths.flatten() {
            if !path.is_file() {
                continue;
            }
            if let Some(content_hash) = hash_file(&path) {
                let relative = path
                    .strip_prefix(workspace)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| path.clone());
                hashes.insert(relative, content_hash);
            }
        }
    }
    hashes
}

fn hash_file(path: &Path) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Some(hex(&hasher.finalize()))
}

fn hex(digest: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
