//! Per-file mutual exclusion for agent applies.
//!
//! Each target file maps to one async mutex held across the whole `apply`.
//! The map itself is guarded by a plain mutex used only for entry
//! lookup/creation (short critical section). Project-level issues share a
//! single dedicated slot.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;

use quench_core::Issue;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LockKey {
    File(PathBuf),
    /// All issues without a file path serialize through this one slot.
    Project,
}

impl LockKey {
    pub fn for_issue(issue: &Issue) -> Self {
        match &issue.file_path {
            Some(path) => Self::File(path.clone()),
            None => Self::Project,
        }
    }
}

#[derive(Default)]
pub struct FileLockMap {
    entries: Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>,
}

impl FileLockMap {
    /// Look up or create the mutex for a key.
    pub fn lock_for(&self, key: &LockKey) -> Arc<AsyncMutex<()>> {
        self.entries
            .lock()
            .expect("lock map mutex poisoned")
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Drop an entry once no task holds a handle to it, reclaiming memory
    /// for long runs over many files.
    pub fn release(&self, key: &LockKey) {
        let mut entries = self.entries.lock().expect("lock map mutex poisoned");
        if let Some(entry) = entries.get(key)
            && Arc::strong_count(entry) == 1
        {
            entries.remove(key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("lock map mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quench_core::{IssueKind, Severity};

    #[test]
    fn test_same_file_shares_a_mutex() {
        let locks = FileLockMap::default();
        let key = LockKey::File(PathBuf::from("/w/a.py"));
        let first = locks.lock_for(&key);
        let second = locks.lock_for(&key);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_project_level_issues_share_the_project_slot() {
        let file_issue = Issue::new(
            "t",
            IssueKind::FormatError,
            Severity::Low,
            Some(PathBuf::from("/w/a.py")),
            None,
            None,
            None,
            "m",
        );
        let project_issue = Issue::new(
            "t",
            IssueKind::DependencyIssue,
            Severity::Low,
            None,
            None,
            None,
            None,
            "m",
        );
        assert_eq!(
            LockKey::for_issue(&file_issue),
            LockKey::File(PathBuf::from("/w/a.py"))
        );
        assert_eq!(LockKey::for_issue(&project_issue), LockKey::Project);
    }

    #[test]
    fn test_release_reaps_uncontended_entries() {
        let locks = FileLockMap::default();
        let key = LockKey::File(PathBuf::from("/w/a.py"));
        let handle = locks.lock_for(&key);
        assert_eq!(locks.len(), 1);

        // Still held elsewhere: stays.
        locks.release(&key);
        assert_eq!(locks.len(), 1);

        drop(handle);
        locks.release(&key);
        assert!(locks.is_empty());
    }
}
