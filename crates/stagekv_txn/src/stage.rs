//! Staged operations of one transaction.

use crate::lock::KeyGuard;
use std::collections::HashMap;

/// A staged operation for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingOp {
    /// Write the value.
    Set(Vec<u8>),
    /// Delete the key.
    Delete,
}

impl PendingOp {
    /// Returns true for a staged deletion.
    #[must_use]
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete)
    }
}

#[derive(Debug)]
struct StagedOp {
    op: PendingOp,
    /// Write lock owned by this entry; `None` once released by a failed commit.
    guard: Option<KeyGuard>,
}

/// Pending operations keyed by key, with the write lock each one implies.
///
/// At most one operation is staged per key; staging again replaces the
/// operation but keeps the lock already held.
#[derive(Debug, Default)]
pub(crate) struct Stage {
    ops: HashMap<String, StagedOp>,
}

impl Stage {
    pub(crate) fn get(&self, key: &str) -> Option<&PendingOp> {
        self.ops.get(key).map(|staged| &staged.op)
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.ops.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.ops.len()
    }

    /// Stages `op` for `key`. `guard` is kept only if the key holds none.
    pub(crate) fn insert(&mut self, key: &str, op: PendingOp, guard: Option<KeyGuard>) {
        match self.ops.get_mut(key) {
            Some(staged) => {
                staged.op = op;
                if staged.guard.is_none() {
                    staged.guard = guard;
                }
            }
            None => {
                self.ops.insert(key.to_string(), StagedOp { op, guard });
            }
        }
    }

    /// Returns staged keys starting with `prefix`, without deletions if
    /// `skip_deleted` is set.
    pub(crate) fn keys(&self, prefix: &str, skip_deleted: bool) -> Vec<String> {
        self.ops
            .iter()
            .filter(|(key, staged)| {
                key.starts_with(prefix) && !(skip_deleted && staged.op.is_delete())
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Removes `key`, releasing its lock.
    pub(crate) fn remove(&mut self, key: &str) -> Option<PendingOp> {
        self.ops.remove(key).map(|staged| staged.op)
    }

    /// Releases the lock held for `key` but keeps its operation staged.
    pub(crate) fn release_lock(&mut self, key: &str) {
        if let Some(staged) = self.ops.get_mut(key) {
            staged.guard = None;
        }
    }

    /// Discards every operation and lock, returning how many were staged.
    pub(crate) fn clear(&mut self) -> usize {
        let discarded = self.ops.len();
        self.ops.clear();
        discarded
    }
}
