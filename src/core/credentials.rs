//! Rotating pool of people-search credentials.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;

/// A credential handed out by [`CredentialPool::next`]. Carries its index so
/// exhaustion is recorded against the credential actually used, even when
/// other workers have moved the cursor since.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialLease {
    pub index: usize,
    pub key: String,
}

impl fmt::Debug for CredentialLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialLease")
            .field("index", &self.index)
            .field("key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Default)]
struct PoolState {
    cursor: usize,
    exhausted: HashSet<usize>,
}

/// Ordered credentials plus the set already exhausted this run.
///
/// Exhaustion is never undone. Build a fresh pool for the next run.
pub struct CredentialPool {
    keys: Vec<String>,
    state: Mutex<PoolState>,
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CredentialPool")
            .field("size", &self.keys.len())
            .field("cursor", &state.cursor)
            .field("exhausted", &state.exhausted.len())
            .finish()
    }
}

impl CredentialPool {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys,
            state: Mutex::new(PoolState::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Next usable credential starting at the cursor, wrapping around.
    /// `None` once every credential is exhausted.
    pub fn next(&self) -> Option<CredentialLease> {
        let mut state = self.state.lock();
        let n = self.keys.len();
        let start = state.cursor;
        let index = (0..n)
            .map(|offset| (start + offset) % n)
            .find(|i| !state.exhausted.contains(i))?;
        state.cursor = index;
        Some(CredentialLease {
            index,
            key: self.keys[index].clone(),
        })
    }

    /// Marks the leased credential exhausted for the rest of the run.
    /// Returns true when this call newly exhausted it.
    pub fn mark_exhausted(&self, lease: &CredentialLease) -> bool {
        self.mark_index_exhausted(lease.index)
    }

    /// Marks the credential under the cursor exhausted.
    pub fn mark_current_exhausted(&self) -> bool {
        let cursor = self.state.lock().cursor;
        self.mark_index_exhausted(cursor)
    }

    fn mark_index_exhausted(&self, index: usize) -> bool {
        if index >= self.keys.len() {
            return false;
        }
        let mut state = self.state.lock();
        let newly = state.exhausted.insert(index);
        if newly {
            tracing::warn!(target: "cascade_task",
                "People-search credential #{} exhausted ({}/{} exhausted).",
                index,
                state.exhausted.len(),
                self.keys.len()
            );
            if state.cursor == index && self.keys.len() > 1 {
                state.cursor = (index + 1) % self.keys.len();
            }
        }
        newly
    }

    pub fn exhausted_count(&self) -> usize {
        self.state.lock().exhausted.len()
    }

    pub fn all_exhausted(&self) -> bool {
        self.exhausted_count() >= self.keys.len()
    }
}
