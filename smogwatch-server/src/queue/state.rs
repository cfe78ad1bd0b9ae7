//! Shared worker state and its status snapshot
//!
//! The only concurrently-shared mutable resource in the queue core. One
//! mutex guards every field; writers (the worker) and readers (the status
//! endpoint) use the same guard, and the lock is never held across I/O.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct WorkerState {
    running: bool,
    current_file: String,
    processed: usize,
    pending: usize,
}

/// Immutable snapshot of worker progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub running: bool,
    pub current_file: String,
    pub processed: usize,
    pub pending: usize,
}

/// Handle to the worker state, cheap to clone
#[derive(Debug, Clone, Default)]
pub struct QueueState {
    inner: Arc<Mutex<WorkerState>>,
}

impl QueueState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A poisoned lock only means a panic happened while a critical section
    /// was held; the fields are plain values, so recover the guard.
    fn lock(&self) -> MutexGuard<'_, WorkerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomic check-and-set of the running flag.
    ///
    /// Returns false when a run is already active (the caller must back off).
    /// On success the counters are reset for the new run.
    pub fn try_begin(&self) -> bool {
        let mut state = self.lock();
        if state.running {
            return false;
        }
        state.running = true;
        state.current_file.clear();
        state.processed = 0;
        state.pending = 0;
        true
    }

    /// Publish the size of the pending set before processing starts.
    pub fn set_pending(&self, pending: usize) {
        self.lock().pending = pending;
    }

    /// Publish the file about to be classified.
    pub fn begin_item(&self, filename: &str) {
        let mut state = self.lock();
        state.current_file.clear();
        state.current_file.push_str(filename);
    }

    /// Record one successful item: processed up, pending down, in a single
    /// critical section so a concurrent snapshot never sees a torn update.
    pub fn item_succeeded(&self) {
        let mut state = self.lock();
        state.processed += 1;
        state.pending = state.pending.saturating_sub(1);
    }

    /// Return the state to idle. Called on every exit path of a run.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.running = false;
        state.current_file.clear();
        state.pending = 0;
    }

    /// Snapshot for the status endpoint.
    pub fn snapshot(&self) -> QueueStatus {
        let state = self.lock();
        QueueStatus {
            running: state.running,
            current_file: state.current_file.clone(),
            processed: state.processed,
            pending: state.pending,
        }
    }
}
