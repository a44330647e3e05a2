use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Run counters. Observational only; the store is the source of truth.
#[derive(Debug, Default)]
pub struct Progress {
    submitted: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub submitted: usize,
    pub completed: usize,
    pub failed: usize,
}

impl ProgressSnapshot {
    pub fn in_flight(&self) -> usize {
        self.submitted.saturating_sub(self.completed + self.failed)
    }

    /// Every submitted task has finished one way or the other.
    pub fn is_settled(&self) -> bool {
        self.submitted == self.completed + self.failed
    }
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
