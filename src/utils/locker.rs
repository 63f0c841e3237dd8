//! In-process run lock preventing overlapping backups

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Admits at most one run at a time
#[derive(Debug, Default)]
pub struct RunGuard {
    running: AtomicBool,
}

impl RunGuard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Take the lock if free. Returns `None` while another run holds it.
    pub fn try_acquire(self: &Arc<Self>) -> Option<RunPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        debug!("Acquired run lock");
        Some(RunPermit {
            guard: Arc::clone(self),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Held for the duration of a run; releases the lock on drop
#[derive(Debug)]
pub struct RunPermit {
    guard: Arc<RunGuard>,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.guard.running.store(false, Ordering::Release);
        debug!("Released run lock");
    }
}
