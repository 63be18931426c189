//! Shutdown Coordinator (C8): a single process-wide running/draining flag.
//!
//! Consulted only by whatever façade sits in front of this crate; the
//! core itself never refuses a validation because of drain state. An
//! `AtomicBool` rather than a mutex-guarded bool, since the only operations
//! are a single flag flip and a single read.

use std::sync::atomic::{AtomicBool, Ordering};

pub struct ShutdownCoordinator {
    draining: AtomicBool,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            draining: AtomicBool::new(false),
        }
    }

    pub fn begin_drain(&self) {
        self.draining.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.draining.store(false, Ordering::SeqCst);
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }
}
