//! Ambient process metrics: atomic counters plus a small rolling latency
//! buffer. Not part of the policy decision itself — purely for operational
//! visibility.

use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

const LATENCY_BUFFER_CAP: usize = 1024;

pub static ALLOWED_TOTAL: AtomicU64 = AtomicU64::new(0);
pub static REJECTED_TOTAL: AtomicU64 = AtomicU64::new(0);
pub static FAIL_CLOSED_TOTAL: AtomicU64 = AtomicU64::new(0);
pub static SIMULATED_TOTAL: AtomicU64 = AtomicU64::new(0);

static LATENCY_MS: Lazy<Mutex<Vec<u64>>> = Lazy::new(|| Mutex::new(Vec::with_capacity(LATENCY_BUFFER_CAP)));

/// Record one completed validation's outcome and latency.
pub fn record_decision(allowed: bool, fail_closed: bool, simulated: bool, duration_ms: u64) {
    if fail_closed {
        FAIL_CLOSED_TOTAL.fetch_add(1, Ordering::Relaxed);
    } else if allowed {
        ALLOWED_TOTAL.fetch_add(1, Ordering::Relaxed);
    } else {
        REJECTED_TOTAL.fetch_add(1, Ordering::Relaxed);
    }
    if simulated {
        SIMULATED_TOTAL.fetch_add(1, Ordering::Relaxed);
    }

    let mut buf = LATENCY_MS.lock();
    if buf.len() == LATENCY_BUFFER_CAP {
        buf.remove(0);
    }
    buf.push(duration_ms);
}

/// Snapshot of the rolling latency buffer's mean, in milliseconds. `None`
/// if no decisions have been recorded yet.
pub fn mean_latency_ms() -> Option<f64> {
    let buf = LATENCY_MS.lock();
    if buf.is_empty() {
        return None;
    }
    Some(buf.iter().sum::<u64>() as f64 / buf.len() as f64)
}
