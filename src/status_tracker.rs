//! # Status Tracker (C4)
//!
//! Process-wide counters for the dispatcher, shared by every concurrent
//! call task and the dispatcher loop itself. Every mutation is a single
//! atomic op, so no lock is needed even though many tasks touch this
//! concurrently — the same style the teacher's `metrics.rs` uses for its
//! request counters.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Default)]
struct Counters {
    started: AtomicU64,
    in_progress: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    rate_limit_errors: AtomicU64,
    api_errors: AtomicU64,
    other_errors: AtomicU64,
    /// Milliseconds since the Unix epoch, 0 meaning "never".
    time_of_last_rate_limit_error_ms: AtomicI64,
}

/// Cheaply cloneable handle to the shared status counters.
#[derive(Debug, Clone, Default)]
pub struct StatusTracker {
    inner: Arc<Counters>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_started(&self) {
        self.inner.started.fetch_add(1, Ordering::Relaxed);
        self.inner.in_progress.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.inner.in_progress.fetch_sub(1, Ordering::Relaxed);
        self.inner.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.inner.in_progress.fetch_sub(1, Ordering::Relaxed);
        self.inner.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limit_error(&self) {
        self.inner.rate_limit_errors.fetch_add(1, Ordering::Relaxed);
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64;
        self.inner
            .time_of_last_rate_limit_error_ms
            .store(now_ms, Ordering::Relaxed);
    }

    pub fn record_api_error(&self) {
        self.inner.api_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_other_error(&self) {
        self.inner.other_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn in_progress(&self) -> u64 {
        self.inner.in_progress.load(Ordering::Relaxed)
    }

    /// Milliseconds since the Unix epoch of the most recent rate-limit
    /// error, or `None` if none has been observed yet.
    pub fn time_of_last_rate_limit_error_ms(&self) -> Option<i64> {
        match self
            .inner
            .time_of_last_rate_limit_error_ms
            .load(Ordering::Relaxed)
        {
            0 => None,
            ms => Some(ms),
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            started: self.inner.started.load(Ordering::Relaxed),
            in_progress: self.inner.in_progress.load(Ordering::Relaxed),
            succeeded: self.inner.succeeded.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
            rate_limit_errors: self.inner.rate_limit_errors.load(Ordering::Relaxed),
            api_errors: self.inner.api_errors.load(Ordering::Relaxed),
            other_errors: self.inner.other_errors.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time read of every counter, for the end-of-run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub started: u64,
    pub in_progress: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub rate_limit_errors: u64,
    pub api_errors: u64,
    pub other_errors: u64,
}
