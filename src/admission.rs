//! # Admission Controller (C7)
//!
//! Two continuous-time token buckets (requests/minute, tokens/minute) and a
//! cool-down gate. Owned exclusively by the dispatcher loop — no other task
//! ever touches this state, so no synchronization is needed (spec.md §5).

use std::time::{Duration, Instant};

/// Global pause triggered by a server-reported rate-limit error,
/// independent of bucket state.
pub const COOLDOWN: Duration = Duration::from_secs(15);

pub struct AdmissionController {
    available_requests: f64,
    available_tokens: f64,
    max_requests_per_minute: f64,
    max_tokens_per_minute: f64,
    last_update: Instant,
}

impl AdmissionController {
    pub fn new(max_requests_per_minute: f64, max_tokens_per_minute: f64) -> Self {
        Self {
            available_requests: max_requests_per_minute,
            available_tokens: max_tokens_per_minute,
            max_requests_per_minute,
            max_tokens_per_minute,
            last_update: Instant::now(),
        }
    }

    /// Replenish both buckets by elapsed wall-clock time, capped at
    /// capacity (spec.md §4.7).
    pub fn replenish(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.available_requests = (self.available_requests
            + self.max_requests_per_minute * elapsed / 60.0)
            .min(self.max_requests_per_minute);
        self.available_tokens = (self.available_tokens
            + self.max_tokens_per_minute * elapsed / 60.0)
            .min(self.max_tokens_per_minute);
        self.last_update = now;
    }

    /// Admit a candidate of cost `cost` iff both buckets have enough
    /// capacity, deducting on success. Callers must call [`Self::replenish`]
    /// first in the same tick.
    pub fn try_admit(&mut self, cost: u32) -> bool {
        if self.available_requests >= 1.0 && self.available_tokens >= f64::from(cost) {
            self.available_requests -= 1.0;
            self.available_tokens -= f64::from(cost);
            true
        } else {
            false
        }
    }

    pub fn available_requests(&self) -> f64 {
        self.available_requests
    }

    pub fn available_tokens(&self) -> f64 {
        self.available_tokens
    }
}

/// How much longer to sleep for the cool-down, given the time of the most
/// recent rate-limit error. `None` if no cool-down is in effect.
pub fn cooldown_remaining(since_last_rate_limit_error: Duration) -> Option<Duration> {
    if since_last_rate_limit_error < COOLDOWN {
        Some(COOLDOWN - since_last_rate_limit_error)
    } else {
        None
    }
}
