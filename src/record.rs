//! # Request Record (C3, data portion)
//!
//! One request's full lifecycle state: its payload, its estimated cost, how
//! many attempts it has left, the metadata it must be echoed back with, and
//! the error observations accumulated across attempts.

use serde_json::Value;

/// A single request's state as it moves through the dispatcher:
/// `Read → Pending → Dispatched → [Succeeded | Retrying → Pending → … | Failed]`.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub task_id: u64,
    pub payload: Value,
    pub token_cost: u32,
    pub attempts_left: u32,
    pub metadata: Option<Value>,
    pub errors: Vec<String>,
}

impl RequestRecord {
    pub fn new(
        task_id: u64,
        payload: Value,
        token_cost: u32,
        max_attempts: u32,
        metadata: Option<Value>,
    ) -> Self {
        Self {
            task_id,
            payload,
            token_cost,
            attempts_left: max_attempts,
            metadata,
            errors: Vec::new(),
        }
    }

    /// Decrement the attempt budget immediately before dispatch, per the
    /// admission contract in §4.7.
    pub fn consume_attempt(&mut self) {
        debug_assert!(self.attempts_left > 0, "dispatched a record with no attempts left");
        self.attempts_left -= 1;
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn has_attempts_remaining(&self) -> bool {
        self.attempts_left > 0
    }
}

/// The classification of a single failed attempt, per §4.3/§7. Distinct
/// from [`crate::error::DispatchError`]: these are transient, recorded as
/// strings and retried, never propagated as a Rust error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    RateLimit(String),
    Api(String),
    Transport(String),
}

impl AttemptError {
    pub fn message(&self) -> &str {
        match self {
            AttemptError::RateLimit(m) | AttemptError::Api(m) | AttemptError::Transport(m) => m,
        }
    }
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Outcome of one dispatched attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    Success(Value),
    Failure(AttemptError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn consume_attempt_decrements() {
        let mut record = RequestRecord::new(1, json!({}), 10, 3, None);
        record.consume_attempt();
        assert_eq!(record.attempts_left, 2);
        assert!(record.has_attempts_remaining());
    }

    #[test]
    fn errors_accumulate_in_attempt_order() {
        let mut record = RequestRecord::new(1, json!({}), 10, 3, None);
        record.record_error("first");
        record.record_error("second");
        assert_eq!(record.errors, vec!["first".to_string(), "second".to_string()]);
    }
}
