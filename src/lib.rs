//! # ratelimited_dispatch
//!
//! Streams requests from a newline-delimited JSON file and dispatches them
//! against a remote LLM-style HTTP API under a dual-axis (requests/minute,
//! tokens/minute) rate limit, retrying transient failures up to a configured
//! attempt budget and logging every terminal outcome back to a results file.
//!
//! ## Architecture
//!
//! - [`config`] - CLI/env/`.env` configuration
//! - [`error`] - fatal, run-aborting error type
//! - [`record`] - per-request lifecycle state and attempt outcomes
//! - [`token_counter`] - pre-dispatch token cost estimation
//! - [`admission`] - dual token-bucket admission control and cool-down
//! - [`input_stream`] - line-delimited JSON request reader
//! - [`retry_queue`] - FIFO of requests awaiting another attempt
//! - [`output_log`] - append-only line-delimited JSON results writer
//! - [`status_tracker`] - process-wide atomic run counters
//! - [`http_client`] - shared, connection-pooled `reqwest::Client` factory
//! - [`api_call`] - per-attempt HTTP call and outcome classification
//! - [`dispatcher`] - the scheduling loop tying every module together

pub mod admission;
pub mod api_call;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod http_client;
pub mod input_stream;
pub mod output_log;
pub mod record;
pub mod retry_queue;
pub mod status_tracker;
pub mod token_counter;

pub use config::Config;
pub use dispatcher::{DispatchSummary, Dispatcher};
pub use error::DispatchError;
