//! # Dispatcher Loop (C8)
//!
//! The single-threaded cooperative scheduler: pulls the next pending
//! request (retry queue first, then the input stream), replenishes the two
//! token buckets, admits at most one request per tick, and terminates only
//! once every started request has reached a terminal state.

use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

use crate::admission::{cooldown_remaining, AdmissionController};
use crate::api_call::call_api;
use crate::config::Config;
use crate::error::DispatchError;
use crate::http_client::{build_client, HttpClientConfig};
use crate::input_stream::RequestLineStream;
use crate::output_log::OutputLog;
use crate::record::{AttemptError, AttemptOutcome, RequestRecord};
use crate::retry_queue::{RetryQueue, RetryQueueHandle};
use crate::status_tracker::{StatusSnapshot, StatusTracker};
use crate::token_counter::{self, EndpointKind, TiktokenEncoder, TokenEncoder};

/// The scheduler's intrinsic tick floor: sleeping this long between ticks
/// when there is nothing to admit caps throughput at ~1000 req/s, well
/// below any realistic per-minute limit, and keeps idle CPU bounded.
const TICK_INTERVAL: Duration = Duration::from_millis(1);

/// End-of-run counters, used for the exit summary.
pub type DispatchSummary = StatusSnapshot;

struct DispatchContext {
    client: Client,
    request_url: String,
    api_key: Option<String>,
    output_log: OutputLog,
    status_tracker: StatusTracker,
    retry_handle: RetryQueueHandle,
}

pub struct Dispatcher {
    config: Config,
    input_stream: RequestLineStream,
    retry_queue: RetryQueue,
    admission: AdmissionController,
    endpoint_kind: EndpointKind,
    encoder: Arc<dyn TokenEncoder>,
    status_tracker: StatusTracker,
    ctx: Arc<DispatchContext>,
    next_task_id: u64,
    next_pending: Option<RequestRecord>,
    input_exhausted: bool,
}

impl Dispatcher {
    pub async fn new(config: Config) -> Result<Self, DispatchError> {
        let input_stream = RequestLineStream::open(&config.requests_filepath).await?;
        let output_log = OutputLog::create(config.resolved_save_filepath()).await?;
        let client = build_client(&HttpClientConfig::default())
            .map_err(|err| DispatchError::Config(err.to_string()))?;
        let endpoint_kind = EndpointKind::from_url(&config.request_url)?;
        let encoder: Arc<dyn TokenEncoder> =
            Arc::new(TiktokenEncoder::by_name(&config.token_encoding_name)?);
        let status_tracker = StatusTracker::new();
        let retry_queue = RetryQueue::new();

        let ctx = Arc::new(DispatchContext {
            client,
            request_url: config.request_url.clone(),
            api_key: config.api_key.clone(),
            output_log,
            status_tracker: status_tracker.clone(),
            retry_handle: retry_queue.handle(),
        });

        Ok(Self {
            admission: AdmissionController::new(
                config.max_requests_per_minute,
                config.max_tokens_per_minute,
            ),
            input_stream,
            retry_queue,
            endpoint_kind,
            encoder,
            status_tracker,
            ctx,
            next_task_id: 0,
            next_pending: None,
            input_exhausted: false,
            config,
        })
    }

    /// Drive the dispatcher to completion. Terminates once every started
    /// request has reached a terminal state (spec.md §4.8).
    pub async fn run(mut self) -> Result<DispatchSummary, DispatchError> {
        debug!("entering dispatcher main loop");

        loop {
            if self.next_pending.is_none() {
                self.fill_next_pending().await?;
            }

            self.admission.replenish(Instant::now());

            if let Some(record) = self.next_pending.take() {
                if self.admission.try_admit(record.token_cost) {
                    self.dispatch(record);
                } else {
                    self.next_pending = Some(record);
                }
            }

            if self.status_tracker.in_progress() == 0 && self.next_pending.is_none() {
                break;
            }

            tokio::time::sleep(TICK_INTERVAL).await;
            self.apply_cooldown().await;
        }

        let summary = self.status_tracker.snapshot();
        info!(
            "parallel processing complete. results saved to {}",
            self.config.resolved_save_filepath().display()
        );
        if summary.failed > 0 {
            warn!(
                "{} / {} requests failed. errors logged to {}.",
                summary.failed,
                summary.started,
                self.config.resolved_save_filepath().display()
            );
        }
        if summary.rate_limit_errors > 0 {
            warn!(
                "{} rate limit errors received. consider running at a lower rate.",
                summary.rate_limit_errors
            );
        }

        Ok(summary)
    }

    /// Step 1 of §4.8: retry queue takes precedence over the input stream,
    /// and reading further input is withheld whenever a pending record is
    /// already held (the dispatcher's only backpressure mechanism).
    async fn fill_next_pending(&mut self) -> Result<(), DispatchError> {
        if let Some(record) = self.retry_queue.try_pop() {
            debug!(task_id = record.task_id, "retrying request");
            self.next_pending = Some(record);
            return Ok(());
        }

        if self.input_exhausted {
            return Ok(());
        }

        match self.input_stream.next_request().await? {
            Some((payload, metadata)) => {
                let token_cost =
                    token_counter::estimate(&payload, self.endpoint_kind, self.encoder.as_ref())?;
                let task_id = self.next_task_id;
                self.next_task_id += 1;

                let record = RequestRecord::new(
                    task_id,
                    payload,
                    token_cost,
                    self.config.max_attempts,
                    metadata,
                );
                self.status_tracker.record_started();
                debug!(task_id, token_cost, "read request");
                self.next_pending = Some(record);
            }
            None => {
                debug!("input stream exhausted");
                self.input_exhausted = true;
            }
        }
        Ok(())
    }

    /// Step 3 of §4.8: launch an admitted record as an independent task.
    /// `attempts_left` is decremented immediately before dispatch.
    fn dispatch(&self, mut record: RequestRecord) {
        record.consume_attempt();
        let ctx = Arc::clone(&self.ctx);
        let task_id = record.task_id;
        tokio::spawn(async move {
            info!(task_id, "starting request");
            run_attempt(record, ctx).await;
        });
    }

    /// Step 6 of §4.8: a rate-limit error pauses the *entire* dispatcher,
    /// independent of bucket state, until 15 seconds have elapsed since it
    /// was observed.
    async fn apply_cooldown(&self) {
        let Some(last_error_ms) = self.status_tracker.time_of_last_rate_limit_error_ms() else {
            return;
        };
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64;
        let elapsed = Duration::from_millis((now_ms - last_error_ms).max(0) as u64);

        if let Some(remaining) = cooldown_remaining(elapsed) {
            warn!(
                seconds = remaining.as_secs_f64(),
                "pausing to cool down after a rate limit error"
            );
            tokio::time::sleep(remaining).await;
        }
    }
}

/// Runs one attempt of `record` to completion and applies §4.3's
/// re-enqueue-or-finalize step.
async fn run_attempt(mut record: RequestRecord, ctx: Arc<DispatchContext>) {
    let outcome = call_api(
        &ctx.client,
        &ctx.request_url,
        ctx.api_key.as_deref(),
        &record.payload,
    )
    .await;

    match outcome {
        AttemptOutcome::Success(body) => {
            if let Err(err) = ctx
                .output_log
                .append_success(&record.payload, &body, record.metadata.as_ref())
                .await
            {
                error!(task_id = record.task_id, %err, "failed to write success record");
            }
            ctx.status_tracker.record_success();
            debug!(task_id = record.task_id, "request succeeded");
        }
        AttemptOutcome::Failure(attempt_error) => {
            match &attempt_error {
                AttemptError::RateLimit(_) => ctx.status_tracker.record_rate_limit_error(),
                AttemptError::Api(_) => ctx.status_tracker.record_api_error(),
                AttemptError::Transport(_) => ctx.status_tracker.record_other_error(),
            }
            warn!(
                task_id = record.task_id,
                error = %attempt_error,
                "request attempt failed"
            );
            record.record_error(attempt_error.to_string());

            if record.has_attempts_remaining() {
                ctx.retry_handle.push(record);
            } else {
                error!(
                    task_id = record.task_id,
                    errors = ?record.errors,
                    "request failed after all attempts"
                );
                if let Err(err) = ctx
                    .output_log
                    .append_failure(&record.payload, &record.errors, record.metadata.as_ref())
                    .await
                {
                    error!(task_id = record.task_id, %err, "failed to write failure record");
                }
                ctx.status_tracker.record_failure();
            }
        }
    }
}
