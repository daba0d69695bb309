//! # API Call (C3, the per-attempt call semantics of §4.3)
//!
//! POSTs a request payload to the remote endpoint and classifies the
//! result into a [`RequestRecord`]-ready [`AttemptOutcome`]. Re-enqueue vs.
//! terminal-failure bookkeeping is the dispatcher's job (§4.8), not this
//! function's — `call_api` only performs the attempt and classifies it.

use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::record::{AttemptError, AttemptOutcome};

/// Marker substring the remote uses on its own rate-limit error messages.
/// Matching is intentionally case-sensitive, per spec.md §4.3/§9.
const RATE_LIMIT_MARKER: &str = "Rate limit";

pub async fn call_api(
    client: &Client,
    request_url: &str,
    api_key: Option<&str>,
    payload: &Value,
) -> AttemptOutcome {
    let mut request = client.post(request_url).json(payload);
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(err) => return AttemptOutcome::Failure(AttemptError::Transport(err.to_string())),
    };

    // A 429 is treated as a rate-limit signal even if the body doesn't
    // carry the "Rate limit" substring — the hardening suggested in
    // spec.md §9, kept compatible with the substring check below.
    let status = response.status();

    let body: Value = match response.json().await {
        Ok(body) => body,
        Err(err) => return AttemptOutcome::Failure(AttemptError::Transport(err.to_string())),
    };

    classify(status, body)
}

fn classify(status: StatusCode, body: Value) -> AttemptOutcome {
    let Some(error) = body.get("error") else {
        return AttemptOutcome::Success(body);
    };

    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default();

    if status == StatusCode::TOO_MANY_REQUESTS || message.contains(RATE_LIMIT_MARKER) {
        AttemptOutcome::Failure(AttemptError::RateLimit(error.to_string()))
    } else {
        AttemptOutcome::Failure(AttemptError::Api(error.to_string()))
    }
}
