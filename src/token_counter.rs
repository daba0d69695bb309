//! # Token Counter (C1)
//!
//! Pure function estimating a request's token cost before dispatch, so the
//! admission controller can debit the tokens-per-minute bucket accurately
//! up front. The estimate is never revised after ingestion — a cheap
//! approximation is the point: the constants below mirror the original
//! Python tool this crate's behavior is grounded on and must not be
//! changed without a compatibility note (spec.md §4.1).

use serde_json::Value;
use std::sync::Arc;

use crate::error::DispatchError;

/// The coarse endpoint category inferred from the request URL, used only
/// for token estimation — it has no bearing on how the request is
/// actually dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    PlainCompletion,
    ChatCompletion,
    Embedding,
}

impl EndpointKind {
    /// Infer the endpoint kind from a `request_url`, using the last path
    /// segment after `/v<digits>/` as in spec.md §6. A `chat/` prefix on a
    /// `completions` segment selects the chat variant.
    pub fn from_url(request_url: &str) -> Result<Self, DispatchError> {
        let segment = endpoint_segment(request_url).ok_or_else(|| {
            DispatchError::UnsupportedEndpoint(format!(
                "could not locate a /v<digits>/... segment in '{request_url}'"
            ))
        })?;

        if segment == "embeddings" {
            Ok(EndpointKind::Embedding)
        } else if segment.ends_with("completions") {
            if segment.starts_with("chat/") {
                Ok(EndpointKind::ChatCompletion)
            } else {
                Ok(EndpointKind::PlainCompletion)
            }
        } else {
            Err(DispatchError::UnsupportedEndpoint(segment.to_string()))
        }
    }
}

/// Returns everything after the first `/v<digits>/` path segment.
fn endpoint_segment(request_url: &str) -> Option<&str> {
    let mut rest = request_url;
    loop {
        let slash = rest.find('/')?;
        let (before, after) = rest.split_at(slash);
        let after = &after[1..];
        let _ = before;
        if after.starts_with('v') {
            let digits_end = after[1..]
                .find(|c: char| !c.is_ascii_digit())
                .map(|i| i + 1)
                .unwrap_or(after.len());
            if digits_end > 1 && after.as_bytes().get(digits_end) == Some(&b'/') {
                return Some(&after[digits_end + 1..]);
            }
        }
        rest = after;
        if rest.is_empty() {
            return None;
        }
    }
}

/// Deterministic `encode(text) -> tokens` over UTF-8 strings. Implemented
/// over `tiktoken-rs` in [`crate::token_counter::TiktokenEncoder`]; kept as
/// a trait so alternate encoders are swappable by name and so tests don't
/// need a real BPE table.
pub trait TokenEncoder: Send + Sync {
    fn encode_len(&self, text: &str) -> usize;
}

/// `tiktoken-rs`-backed encoder. The dispatcher does not cache tokenizer
/// state across requests beyond this one shared `CoreBPE` table per run.
pub struct TiktokenEncoder {
    bpe: Arc<tiktoken_rs::CoreBPE>,
}

impl TiktokenEncoder {
    pub fn by_name(encoding_name: &str) -> Result<Self, DispatchError> {
        let bpe = match encoding_name {
            "cl100k_base" => tiktoken_rs::cl100k_base(),
            "p50k_base" => tiktoken_rs::p50k_base(),
            "p50k_edit" => tiktoken_rs::p50k_edit(),
            "r50k_base" | "gpt2" => tiktoken_rs::r50k_base(),
            other => {
                return Err(DispatchError::UnsupportedEndpoint(format!(
                    "unknown token encoding '{other}'"
                )))
            }
        }
        .map_err(|err| DispatchError::Config(format!("failed to load tokenizer: {err}")))?;

        Ok(Self { bpe: Arc::new(bpe) })
    }
}

impl TokenEncoder for TiktokenEncoder {
    fn encode_len(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

/// Per-message framing overhead (models the chat format's role/name
/// delimiters). Must not change without a compatibility note — spec.md §4.1.
const CHAT_MESSAGE_OVERHEAD: u32 = 4;
/// Per-conversation framing overhead, added once per request.
const CHAT_CONVERSATION_OVERHEAD: u32 = 2;
/// Default completion budget when the payload doesn't specify `max_tokens`.
const DEFAULT_MAX_TOKENS: u32 = 15;

/// Estimate the token cost of `payload` against `endpoint_kind`, using
/// `encoder` to count tokens in any string the endpoint contributes.
pub fn estimate(
    payload: &Value,
    endpoint_kind: EndpointKind,
    encoder: &dyn TokenEncoder,
) -> Result<u32, DispatchError> {
    match endpoint_kind {
        EndpointKind::PlainCompletion => estimate_plain_completion(payload, encoder),
        EndpointKind::ChatCompletion => estimate_chat_completion(payload, encoder),
        EndpointKind::Embedding => estimate_embedding(payload, encoder),
    }
}

fn completion_budget(payload: &Value) -> u32 {
    let n = payload.get("n").and_then(Value::as_u64).unwrap_or(1) as u32;
    let max_tokens = payload
        .get("max_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(u64::from(DEFAULT_MAX_TOKENS)) as u32;
    n.saturating_mul(max_tokens)
}

fn estimate_plain_completion(
    payload: &Value,
    encoder: &dyn TokenEncoder,
) -> Result<u32, DispatchError> {
    let prompt = payload.get("prompt").ok_or_else(|| {
        DispatchError::InvalidInput("plain completion request missing 'prompt' field".to_string())
    })?;
    let prompt_tokens = count_tokens_of_string_or_list(prompt, encoder)?;
    Ok(prompt_tokens.saturating_add(completion_budget(payload)))
}

fn estimate_chat_completion(
    payload: &Value,
    encoder: &dyn TokenEncoder,
) -> Result<u32, DispatchError> {
    let messages = payload
        .get("messages")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            DispatchError::InvalidInput(
                "chat completion request missing 'messages' array".to_string(),
            )
        })?;

    let mut total: u32 = 0;
    for message in messages {
        let object = message.as_object().ok_or_else(|| {
            DispatchError::InvalidInput("chat message must be a JSON object".to_string())
        })?;
        let mut per_message: u32 = CHAT_MESSAGE_OVERHEAD;
        // Only string-valued fields contribute — the resolution of the
        // Open Question in spec.md §9: non-string field values are
        // skipped rather than recursed into or treated as an error.
        for value in object.values() {
            if let Some(text) = value.as_str() {
                per_message = per_message.saturating_add(encoder.encode_len(text) as u32);
            }
        }
        total = total.saturating_add(per_message);
    }
    total = total.saturating_add(CHAT_CONVERSATION_OVERHEAD);
    Ok(total.saturating_add(completion_budget(payload)))
}

fn estimate_embedding(payload: &Value, encoder: &dyn TokenEncoder) -> Result<u32, DispatchError> {
    let input = payload.get("input").ok_or_else(|| {
        DispatchError::InvalidInput("embedding request missing 'input' field".to_string())
    })?;
    count_tokens_of_string_or_list(input, encoder)
}

fn count_tokens_of_string_or_list(
    value: &Value,
    encoder: &dyn TokenEncoder,
) -> Result<u32, DispatchError> {
    if let Some(text) = value.as_str() {
        return Ok(encoder.encode_len(text) as u32);
    }
    if let Some(items) = value.as_array() {
        let mut total: u32 = 0;
        for item in items {
            let text = item.as_str().ok_or_else(|| {
                DispatchError::InvalidInput(
                    "input list must contain only strings".to_string(),
                )
            })?;
            total = total.saturating_add(encoder.encode_len(text) as u32);
        }
        return Ok(total);
    }
    Err(DispatchError::InvalidInput(
        "input must be a string or a list of strings".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// A trivial encoder counting one token per whitespace-separated word,
    /// so tests don't depend on a real BPE table.
    struct WordEncoder;
    impl TokenEncoder for WordEncoder {
        fn encode_len(&self, text: &str) -> usize {
            text.split_whitespace().count()
        }
    }

    #[test]
    fn detects_embeddings_endpoint() {
        let kind = EndpointKind::from_url("https://api.openai.com/v1/embeddings").unwrap();
        assert_eq!(kind, EndpointKind::Embedding);
    }

    #[test]
    fn detects_chat_completions_endpoint() {
        let kind =
            EndpointKind::from_url("https://api.openai.com/v1/chat/completions").unwrap();
        assert_eq!(kind, EndpointKind::ChatCompletion);
    }

    #[test]
    fn detects_plain_completions_endpoint() {
        let kind = EndpointKind::from_url("https://api.openai.com/v1/completions").unwrap();
        assert_eq!(kind, EndpointKind::PlainCompletion);
    }

    #[test]
    fn rejects_unknown_endpoint() {
        let err = EndpointKind::from_url("https://api.openai.com/v1/models");
        assert!(err.is_err());
    }

    #[test]
    fn plain_completion_adds_default_completion_budget() {
        let payload = json!({"prompt": "one two three"});
        let cost = estimate(&payload, EndpointKind::PlainCompletion, &WordEncoder).unwrap();
        // 3 prompt tokens + n(1) * max_tokens(default 15)
        assert_eq!(cost, 18);
    }

    #[test]
    fn plain_completion_honors_explicit_max_tokens_and_n() {
        let payload = json!({"prompt": "one two", "max_tokens": 10, "n": 2});
        let cost = estimate(&payload, EndpointKind::PlainCompletion, &WordEncoder).unwrap();
        assert_eq!(cost, 2 + 2 * 10);
    }

    #[test]
    fn chat_completion_applies_framing_overhead() {
        let payload = json!({
            "messages": [
                {"role": "user", "content": "one two"},
                {"role": "assistant", "content": "three"}
            ]
        });
        let cost = estimate(&payload, EndpointKind::ChatCompletion, &WordEncoder).unwrap();
        // msg1: 4 + 1(role "user") + 2(content) = 7
        // msg2: 4 + 1(role "assistant") + 1(content) = 6
        // + 2 conversation overhead + 15 default completion budget
        assert_eq!(cost, 7 + 6 + 2 + 15);
    }

    #[test]
    fn chat_completion_skips_non_string_fields() {
        let payload = json!({
            "messages": [
                {"role": "user", "content": "hi", "name": null, "extra": {"a": 1}}
            ]
        });
        let cost = estimate(&payload, EndpointKind::ChatCompletion, &WordEncoder).unwrap();
        // 4 + role(1) + content(1) + 2 + 15 -- `extra` (object) and `name` (null) contribute nothing
        assert_eq!(cost, 4 + 1 + 1 + 2 + 15);
    }

    #[test]
    fn embedding_single_string() {
        let payload = json!({"input": "one two three four"});
        let cost = estimate(&payload, EndpointKind::Embedding, &WordEncoder).unwrap();
        assert_eq!(cost, 4);
    }

    #[test]
    fn embedding_list_of_strings_sums() {
        let payload = json!({"input": ["one two", "three"]});
        let cost = estimate(&payload, EndpointKind::Embedding, &WordEncoder).unwrap();
        assert_eq!(cost, 3);
    }

    #[test]
    fn embedding_rejects_non_string_input() {
        let payload = json!({"input": 42});
        let err = estimate(&payload, EndpointKind::Embedding, &WordEncoder);
        assert!(err.is_err());
    }
}
