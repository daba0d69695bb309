//! Token counting exercised with the real `tiktoken-rs`-backed encoder,
//! as opposed to the word-counting test double used by the in-module unit
//! tests.

use ratelimited_dispatch::token_counter::{estimate, EndpointKind, TiktokenEncoder};
use serde_json::json;

#[test]
fn embeddings_endpoint_is_detected_from_a_realistic_url() {
    let kind = EndpointKind::from_url("https://api.openai.com/v1/embeddings").unwrap();
    assert_eq!(kind, EndpointKind::Embedding);
}

#[test]
fn real_encoder_counts_nonzero_tokens_for_nonempty_text() {
    let encoder = TiktokenEncoder::by_name("cl100k_base").unwrap();
    let payload = json!({"input": "the quick brown fox jumps over the lazy dog"});
    let cost = estimate(&payload, EndpointKind::Embedding, &encoder).unwrap();
    assert!(cost > 0);
}

#[test]
fn chat_completion_cost_grows_with_conversation_length() {
    let encoder = TiktokenEncoder::by_name("cl100k_base").unwrap();
    let short = json!({"messages": [{"role": "user", "content": "hi"}]});
    let long = json!({
        "messages": [
            {"role": "user", "content": "hi"},
            {"role": "assistant", "content": "hello, how can I help you today?"},
            {"role": "user", "content": "tell me something interesting about Rust"}
        ]
    });
    let short_cost = estimate(&short, EndpointKind::ChatCompletion, &encoder).unwrap();
    let long_cost = estimate(&long, EndpointKind::ChatCompletion, &encoder).unwrap();
    assert!(long_cost > short_cost);
}

#[test]
fn unknown_encoding_name_is_rejected() {
    assert!(TiktokenEncoder::by_name("not-a-real-encoding").is_err());
}
