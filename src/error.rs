//! Crate-wide error type for conditions the dispatcher cannot recover from.
//!
//! Transient, per-attempt failures (rate limits, API errors, transport
//! errors) are not represented here — they are recorded as strings on a
//! [`crate::record::RequestRecord`] and retried. `DispatchError` is reserved
//! for the categories the specification calls fatal: malformed input, an
//! unsupported endpoint kind during token counting, and configuration or
//! I/O failures that should abort the whole run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The `request_url` does not route to a token-counting strategy this
    /// crate knows how to estimate (plain completion, chat completion,
    /// embedding).
    #[error("unsupported endpoint for token counting: {0}")]
    UnsupportedEndpoint(String),

    /// A payload field had a shape the token counter cannot interpret
    /// (e.g. an `input` field on an embeddings request that is neither a
    /// string nor an array of strings).
    #[error("invalid input for token counting: {0}")]
    InvalidInput(String),

    /// A line of the input file was not valid JSON. The input file is
    /// authoritative, so this aborts the run rather than being skipped.
    #[error("malformed input at line {line}: {source}")]
    MalformedInput {
        line: u64,
        #[source]
        source: serde_json::Error,
    },

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}
