//! # Dispatcher Configuration
//!
//! Command-line arguments, environment variables, and `.env` file loading
//! for the parallel request dispatcher, following the same layering the
//! rest of this ecosystem uses: CLI flag > environment variable > default.

#[cfg(feature = "cli")]
use clap::Parser;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::DispatchError;

/// Dispatcher configuration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", command(name = "ratedispatch"))]
#[cfg_attr(
    feature = "cli",
    command(
        about = "Streams requests from a file and dispatches them against a remote API under a dual-axis rate limit"
    )
)]
#[cfg_attr(feature = "cli", command(version))]
pub struct Config {
    /// Path to the newline-delimited JSON file of requests to process.
    #[cfg_attr(feature = "cli", arg(long, env = "REQUESTS_FILEPATH"))]
    pub requests_filepath: PathBuf,

    /// Path to write terminal outcomes to. Defaults to the input path with
    /// `.jsonl` replaced by `_results.jsonl`.
    #[cfg_attr(feature = "cli", arg(long, env = "SAVE_FILEPATH"))]
    pub save_filepath: Option<PathBuf>,

    /// Remote endpoint URL requests are POSTed to.
    #[cfg_attr(
        feature = "cli",
        arg(
            long,
            env = "REQUEST_URL",
            default_value = "https://api.openai.com/v1/embeddings"
        )
    )]
    pub request_url: String,

    /// Bearer token for the remote endpoint.
    #[cfg_attr(feature = "cli", arg(long, env = "OPENAI_API_KEY"))]
    pub api_key: Option<String>,

    /// Maximum requests admitted per 60-second window.
    #[cfg_attr(
        feature = "cli",
        arg(long, env = "MAX_REQUESTS_PER_MINUTE", default_value = "1500")
    )]
    pub max_requests_per_minute: f64,

    /// Maximum tokens admitted per 60-second window.
    #[cfg_attr(
        feature = "cli",
        arg(long, env = "MAX_TOKENS_PER_MINUTE", default_value = "125000")
    )]
    pub max_tokens_per_minute: f64,

    /// Tokenizer used to estimate request cost.
    #[cfg_attr(
        feature = "cli",
        arg(long, env = "TOKEN_ENCODING_NAME", default_value = "cl100k_base")
    )]
    pub token_encoding_name: String,

    /// Maximum attempts per request before it is logged as a terminal
    /// failure.
    #[cfg_attr(feature = "cli", arg(long, env = "MAX_ATTEMPTS", default_value = "5"))]
    pub max_attempts: u32,

    /// Logging level (error, warn, info, debug, trace).
    #[cfg_attr(feature = "cli", arg(long, env = "RUST_LOG", default_value = "info"))]
    pub logging_level: String,
}

impl Config {
    /// Parse configuration from command-line arguments and environment
    /// variables, loading a `.env` file first if one is present.
    #[cfg(feature = "cli")]
    pub fn parse_args() -> Self {
        let _ = dotenv::dotenv();
        Self::parse()
    }

    /// The file terminal outcomes are written to: the explicit
    /// `--save-filepath`, or the input path with `.jsonl` replaced by
    /// `_results.jsonl`.
    pub fn resolved_save_filepath(&self) -> PathBuf {
        if let Some(path) = &self.save_filepath {
            return path.clone();
        }
        derive_save_filepath(&self.requests_filepath)
    }

    /// A minimal configuration for tests.
    pub fn for_test(requests_filepath: impl Into<PathBuf>) -> Self {
        Self {
            requests_filepath: requests_filepath.into(),
            save_filepath: None,
            request_url: "https://api.openai.com/v1/embeddings".to_string(),
            api_key: Some("test-key".to_string()),
            max_requests_per_minute: 1500.0,
            max_tokens_per_minute: 125_000.0,
            token_encoding_name: "cl100k_base".to_string(),
            max_attempts: 5,
            logging_level: "info".to_string(),
        }
    }

    /// Validate configuration values, returning the first hard failure.
    /// Soft concerns (ones that don't make the run incoherent) are printed
    /// as warnings instead of rejected.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if !self.requests_filepath.exists() {
            return Err(DispatchError::Config(format!(
                "requests file not found: {}",
                self.requests_filepath.display()
            )));
        }

        match Url::parse(&self.request_url) {
            Ok(url) => {
                if !["http", "https"].contains(&url.scheme()) {
                    return Err(DispatchError::Config(format!(
                        "invalid URL scheme '{}'. Only 'http' and 'https' are supported.",
                        url.scheme()
                    )));
                }
            }
            Err(err) => {
                return Err(DispatchError::Config(format!(
                    "invalid request_url '{}': {}",
                    self.request_url, err
                )));
            }
        }

        if self.max_attempts == 0 {
            return Err(DispatchError::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        if self.max_requests_per_minute <= 0.0 {
            return Err(DispatchError::Config(
                "max_requests_per_minute must be greater than 0".to_string(),
            ));
        }

        if self.max_tokens_per_minute <= 0.0 {
            return Err(DispatchError::Config(
                "max_tokens_per_minute must be greater than 0".to_string(),
            ));
        }

        if self.api_key.is_none() {
            eprintln!(
                "⚠️  Warning: no API key configured (--api-key / OPENAI_API_KEY). \
                Requests will be sent without an Authorization header."
            );
        }

        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging_level.as_str()) {
            return Err(DispatchError::Config(format!(
                "invalid logging level '{}'. Valid options are: {}",
                self.logging_level,
                valid_log_levels.join(", ")
            )));
        }

        Ok(())
    }
}

fn derive_save_filepath(requests_filepath: &Path) -> PathBuf {
    let as_str = requests_filepath.to_string_lossy();
    if let Some(stripped) = as_str.strip_suffix(".jsonl") {
        PathBuf::from(format!("{stripped}_results.jsonl"))
    } else {
        PathBuf::from(format!("{as_str}_results.jsonl"))
    }
}
