//! # Input Stream (C5)
//!
//! A forward-only, one-record-at-a-time reader over a line-delimited JSON
//! request file. The optional top-level `metadata` field is extracted out
//! of the payload before dispatch — it is never sent to the remote.

use serde_json::Value;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

use crate::error::DispatchError;

pub struct RequestLineStream {
    lines: Lines<BufReader<File>>,
    next_line_no: u64,
}

impl RequestLineStream {
    pub async fn open(path: impl AsRef<std::path::Path>) -> Result<Self, DispatchError> {
        let file = File::open(path).await?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            next_line_no: 1,
        })
    }

    /// Returns the next request's (payload, metadata) pair, or `None` once
    /// the file is exhausted. A parse failure is fatal — the input file is
    /// authoritative (spec.md §4.5).
    pub async fn next_request(
        &mut self,
    ) -> Result<Option<(Value, Option<Value>)>, DispatchError> {
        let raw = match self.lines.next_line().await? {
            Some(line) => line,
            None => return Ok(None),
        };
        let line_no = self.next_line_no;
        self.next_line_no += 1;

        let mut payload: Value =
            serde_json::from_str(&raw).map_err(|source| DispatchError::MalformedInput {
                line: line_no,
                source,
            })?;

        let metadata = payload
            .as_object_mut()
            .and_then(|object| object.remove("metadata"))
            .filter(|value| !value.is_null());

        Ok(Some((payload, metadata)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    async fn stream_over(contents: &str) -> RequestLineStream {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        RequestLineStream::open(file.path()).await.unwrap()
    }

    #[tokio::test]
    async fn reads_requests_in_order() {
        let mut stream = stream_over("{\"a\":1}\n{\"a\":2}\n").await;
        let (first, _) = stream.next_request().await.unwrap().unwrap();
        let (second, _) = stream.next_request().await.unwrap().unwrap();
        assert_eq!(first, json!({"a": 1}));
        assert_eq!(second, json!({"a": 2}));
        assert!(stream.next_request().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn extracts_metadata_out_of_the_payload() {
        let mut stream = stream_over("{\"a\":1,\"metadata\":{\"tag\":\"x\"}}\n").await;
        let (payload, metadata) = stream.next_request().await.unwrap().unwrap();
        assert_eq!(payload, json!({"a": 1}));
        assert_eq!(metadata, Some(json!({"tag": "x"})));
    }

    #[tokio::test]
    async fn no_metadata_field_yields_none() {
        let mut stream = stream_over("{\"a\":1}\n").await;
        let (_, metadata) = stream.next_request().await.unwrap().unwrap();
        assert!(metadata.is_none());
    }

    #[tokio::test]
    async fn null_metadata_is_treated_as_absent() {
        let mut stream = stream_over("{\"a\":1,\"metadata\":null}\n").await;
        let (payload, metadata) = stream.next_request().await.unwrap().unwrap();
        assert_eq!(payload, json!({"a": 1}));
        assert!(metadata.is_none());
    }

    #[tokio::test]
    async fn malformed_line_is_fatal() {
        let mut stream = stream_over("not json\n").await;
        let err = stream.next_request().await;
        assert!(matches!(err, Err(DispatchError::MalformedInput { line: 1, .. })));
    }

    #[tokio::test]
    async fn blank_line_is_fatal() {
        let mut stream = stream_over("{\"a\":1}\n\n").await;
        stream.next_request().await.unwrap().unwrap();
        let err = stream.next_request().await;
        assert!(matches!(err, Err(DispatchError::MalformedInput { line: 2, .. })));
    }
}
